pub mod common;
pub mod header_page;
pub mod index_page;

pub use common::CommonCodec;
pub use header_page::HeaderPageCodec;
pub use index_page::{
    BPlusTreeInternalPageCodec, BPlusTreeLeafPageCodec, BPlusTreePageCodec, BPlusTreePageTypeCodec,
};

// data + consumed offset
pub type DecodedData<T> = (T, usize);
