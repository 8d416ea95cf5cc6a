pub mod header_page;
pub mod index_page;

pub use header_page::{HeaderPage, HEADER_PAGE_MAX_RECORDS, HEADER_RECORD_NAME_SIZE};
pub use index_page::{
    BPlusTreeInternalPage, BPlusTreeInternalPageHeader, BPlusTreeLeafPage, BPlusTreeLeafPageHeader,
    BPlusTreePage, BPlusTreePageType, InternalKV, LeafKV, INTERNAL_PAGE_HEADER_SIZE,
    LEAF_PAGE_HEADER_SIZE,
};

use crate::buffer::PageId;

/// Record identifier: an opaque pointer at a tuple in a heap file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }
}
