pub mod btree_index;
pub mod btree_iterator;
pub mod comparator;

pub use btree_index::BPlusTree;
pub use btree_iterator::TreeIndexIterator;
pub use comparator::{default_comparator, KeyComparator};
