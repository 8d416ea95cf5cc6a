use std::sync::Arc;

use crate::buffer::{BufferPoolManager, PageId, INVALID_PAGE_ID};
use crate::error::VellumResult;
use crate::storage::page::{BPlusTreeLeafPage, LeafKV};

/// Forward iterator over leaf entries. Holds a pin on the current leaf,
/// follows `next_page_id` when a leaf is exhausted, and unpins the previous
/// leaf on every advance (and the current one on drop).
#[derive(Debug)]
pub struct TreeIndexIterator {
    buffer_pool: Arc<BufferPoolManager>,
    // INVALID_PAGE_ID once exhausted
    leaf_page_id: PageId,
    leaf: BPlusTreeLeafPage,
    cursor: usize,
}

impl TreeIndexIterator {
    pub(crate) fn new(
        buffer_pool: Arc<BufferPoolManager>,
        leaf_page_id: PageId,
        leaf: BPlusTreeLeafPage,
        cursor: usize,
    ) -> Self {
        Self {
            buffer_pool,
            leaf_page_id,
            leaf,
            cursor,
        }
    }

    /// The end sentinel: already exhausted, pinning nothing.
    pub(crate) fn end(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            leaf_page_id: INVALID_PAGE_ID,
            leaf: BPlusTreeLeafPage::new(INVALID_PAGE_ID, INVALID_PAGE_ID, 0),
            cursor: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.leaf_page_id == INVALID_PAGE_ID
    }

    pub fn next(&mut self) -> VellumResult<Option<LeafKV>> {
        loop {
            if self.leaf_page_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            if self.cursor < self.leaf.header.current_size as usize {
                let kv = self.leaf.kv_at(self.cursor).clone();
                self.cursor += 1;
                return Ok(Some(kv));
            }
            let next_id = self.leaf.header.next_page_id;
            self.buffer_pool.unpin_page(self.leaf_page_id, false);
            self.leaf_page_id = INVALID_PAGE_ID;
            if next_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            self.leaf = self.buffer_pool.fetch_tree_leaf_page(next_id)?;
            self.leaf_page_id = next_id;
            self.cursor = 0;
        }
    }
}

impl Drop for TreeIndexIterator {
    fn drop(&mut self) {
        if self.leaf_page_id != INVALID_PAGE_ID {
            self.buffer_pool.unpin_page(self.leaf_page_id, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::BufferPoolManager;
    use crate::config::BTreeConfig;
    use crate::storage::disk_manager::DiskManager;
    use crate::storage::index::comparator::default_comparator;
    use crate::storage::index::BPlusTree;
    use crate::storage::page::RecordId;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn key(i: i32) -> Vec<u8> {
        i.to_be_bytes().to_vec()
    }

    fn build_tree() -> (TempDir, BPlusTree) {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        let buffer_pool = Arc::new(BufferPoolManager::new(64, disk_manager));
        let tree = BPlusTree::new(
            "iter_index",
            buffer_pool,
            default_comparator,
            BTreeConfig {
                leaf_max_size: 3,
                internal_max_size: 3,
            },
        )
        .unwrap();
        for i in 1..=9 {
            tree.insert(&key(i), RecordId::new(i, i as u32)).unwrap();
        }
        (temp_dir, tree)
    }

    #[test]
    fn scans_all_entries_in_order() {
        let (_temp_dir, tree) = build_tree();
        let mut iterator = tree.begin().unwrap();
        for i in 1..=9 {
            let (k, rid) = iterator.next().unwrap().unwrap();
            assert_eq!(k, key(i));
            assert_eq!(rid, RecordId::new(i, i as u32));
        }
        assert_eq!(iterator.next().unwrap(), None);
        // stays exhausted
        assert_eq!(iterator.next().unwrap(), None);
    }

    #[test]
    fn begin_from_seeks_the_first_entry_not_below_key() {
        let (_temp_dir, tree) = build_tree();

        let mut iterator = tree.begin_from(&key(4)).unwrap();
        let (k, _) = iterator.next().unwrap().unwrap();
        assert_eq!(k, key(4));

        // between stored keys: lands on the next one
        tree.remove(&key(5)).unwrap();
        let mut iterator = tree.begin_from(&key(5)).unwrap();
        let (k, _) = iterator.next().unwrap().unwrap();
        assert_eq!(k, key(6));

        // past the last key: end sentinel
        let iterator = tree.begin_from(&key(100)).unwrap();
        assert!(iterator.is_end());
    }

    #[test]
    fn empty_tree_yields_end() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        let buffer_pool = Arc::new(BufferPoolManager::new(8, disk_manager));
        let tree = BPlusTree::new(
            "empty",
            buffer_pool,
            default_comparator,
            BTreeConfig::default(),
        )
        .unwrap();
        let mut iterator = tree.begin().unwrap();
        assert!(iterator.is_end());
        assert_eq!(iterator.next().unwrap(), None);
    }

    #[test]
    fn iterator_releases_its_pin_on_drop() {
        let (_temp_dir, tree) = build_tree();
        {
            let mut iterator = tree.begin().unwrap();
            let _ = iterator.next().unwrap();
        }
        // with the pin released the leaf is deletable once unreferenced;
        // a full scan still works
        let mut iterator = tree.begin().unwrap();
        let mut count = 0;
        while iterator.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 9);
    }
}
