use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::buffer::{
    AtomicPageId, BufferPoolManager, PageId, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::config::BTreeConfig;
use crate::error::{VellumError, VellumResult};
use crate::storage::index::btree_iterator::TreeIndexIterator;
use crate::storage::index::comparator::KeyComparator;
use crate::storage::page::{
    BPlusTreeInternalPage, BPlusTreeLeafPage, BPlusTreePage, RecordId,
};

/// Ordered record of pages pinned during a write descent. Ancestors are
/// released as soon as the child below them is proven safe; whatever is left
/// is released on every exit path.
struct Context {
    pinned: Vec<PageId>,
}

impl Context {
    fn new() -> Self {
        Self { pinned: Vec::new() }
    }
}

/// On-disk B+ tree with unique keys. Keys are opaque byte strings ordered by
/// a comparator fixed at construction; leaf values are `RecordId`s. The root
/// page id of every named tree is registered in the header page.
///
/// Writers serialize through the root latch, so split and merge chains never
/// race each other; readers traverse over pinned pages hand over hand.
#[derive(Debug)]
pub struct BPlusTree {
    pub index_name: String,
    pub buffer_pool: Arc<BufferPoolManager>,
    comparator: KeyComparator,
    pub leaf_max_size: u32,
    pub internal_max_size: u32,
    root_page_id: AtomicPageId,
    root_latch: Mutex<()>,
}

impl BPlusTree {
    /// Open or create the named tree, recovering its root from the header
    /// page when the name is already registered.
    pub fn new(
        index_name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        comparator: KeyComparator,
        config: BTreeConfig,
    ) -> VellumResult<Self> {
        let index_name = index_name.into();
        let header = buffer_pool.fetch_header_page()?;
        let root_page_id = header.get_root_id(&index_name).unwrap_or(INVALID_PAGE_ID);
        buffer_pool.unpin_page(HEADER_PAGE_ID, false);
        Ok(Self {
            index_name,
            buffer_pool,
            comparator,
            leaf_max_size: config.leaf_max_size,
            internal_max_size: config.internal_max_size,
            root_page_id: AtomicPageId::new(root_page_id),
            root_latch: Mutex::new(()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id.load(Ordering::SeqCst) == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id.load(Ordering::SeqCst)
    }

    /// Point lookup. Every fetched page is unpinned once its child is
    /// pinned; nothing is written back.
    pub fn get_value(&self, key: &[u8]) -> VellumResult<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut current_id = self.root_page_id.load(Ordering::SeqCst);
        let mut current = self.buffer_pool.fetch_tree_page(current_id)?;
        loop {
            match current {
                BPlusTreePage::Internal(internal) => {
                    // pin the child before letting go of its parent
                    let child_id = internal.look_up(key, self.comparator);
                    let child = self.buffer_pool.fetch_tree_page(child_id);
                    self.buffer_pool.unpin_page(current_id, false);
                    current = child?;
                    current_id = child_id;
                }
                BPlusTreePage::Leaf(leaf) => {
                    let result = leaf.look_up(key, self.comparator);
                    self.buffer_pool.unpin_page(current_id, false);
                    return Ok(result);
                }
            }
        }
    }

    /// Insert a unique key. `Ok(false)` when the key already exists.
    pub fn insert(&self, key: &[u8], rid: RecordId) -> VellumResult<bool> {
        let _writer = self.root_latch.lock();
        if self.is_empty() {
            self.start_new_tree(key, rid)?;
            return Ok(true);
        }
        let mut context = Context::new();
        let result = self.insert_into_leaf(key, rid, &mut context);
        self.release_context(&mut context);
        result
    }

    /// Remove a key; silent when absent.
    pub fn remove(&self, key: &[u8]) -> VellumResult<()> {
        let _writer = self.root_latch.lock();
        if self.is_empty() {
            return Ok(());
        }
        let mut context = Context::new();
        let result = self.remove_from_leaf(key, &mut context);
        self.release_context(&mut context);
        result
    }

    /// Iterator over the whole tree, starting at the leftmost leaf.
    pub fn begin(&self) -> VellumResult<TreeIndexIterator> {
        if self.is_empty() {
            return Ok(self.end());
        }
        let mut current_id = self.root_page_id.load(Ordering::SeqCst);
        loop {
            let page = self.buffer_pool.fetch_tree_page(current_id)?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    let child_id = internal.value_at(0);
                    self.buffer_pool.unpin_page(current_id, false);
                    current_id = child_id;
                }
                BPlusTreePage::Leaf(leaf) => {
                    return Ok(TreeIndexIterator::new(
                        self.buffer_pool.clone(),
                        current_id,
                        leaf,
                        0,
                    ));
                }
            }
        }
    }

    /// Iterator positioned at the first entry with `entry >= key`.
    pub fn begin_from(&self, key: &[u8]) -> VellumResult<TreeIndexIterator> {
        if self.is_empty() {
            return Ok(self.end());
        }
        let mut current_id = self.root_page_id.load(Ordering::SeqCst);
        loop {
            let page = self.buffer_pool.fetch_tree_page(current_id)?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    let child_id = internal.look_up(key, self.comparator);
                    self.buffer_pool.unpin_page(current_id, false);
                    current_id = child_id;
                }
                BPlusTreePage::Leaf(leaf) => {
                    if let Some(cursor) = leaf.next_closest(key, true, self.comparator) {
                        return Ok(TreeIndexIterator::new(
                            self.buffer_pool.clone(),
                            current_id,
                            leaf,
                            cursor,
                        ));
                    }
                    // every entry here is smaller; start at the next leaf
                    let next_id = leaf.header.next_page_id;
                    self.buffer_pool.unpin_page(current_id, false);
                    if next_id == INVALID_PAGE_ID {
                        return Ok(self.end());
                    }
                    let next_leaf = self.buffer_pool.fetch_tree_leaf_page(next_id)?;
                    return Ok(TreeIndexIterator::new(
                        self.buffer_pool.clone(),
                        next_id,
                        next_leaf,
                        0,
                    ));
                }
            }
        }
    }

    /// The exhausted sentinel.
    pub fn end(&self) -> TreeIndexIterator {
        TreeIndexIterator::end(self.buffer_pool.clone())
    }

    fn start_new_tree(&self, key: &[u8], rid: RecordId) -> VellumResult<()> {
        let new_page = self.buffer_pool.new_page()?;
        let new_page_id = new_page.read().page_id;
        let mut leaf = BPlusTreeLeafPage::new(new_page_id, INVALID_PAGE_ID, self.leaf_max_size);
        leaf.insert(key.to_vec(), rid, self.comparator);
        let result = self
            .buffer_pool
            .write_tree_page(new_page_id, &BPlusTreePage::Leaf(leaf));
        self.buffer_pool.unpin_page(new_page_id, true);
        result?;
        self.set_root(new_page_id)?;
        debug!("started tree {:?} with root {}", self.index_name, new_page_id);
        Ok(())
    }

    fn insert_into_leaf(
        &self,
        key: &[u8],
        rid: RecordId,
        context: &mut Context,
    ) -> VellumResult<bool> {
        let mut current_id = self.root_page_id.load(Ordering::SeqCst);
        let (leaf_id, mut leaf) = loop {
            let page = self.buffer_pool.fetch_tree_page(current_id)?;
            let insert_safe = match &page {
                BPlusTreePage::Internal(internal) => {
                    internal.header.current_size < self.internal_max_size
                }
                BPlusTreePage::Leaf(leaf) => leaf.header.current_size + 1 < leaf.header.max_size,
            };
            if insert_safe {
                self.release_context(context);
            }
            match page {
                BPlusTreePage::Internal(internal) => {
                    context.pinned.push(current_id);
                    current_id = internal.look_up(key, self.comparator);
                }
                BPlusTreePage::Leaf(leaf) => break (current_id, leaf),
            }
        };

        if !leaf.insert(key.to_vec(), rid, self.comparator) {
            self.buffer_pool.unpin_page(leaf_id, false);
            return Ok(false);
        }

        if leaf.is_overflow() {
            let result = self.split_leaf(leaf_id, leaf);
            self.buffer_pool.unpin_page(leaf_id, true);
            result?;
        } else {
            let result = self
                .buffer_pool
                .write_tree_page(leaf_id, &BPlusTreePage::Leaf(leaf));
            self.buffer_pool.unpin_page(leaf_id, true);
            result?;
        }
        Ok(true)
    }

    /// Move the upper half of an overflowing leaf into a fresh right
    /// sibling, relink the leaf chain, and push the sibling's first key up.
    fn split_leaf(&self, leaf_id: PageId, mut leaf: BPlusTreeLeafPage) -> VellumResult<()> {
        let new_page = self.buffer_pool.new_page()?;
        let new_page_id = new_page.read().page_id;

        let moved = leaf.split_off(leaf.array.len() / 2);
        let mut new_leaf =
            BPlusTreeLeafPage::new(new_page_id, leaf.header.parent_page_id, leaf.header.max_size);
        new_leaf.append(moved);
        new_leaf.header.next_page_id = leaf.header.next_page_id;
        leaf.header.next_page_id = new_page_id;
        let separator = new_leaf.key_at(0).to_vec();
        let parent_id = leaf.header.parent_page_id;

        let result = self
            .buffer_pool
            .write_tree_page(new_page_id, &BPlusTreePage::Leaf(new_leaf));
        self.buffer_pool.unpin_page(new_page_id, true);
        result?;
        self.buffer_pool
            .write_tree_page(leaf_id, &BPlusTreePage::Leaf(leaf))?;
        debug!("split leaf {} into {}", leaf_id, new_page_id);

        self.insert_into_parent(leaf_id, parent_id, separator, new_page_id)
    }

    /// Split an overflowing internal page, pushing the middle key up.
    fn split_internal(
        &self,
        page_id: PageId,
        mut page: BPlusTreeInternalPage,
    ) -> VellumResult<()> {
        let new_page = self.buffer_pool.new_page()?;
        let new_page_id = new_page.read().page_id;

        let mut moved = page.split_off(page.array.len() / 2);
        // the first moved key travels up; its child becomes the sibling's
        // sentinel slot
        let separator = std::mem::take(&mut moved[0].0);
        let mut new_internal = BPlusTreeInternalPage::new(
            new_page_id,
            page.header.parent_page_id,
            self.internal_max_size,
        );
        new_internal.append(moved);
        let adopted = new_internal.values();
        let parent_id = page.header.parent_page_id;

        let result = self
            .buffer_pool
            .write_tree_page(new_page_id, &BPlusTreePage::Internal(new_internal));
        self.buffer_pool.unpin_page(new_page_id, true);
        result?;
        for child_id in adopted {
            self.set_parent(child_id, new_page_id)?;
        }
        self.buffer_pool
            .write_tree_page(page_id, &BPlusTreePage::Internal(page))?;
        debug!("split internal {} into {}", page_id, new_page_id);

        self.insert_into_parent(page_id, parent_id, separator, new_page_id)
    }

    /// After `left` split off `right` with separator `key`: a root split
    /// grows a new root, otherwise the separator lands in the parent right
    /// after `left`'s slot, splitting the parent in turn when it overflows.
    fn insert_into_parent(
        &self,
        left_id: PageId,
        parent_id: PageId,
        key: Vec<u8>,
        right_id: PageId,
    ) -> VellumResult<()> {
        if parent_id == INVALID_PAGE_ID {
            let root_page = self.buffer_pool.new_page()?;
            let root_id = root_page.read().page_id;
            let mut root =
                BPlusTreeInternalPage::new(root_id, INVALID_PAGE_ID, self.internal_max_size);
            root.populate_new_root(left_id, key, right_id);
            let result = self
                .buffer_pool
                .write_tree_page(root_id, &BPlusTreePage::Internal(root));
            self.buffer_pool.unpin_page(root_id, true);
            result?;
            self.set_parent(left_id, root_id)?;
            self.set_parent(right_id, root_id)?;
            self.set_root(root_id)?;
            debug!("grew new root {} over {} and {}", root_id, left_id, right_id);
            return Ok(());
        }

        let mut parent = self.buffer_pool.fetch_tree_internal_page(parent_id)?;
        parent.insert_after(left_id, key, right_id);
        if parent.is_overflow() {
            let result = self.split_internal(parent_id, parent);
            self.buffer_pool.unpin_page(parent_id, true);
            result
        } else {
            let result = self
                .buffer_pool
                .write_tree_page(parent_id, &BPlusTreePage::Internal(parent));
            self.buffer_pool.unpin_page(parent_id, true);
            result
        }
    }

    fn remove_from_leaf(&self, key: &[u8], context: &mut Context) -> VellumResult<()> {
        let mut current_id = self.root_page_id.load(Ordering::SeqCst);
        let (leaf_id, mut leaf) = loop {
            let page = self.buffer_pool.fetch_tree_page(current_id)?;
            let delete_safe = page.current_size() > page.min_size();
            if delete_safe {
                self.release_context(context);
            }
            match page {
                BPlusTreePage::Internal(internal) => {
                    context.pinned.push(current_id);
                    current_id = internal.look_up(key, self.comparator);
                }
                BPlusTreePage::Leaf(leaf) => break (current_id, leaf),
            }
        };

        if !leaf.delete(key, self.comparator) {
            self.buffer_pool.unpin_page(leaf_id, false);
            return Ok(());
        }

        let is_root = leaf_id == self.root_page_id.load(Ordering::SeqCst);
        let node = BPlusTreePage::Leaf(leaf);
        self.buffer_pool.write_tree_page(leaf_id, &node)?;
        if node.is_underflow(is_root) {
            self.coalesce_or_redistribute(leaf_id, node)
        } else {
            self.buffer_pool.unpin_page(leaf_id, true);
            Ok(())
        }
    }

    /// Restore an underflowing page: borrow a single entry from the left
    /// sibling, then the right; failing both, merge. Consumes the pin on
    /// `node_id`.
    fn coalesce_or_redistribute(&self, node_id: PageId, node: BPlusTreePage) -> VellumResult<()> {
        if node_id == self.root_page_id.load(Ordering::SeqCst) {
            return self.adjust_root(node_id, node);
        }

        let parent_id = node.parent_page_id();
        let mut parent = self.buffer_pool.fetch_tree_internal_page(parent_id)?;
        let (left_id, right_id) = parent.sibling_page_ids(node_id);
        let mut node = node;

        for (sibling_id, from_left) in [(left_id, true), (right_id, false)] {
            let Some(sibling_id) = sibling_id else {
                continue;
            };
            if self.try_redistribute(node_id, &mut node, sibling_id, from_left, &mut parent)? {
                self.buffer_pool.write_tree_page(node_id, &node)?;
                self.buffer_pool.unpin_page(node_id, true);
                self.buffer_pool
                    .write_tree_page(parent_id, &BPlusTreePage::Internal(parent))?;
                self.buffer_pool.unpin_page(parent_id, true);
                return Ok(());
            }
        }

        if let Some(left_sibling_id) = left_id {
            let left_sibling = self.buffer_pool.fetch_tree_page(left_sibling_id)?;
            self.merge(left_sibling_id, left_sibling, node_id, node, &mut parent)?;
        } else if let Some(right_sibling_id) = right_id {
            let right_sibling = self.buffer_pool.fetch_tree_page(right_sibling_id)?;
            self.merge(node_id, node, right_sibling_id, right_sibling, &mut parent)?;
        } else {
            self.buffer_pool.unpin_page(node_id, true);
            self.buffer_pool.unpin_page(parent_id, false);
            return Err(VellumError::Internal(format!(
                "page {} has no siblings under parent {}",
                node_id, parent_id
            )));
        }

        let parent_is_root = parent_id == self.root_page_id.load(Ordering::SeqCst);
        let parent_page = BPlusTreePage::Internal(parent);
        self.buffer_pool.write_tree_page(parent_id, &parent_page)?;
        if parent_page.is_underflow(parent_is_root) {
            self.coalesce_or_redistribute(parent_id, parent_page)
        } else {
            self.buffer_pool.unpin_page(parent_id, true);
            Ok(())
        }
    }

    /// Move exactly one entry from a lendable sibling and refresh the
    /// separator in the parent. Writes the sibling; the caller writes the
    /// node and the parent.
    fn try_redistribute(
        &self,
        node_id: PageId,
        node: &mut BPlusTreePage,
        sibling_id: PageId,
        from_left: bool,
        parent: &mut BPlusTreeInternalPage,
    ) -> VellumResult<bool> {
        let mut sibling = self.buffer_pool.fetch_tree_page(sibling_id)?;
        if !sibling.can_lend() {
            self.buffer_pool.unpin_page(sibling_id, false);
            return Ok(false);
        }

        match (&mut *node, &mut sibling) {
            (BPlusTreePage::Leaf(n), BPlusTreePage::Leaf(s)) => {
                if from_left {
                    let kv = s.pop_back().expect("lendable sibling is empty");
                    n.push_front(kv);
                    let index = self.separator_index(parent, node_id)?;
                    parent.set_key_at(index, n.key_at(0).to_vec());
                } else {
                    let kv = s.pop_front().expect("lendable sibling is empty");
                    n.push_back(kv);
                    let index = self.separator_index(parent, sibling_id)?;
                    parent.set_key_at(index, s.key_at(0).to_vec());
                }
            }
            (BPlusTreePage::Internal(n), BPlusTreePage::Internal(s)) => {
                if from_left {
                    // the demoted separator re-keys the node's sentinel slot
                    let (last_key, last_child) = s.pop_back().expect("lendable sibling is empty");
                    let index = self.separator_index(parent, node_id)?;
                    let old_separator = parent.key_at(index).to_vec();
                    n.set_key_at(0, old_separator);
                    n.push_front(last_child);
                    parent.set_key_at(index, last_key);
                    self.set_parent(last_child, node_id)?;
                } else {
                    // the sibling's sentinel child moves over under the
                    // demoted separator; its first real key is promoted
                    let (_, first_child) = s.pop_front().expect("lendable sibling is empty");
                    let index = self.separator_index(parent, sibling_id)?;
                    let old_separator = parent.key_at(index).to_vec();
                    let promoted = s.take_key_at(0);
                    parent.set_key_at(index, promoted);
                    n.push_back((old_separator, first_child));
                    self.set_parent(first_child, node_id)?;
                }
            }
            _ => {
                self.buffer_pool.unpin_page(sibling_id, false);
                return Err(VellumError::Internal(
                    "sibling pages disagree on page type".to_string(),
                ));
            }
        }

        let result = self.buffer_pool.write_tree_page(sibling_id, &sibling);
        self.buffer_pool.unpin_page(sibling_id, true);
        result?;
        debug!(
            "redistributed one entry from {} into {}",
            sibling_id, node_id
        );
        Ok(true)
    }

    /// Concatenate `right` onto `left`, folding the parent separator in for
    /// internal pages, and drop the separator entry. Consumes both pins and
    /// deletes the right page.
    fn merge(
        &self,
        left_id: PageId,
        mut left: BPlusTreePage,
        right_id: PageId,
        right: BPlusTreePage,
        parent: &mut BPlusTreeInternalPage,
    ) -> VellumResult<()> {
        let separator_index = self.separator_index(parent, right_id)?;
        match (&mut left, right) {
            (BPlusTreePage::Leaf(l), BPlusTreePage::Leaf(r)) => {
                l.header.next_page_id = r.header.next_page_id;
                l.append(r.array);
            }
            (BPlusTreePage::Internal(l), BPlusTreePage::Internal(r)) => {
                let separator = parent.key_at(separator_index).to_vec();
                let mut moved = r.array;
                moved[0].0 = separator;
                let adopted: Vec<PageId> = moved.iter().map(|kv| kv.1).collect();
                l.append(moved);
                for child_id in adopted {
                    self.set_parent(child_id, left_id)?;
                }
            }
            _ => {
                self.buffer_pool.unpin_page(left_id, true);
                self.buffer_pool.unpin_page(right_id, false);
                return Err(VellumError::Internal(
                    "sibling pages disagree on page type".to_string(),
                ));
            }
        }
        parent.remove_at(separator_index);

        let result = self.buffer_pool.write_tree_page(left_id, &left);
        self.buffer_pool.unpin_page(left_id, true);
        result?;
        self.buffer_pool.unpin_page(right_id, false);
        if !self.buffer_pool.delete_page(right_id)? {
            warn!("merged page {} still pinned, leaving it behind", right_id);
        }
        debug!("merged page {} into {}", right_id, left_id);
        Ok(())
    }

    /// Root special cases after deletion: an empty leaf root empties the
    /// tree; an internal root down to one child hands the root to that
    /// child. Consumes the pin on `root_id`.
    fn adjust_root(&self, root_id: PageId, node: BPlusTreePage) -> VellumResult<()> {
        match node {
            BPlusTreePage::Internal(internal) if internal.header.current_size == 1 => {
                let child_id = internal.value_at(0);
                self.set_parent(child_id, INVALID_PAGE_ID)?;
                self.buffer_pool.unpin_page(root_id, false);
                self.buffer_pool.delete_page(root_id)?;
                self.set_root(child_id)?;
                debug!("root {} collapsed into {}", root_id, child_id);
            }
            BPlusTreePage::Leaf(leaf) if leaf.header.current_size == 0 => {
                self.buffer_pool.unpin_page(root_id, false);
                self.buffer_pool.delete_page(root_id)?;
                self.set_root(INVALID_PAGE_ID)?;
                debug!("tree {:?} is empty", self.index_name);
            }
            _ => {
                self.buffer_pool.unpin_page(root_id, true);
            }
        }
        Ok(())
    }

    fn separator_index(
        &self,
        parent: &BPlusTreeInternalPage,
        child_id: PageId,
    ) -> VellumResult<usize> {
        parent.child_index(child_id).ok_or_else(|| {
            VellumError::Internal(format!(
                "child {} missing from parent {}",
                child_id, parent.header.page_id
            ))
        })
    }

    fn set_parent(&self, page_id: PageId, parent_id: PageId) -> VellumResult<()> {
        let mut page = self.buffer_pool.fetch_tree_page(page_id)?;
        page.set_parent_page_id(parent_id);
        let result = self.buffer_pool.write_tree_page(page_id, &page);
        self.buffer_pool.unpin_page(page_id, true);
        result
    }

    /// Swing the root pointer and record it under the index name in the
    /// header page.
    fn set_root(&self, new_root_id: PageId) -> VellumResult<()> {
        self.root_page_id.store(new_root_id, Ordering::SeqCst);
        let mut header = self.buffer_pool.fetch_header_page()?;
        let recorded = header.update_record(&self.index_name, new_root_id)
            || header.insert_record(&self.index_name, new_root_id);
        if !recorded {
            self.buffer_pool.unpin_page(HEADER_PAGE_ID, false);
            return Err(VellumError::Storage(format!(
                "cannot record root of index {:?} in header page",
                self.index_name
            )));
        }
        let result = self.buffer_pool.write_header_page(&header);
        self.buffer_pool.unpin_page(HEADER_PAGE_ID, true);
        result
    }

    fn release_context(&self, context: &mut Context) {
        while let Some(page_id) = context.pinned.pop() {
            self.buffer_pool.unpin_page(page_id, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BPlusTree;
    use crate::buffer::BufferPoolManager;
    use crate::config::BTreeConfig;
    use crate::storage::disk_manager::DiskManager;
    use crate::storage::index::comparator::default_comparator;
    use crate::storage::page::{BPlusTreePage, RecordId};
    use crate::utils::util::pretty_format_index_tree;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn key(i: i32) -> Vec<u8> {
        i.to_be_bytes().to_vec()
    }

    fn setup(pool_size: usize) -> (TempDir, Arc<BufferPoolManager>) {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        (temp_dir, Arc::new(BufferPoolManager::new(pool_size, disk_manager)))
    }

    fn build_tree(buffer_pool: Arc<BufferPoolManager>) -> BPlusTree {
        let tree = BPlusTree::new(
            "test_index",
            buffer_pool,
            default_comparator,
            BTreeConfig {
                leaf_max_size: 4,
                internal_max_size: 4,
            },
        )
        .unwrap();
        for i in 1..=11 {
            assert!(tree.insert(&key(i), RecordId::new(i, i as u32)).unwrap());
        }
        tree
    }

    #[test]
    fn insert_and_get() {
        let (_temp_dir, buffer_pool) = setup(64);
        let tree = build_tree(buffer_pool);

        for i in 1..=11 {
            assert_eq!(
                tree.get_value(&key(i)).unwrap(),
                Some(RecordId::new(i, i as u32)),
                "key {} lost",
                i
            );
        }
        assert_eq!(tree.get_value(&key(0)).unwrap(), None);
        assert_eq!(tree.get_value(&key(12)).unwrap(), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (_temp_dir, buffer_pool) = setup(64);
        let tree = build_tree(buffer_pool);

        assert!(!tree.insert(&key(5), RecordId::new(99, 99)).unwrap());
        // original value intact
        assert_eq!(tree.get_value(&key(5)).unwrap(), Some(RecordId::new(5, 5)));
    }

    #[test]
    fn splits_grow_an_internal_root() {
        let (_temp_dir, buffer_pool) = setup(64);
        let tree = build_tree(buffer_pool.clone());

        let root_id = tree.root_page_id();
        let root = buffer_pool.fetch_tree_page(root_id).unwrap();
        assert!(matches!(root, BPlusTreePage::Internal(_)));
        buffer_pool.unpin_page(root_id, false);

        let display = pretty_format_index_tree(&tree).unwrap();
        assert!(display.contains("B+ Tree Level No.2:"));
    }

    #[test]
    fn delete_with_redistribute_and_merge() {
        let (_temp_dir, buffer_pool) = setup(64);
        let tree = build_tree(buffer_pool);

        let mut remaining: Vec<i32> = (1..=11).collect();
        for target in [3, 10, 8, 1, 2, 11] {
            tree.remove(&key(target)).unwrap();
            remaining.retain(|&i| i != target);
            for &i in &remaining {
                assert_eq!(
                    tree.get_value(&key(i)).unwrap(),
                    Some(RecordId::new(i, i as u32)),
                    "key {} lost after removing {}",
                    i,
                    target
                );
            }
            assert_eq!(tree.get_value(&key(target)).unwrap(), None);
        }
    }

    #[test]
    fn delete_until_empty_and_reuse() {
        let (_temp_dir, buffer_pool) = setup(64);
        let tree = build_tree(buffer_pool);

        // removing an absent key is silent
        tree.remove(&key(42)).unwrap();

        for i in 1..=11 {
            tree.remove(&key(i)).unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.get_value(&key(5)).unwrap(), None);

        assert!(tree.insert(&key(7), RecordId::new(7, 7)).unwrap());
        assert_eq!(tree.get_value(&key(7)).unwrap(), Some(RecordId::new(7, 7)));
    }

    #[test]
    fn root_is_recovered_from_header_page() {
        let (_temp_dir, buffer_pool) = setup(64);
        let tree = build_tree(buffer_pool.clone());
        let root_id = tree.root_page_id();
        drop(tree);

        let reopened = BPlusTree::new(
            "test_index",
            buffer_pool,
            default_comparator,
            BTreeConfig {
                leaf_max_size: 4,
                internal_max_size: 4,
            },
        )
        .unwrap();
        assert_eq!(reopened.root_page_id(), root_id);
        for i in 1..=11 {
            assert_eq!(
                reopened.get_value(&key(i)).unwrap(),
                Some(RecordId::new(i, i as u32))
            );
        }
    }

    #[test]
    fn concurrent_inserts_do_not_lose_keys() {
        const NUM_THREADS: usize = 4;
        const KEYS_PER_THREAD: i32 = 250;

        let (_temp_dir, buffer_pool) = setup(256);
        let tree = Arc::new(
            BPlusTree::new(
                "concurrent",
                buffer_pool,
                default_comparator,
                BTreeConfig {
                    leaf_max_size: 8,
                    internal_max_size: 8,
                },
            )
            .unwrap(),
        );

        let mut handles = vec![];
        for t in 0..NUM_THREADS {
            let tree = Arc::clone(&tree);
            handles.push(std::thread::spawn(move || {
                let start = t as i32 * KEYS_PER_THREAD;
                for i in start..start + KEYS_PER_THREAD {
                    assert!(tree.insert(&key(i), RecordId::new(i, i as u32)).unwrap());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..NUM_THREADS as i32 * KEYS_PER_THREAD {
            assert_eq!(
                tree.get_value(&key(i)).unwrap(),
                Some(RecordId::new(i, i as u32)),
                "key {} lost",
                i
            );
        }
    }
}
