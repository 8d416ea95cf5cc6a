use crate::buffer::{PageId, INVALID_PAGE_ID};
use crate::storage::index::comparator::KeyComparator;
use crate::storage::page::RecordId;
use std::cmp::Ordering;

/// Encoded header widths, used to derive default fan-outs.
pub const LEAF_PAGE_HEADER_SIZE: usize = 28;
pub const INTERNAL_PAGE_HEADER_SIZE: usize = 24;

pub type InternalKV = (Vec<u8>, PageId);
pub type LeafKV = (Vec<u8>, RecordId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BPlusTreePageType {
    LeafPage,
    InternalPage,
}

/// Value-level dispatch over the two page layouts; the on-disk `page_type`
/// tag picks the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BPlusTreePage {
    Internal(BPlusTreeInternalPage),
    Leaf(BPlusTreeLeafPage),
}

impl BPlusTreePage {
    pub fn page_id(&self) -> PageId {
        match self {
            Self::Internal(page) => page.header.page_id,
            Self::Leaf(page) => page.header.page_id,
        }
    }

    pub fn parent_page_id(&self) -> PageId {
        match self {
            Self::Internal(page) => page.header.parent_page_id,
            Self::Leaf(page) => page.header.parent_page_id,
        }
    }

    pub fn set_parent_page_id(&mut self, parent_page_id: PageId) {
        match self {
            Self::Internal(page) => page.header.parent_page_id = parent_page_id,
            Self::Leaf(page) => page.header.parent_page_id = parent_page_id,
        }
    }

    pub fn current_size(&self) -> u32 {
        match self {
            Self::Internal(page) => page.header.current_size,
            Self::Leaf(page) => page.header.current_size,
        }
    }

    pub fn min_size(&self) -> u32 {
        match self {
            Self::Internal(page) => page.min_size(),
            Self::Leaf(page) => page.min_size(),
        }
    }

    pub fn is_overflow(&self) -> bool {
        match self {
            Self::Internal(page) => page.is_overflow(),
            Self::Leaf(page) => page.is_overflow(),
        }
    }

    pub fn is_underflow(&self, is_root: bool) -> bool {
        if is_root {
            // an empty leaf root empties the tree; a one-child internal root
            // collapses into its child
            return match self {
                Self::Leaf(page) => page.header.current_size == 0,
                Self::Internal(page) => page.header.current_size == 1,
            };
        }
        self.current_size() < self.min_size()
    }

    pub fn can_lend(&self) -> bool {
        self.current_size() > self.min_size()
    }
}

/**
 * Internal page format (keys are stored in increasing order):
 *  --------------------------------------------------------------------------
 * | HEADER | KEY(1)+PAGE_ID(1) | KEY(2)+PAGE_ID(2) | ... | KEY(n)+PAGE_ID(n) |
 *  --------------------------------------------------------------------------
 *
 * Header (24 bytes):
 * ----------------------------------------------------------------------------
 * | PageType (4) | Lsn (4) | CurrentSize (4) | MaxSize (4) | ParentPageId (4)
 * | PageId (4) |
 * ----------------------------------------------------------------------------
 *
 * Slot 0's key is a sentinel for negative infinity: n keys for n+1 children.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BPlusTreeInternalPage {
    pub header: BPlusTreeInternalPageHeader,
    pub array: Vec<InternalKV>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BPlusTreeInternalPageHeader {
    pub page_type: BPlusTreePageType,
    pub lsn: u32,
    pub current_size: u32,
    // max number of children
    pub max_size: u32,
    pub parent_page_id: PageId,
    pub page_id: PageId,
}

impl BPlusTreeInternalPage {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: u32) -> Self {
        Self {
            header: BPlusTreeInternalPageHeader {
                page_type: BPlusTreePageType::InternalPage,
                lsn: 0,
                current_size: 0,
                max_size,
                parent_page_id,
                page_id,
            },
            array: Vec::with_capacity(max_size as usize + 1),
        }
    }

    /// A non-root internal page keeps at least half its children, rounded
    /// up; splitting max_size + 1 children leaves both halves legal.
    pub fn min_size(&self) -> u32 {
        (self.header.max_size + 1) / 2
    }

    pub fn is_overflow(&self) -> bool {
        self.header.current_size > self.header.max_size
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        &self.array[index].0
    }

    pub fn value_at(&self, index: usize) -> PageId {
        self.array[index].1
    }

    pub fn values(&self) -> Vec<PageId> {
        self.array.iter().map(|kv| kv.1).collect()
    }

    pub fn set_key_at(&mut self, index: usize, key: Vec<u8>) {
        self.array[index].0 = key;
    }

    pub fn take_key_at(&mut self, index: usize) -> Vec<u8> {
        std::mem::take(&mut self.array[index].0)
    }

    pub fn child_index(&self, page_id: PageId) -> Option<usize> {
        self.array.iter().position(|kv| kv.1 == page_id)
    }

    pub fn sibling_page_ids(&self, page_id: PageId) -> (Option<PageId>, Option<PageId>) {
        let Some(index) = self.child_index(page_id) else {
            return (None, None);
        };
        let left = if index == 0 {
            None
        } else {
            Some(self.array[index - 1].1)
        };
        let right = if index + 1 >= self.array.len() {
            None
        } else {
            Some(self.array[index + 1].1)
        };
        (left, right)
    }

    /// Fill a freshly allocated root after its old single page split:
    /// `{value0 = left, key1 = key, value1 = right}`.
    pub fn populate_new_root(&mut self, left: PageId, key: Vec<u8>, right: PageId) {
        debug_assert!(self.array.is_empty());
        self.array.push((Vec::new(), left));
        self.array.push((key, right));
        self.header.current_size = 2;
    }

    /// Insert `(key, new_child)` immediately after the slot holding
    /// `old_child`. Used when a child at `old_child` split off `new_child`.
    pub fn insert_after(&mut self, old_child: PageId, key: Vec<u8>, new_child: PageId) {
        let index = self
            .child_index(old_child)
            .expect("split child not present in parent");
        self.array.insert(index + 1, (key, new_child));
        self.header.current_size += 1;
    }

    /// The child whose key range contains `key`: the largest `i` with
    /// `key_i <= key`, slot 0's key standing in for negative infinity.
    pub fn look_up(&self, key: &[u8], comparator: KeyComparator) -> PageId {
        debug_assert!(!self.array.is_empty());
        let mut lo = 1;
        let mut hi = self.array.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match comparator(key, &self.array[mid].0) {
                Ordering::Less => hi = mid,
                _ => lo = mid + 1,
            }
        }
        self.array[lo - 1].1
    }

    pub fn remove_at(&mut self, index: usize) -> InternalKV {
        let kv = self.array.remove(index);
        self.header.current_size -= 1;
        kv
    }

    pub fn split_off(&mut self, at: usize) -> Vec<InternalKV> {
        let moved = self.array.split_off(at);
        self.header.current_size -= moved.len() as u32;
        moved
    }

    pub fn append(&mut self, kvs: Vec<InternalKV>) {
        self.header.current_size += kvs.len() as u32;
        self.array.extend(kvs);
    }

    pub fn pop_back(&mut self) -> Option<InternalKV> {
        let kv = self.array.pop()?;
        self.header.current_size -= 1;
        Some(kv)
    }

    pub fn pop_front(&mut self) -> Option<InternalKV> {
        if self.array.is_empty() {
            return None;
        }
        self.header.current_size -= 1;
        Some(self.array.remove(0))
    }

    pub fn push_back(&mut self, kv: InternalKV) {
        self.array.push(kv);
        self.header.current_size += 1;
    }

    /// Prepend a child behind the sentinel slot; the caller re-keys the
    /// displaced slot first.
    pub fn push_front(&mut self, child: PageId) {
        self.array.insert(0, (Vec::new(), child));
        self.header.current_size += 1;
    }
}

/**
 * Leaf page format (keys are stored in increasing order):
 *  ----------------------------------------------------------------------
 * | HEADER | KEY(1) + RID(1) | KEY(2) + RID(2) | ... | KEY(n) + RID(n) |
 *  ----------------------------------------------------------------------
 *
 * Header (28 bytes):
 *  ---------------------------------------------------------------------
 * | PageType (4) | Lsn (4) | CurrentSize (4) | MaxSize (4)
 * | ParentPageId (4) | PageId (4) | NextPageId (4) |
 *  ---------------------------------------------------------------------
 *
 * A leaf legally holds up to max_size - 1 entries; reaching max_size
 * triggers a split.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BPlusTreeLeafPage {
    pub header: BPlusTreeLeafPageHeader,
    pub array: Vec<LeafKV>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BPlusTreeLeafPageHeader {
    pub page_type: BPlusTreePageType,
    pub lsn: u32,
    pub current_size: u32,
    pub max_size: u32,
    pub parent_page_id: PageId,
    pub page_id: PageId,
    pub next_page_id: PageId,
}

impl BPlusTreeLeafPage {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: u32) -> Self {
        Self {
            header: BPlusTreeLeafPageHeader {
                page_type: BPlusTreePageType::LeafPage,
                lsn: 0,
                current_size: 0,
                max_size,
                parent_page_id,
                page_id,
                next_page_id: INVALID_PAGE_ID,
            },
            array: Vec::with_capacity(max_size as usize),
        }
    }

    pub fn min_size(&self) -> u32 {
        self.header.max_size / 2
    }

    pub fn is_overflow(&self) -> bool {
        self.header.current_size >= self.header.max_size
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        &self.array[index].0
    }

    pub fn kv_at(&self, index: usize) -> &LeafKV {
        &self.array[index]
    }

    /// Sorted insert; duplicate keys are rejected.
    pub fn insert(&mut self, key: Vec<u8>, rid: RecordId, comparator: KeyComparator) -> bool {
        let mut lo = 0;
        let mut hi = self.array.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match comparator(&key, &self.array[mid].0) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return false,
            }
        }
        self.array.insert(lo, (key, rid));
        self.header.current_size += 1;
        true
    }

    pub fn look_up(&self, key: &[u8], comparator: KeyComparator) -> Option<RecordId> {
        self.key_index(key, comparator).map(|i| self.array[i].1)
    }

    pub fn delete(&mut self, key: &[u8], comparator: KeyComparator) -> bool {
        if let Some(index) = self.key_index(key, comparator) {
            self.array.remove(index);
            self.header.current_size -= 1;
            true
        } else {
            false
        }
    }

    fn key_index(&self, key: &[u8], comparator: KeyComparator) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.array.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match comparator(key, &self.array[mid].0) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Index of the first entry with `key <= entry` (or `key < entry` when
    /// not inclusive); None when every entry is smaller.
    pub fn next_closest(
        &self,
        key: &[u8],
        included: bool,
        comparator: KeyComparator,
    ) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.array.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match comparator(key, &self.array[mid].0) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => {
                    return if included {
                        Some(mid)
                    } else if mid + 1 < self.array.len() {
                        Some(mid + 1)
                    } else {
                        None
                    }
                }
            }
        }
        if lo < self.array.len() {
            Some(lo)
        } else {
            None
        }
    }

    pub fn split_off(&mut self, at: usize) -> Vec<LeafKV> {
        let moved = self.array.split_off(at);
        self.header.current_size -= moved.len() as u32;
        moved
    }

    pub fn append(&mut self, kvs: Vec<LeafKV>) {
        self.header.current_size += kvs.len() as u32;
        self.array.extend(kvs);
    }

    pub fn pop_back(&mut self) -> Option<LeafKV> {
        let kv = self.array.pop()?;
        self.header.current_size -= 1;
        Some(kv)
    }

    pub fn pop_front(&mut self) -> Option<LeafKV> {
        if self.array.is_empty() {
            return None;
        }
        self.header.current_size -= 1;
        Some(self.array.remove(0))
    }

    pub fn push_back(&mut self, kv: LeafKV) {
        self.array.push(kv);
        self.header.current_size += 1;
    }

    pub fn push_front(&mut self, kv: LeafKV) {
        self.array.insert(0, kv);
        self.header.current_size += 1;
    }
}
