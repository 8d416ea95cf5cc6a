use bytes::Bytes;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::page::{FrameId, Page, PageId, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::config::BufferPoolConfig;
use crate::error::{VellumError, VellumResult};
use crate::storage::codec::{
    BPlusTreeInternalPageCodec, BPlusTreeLeafPageCodec, BPlusTreePageCodec, HeaderPageCodec,
};
use crate::storage::disk_manager::DiskManager;
use crate::storage::page::{BPlusTreeInternalPage, BPlusTreeLeafPage, BPlusTreePage, HeaderPage};
use crate::utils::cache::lru_k::LruKReplacer;
use crate::utils::cache::Replacer;
use crate::utils::hash::ExtendibleHashTable;
use crate::utils::util::page_bytes_to_array;

const PAGE_TABLE_BUCKET_SIZE: usize = 8;

/// Bounded cache of disk pages. Callers pin pages through
/// `new_page`/`fetch_page` and own the lease until `unpin_page`; a page with
/// outstanding pins is never evicted. One coarse latch serializes the public
/// operations, disk I/O included.
#[derive(Debug)]
pub struct BufferPoolManager {
    pool: Vec<Arc<RwLock<Page>>>,
    page_table: ExtendibleHashTable<PageId, FrameId>,
    replacer: Mutex<LruKReplacer>,
    free_list: Mutex<VecDeque<FrameId>>,
    latch: Mutex<()>,
    pub disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::with_config(
            BufferPoolConfig {
                buffer_pool_size: pool_size,
                ..Default::default()
            },
            disk_manager,
        )
    }

    pub fn with_config(config: BufferPoolConfig, disk_manager: Arc<DiskManager>) -> Self {
        let pool_size = config.buffer_pool_size;
        let mut free_list = VecDeque::with_capacity(pool_size);
        let mut pool = Vec::with_capacity(pool_size);
        for frame_id in 0..pool_size {
            free_list.push_back(frame_id);
            pool.push(Arc::new(RwLock::new(Page::empty())));
        }
        Self {
            pool,
            page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
            replacer: Mutex::new(LruKReplacer::with_k(pool_size, config.lru_k_k)),
            free_list: Mutex::new(free_list),
            latch: Mutex::new(()),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Allocate a fresh page and return its frame pinned with `pin_count = 1`.
    pub fn new_page(&self) -> VellumResult<Arc<RwLock<Page>>> {
        let _latch = self.latch.lock();
        let frame_id = self.acquire_frame()?;
        let page_id = match self.disk_manager.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_list.lock().push_back(frame_id);
                return Err(e);
            }
        };

        self.page_table.insert(page_id, frame_id);
        {
            let mut page = self.pool[frame_id].write();
            page.reset();
            page.page_id = page_id;
            page.pin_count = 1;
        }
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);

        debug!("new page {} in frame {}", page_id, frame_id);
        Ok(self.pool[frame_id].clone())
    }

    /// Return the resident frame for `page_id` pinned, reading it from disk
    /// on a miss.
    pub fn fetch_page(&self, page_id: PageId) -> VellumResult<Arc<RwLock<Page>>> {
        if page_id == INVALID_PAGE_ID {
            return Err(VellumError::Storage(
                "fetch_page: invalid page id".to_string(),
            ));
        }
        let _latch = self.latch.lock();

        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.pool[frame_id].write().pin_count += 1;
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
            return Ok(self.pool[frame_id].clone());
        }

        let frame_id = self.acquire_frame()?;
        let data = match self.disk_manager.read_page(page_id) {
            Ok(data) => data,
            Err(e) => {
                self.free_list.lock().push_back(frame_id);
                return Err(e);
            }
        };

        self.page_table.insert(page_id, frame_id);
        {
            let mut page = self.pool[frame_id].write();
            page.reset();
            page.page_id = page_id;
            page.pin_count = 1;
            page.data_mut().copy_from_slice(&data);
        }
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);

        debug!("fetched page {} into frame {}", page_id, frame_id);
        Ok(self.pool[frame_id].clone())
    }

    /// Drop one pin. False when the page is not resident or already fully
    /// unpinned. `is_dirty = true` sets the dirty flag; `false` leaves it
    /// unchanged so a concurrent dirtying unpinner cannot be undone.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _latch = self.latch.lock();
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let mut page = self.pool[frame_id].write();
        if page.pin_count == 0 {
            return false;
        }
        if is_dirty {
            page.is_dirty = true;
        }
        page.pin_count -= 1;
        if page.pin_count == 0 {
            drop(page);
            self.replacer.lock().set_evictable(frame_id, true);
        }
        true
    }

    /// Write the page to disk whether dirty or not, then clear the flag.
    pub fn flush_page(&self, page_id: PageId) -> VellumResult<bool> {
        let _latch = self.latch.lock();
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(false);
        };
        let data = {
            let mut page = self.pool[frame_id].write();
            let data = Bytes::copy_from_slice(page.data());
            page.is_dirty = false;
            data
        };
        self.disk_manager.write_page(page_id, &data)?;
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> VellumResult<()> {
        let _latch = self.latch.lock();
        for frame in self.pool.iter() {
            let data;
            let page_id;
            {
                let mut page = frame.write();
                if page.page_id == INVALID_PAGE_ID {
                    continue;
                }
                page_id = page.page_id;
                data = Bytes::copy_from_slice(page.data());
                page.is_dirty = false;
            }
            self.disk_manager.write_page(page_id, &data)?;
        }
        Ok(())
    }

    /// Drop a page from the pool and hand its id back to the disk manager.
    /// `Ok(false)` when the page is still pinned; non-resident pages are a
    /// no-op success.
    pub fn delete_page(&self, page_id: PageId) -> VellumResult<bool> {
        let _latch = self.latch.lock();
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(true);
        };
        {
            let mut page = self.pool[frame_id].write();
            if page.pin_count > 0 {
                return Ok(false);
            }
            page.reset();
        }
        self.page_table.remove(&page_id);
        self.replacer.lock().remove(frame_id);
        self.free_list.lock().push_back(frame_id);
        self.disk_manager.deallocate_page(page_id)?;
        debug!("deleted page {} from frame {}", page_id, frame_id);
        Ok(true)
    }

    /// A free frame, or an evicted one with any dirty contents written back.
    /// Callers hold the latch.
    fn acquire_frame(&self) -> VellumResult<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop_front() {
            return Ok(frame_id);
        }
        let Some(frame_id) = self.replacer.lock().evict() else {
            return Err(VellumError::Storage(
                "cannot acquire frame: buffer pool is full and no frame is evictable".to_string(),
            ));
        };
        let (evicted_page_id, is_dirty, data) = {
            let page = self.pool[frame_id].read();
            (
                page.page_id,
                page.is_dirty,
                Bytes::copy_from_slice(page.data()),
            )
        };
        if is_dirty {
            debug!(
                "writing back dirty page {} evicted from frame {}",
                evicted_page_id, frame_id
            );
            self.disk_manager.write_page(evicted_page_id, &data)?;
        }
        self.page_table.remove(&evicted_page_id);
        debug!("evicted page {} from frame {}", evicted_page_id, frame_id);
        Ok(frame_id)
    }

    // Typed fetch helpers: decode the pinned frame's bytes; the caller still
    // owns the pin.

    pub fn fetch_tree_page(&self, page_id: PageId) -> VellumResult<BPlusTreePage> {
        let page = self.fetch_page(page_id)?;
        let (tree_page, _) = match BPlusTreePageCodec::decode(page.read().data()) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.unpin_page(page_id, false);
                return Err(e);
            }
        };
        if tree_page.page_id() != page_id {
            self.unpin_page(page_id, false);
            return Err(VellumError::Storage(format!(
                "corrupt index page: header says {}, fetched {}",
                tree_page.page_id(),
                page_id
            )));
        }
        Ok(tree_page)
    }

    pub fn fetch_tree_leaf_page(&self, page_id: PageId) -> VellumResult<BPlusTreeLeafPage> {
        let page = self.fetch_page(page_id)?;
        let (leaf_page, _) = match BPlusTreeLeafPageCodec::decode(page.read().data()) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.unpin_page(page_id, false);
                return Err(e);
            }
        };
        Ok(leaf_page)
    }

    pub fn fetch_tree_internal_page(&self, page_id: PageId) -> VellumResult<BPlusTreeInternalPage> {
        let page = self.fetch_page(page_id)?;
        let (internal_page, _) = match BPlusTreeInternalPageCodec::decode(page.read().data()) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.unpin_page(page_id, false);
                return Err(e);
            }
        };
        Ok(internal_page)
    }

    pub fn fetch_header_page(&self) -> VellumResult<HeaderPage> {
        let page = self.fetch_page(HEADER_PAGE_ID)?;
        let (header_page, _) = match HeaderPageCodec::decode(page.read().data()) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.unpin_page(HEADER_PAGE_ID, false);
                return Err(e);
            }
        };
        Ok(header_page)
    }

    /// Re-encode a decoded tree page into its (pinned) frame, marking it
    /// dirty.
    pub fn write_tree_page(&self, page_id: PageId, tree_page: &BPlusTreePage) -> VellumResult<()> {
        let _latch = self.latch.lock();
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Err(VellumError::Storage(format!(
                "write_tree_page: page {} is not resident",
                page_id
            )));
        };
        self.pool[frame_id]
            .write()
            .set_data(page_bytes_to_array(&BPlusTreePageCodec::encode(tree_page)));
        Ok(())
    }

    pub fn write_header_page(&self, header_page: &HeaderPage) -> VellumResult<()> {
        let _latch = self.latch.lock();
        let Some(frame_id) = self.page_table.find(&HEADER_PAGE_ID) else {
            return Err(VellumError::Storage(
                "write_header_page: header page is not resident".to_string(),
            ));
        };
        self.pool[frame_id]
            .write()
            .set_data(page_bytes_to_array(&HeaderPageCodec::encode(header_page)));
        Ok(())
    }
}
