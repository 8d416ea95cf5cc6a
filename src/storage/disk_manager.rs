use log::{debug, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::Ordering;

use crate::buffer::{AtomicPageId, PageId, PAGE_SIZE};
use crate::error::{VellumError, VellumResult};

static EMPTY_PAGE: [u8; PAGE_SIZE] = [0; PAGE_SIZE];

/// Page-addressed block storage over a single database file. Page 0 is the
/// header page and is written when the file is created; page ids grow
/// monotonically from there, with deallocated ids recycled.
#[derive(Debug)]
pub struct DiskManager {
    next_page_id: AtomicPageId,
    // One thread at a time may touch the file handle.
    db_file: Mutex<File>,
    free_pages: Mutex<Vec<PageId>>,
}

impl DiskManager {
    pub fn try_new(db_path: impl AsRef<Path>) -> VellumResult<Self> {
        let db_path = db_path.as_ref();
        let is_new_file = !db_path.exists();
        let mut db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        if is_new_file {
            // reserve page 0 for the index catalog
            db_file.write_all(&EMPTY_PAGE)?;
            db_file.flush()?;
        }

        let db_file_len = db_file.metadata()?.len();
        if db_file_len % PAGE_SIZE as u64 != 0 {
            return Err(VellumError::Internal(format!(
                "db file size {} is not a multiple of page size {}",
                db_file_len, PAGE_SIZE
            )));
        }
        let next_page_id = (db_file_len / PAGE_SIZE as u64).max(1) as PageId;
        debug!("disk manager initialized, next_page_id: {}", next_page_id);

        Ok(Self {
            next_page_id: AtomicPageId::new(next_page_id),
            db_file: Mutex::new(db_file),
            free_pages: Mutex::new(Vec::new()),
        })
    }

    pub fn read_page(&self, page_id: PageId) -> VellumResult<[u8; PAGE_SIZE]> {
        if page_id < 0 {
            return Err(VellumError::Storage(format!(
                "read_page: invalid page id {}",
                page_id
            )));
        }
        let mut guard = self.db_file.lock();
        guard.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        let mut page = [0u8; PAGE_SIZE];
        match guard.read_exact(&mut page) {
            Ok(()) => Ok(page),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!("read_page {} past end of file, returning zeros", page_id);
                Ok([0u8; PAGE_SIZE])
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> VellumResult<()> {
        if page_id < 0 {
            return Err(VellumError::Storage(format!(
                "write_page: invalid page id {}",
                page_id
            )));
        }
        if data.len() != PAGE_SIZE {
            return Err(VellumError::Internal(format!(
                "write_page: data length {} is not {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        let mut guard = self.db_file.lock();
        guard.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        guard.write_all(data)?;
        guard.flush()?;
        Ok(())
    }

    pub fn allocate_page(&self) -> VellumResult<PageId> {
        if let Some(page_id) = self.free_pages.lock().pop() {
            return Ok(page_id);
        }
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        // extend the file with a zeroed page
        self.write_page(page_id, &EMPTY_PAGE)?;
        Ok(page_id)
    }

    pub fn deallocate_page(&self, page_id: PageId) -> VellumResult<()> {
        if page_id <= 0 {
            return Err(VellumError::Storage(format!(
                "deallocate_page: invalid page id {}",
                page_id
            )));
        }
        self.write_page(page_id, &EMPTY_PAGE)?;
        self.free_pages.lock().push(page_id);
        Ok(())
    }

    pub fn db_file_len(&self) -> VellumResult<u64> {
        let guard = self.db_file.lock();
        Ok(guard.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::DiskManager;
    use crate::buffer::PAGE_SIZE;
    use tempfile::TempDir;

    #[test]
    fn write_read_page() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();

        let page_id1 = disk_manager.allocate_page().unwrap();
        assert_eq!(page_id1, 1);
        let mut page1 = vec![1, 2, 3];
        page1.extend(vec![0; PAGE_SIZE - 3]);
        disk_manager.write_page(page_id1, &page1).unwrap();
        assert_eq!(disk_manager.read_page(page_id1).unwrap(), page1.as_slice());

        let page_id2 = disk_manager.allocate_page().unwrap();
        assert_eq!(page_id2, 2);
        let mut page2 = vec![0; PAGE_SIZE - 3];
        page2.extend(vec![4, 5, 6]);
        disk_manager.write_page(page_id2, &page2).unwrap();
        assert_eq!(disk_manager.read_page(page_id2).unwrap(), page2.as_slice());

        // header page + two data pages
        assert_eq!(disk_manager.db_file_len().unwrap() as usize, 3 * PAGE_SIZE);
    }

    #[test]
    fn deallocated_ids_are_recycled() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();

        let page_id1 = disk_manager.allocate_page().unwrap();
        let _page_id2 = disk_manager.allocate_page().unwrap();
        disk_manager.write_page(page_id1, &[7u8; PAGE_SIZE]).unwrap();

        disk_manager.deallocate_page(page_id1).unwrap();
        // the page bytes were zeroed
        assert!(disk_manager
            .read_page(page_id1)
            .unwrap()
            .iter()
            .all(|&b| b == 0));

        let page_id3 = disk_manager.allocate_page().unwrap();
        assert_eq!(page_id3, page_id1);
    }

    #[test]
    fn reopen_restores_next_page_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        {
            let disk_manager = DiskManager::try_new(&path).unwrap();
            assert_eq!(disk_manager.allocate_page().unwrap(), 1);
            assert_eq!(disk_manager.allocate_page().unwrap(), 2);
        }
        let disk_manager = DiskManager::try_new(&path).unwrap();
        assert_eq!(disk_manager.allocate_page().unwrap(), 3);
    }

    #[test]
    fn invalid_page_ids_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();
        assert!(disk_manager.read_page(-1).is_err());
        assert!(disk_manager.write_page(-1, &[0u8; PAGE_SIZE]).is_err());
        assert!(disk_manager.deallocate_page(0).is_err());
    }
}
