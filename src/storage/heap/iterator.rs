use log::trace;

use super::file::HeapFile;
use super::page::HeapPageId;
use crate::buffer::{PageCache, PageRef, Permission};
use crate::common::{PageNo, SlotNo};
use crate::concurrency::TransactionId;
use crate::error::{Result, StorageError};
use crate::storage::DbFileIterator;
use crate::tuple::Tuple;

/// Position of an open scan. Only the page currently being read is held.
struct Cursor {
    num_pages: PageNo,
    next_page_no: PageNo,
    page: Option<PageRef>,
    slot: SlotNo,
}

enum ScanState {
    Unopened,
    Open(Cursor),
    Closed,
}

/// Sequential scan over all tuples of a heap file, in page order and slot order within
/// each page. Pages are requested read-only from the page cache one at a time.
///
/// Not meant to be shared between threads, every reader owns its own iterator.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    tid: TransactionId,
    cache: &'a dyn PageCache,
    state: ScanState,
}

impl<'a> HeapFileIterator<'a> {
    pub(in crate::storage) fn new(
        file: &'a HeapFile,
        tid: TransactionId,
        cache: &'a dyn PageCache,
    ) -> Self {
        Self {
            file,
            tid,
            cache,
            state: ScanState::Unopened,
        }
    }

    fn start(&self) -> Result<Cursor> {
        Ok(Cursor {
            num_pages: self.file.num_pages()?,
            next_page_no: 0,
            page: None,
            slot: 0,
        })
    }

    /// Moves the cursor to the next live tuple, fetching pages as needed.
    /// Returns false once every page has been exhausted.
    fn advance(&mut self) -> Result<bool> {
        let cursor = match &mut self.state {
            ScanState::Open(cursor) => cursor,
            ScanState::Unopened | ScanState::Closed => return Ok(false),
        };
        loop {
            if let Some(page) = &cursor.page {
                if let Some(slot) = page.read().next_occupied_slot(cursor.slot) {
                    cursor.slot = slot;
                    return Ok(true);
                }
            }
            if cursor.next_page_no >= cursor.num_pages {
                cursor.page = None;
                return Ok(false);
            }
            let page_id = HeapPageId::new(self.file.id(), cursor.next_page_no);
            trace!("scan of table {} moves to page {}", self.file.id(), page_id);
            // release the previous page before asking for the next one
            cursor.page = None;
            cursor.page = Some(
                self.cache
                    .get_page(self.tid, page_id, Permission::ReadOnly)?,
            );
            cursor.next_page_no += 1;
            cursor.slot = 0;
        }
    }
}

impl DbFileIterator for HeapFileIterator<'_> {
    fn open(&mut self) -> Result<()> {
        self.state = ScanState::Open(self.start()?);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        self.advance()
    }

    fn next(&mut self) -> Result<Tuple> {
        match self.state {
            ScanState::Unopened => return Err(StorageError::IteratorNotOpen),
            ScanState::Closed => return Err(StorageError::IteratorClosed),
            ScanState::Open(_) => (),
        }
        if !self.advance()? {
            return Err(StorageError::NoSuchElement);
        }
        let ScanState::Open(cursor) = &mut self.state else {
            return Err(StorageError::IteratorNotOpen);
        };
        let page = cursor.page.as_ref().ok_or(StorageError::NoSuchElement)?;
        let tuple = page
            .read()
            .tuple(cursor.slot)
            .cloned()
            .ok_or(StorageError::NoSuchElement)?;
        cursor.slot += 1;
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        match self.state {
            ScanState::Unopened => Err(StorageError::IteratorNotOpen),
            ScanState::Closed => Err(StorageError::IteratorClosed),
            ScanState::Open(_) => {
                self.state = ScanState::Open(self.start()?);
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.state = ScanState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::Result;
    use parking_lot::RwLock;
    use tempfile::tempdir;

    use crate::buffer::{PageCache, PageRef, Permission};
    use crate::concurrency::TransactionId;
    use crate::config::StorageConfig;
    use crate::error::{ErrorKind, StorageError};
    use crate::storage::heap::file::HeapFile;
    use crate::storage::heap::page::{HeapPage, HeapPageId};
    use crate::storage::DbFileIterator;
    use crate::tuple::schema::{TupleDesc, Type};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    const PAGE_SIZE: usize = 64;

    /// Serves pages from disk and remembers what was asked for.
    struct RecordingCache<'a> {
        file: &'a HeapFile,
        fetches: AtomicUsize,
        permissions: RwLock<Vec<Permission>>,
    }

    impl<'a> RecordingCache<'a> {
        fn new(file: &'a HeapFile) -> Self {
            Self {
                file,
                fetches: AtomicUsize::new(0),
                permissions: RwLock::new(Vec::new()),
            }
        }
    }

    impl PageCache for RecordingCache<'_> {
        fn get_page(
            &self,
            _tid: TransactionId,
            page_id: HeapPageId,
            permission: Permission,
        ) -> crate::error::Result<PageRef> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.permissions.write().push(permission);
            Ok(Arc::new(RwLock::new(self.file.read_page(page_id)?)))
        }
    }

    struct FailingCache;

    impl PageCache for FailingCache {
        fn get_page(
            &self,
            _tid: TransactionId,
            _page_id: HeapPageId,
            _permission: Permission,
        ) -> crate::error::Result<PageRef> {
            Err(StorageError::BufferPoolFull(0))
        }
    }

    /// Writes one page per entry of `tuples_per_page`, page `p` holding that many tuples
    /// with values `(p, i)`.
    fn build_file(dir: &std::path::Path, tuples_per_page: &[i32]) -> Result<HeapFile> {
        let config = StorageConfig::new(PAGE_SIZE, 4)?;
        let file = HeapFile::new(
            dir.join("scan.dat"),
            TupleDesc::with_types(vec![Type::Int, Type::Int])?,
            &config,
        )?;
        let desc = Arc::clone(file.tuple_desc());
        for (page_no, count) in tuples_per_page.iter().enumerate() {
            let mut page = HeapPage::parse(
                HeapPageId::new(file.id(), page_no as u32),
                Arc::clone(&desc),
                PAGE_SIZE,
                &HeapPage::empty_page_data(PAGE_SIZE),
            )?;
            for i in 0..*count {
                let values = vec![Value::Int(page_no as i32), Value::Int(i)];
                page.insert_tuple(&Tuple::new(Arc::clone(&desc), values)?)?;
            }
            file.write_page(&page)?;
        }
        Ok(file)
    }

    fn drain(iter: &mut dyn DbFileIterator) -> Result<Vec<(i32, i32)>> {
        let mut out = Vec::new();
        while iter.has_next()? {
            let tuple = iter.next()?;
            out.push((
                tuple.value(0).and_then(|v| v.as_i32()).unwrap(),
                tuple.value(1).and_then(|v| v.as_i32()).unwrap(),
            ));
        }
        Ok(out)
    }

    #[test]
    fn scans_pages_in_order_skipping_empty_ones() -> Result<()> {
        let dir = tempdir()?;
        let file = build_file(dir.path(), &[2, 0, 0, 3, 0, 1, 0])?;
        let cache = RecordingCache::new(&file);
        let mut iter = file.iterator(TransactionId::new(), &cache);

        iter.open()?;
        let tuples = drain(&mut iter)?;
        assert_eq!(
            tuples,
            vec![(0, 0), (0, 1), (3, 0), (3, 1), (3, 2), (5, 0)]
        );
        assert!(!iter.has_next()?);
        assert!(matches!(iter.next(), Err(StorageError::NoSuchElement)));
        iter.close();

        assert_eq!(cache.fetches.load(Ordering::Relaxed), 7);
        assert!(cache
            .permissions
            .read()
            .iter()
            .all(|p| *p == Permission::ReadOnly));
        Ok(())
    }

    #[test]
    fn empty_file_and_empty_pages_yield_nothing() -> Result<()> {
        let dir = tempdir()?;
        let file = build_file(dir.path(), &[])?;
        let cache = RecordingCache::new(&file);
        let mut iter = file.iterator(TransactionId::new(), &cache);
        iter.open()?;
        assert!(!iter.has_next()?);

        let dir = tempdir()?;
        let file = build_file(dir.path(), &[0, 0, 0])?;
        let cache = RecordingCache::new(&file);
        let mut iter = file.iterator(TransactionId::new(), &cache);
        iter.open()?;
        assert!(drain(&mut iter)?.is_empty());
        Ok(())
    }

    #[test]
    fn rewind_restarts_from_first_page() -> Result<()> {
        let dir = tempdir()?;
        let file = build_file(dir.path(), &[3, 0, 4])?;
        let cache = RecordingCache::new(&file);
        let mut iter = file.iterator(TransactionId::new(), &cache);

        iter.open()?;
        let full = drain(&mut iter)?;
        assert_eq!(full.len(), 7);

        iter.rewind()?;
        for _ in 0..4 {
            iter.next()?;
        }
        iter.rewind()?;
        assert_eq!(drain(&mut iter)?, full);

        // reopening behaves like a fresh scan as well
        iter.close();
        iter.open()?;
        assert_eq!(drain(&mut iter)?, full);
        Ok(())
    }

    #[test]
    fn next_without_has_next_walks_everything() -> Result<()> {
        let dir = tempdir()?;
        let file = build_file(dir.path(), &[1, 0, 2])?;
        let cache = RecordingCache::new(&file);
        let mut iter = file.iterator(TransactionId::new(), &cache);
        iter.open()?;
        for _ in 0..3 {
            iter.next()?;
        }
        assert!(matches!(iter.next(), Err(StorageError::NoSuchElement)));
        Ok(())
    }

    #[test]
    fn lifecycle_errors_are_distinct() -> Result<()> {
        let dir = tempdir()?;
        let file = build_file(dir.path(), &[2])?;
        let cache = RecordingCache::new(&file);
        let mut iter = file.iterator(TransactionId::new(), &cache);

        assert!(!iter.has_next()?);
        assert!(matches!(iter.next(), Err(StorageError::IteratorNotOpen)));
        assert!(matches!(iter.rewind(), Err(StorageError::IteratorNotOpen)));

        iter.open()?;
        assert!(iter.has_next()?);
        iter.close();
        iter.close();

        assert!(!iter.has_next()?);
        let err = iter.next().unwrap_err();
        assert!(matches!(err, StorageError::IteratorClosed));
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(matches!(iter.rewind(), Err(StorageError::IteratorClosed)));
        assert_eq!(cache.fetches.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[test]
    fn page_cache_errors_propagate() -> Result<()> {
        let dir = tempdir()?;
        let file = build_file(dir.path(), &[1])?;
        let mut iter = file.iterator(TransactionId::new(), &FailingCache);
        iter.open()?;
        assert!(matches!(
            iter.has_next(),
            Err(StorageError::BufferPoolFull(_))
        ));
        Ok(())
    }
}
