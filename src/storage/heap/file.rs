use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::os::unix::prelude::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::iterator::HeapFileIterator;
use super::page::{HeapPage, HeapPageId};
use crate::buffer::{PageCache, PageRef, Permission};
use crate::common::{PageNo, TableId};
use crate::concurrency::TransactionId;
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::storage::common::PageLayout;
use crate::tuple::schema::TupleDesc;
use crate::tuple::Tuple;

/// A table stored as a flat sequence of fixed-size pages in a single file.
/// Page `n` occupies the bytes `[n * page_size, (n + 1) * page_size)`.
///
/// The struct only holds the path and the schema, every operation goes to the file
/// (or to the page cache) anew, so a `HeapFile` can be shared freely between threads.
#[derive(Debug)]
pub struct HeapFile {
    table_id: TableId,
    path: PathBuf,
    tuple_desc: Arc<TupleDesc>,
    page_size: usize,
    /// Held while growing the file by a page.
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Creates a heap file backed by `path`. The file itself is not touched, a missing
    /// file is treated as an empty table until the first page is written.
    pub fn new(
        path: impl AsRef<Path>,
        tuple_desc: TupleDesc,
        config: &StorageConfig,
    ) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        let table_id = table_id_of(&path);
        Ok(Self::with_id(table_id, path, tuple_desc, config))
    }

    fn with_id(
        table_id: TableId,
        path: PathBuf,
        tuple_desc: TupleDesc,
        config: &StorageConfig,
    ) -> Self {
        Self {
            table_id,
            path,
            tuple_desc: Arc::new(tuple_desc),
            page_size: config.page_size,
            append_lock: Mutex::new(()),
        }
    }

    /// Heap file over `path` with a chosen id, to set up id collisions.
    #[cfg(test)]
    pub(crate) fn new_with_id(
        table_id: TableId,
        path: impl AsRef<Path>,
        tuple_desc: TupleDesc,
        config: &StorageConfig,
    ) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        Ok(Self::with_id(table_id, path, tuple_desc, config))
    }

    /// Identifier derived from the absolute path; stable for a given path.
    pub fn id(&self) -> TableId {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.tuple_desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn file_len(&self) -> Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of pages in the file, counting a trailing partial page. Always computed from
    /// the current file length.
    pub fn num_pages(&self) -> Result<PageNo> {
        let len = self.file_len()?;
        Ok(len.div_ceil(self.page_size as u64) as PageNo)
    }

    fn check_owned(&self, page_id: HeapPageId) -> Result<()> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::ForeignPage {
                page_id,
                table_id: self.table_id,
            });
        }
        Ok(())
    }

    fn offset(&self, page_no: PageNo) -> u64 {
        page_no as u64 * self.page_size as u64
    }

    /// Reads page `page_id` straight from disk.
    pub fn read_page(&self, page_id: HeapPageId) -> Result<HeapPage> {
        self.check_owned(page_id)?;
        let num_pages = self.num_pages()?;
        if page_id.page_no >= num_pages {
            return Err(StorageError::PageOutOfRange { page_id, num_pages });
        }

        debug!("reading page {} from {}", page_id, self.path.display());
        let file = File::open(&self.path)?;
        let mut buffer = vec![0u8; self.page_size];
        file.read_exact_at(&mut buffer, self.offset(page_id.page_no))?;

        HeapPage::parse(page_id, Arc::clone(&self.tuple_desc), self.page_size, &buffer)
    }

    /// Writes `page` to its slot in the file, growing the file if the slot lies past the end.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        self.check_owned(page.page_id())?;
        let data = page.page_data();
        if data.len() != self.page_size {
            return Err(StorageError::MalformedPage {
                page_id: page.page_id(),
                reason: format!(
                    "page serializes to {} bytes, file pages are {} bytes",
                    data.len(),
                    self.page_size
                ),
            });
        }
        self.write_page_data(page.page_id().page_no, &data)
    }

    fn write_page_data(&self, page_no: PageNo, data: &[u8]) -> Result<()> {
        debug!("writing page {} to {}", page_no, self.path.display());
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.write_all_at(data, self.offset(page_no))?;
        file.sync_all()?;
        Ok(())
    }

    /// Inserts `tuple` into the first page with a free slot, appending a new page when
    /// every existing page is full. Returns the pages that were modified; the caller is
    /// responsible for marking them dirty.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        cache: &dyn PageCache,
    ) -> Result<Vec<PageRef>> {
        if tuple.tuple_desc().as_ref() != self.tuple_desc.as_ref() {
            return Err(StorageError::TupleMismatch(format!(
                "table {} stores ({}), tuple has ({})",
                self.table_id,
                self.tuple_desc,
                tuple.tuple_desc()
            )));
        }
        if PageLayout::new(self.page_size, self.tuple_desc.size()).num_slots == 0 {
            return Err(StorageError::TupleTooLarge {
                tuple_size: self.tuple_desc.size(),
                page_size: self.page_size,
            });
        }

        let mut scanned = 0;
        loop {
            let num_pages = self.num_pages()?;
            for page_no in scanned..num_pages {
                let page_id = HeapPageId::new(self.table_id, page_no);
                let page = cache.get_page(tid, page_id, Permission::ReadWrite)?;
                let mut guard = page.write();
                if guard.num_empty_slots() > 0 {
                    guard.insert_tuple(tuple)?;
                    drop(guard);
                    return Ok(vec![page]);
                }
            }
            scanned = num_pages;

            let _append = self.append_lock.lock();
            // another writer may have appended while the existing pages were scanned
            if self.num_pages()? != num_pages {
                continue;
            }
            self.write_page_data(num_pages, &HeapPage::empty_page_data(self.page_size))?;
            let page_id = HeapPageId::new(self.table_id, num_pages);
            let page = cache.get_page(tid, page_id, Permission::ReadWrite)?;
            page.write().insert_tuple(tuple)?;
            return Ok(vec![page]);
        }
    }

    /// Removes `tuple` from the page its record id points to. Returns the modified pages.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        cache: &dyn PageCache,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        self.check_owned(record_id.page_id)?;
        let page = cache.get_page(tid, record_id.page_id, Permission::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Returns an unopened iterator over all tuples of this file, fetching pages for `tid`
    /// through `cache`.
    pub fn iterator<'a>(
        &'a self,
        tid: TransactionId,
        cache: &'a dyn PageCache,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, tid, cache)
    }
}

fn table_id_of(path: &Path) -> TableId {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as TableId
}
