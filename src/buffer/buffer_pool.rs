use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use super::clock_replacer::ClockReplacer;
use super::{PageCache, PageRef, Permission, PoolPos};
use crate::catalog::Catalog;
use crate::common::TableId;
use crate::concurrency::TransactionId;
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::storage::heap::file::HeapFile;
use crate::storage::heap::page::HeapPageId;
use crate::tuple::Tuple;

/// A cached page together with the heap file it was read from, which is also where it
/// is written back to.
#[derive(Clone)]
struct Frame {
    file: Arc<HeapFile>,
    page: PageRef,
}

impl Frame {
    /// Whether anybody besides the pool holds the page.
    fn is_pinned(&self) -> bool {
        Arc::strong_count(&self.page) > 1
    }

    fn flush(&self) -> Result<()> {
        let mut guard = self.page.write();
        if guard.dirtied_by().is_some() {
            self.file.write_page(&guard)?;
            guard.mark_dirty(None);
        }
        Ok(())
    }
}

struct PoolState {
    frames: Vec<Option<Frame>>,
    page_table: HashMap<HeapPageId, PoolPos>,
    replacer: ClockReplacer,
}

/// A fixed number of page frames shared by all transactions.
///
/// Pages are loaded through the heap file the catalog registers for their table and are
/// written back through that same file, even if the catalog has dropped it since. A frame
/// can only be reused once no [`PageRef`] to its page is held outside the pool; dirty
/// pages are written back before their frame is reused.
pub struct BufferPool {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    state: Mutex<PoolState>,
    grants: DashMap<TransactionId, HashMap<HeapPageId, Permission>>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: StorageConfig) -> Self {
        let pool_size = config.pool_size;
        Self {
            config,
            catalog,
            state: Mutex::new(PoolState {
                frames: (0..pool_size).map(|_| None).collect(),
                page_table: HashMap::new(),
                replacer: ClockReplacer::new(pool_size),
            }),
            grants: DashMap::new(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Number of pages currently held in frames.
    pub fn num_cached_pages(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Strongest permission `tid` has requested for `page_id` since it started.
    pub fn holds_page(&self, tid: TransactionId, page_id: HeapPageId) -> Option<Permission> {
        self.grants
            .get(&tid)
            .and_then(|pages| pages.get(&page_id).copied())
    }

    fn grant(&self, tid: TransactionId, page_id: HeapPageId, permission: Permission) {
        self.grants
            .entry(tid)
            .or_default()
            .entry(page_id)
            .and_modify(|granted| *granted = (*granted).max(permission))
            .or_insert(permission);
    }

    /// Returns a frame that holds no page, evicting one if needed.
    fn find_frame(&self, state: &mut PoolState) -> Result<PoolPos> {
        let PoolState {
            frames,
            page_table,
            replacer,
        } = state;

        if let Some(free) = frames.iter().position(|frame| frame.is_none()) {
            return Ok(free);
        }

        let victim = replacer
            .find_victim(|pos| frames[pos].as_ref().map_or(true, |frame| !frame.is_pinned()))
            .ok_or(StorageError::BufferPoolFull(self.config.pool_size))?;

        if let Some(frame) = frames[victim].take() {
            if let Err(e) = frame.flush() {
                frames[victim] = Some(frame);
                return Err(e);
            }
            let page_id = frame.page.read().page_id();
            trace!("evicting page {} from frame {}", page_id, victim);
            page_table.remove(&page_id);
        }
        replacer.forget(victim);
        Ok(victim)
    }

    /// Returns the page in frame `pos` if it was read through `file`. A page read through
    /// a heap file the catalog no longer hands out is written back and dropped instead.
    fn cached_page(
        &self,
        state: &mut PoolState,
        pos: PoolPos,
        page_id: HeapPageId,
        file: &Arc<HeapFile>,
    ) -> Result<Option<PageRef>> {
        let Some(frame) = &state.frames[pos] else {
            return Ok(None);
        };
        if Arc::ptr_eq(&frame.file, file) {
            let page = Arc::clone(&frame.page);
            state.replacer.touch(pos);
            return Ok(Some(page));
        }
        if frame.is_pinned() {
            return Err(StorageError::StalePage(page_id));
        }
        frame.flush()?;
        debug!("table {} was replaced, reloading page {}", page_id.table_id, page_id);
        state.page_table.remove(&page_id);
        state.frames[pos] = None;
        state.replacer.forget(pos);
        Ok(None)
    }

    /// Writes `page_id` back to disk if it is cached and dirty.
    pub fn flush_page(&self, page_id: HeapPageId) -> Result<()> {
        let state = self.state.lock();
        if let Some(&pos) = state.page_table.get(&page_id) {
            if let Some(frame) = &state.frames[pos] {
                frame.flush()?;
            }
        }
        Ok(())
    }

    /// Writes every dirty cached page back to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();
        for frame in state.frames.iter().flatten() {
            frame.flush()?;
        }
        Ok(())
    }

    /// Drops `page_id` from the pool without writing it back. Outstanding [`PageRef`]s
    /// keep working on their now detached copy.
    pub fn discard_page(&self, page_id: HeapPageId) {
        let mut state = self.state.lock();
        if let Some(pos) = state.page_table.remove(&page_id) {
            state.frames[pos] = None;
            state.replacer.forget(pos);
        }
    }

    /// Ends `tid`: on commit its dirty pages are written back, on abort they are dropped
    /// so the next reader sees the on-disk version again. Its grants are released.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let Some((_, pages)) = self.grants.remove(&tid) else {
            return Ok(());
        };
        for page_id in pages.into_keys() {
            let frame = {
                let state = self.state.lock();
                state
                    .page_table
                    .get(&page_id)
                    .and_then(|pos| state.frames[*pos].clone())
            };
            let Some(frame) = frame else {
                continue;
            };
            if frame.page.read().dirtied_by() != Some(tid) {
                continue;
            }
            if commit {
                frame.flush()?;
            } else {
                debug!("{} aborted, discarding page {}", tid, page_id);
                self.discard_page(page_id);
            }
        }
        Ok(())
    }

    /// Adds `tuple` to table `table_id` on behalf of `tid` and marks the touched pages dirty.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: &Tuple) -> Result<()> {
        let file = self.catalog.get_database_file(table_id)?;
        for page in file.insert_tuple(tid, tuple, self)? {
            page.write().mark_dirty(Some(tid));
        }
        Ok(())
    }

    /// Removes `tuple` from the table its record id points into and marks the touched
    /// pages dirty.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let file = self.catalog.get_database_file(record_id.page_id.table_id)?;
        for page in file.delete_tuple(tid, tuple, self)? {
            page.write().mark_dirty(Some(tid));
        }
        Ok(())
    }
}

impl PageCache for BufferPool {
    fn get_page(
        &self,
        tid: TransactionId,
        page_id: HeapPageId,
        permission: Permission,
    ) -> Result<PageRef> {
        let file = self.catalog.get_database_file(page_id.table_id)?;
        let mut state = self.state.lock();
        let page = match state.page_table.get(&page_id).copied() {
            Some(pos) => self.cached_page(&mut state, pos, page_id, &file)?,
            None => None,
        };

        let page = match page {
            Some(page) => page,
            None => {
                if file.page_size() != self.config.page_size {
                    return Err(StorageError::PageSizeMismatch {
                        file: file.page_size(),
                        pool: self.config.page_size,
                    });
                }
                let page: PageRef = Arc::new(RwLock::new(file.read_page(page_id)?));
                let pos = self.find_frame(&mut state)?;
                state.frames[pos] = Some(Frame {
                    file,
                    page: Arc::clone(&page),
                });
                state.page_table.insert(page_id, pos);
                state.replacer.touch(pos);
                page
            }
        };
        drop(state);

        self.grant(tid, page_id, permission);
        Ok(page)
    }
}
