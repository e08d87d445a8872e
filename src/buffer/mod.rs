use std::sync::Arc;

use parking_lot::RwLock;

use crate::concurrency::TransactionId;
use crate::error::Result;
use crate::storage::heap::page::{HeapPage, HeapPageId};

pub mod buffer_pool;
mod clock_replacer;

pub(in crate::buffer) type PoolPos = usize;

/// Shared handle to a cached page. Holding a clone keeps the page resident.
pub type PageRef = Arc<RwLock<HeapPage>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// Source of pages for heap files. Owns residency and write-back of pages; heap files and
/// their iterators only ask for pages by id.
pub trait PageCache: Send + Sync {
    fn get_page(
        &self,
        tid: TransactionId,
        page_id: HeapPageId,
        permission: Permission,
    ) -> Result<PageRef>;
}
