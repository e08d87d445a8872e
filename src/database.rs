use std::sync::Arc;

use log::info;

use crate::buffer::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::error::Result;

/// Owns the catalog and the buffer pool serving its tables, both built from one config.
pub struct Database {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
}

impl Database {
    pub fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "opening database with {} byte pages and {} frames",
            config.page_size, config.pool_size
        );
        let catalog = Arc::new(Catalog::new(config));
        let buffer_pool = BufferPool::new(Arc::clone(&catalog), config);
        Ok(Self {
            config,
            catalog,
            buffer_pool,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }
}
