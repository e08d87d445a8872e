use crate::common::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};
use crate::error::{Result, StorageError};

/// Storage parameters shared by every heap file and the buffer pool serving them.
/// Both sides must be built from the same value, otherwise page offsets on disk and
/// page sizes in memory disagree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub page_size: usize,
    pub pool_size: usize,
}

impl StorageConfig {
    pub fn new(page_size: usize, pool_size: usize) -> Result<Self> {
        let config = Self {
            page_size,
            pool_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StorageError::InvalidConfig(
                "page size must be greater than zero".to_owned(),
            ));
        }
        if self.pool_size == 0 {
            return Err(StorageError::InvalidConfig(
                "pool size must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
