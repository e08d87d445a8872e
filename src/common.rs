pub type TableId = u32;
pub type PageNo = u32;
pub type SlotNo = usize;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_POOL_SIZE: usize = 50;

/// Number of payload bytes reserved for every string field, regardless of its content.
pub const STRING_LEN: usize = 128;

pub const HEAP_FILE_EXTENSION: &str = "dat";
