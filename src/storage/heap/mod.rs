pub mod file;
pub mod iterator;
pub mod page;

pub use file::HeapFile;
pub use iterator::HeapFileIterator;
pub use page::{HeapPage, HeapPageId};
