pub(in crate::storage) mod common;
pub mod heap;

use crate::error::Result;
use crate::tuple::Tuple;

/// A forward-only cursor over the tuples of a file.
///
/// A fresh iterator is unopened and yields nothing until [`DbFileIterator::open`] is
/// called. Once closed it yields nothing again until it is reopened.
pub trait DbFileIterator {
    fn open(&mut self) -> Result<()>;
    fn has_next(&mut self) -> Result<bool>;
    fn next(&mut self) -> Result<Tuple>;
    fn rewind(&mut self) -> Result<()>;
    fn close(&mut self);
}
