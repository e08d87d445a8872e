use std::path::PathBuf;

use thiserror::Error;

use crate::common::{PageNo, SlotNo, TableId};
use crate::storage::heap::page::HeapPageId;

/// Coarse classification of a [`StorageError`], so callers can decide how to react
/// without matching every variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A field, table or element has no referent.
    NotFound,
    /// The underlying storage failed.
    Io,
    /// Bad configuration or a malformed schema description.
    Config,
    /// An object was used in a state that does not allow the operation.
    IllegalState,
    /// The caller handed over something that cannot be stored or looked up as given.
    Invalid,
    /// A bounded resource ran out.
    Resource,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("field index {index} is out of range for a schema with {num_fields} fields")]
    FieldIndexOutOfRange { index: usize, num_fields: usize },

    #[error("null is not a valid field name")]
    NullFieldName,

    #[error("no fields are named, so field {0} cannot be found")]
    NoNamedFields(String),

    #[error("{0} is not a valid field name")]
    FieldNotFound(String),

    #[error("a schema needs at least one field")]
    EmptySchema,

    #[error("got {types} types but {names} field names")]
    SchemaLengthMismatch { types: usize, names: usize },

    #[error("tuple does not match the schema: {0}")]
    TupleMismatch(String),

    #[error("no table named {0}")]
    NoSuchTable(String),

    #[error("no table with id {0}")]
    NoSuchTableId(TableId),

    #[error(
        "table id {} of {} is already taken by {}",
        .table_id,
        .incoming.display(),
        .existing.display()
    )]
    TableIdCollision {
        table_id: TableId,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("page {page_id} does not exist, the file has {num_pages} pages")]
    PageOutOfRange { page_id: HeapPageId, num_pages: PageNo },

    #[error("page {page_id} does not belong to table {table_id}")]
    ForeignPage {
        page_id: HeapPageId,
        table_id: TableId,
    },

    #[error("page {page_id} is malformed: {reason}")]
    MalformedPage { page_id: HeapPageId, reason: String },

    #[error("page {0} has no empty slot")]
    PageFull(HeapPageId),

    #[error("slot {slot} of page {page_id} is not occupied")]
    SlotNotOccupied { page_id: HeapPageId, slot: SlotNo },

    #[error("tuple has no record id, it was never stored")]
    MissingRecordId,

    #[error("a tuple of {tuple_size} bytes does not fit into a page of {page_size} bytes")]
    TupleTooLarge { tuple_size: usize, page_size: usize },

    #[error("heap file uses {file} byte pages, but the buffer pool serves {pool} byte pages")]
    PageSizeMismatch { file: usize, pool: usize },

    #[error("no more elements")]
    NoSuchElement,

    #[error("iterator has not been opened")]
    IteratorNotOpen,

    #[error("iterator has been closed")]
    IteratorClosed,

    #[error("all {0} buffers are in use")]
    BufferPoolFull(usize),

    #[error("page {0} is still in use by a table that has since been replaced")]
    StalePage(HeapPageId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid schema entry on line {line_no} ({reason}): {line}")]
    SchemaParse {
        line_no: usize,
        line: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::FieldIndexOutOfRange { .. }
            | StorageError::NullFieldName
            | StorageError::NoNamedFields(_)
            | StorageError::FieldNotFound(_)
            | StorageError::NoSuchTable(_)
            | StorageError::NoSuchTableId(_)
            | StorageError::PageOutOfRange { .. }
            | StorageError::SlotNotOccupied { .. }
            | StorageError::NoSuchElement => ErrorKind::NotFound,
            StorageError::Io(_) | StorageError::MalformedPage { .. } => ErrorKind::Io,
            StorageError::InvalidConfig(_)
            | StorageError::SchemaParse { .. }
            | StorageError::PageSizeMismatch { .. } => ErrorKind::Config,
            StorageError::IteratorNotOpen
            | StorageError::IteratorClosed
            | StorageError::StalePage(_) => ErrorKind::IllegalState,
            StorageError::EmptySchema
            | StorageError::SchemaLengthMismatch { .. }
            | StorageError::TupleMismatch(_)
            | StorageError::TableIdCollision { .. }
            | StorageError::ForeignPage { .. }
            | StorageError::PageFull(_)
            | StorageError::MissingRecordId
            | StorageError::TupleTooLarge { .. } => ErrorKind::Invalid,
            StorageError::BufferPoolFull(_) => ErrorKind::Resource,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
