use std::fmt::Display;
use std::sync::Arc;

use self::schema::TupleDesc;
use self::value::Value;
use crate::common::SlotNo;
use crate::error::{Result, StorageError};
use crate::storage::heap::page::HeapPageId;

pub mod schema;
pub mod value;

/// Location of a stored tuple: the page it lives on and its slot within that page.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: HeapPageId,
    pub slot: SlotNo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    tuple_desc: Arc<TupleDesc>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple, checking that `values` line up with the types of `tuple_desc`.
    pub fn new(tuple_desc: Arc<TupleDesc>, values: Vec<Value>) -> Result<Self> {
        if values.len() != tuple_desc.num_fields() {
            return Err(StorageError::TupleMismatch(format!(
                "expected {} values, got {}",
                tuple_desc.num_fields(),
                values.len()
            )));
        }
        for (index, (value, field)) in values.iter().zip(tuple_desc.fields()).enumerate() {
            if value.value_type() != field.field_type() {
                return Err(StorageError::TupleMismatch(format!(
                    "value {} has type {}, field {} expects {}",
                    value,
                    value.value_type(),
                    index,
                    field.field_type()
                )));
            }
        }
        Ok(Self {
            tuple_desc,
            values,
            record_id: None,
        })
    }

    pub(crate) fn with_record_id(
        tuple_desc: Arc<TupleDesc>,
        values: Vec<Value>,
        record_id: RecordId,
    ) -> Self {
        Self {
            tuple_desc,
            values,
            record_id: Some(record_id),
        }
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.tuple_desc
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}
