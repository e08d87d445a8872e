use std::fmt::Display;
use std::sync::Arc;

use crate::common::{PageNo, SlotNo, TableId};
use crate::concurrency::TransactionId;
use crate::error::{Result, StorageError};
use crate::storage::common::{is_bit_set, set_bit, PageLayout};
use crate::tuple::schema::TupleDesc;
use crate::tuple::value::Value;
use crate::tuple::{RecordId, Tuple};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapPageId {
    pub table_id: TableId,
    pub page_no: PageNo,
}

impl HeapPageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
}

impl Display for HeapPageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// In-memory image of one page of a heap file.
#[derive(Debug)]
pub struct HeapPage {
    page_id: HeapPageId,
    tuple_desc: Arc<TupleDesc>,
    layout: PageLayout,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Parses a page from exactly `page_size` bytes.
    pub fn parse(
        page_id: HeapPageId,
        tuple_desc: Arc<TupleDesc>,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        if data.len() != page_size {
            return Err(StorageError::MalformedPage {
                page_id,
                reason: format!("expected {} bytes, got {}", page_size, data.len()),
            });
        }
        let layout = PageLayout::new(page_size, tuple_desc.size());
        let header = data[..layout.header_size].to_vec();

        let mut tuples = Vec::with_capacity(layout.num_slots);
        for slot in 0..layout.num_slots {
            if !is_bit_set(&header, slot) {
                tuples.push(None);
                continue;
            }
            let mut offset = layout.slot_offset(slot);
            let mut values = Vec::with_capacity(tuple_desc.num_fields());
            for field in tuple_desc.fields() {
                let value = Value::parse_value(&data[offset..], field.field_type()).map_err(
                    |reason| StorageError::MalformedPage {
                        page_id,
                        reason: format!("slot {slot}: {reason}"),
                    },
                )?;
                offset += field.field_type().len();
                values.push(value);
            }
            let record_id = RecordId { page_id, slot };
            tuples.push(Some(Tuple::with_record_id(
                Arc::clone(&tuple_desc),
                values,
                record_id,
            )));
        }

        Ok(Self {
            page_id,
            tuple_desc,
            layout,
            header,
            tuples,
            dirtied_by: None,
        })
    }

    /// Bytes of a page without any tuple.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Serializes the page so it can be written back to disk.
    pub fn page_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.layout.page_size];
        data[..self.layout.header_size].copy_from_slice(&self.header);
        for (slot, tuple) in self.tuples.iter().enumerate() {
            if let Some(tuple) = tuple {
                let mut offset = self.layout.slot_offset(slot);
                for value in tuple.values() {
                    value.serialize_value(&mut data[offset..]);
                    offset += value.value_type().len();
                }
            }
        }
        data
    }

    pub fn page_id(&self) -> HeapPageId {
        self.page_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.tuple_desc
    }

    pub fn num_slots(&self) -> usize {
        self.layout.num_slots
    }

    pub fn num_empty_slots(&self) -> usize {
        self.tuples.iter().filter(|tuple| tuple.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: SlotNo) -> bool {
        slot < self.layout.num_slots && is_bit_set(&self.header, slot)
    }

    /// Returns the tuple stored in `slot`, if any.
    pub fn tuple(&self, slot: SlotNo) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(|tuple| tuple.as_ref())
    }

    /// Returns the first occupied slot at or after `from`.
    pub fn next_occupied_slot(&self, from: SlotNo) -> Option<SlotNo> {
        (from..self.tuples.len()).find(|slot| self.tuples[*slot].is_some())
    }

    /// Live tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    /// Stores a copy of `tuple` in the first free slot and returns where it went.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordId> {
        if tuple.tuple_desc().as_ref() != self.tuple_desc.as_ref() {
            return Err(StorageError::TupleMismatch(format!(
                "page {} stores ({}), tuple has ({})",
                self.page_id,
                self.tuple_desc,
                tuple.tuple_desc()
            )));
        }
        let slot = self
            .tuples
            .iter()
            .position(|tuple| tuple.is_none())
            .ok_or(StorageError::PageFull(self.page_id))?;

        let record_id = RecordId {
            page_id: self.page_id,
            slot,
        };
        let mut stored = tuple.clone();
        stored.set_record_id(Some(record_id));
        self.tuples[slot] = Some(stored);
        set_bit(&mut self.header, slot, true);

        Ok(record_id)
    }

    /// Frees the slot `tuple` was read from.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if record_id.page_id != self.page_id {
            return Err(StorageError::TupleMismatch(format!(
                "tuple is stored on page {}, not on page {}",
                record_id.page_id, self.page_id
            )));
        }
        if !self.is_slot_used(record_id.slot) {
            return Err(StorageError::SlotNotOccupied {
                page_id: self.page_id,
                slot: record_id.slot,
            });
        }
        self.tuples[record_id.slot] = None;
        set_bit(&mut self.header, record_id.slot, false);
        Ok(())
    }

    /// Marks the page as modified by `tid`, or as clean when `tid` is `None`.
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtied_by = tid;
    }

    /// The transaction that last modified this page, if it has not been written back since.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use lazy_static::lazy_static;
    use rand::distributions::{Alphanumeric, DistString};
    use rand::Rng;

    use super::{HeapPage, HeapPageId};
    use crate::error::StorageError;
    use crate::tuple::schema::{TupleDesc, Type};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    const PAGE_SIZE: usize = 1024;

    lazy_static! {
        static ref TEST_DESC: Arc<TupleDesc> = Arc::new(
            TupleDesc::new(
                vec![Type::Int, Type::String],
                vec![Some("id".to_owned()), Some("name".to_owned())],
            )
            .unwrap()
        );
    }

    fn random_tuple(id: i32) -> Tuple {
        let mut rng = rand::thread_rng();
        let length = rng.gen_range(0..20);
        let name = Alphanumeric.sample_string(&mut rng, length);
        Tuple::new(
            Arc::clone(&TEST_DESC),
            vec![Value::Int(id), Value::String(name)],
        )
        .unwrap()
    }

    fn empty_page() -> Result<HeapPage> {
        let data = HeapPage::empty_page_data(PAGE_SIZE);
        Ok(HeapPage::parse(
            HeapPageId::new(7, 3),
            Arc::clone(&TEST_DESC),
            PAGE_SIZE,
            &data,
        )?)
    }

    #[test]
    fn empty_page_has_free_slots() -> Result<()> {
        let page = empty_page()?;
        // 1024 * 8 / (136 * 8 + 1)
        assert_eq!(page.num_slots(), 7);
        assert_eq!(page.num_empty_slots(), 7);
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.next_occupied_slot(0), None);
        Ok(())
    }

    #[test]
    fn inserted_tuples_survive_serialization() -> Result<()> {
        let mut page = empty_page()?;
        let tuples = (0..5).map(random_tuple).collect::<Vec<_>>();
        for (slot, tuple) in tuples.iter().enumerate() {
            let record_id = page.insert_tuple(tuple)?;
            assert_eq!(record_id.slot, slot);
            assert_eq!(record_id.page_id, page.page_id());
        }
        let victim = page.tuple(1).unwrap().clone();
        page.delete_tuple(&victim)?;
        assert_eq!(page.num_empty_slots(), 3);

        let reparsed = HeapPage::parse(
            page.page_id(),
            Arc::clone(&TEST_DESC),
            PAGE_SIZE,
            &page.page_data(),
        )?;
        assert_eq!(reparsed.num_empty_slots(), 3);
        assert!(!reparsed.is_slot_used(1));
        assert_eq!(reparsed.next_occupied_slot(1), Some(2));

        let expected = [&tuples[0], &tuples[2], &tuples[3], &tuples[4]];
        let parsed = reparsed.iter().collect::<Vec<_>>();
        assert_eq!(parsed.len(), expected.len());
        for (parsed, expected) in parsed.iter().zip(expected) {
            assert_eq!(parsed.values(), expected.values());
        }
        assert_eq!(reparsed.tuple(4).unwrap().record_id().unwrap().slot, 4);
        Ok(())
    }

    #[test]
    fn insert_reuses_freed_slot_and_fails_when_full() -> Result<()> {
        let mut page = empty_page()?;
        for i in 0..7 {
            page.insert_tuple(&random_tuple(i))?;
        }
        assert!(matches!(
            page.insert_tuple(&random_tuple(7)),
            Err(StorageError::PageFull(_))
        ));

        let victim = page.tuple(2).unwrap().clone();
        page.delete_tuple(&victim)?;
        assert_eq!(page.insert_tuple(&random_tuple(8))?.slot, 2);
        Ok(())
    }

    #[test]
    fn delete_checks_record_id() -> Result<()> {
        let mut page = empty_page()?;
        let unstored = random_tuple(1);
        assert!(matches!(
            page.delete_tuple(&unstored),
            Err(StorageError::MissingRecordId)
        ));

        page.insert_tuple(&unstored)?;
        let stored = page.tuple(0).unwrap().clone();
        page.delete_tuple(&stored)?;
        assert!(matches!(
            page.delete_tuple(&stored),
            Err(StorageError::SlotNotOccupied { slot: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_foreign_schema_and_bad_length() -> Result<()> {
        let mut page = empty_page()?;
        let other_desc = Arc::new(TupleDesc::with_types(vec![Type::Int])?);
        let tuple = Tuple::new(other_desc, vec![Value::Int(1)])?;
        assert!(matches!(
            page.insert_tuple(&tuple),
            Err(StorageError::TupleMismatch(_))
        ));

        let short = vec![0u8; PAGE_SIZE - 1];
        assert!(matches!(
            HeapPage::parse(
                HeapPageId::new(1, 0),
                Arc::clone(&TEST_DESC),
                PAGE_SIZE,
                &short
            ),
            Err(StorageError::MalformedPage { .. })
        ));
        Ok(())
    }
}
