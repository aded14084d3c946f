//! Heap page with a slot-occupancy bitmap and fixed-width tuple slots.
//!
//! Page layout:
//! ```text
//! +----------------------------+
//! | Occupancy bitmap           |  ceil(num_slots / 8) bytes, bit 1 = used
//! +----------------------------+
//! | Slot 0 (tuple_width bytes) |
//! | Slot 1                     |
//! | ...                        |
//! | Slot num_slots - 1         |
//! +----------------------------+
//! | Zero padding               |
//! +----------------------------+
//! ```
//!
//! Slot `i` is tracked by bit `i % 8` (least significant first) of bitmap
//! byte `i / 8`. Empty slots are written as zeros.

use crate::catalog::SchemaLookup;
use crate::schema::Schema;
use crate::tuple::{RecordId, Tuple};
use bytes::{Buf, BufMut, BytesMut};
use slate_common::page::PageId;
use slate_common::{Result, SlateError, TransactionId};
use std::sync::Arc;

/// A decoded heap page.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    /// Occupancy bitmap, stored verbatim.
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    /// Transaction that last dirtied this page.
    dirtier: Option<TransactionId>,
    /// Encoded page as it was when loaded or last committed.
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Most slots a page can have; slot numbers are `u16`.
    pub const MAX_SLOTS: usize = u16::MAX as usize + 1;

    /// Number of tuples of `tuple_width` bytes that fit in a page, counting
    /// one bitmap bit per tuple.
    pub fn num_slots_for(page_size: usize, tuple_width: usize) -> usize {
        if tuple_width == 0 {
            return 0;
        }
        (page_size * 8) / (tuple_width * 8 + 1)
    }

    /// Bitmap size in bytes for `num_slots` slots.
    pub fn header_size_for(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Returns the bytes of an empty page.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Creates an empty page.
    pub fn new_empty(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        Self::from_bytes(page_id, schema, page_size, &Self::empty_page_data(page_size))
    }

    /// Decodes a page, resolving its schema through `catalog`.
    pub fn from_bytes_with_catalog(
        page_id: PageId,
        catalog: &dyn SchemaLookup,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        let schema = catalog.schema_of(page_id.table_id)?;
        Self::from_bytes(page_id, schema, page_size, data)
    }

    /// Decodes the first `page_size` bytes of `data`.
    pub fn from_bytes(
        page_id: PageId,
        schema: Arc<Schema>,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        let corrupt = |reason: String| SlateError::CorruptPage { page_id, reason };

        if data.len() < page_size {
            return Err(corrupt(format!(
                "expected {} bytes, got {}",
                page_size,
                data.len()
            )));
        }

        let tuple_width = schema.byte_width();
        let num_slots = Self::num_slots_for(page_size, tuple_width);
        if num_slots == 0 {
            return Err(corrupt(format!(
                "tuple width {} does not fit a {}-byte page",
                tuple_width, page_size
            )));
        }
        if num_slots > Self::MAX_SLOTS {
            return Err(corrupt(format!("{} slots exceed slot numbering", num_slots)));
        }

        let page = &data[..page_size];
        let header_size = Self::header_size_for(num_slots);
        let header = page[..header_size].to_vec();

        let mut buf = &page[header_size..];
        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if !bit_is_set(&header, slot) {
                buf.advance(tuple_width);
                tuples.push(None);
                continue;
            }
            let mut tuple = Tuple::deserialize(schema.clone(), &mut buf)
                .map_err(|e| corrupt(format!("slot {}: {}", slot, e)))?;
            tuple.set_record_id(Some(RecordId::new(page_id, slot as u16)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            schema,
            page_size,
            header,
            tuples,
            dirtier: None,
            before_image: page.to_vec(),
        })
    }

    /// Encodes the page to exactly `page_size` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tuple_width = self.schema.byte_width();
        let mut buf = BytesMut::with_capacity(self.page_size);

        buf.put_slice(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(tuple) => tuple.serialize(&mut buf)?,
                None => buf.put_bytes(0, tuple_width),
            }
        }
        buf.put_bytes(0, self.page_size - buf.len());

        Ok(buf.to_vec())
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Returns true if slot `i` holds a tuple. Out-of-range slots are unused.
    pub fn is_slot_used(&self, i: usize) -> bool {
        i < self.num_slots() && bit_is_set(&self.header, i)
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots()).filter(|&i| !self.is_slot_used(i)).count()
    }

    /// Returns the tuple in slot `i`, if any.
    pub fn tuple_at(&self, i: usize) -> Option<&Tuple> {
        self.tuples.get(i).and_then(Option::as_ref)
    }

    /// Stores `tuple` in the lowest free slot and records its new location
    /// in `tuple`.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if **tuple.schema() != *self.schema {
            return Err(SlateError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }
        let slot = (0..self.num_slots())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(SlateError::PageFull {
                page_id: self.page_id,
            })?;

        let record_id = RecordId::new(self.page_id, slot as u16);
        tuple.set_record_id(Some(record_id));
        self.tuples[slot] = Some(tuple.clone());
        self.mark_slot_used(slot, true);
        Ok(record_id)
    }

    /// Removes `tuple` from its slot and clears its location.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| SlateError::TupleNotOnThisPage("tuple has no record id".to_string()))?;
        if record_id.page_id != self.page_id {
            return Err(SlateError::TupleNotOnThisPage(format!(
                "{} is not on page {}",
                record_id, self.page_id
            )));
        }
        let slot = record_id.slot as usize;
        if !self.is_slot_used(slot) {
            return Err(SlateError::TupleNotOnThisPage(format!(
                "slot {} is empty",
                record_id
            )));
        }

        self.tuples[slot] = None;
        self.mark_slot_used(slot, false);
        tuple.set_record_id(None);
        Ok(())
    }

    fn mark_slot_used(&mut self, i: usize, used: bool) {
        let mask = 1u8 << (i % 8);
        if used {
            self.header[i / 8] |= mask;
        } else {
            self.header[i / 8] &= !mask;
        }
    }

    /// Sets or clears the dirty marker.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtier = if dirty { Some(tid) } else { None };
    }

    /// Returns the transaction that dirtied this page, if it is dirty.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Decodes the saved before image.
    pub fn before_image(&self) -> Result<HeapPage> {
        Self::from_bytes(
            self.page_id,
            self.schema.clone(),
            self.page_size,
            &self.before_image,
        )
    }

    /// Replaces the before image with the current contents.
    pub fn set_before_image(&mut self) -> Result<()> {
        self.before_image = self.to_bytes()?;
        Ok(())
    }

    pub fn before_image_data(&self) -> &[u8] {
        &self.before_image
    }

    /// Iterates over stored tuples in slot order.
    pub fn iter(&self) -> HeapPageIterator<'_> {
        HeapPageIterator {
            page: self,
            current_slot: 0,
        }
    }
}

fn bit_is_set(header: &[u8], i: usize) -> bool {
    header[i / 8] & (1u8 << (i % 8)) != 0
}

/// Iterator over the tuples of a heap page.
pub struct HeapPageIterator<'a> {
    page: &'a HeapPage,
    current_slot: usize,
}

impl<'a> Iterator for HeapPageIterator<'a> {
    type Item = &'a Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_slot < self.page.num_slots() {
            let slot = self.current_slot;
            self.current_slot += 1;

            if let Some(tuple) = self.page.tuple_at(slot) {
                return Some(tuple);
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a HeapPage {
    type Item = &'a Tuple;
    type IntoIter = HeapPageIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use rand::Rng;
    use slate_common::FieldType;

    const PAGE_SIZE: usize = 50;

    fn people() -> Arc<Schema> {
        Arc::new(
            Schema::named([
                (FieldType::Int, "id"),
                (FieldType::text_with_capacity(8), "name"),
            ])
            .unwrap(),
        )
    }

    fn person(schema: &Arc<Schema>, id: i32, name: &str) -> Tuple {
        Tuple::new(schema.clone(), vec![Field::Int(id), Field::from(name)]).unwrap()
    }

    fn create_test_page() -> HeapPage {
        HeapPage::new_empty(PageId::new(1, 0), people(), PAGE_SIZE).unwrap()
    }

    #[test]
    fn test_layout_helpers() {
        // 400 bits / 129 bits per tuple
        assert_eq!(HeapPage::num_slots_for(50, 16), 3);
        assert_eq!(HeapPage::header_size_for(3), 1);
        assert_eq!(HeapPage::header_size_for(8), 1);
        assert_eq!(HeapPage::header_size_for(9), 2);
        assert_eq!(HeapPage::num_slots_for(4096, 4), 992);
        assert_eq!(HeapPage::num_slots_for(4096, 0), 0);
    }

    #[test]
    fn test_capacity_law() {
        for page_size in [50usize, 64, 512, 4096] {
            for width in [4usize, 12, 16, 132] {
                let slots = HeapPage::num_slots_for(page_size, width);
                if slots == 0 {
                    continue;
                }
                let header = HeapPage::header_size_for(slots);
                assert_eq!(slots, (8 * page_size) / (8 * width + 1));
                assert!(header + slots * width <= page_size);
            }
        }
    }

    #[test]
    fn test_new_empty_page() {
        let page = create_test_page();
        assert_eq!(page.num_slots(), 3);
        assert_eq!(page.header_size(), 1);
        assert_eq!(page.num_empty_slots(), 3);
        assert!(page.iter().next().is_none());
        assert!(page.is_dirty().is_none());
        assert_eq!(page.to_bytes().unwrap(), vec![0u8; PAGE_SIZE]);
    }

    #[test]
    fn test_insert_fills_lowest_slot() {
        let schema = people();
        let mut page = create_test_page();

        let mut t = person(&schema, 1, "ann");
        let rid = page.insert_tuple(&mut t).unwrap();
        assert_eq!(rid, RecordId::new(PageId::new(1, 0), 0));
        assert_eq!(t.record_id(), Some(rid));
        assert!(page.is_slot_used(0));
        assert_eq!(page.num_empty_slots(), 2);
        assert_eq!(page.tuple_at(0).unwrap(), &t);
    }

    #[test]
    fn test_insert_page_full() {
        let schema = people();
        let mut page = create_test_page();
        for i in 0..3 {
            page.insert_tuple(&mut person(&schema, i, "x")).unwrap();
        }

        let mut extra = person(&schema, 9, "y");
        let err = page.insert_tuple(&mut extra).unwrap_err();
        assert!(matches!(err, SlateError::PageFull { .. }));
        assert!(extra.record_id().is_none());
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let mut page = create_test_page();
        let other = Arc::new(Schema::from_types(vec![FieldType::Int]).unwrap());
        let mut t = Tuple::new(other, vec![Field::Int(1)]).unwrap();

        let err = page.insert_tuple(&mut t).unwrap_err();
        assert!(matches!(err, SlateError::SchemaMismatch { .. }));
        assert_eq!(page.num_empty_slots(), 3);
    }

    #[test]
    fn test_delete_then_reuse_slot() {
        let schema = people();
        let mut page = create_test_page();
        let mut a = person(&schema, 1, "ann");
        let mut b = person(&schema, 2, "bob");
        let mut c = person(&schema, 3, "cid");
        page.insert_tuple(&mut a).unwrap();
        page.insert_tuple(&mut b).unwrap();
        page.insert_tuple(&mut c).unwrap();

        page.delete_tuple(&mut b).unwrap();
        assert!(b.record_id().is_none());
        assert!(!page.is_slot_used(1));
        assert!(page.is_slot_used(0) && page.is_slot_used(2));

        let remaining: Vec<&Tuple> = page.iter().collect();
        assert_eq!(remaining, vec![&a, &c]);

        let mut d = person(&schema, 4, "dee");
        assert_eq!(page.insert_tuple(&mut d).unwrap().slot, 1);
    }

    #[test]
    fn test_delete_rejects_foreign_tuples() {
        let schema = people();
        let mut page = create_test_page();

        let mut unplaced = person(&schema, 1, "ann");
        assert!(matches!(
            page.delete_tuple(&mut unplaced),
            Err(SlateError::TupleNotOnThisPage(_))
        ));

        let mut elsewhere = person(&schema, 1, "ann");
        elsewhere.set_record_id(Some(RecordId::new(PageId::new(1, 7), 0)));
        assert!(page.delete_tuple(&mut elsewhere).is_err());

        let mut empty_slot = person(&schema, 1, "ann");
        empty_slot.set_record_id(Some(RecordId::new(PageId::new(1, 0), 2)));
        assert!(page.delete_tuple(&mut empty_slot).is_err());

        let mut out_of_range = person(&schema, 1, "ann");
        out_of_range.set_record_id(Some(RecordId::new(PageId::new(1, 0), 40)));
        assert!(page.delete_tuple(&mut out_of_range).is_err());
        // Failed deletes keep the record id
        assert!(out_of_range.record_id().is_some());
    }

    #[test]
    fn test_encoding_layout() {
        let schema = people();
        let mut page = create_test_page();
        page.insert_tuple(&mut person(&schema, 1, "ann")).unwrap();
        page.insert_tuple(&mut person(&schema, 3, "cid")).unwrap();
        let mut first = page.tuple_at(0).unwrap().clone();
        page.delete_tuple(&mut first).unwrap();

        let bytes = page.to_bytes().unwrap();
        assert_eq!(bytes.len(), PAGE_SIZE);
        assert_eq!(bytes[0], 0b0000_0010);
        // Slot 0 is zeroed
        assert!(bytes[1..17].iter().all(|&b| b == 0));
        // Slot 1 holds (3, "cid")
        assert_eq!(&bytes[17..21], &[0, 0, 0, 3]);
        assert_eq!(&bytes[21..25], &[0, 0, 0, 3]);
        assert_eq!(&bytes[25..28], b"cid");
        // Slot 2 and padding
        assert!(bytes[33..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_assigns_record_ids() {
        let schema = people();
        let mut page = create_test_page();
        page.insert_tuple(&mut person(&schema, 1, "ann")).unwrap();
        page.insert_tuple(&mut person(&schema, 2, "bob")).unwrap();
        let bytes = page.to_bytes().unwrap();

        let decoded = HeapPage::from_bytes(PageId::new(1, 0), schema, PAGE_SIZE, &bytes).unwrap();
        let slots: Vec<u16> = decoded
            .iter()
            .map(|t| t.record_id().unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 1]);
        assert_eq!(decoded.before_image_data(), &bytes[..]);
    }

    #[test]
    fn test_decode_ignores_empty_slot_content() {
        let schema = people();
        let mut bytes = vec![0u8; PAGE_SIZE];
        // Garbage in unused slot 0 is never decoded
        bytes[1..17].copy_from_slice(&[0xFF; 16]);

        let page = HeapPage::from_bytes(PageId::new(1, 0), schema, PAGE_SIZE, &bytes).unwrap();
        assert_eq!(page.num_empty_slots(), 3);
    }

    #[test]
    fn test_decode_corrupt_input() {
        let schema = people();

        let short = HeapPage::from_bytes(PageId::new(1, 0), schema.clone(), PAGE_SIZE, &[0u8; 10]);
        assert!(matches!(short, Err(SlateError::CorruptPage { .. })));

        // Slot 0 marked used with an out-of-range text length
        let mut bytes = vec![0u8; PAGE_SIZE];
        bytes[0] = 0b1;
        bytes[5..9].copy_from_slice(&[0, 0, 0, 99]);
        let bad = HeapPage::from_bytes(PageId::new(1, 0), schema, PAGE_SIZE, &bytes);
        assert!(matches!(bad, Err(SlateError::CorruptPage { .. })));

        let wide = Arc::new(Schema::from_types(vec![FieldType::text_with_capacity(100)]).unwrap());
        let too_wide = HeapPage::new_empty(PageId::new(1, 0), wide, PAGE_SIZE);
        assert!(matches!(too_wide, Err(SlateError::CorruptPage { .. })));
    }

    #[test]
    fn test_decode_uses_only_page_size_bytes() {
        let mut bytes = vec![0u8; PAGE_SIZE + 20];
        bytes[PAGE_SIZE..].fill(0xAB);

        let page = HeapPage::from_bytes(PageId::new(1, 0), people(), PAGE_SIZE, &bytes).unwrap();
        assert_eq!(page.before_image_data().len(), PAGE_SIZE);
    }

    #[test]
    fn test_random_roundtrip() {
        let schema = Arc::new(
            Schema::named([
                (FieldType::Int, "k"),
                (FieldType::text_with_capacity(6), "v"),
                (FieldType::Int, "w"),
            ])
            .unwrap(),
        );
        let mut rng = rand::thread_rng();

        for _ in 0..20 {
            let mut page = HeapPage::new_empty(PageId::new(4, 2), schema.clone(), 512).unwrap();
            for _ in 0..page.num_slots() {
                let mut t = Tuple::new(
                    schema.clone(),
                    vec![
                        Field::Int(rng.gen()),
                        Field::Text((0..rng.gen_range(0..=6)).map(|_| 'z').collect()),
                        Field::Int(rng.gen()),
                    ],
                )
                .unwrap();
                page.insert_tuple(&mut t).unwrap();
            }
            for slot in 0..page.num_slots() {
                if rng.gen_bool(0.4) {
                    let mut t = page.tuple_at(slot).unwrap().clone();
                    page.delete_tuple(&mut t).unwrap();
                }
            }

            let bytes = page.to_bytes().unwrap();
            let decoded =
                HeapPage::from_bytes(page.page_id(), schema.clone(), 512, &bytes).unwrap();
            for slot in 0..page.num_slots() {
                assert_eq!(decoded.is_slot_used(slot), page.is_slot_used(slot));
                assert_eq!(decoded.tuple_at(slot), page.tuple_at(slot));
            }
            assert_eq!(
                decoded.iter().count(),
                decoded.num_slots() - decoded.num_empty_slots()
            );
            for tuple in &decoded {
                let record_id = tuple.record_id().unwrap();
                assert_eq!(record_id.page_id, decoded.page_id());
                assert!(decoded.is_slot_used(record_id.slot as usize));
            }
            assert_eq!(decoded.to_bytes().unwrap(), bytes);
        }
    }

    #[test]
    fn test_dirty_marker() {
        let mut page = create_test_page();
        let tid = TransactionId(7);

        page.mark_dirty(true, tid);
        assert_eq!(page.is_dirty(), Some(tid));
        page.mark_dirty(false, tid);
        assert!(page.is_dirty().is_none());
    }

    #[test]
    fn test_before_image() {
        let schema = people();
        let mut page = create_test_page();
        page.insert_tuple(&mut person(&schema, 1, "ann")).unwrap();

        // Captured at load time, so still empty
        let before = page.before_image().unwrap();
        assert_eq!(before.num_empty_slots(), 3);

        page.set_before_image().unwrap();
        let before = page.before_image().unwrap();
        assert_eq!(before.num_empty_slots(), 2);
        assert_eq!(before.tuple_at(0), page.tuple_at(0));
        assert_eq!(page.before_image_data(), &page.to_bytes().unwrap()[..]);
    }

    #[test]
    fn test_from_bytes_with_catalog() {
        struct Fixed(Arc<Schema>);
        impl SchemaLookup for Fixed {
            fn schema_of(&self, table_id: u32) -> Result<Arc<Schema>> {
                if table_id == 1 {
                    Ok(self.0.clone())
                } else {
                    Err(SlateError::TableNotFound(table_id.to_string()))
                }
            }
        }

        let lookup = Fixed(people());
        let data = HeapPage::empty_page_data(PAGE_SIZE);
        let page = HeapPage::from_bytes_with_catalog(PageId::new(1, 3), &lookup, PAGE_SIZE, &data)
            .unwrap();
        assert_eq!(page.num_slots(), 3);

        let missing =
            HeapPage::from_bytes_with_catalog(PageId::new(2, 0), &lookup, PAGE_SIZE, &data);
        assert!(matches!(missing, Err(SlateError::TableNotFound(_))));
    }
}
