//! Heap page - fixed-size slotted page of tuples.
//!
//! A [`HeapPage`] is the decoded form of one page of a heap file. The
//! buffer pool caches these and hands them out as shared snapshots.

use std::sync::Arc;

use crate::common::config::page_size;
use crate::common::{Error, PageId, Result, TransactionId};
use crate::tuple::{Field, RecordId, Tuple, TupleDesc};

/// One page of a heap file.
///
/// # Layout
/// ```text
/// ┌────────────────────┬─────────┬─────────┬─────┬──────────────┬─────────┐
/// │ occupancy bitmap   │ slot 0  │ slot 1  │ ... │ slot n-1     │ zero    │
/// │ ceil(n/8) bytes    │ T bytes │ T bytes │     │ T bytes      │ padding │
/// └────────────────────┴─────────┴─────────┴─────┴──────────────┴─────────┘
/// n = floor(page_size * 8 / (T * 8 + 1)),  T = tuple size
/// ```
///
/// Bit `i % 8` (LSB first) of bitmap byte `i / 8` is set when slot `i` holds
/// a tuple. Empty slots are zero-filled.
///
/// # Before-image
/// Every page keeps an immutable copy of its serialized bytes as of load (or
/// the last commit). It is a separate buffer, never a reference to another
/// live page.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Arc<[u8]>,
}

impl HeapPage {
    /// Number of tuple slots on a page of `page_size` bytes.
    pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    /// Bytes of occupancy bitmap for `num_slots` slots.
    #[inline]
    pub fn header_len(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Bytes of a page with no tuples, used to grow a heap file.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; page_size()]
    }

    /// Create an empty page.
    pub fn empty(pid: PageId, desc: Arc<TupleDesc>) -> Self {
        let page_size = page_size();
        let num_slots = Self::slots_per_page(page_size, desc.size());
        let mut page = Self {
            pid,
            desc,
            page_size,
            header: vec![0u8; Self::header_len(num_slots)],
            tuples: vec![None; num_slots],
            dirtier: None,
            before_image: Arc::from(Vec::new()),
        };
        page.set_before_image();
        page
    }

    /// Decode a page read from disk.
    ///
    /// # Errors
    /// `Error::CorruptPage` if `data` is not exactly one page, a bitmap bit
    /// past the last slot is set, or a used slot does not parse under `desc`.
    pub fn from_bytes(pid: PageId, desc: Arc<TupleDesc>, data: &[u8]) -> Result<Self> {
        let page_size = page_size();
        if data.len() != page_size {
            return Err(Error::CorruptPage {
                page: pid,
                reason: format!("expected {} bytes, got {}", page_size, data.len()),
            });
        }

        let tuple_size = desc.size();
        let num_slots = Self::slots_per_page(page_size, tuple_size);
        let header_len = Self::header_len(num_slots);
        let header = data[..header_len].to_vec();
        if let Some(bit) = (num_slots..header_len * 8).find(|&i| bit_is_set(&header, i)) {
            return Err(Error::CorruptPage {
                page: pid,
                reason: format!("bitmap bit {} set past {} slots", bit, num_slots),
            });
        }

        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if !bit_is_set(&header, slot) {
                tuples.push(None);
                continue;
            }
            let start = header_len + slot * tuple_size;
            let tuple = Self::parse_slot(pid, &desc, &data[start..start + tuple_size], slot)?;
            tuples.push(Some(tuple));
        }

        Ok(Self {
            pid,
            desc,
            page_size,
            header,
            tuples,
            dirtier: None,
            before_image: Arc::from(data),
        })
    }

    fn parse_slot(pid: PageId, desc: &Arc<TupleDesc>, bytes: &[u8], slot: usize) -> Result<Tuple> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for item in desc.iter() {
            let field = Field::parse(item.field_type, &bytes[offset..]).map_err(|reason| {
                Error::CorruptPage {
                    page: pid,
                    reason: format!("slot {}: {}", slot, reason),
                }
            })?;
            offset += item.field_type.byte_len();
            fields.push(field);
        }
        let mut tuple = Tuple::new(Arc::clone(desc), fields)?;
        tuple.set_record_id(Some(RecordId::new(pid, slot)));
        Ok(tuple)
    }

    /// Encode this page into exactly `page_size` bytes.
    ///
    /// `HeapPage::from_bytes(pid, desc, &page.to_bytes())` reproduces an
    /// equivalent page.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tuple_size = self.desc.size();
        let mut out = Vec::with_capacity(self.page_size);
        out.extend_from_slice(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(t) => t.serialize(&mut out),
                None => out.resize(out.len() + tuple_size, 0),
            }
        }
        out.resize(self.page_size, 0);
        out
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.pid
    }

    #[inline]
    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots())
            .filter(|&i| !bit_is_set(&self.header, i))
            .count()
    }

    /// Whether slot `i` holds a tuple. Out-of-range slots are unused.
    pub fn is_slot_used(&self, i: usize) -> bool {
        i < self.num_slots() && bit_is_set(&self.header, i)
    }

    fn mark_slot_used(&mut self, i: usize, used: bool) {
        let mask = 1u8 << (i % 8);
        if used {
            self.header[i / 8] |= mask;
        } else {
            self.header[i / 8] &= !mask;
        }
    }

    /// Place `tuple` in the first free slot and stamp its record id.
    ///
    /// # Errors
    /// - `Error::SchemaMismatch` if the tuple's descriptor differs from the page's
    /// - `Error::PageFull` if no slot is free
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if **tuple.desc() != *self.desc {
            return Err(Error::SchemaMismatch);
        }
        let slot = (0..self.num_slots())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(Error::PageFull(self.pid))?;

        let rid = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(rid));
        self.mark_slot_used(slot, true);
        self.tuples[slot] = Some(tuple.clone());
        Ok(rid)
    }

    /// Remove `tuple` from the slot its record id names, clearing the id.
    ///
    /// # Errors
    /// - `Error::MissingRecordId` if the tuple was never stored
    /// - `Error::TupleNotOnPage` if the record id names another page
    /// - `Error::SlotEmpty` if the slot holds nothing
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        if rid.page_id != self.pid {
            return Err(Error::TupleNotOnPage { page: self.pid });
        }
        if !self.is_slot_used(rid.slot) {
            return Err(Error::SlotEmpty {
                page: self.pid,
                slot: rid.slot,
            });
        }
        self.mark_slot_used(rid.slot, false);
        self.tuples[rid.slot] = None;
        tuple.set_record_id(None);
        Ok(())
    }

    /// Tuple stored in slot `i`, if any.
    pub fn tuple(&self, i: usize) -> Option<&Tuple> {
        self.tuples.get(i).and_then(Option::as_ref)
    }

    /// Occupied tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    /// Transaction whose uncommitted writes this page holds, or `None` if clean.
    #[inline]
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Set (`Some(tid)`) or clear (`None`) the dirtying transaction.
    #[inline]
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtier = tid;
    }

    /// Serialized bytes captured at load time or at the last commit.
    #[inline]
    pub fn before_image_bytes(&self) -> &[u8] {
        &self.before_image
    }

    /// Decode the before-image as a standalone page.
    pub fn before_image(&self) -> Result<HeapPage> {
        HeapPage::from_bytes(self.pid, Arc::clone(&self.desc), &self.before_image)
    }

    /// Snapshot the current contents as the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = Arc::from(self.to_bytes());
    }
}

#[inline]
fn bit_is_set(header: &[u8], i: usize) -> bool {
    (header[i / 8] >> (i % 8)) & 1 == 1
}
