//! Write-cursor state and valid-range arithmetic.
//!
//! Everything the samplers need to know about which slots may be read is
//! expressed here as a single contiguous run of slots modulo the capacity,
//! so no index lists are materialized on the sampling path.
use crate::error::ReplayError;
use anyhow::Result;

/// A contiguous run of slot indices modulo the buffer capacity.
///
/// [`get`](SlotRange::get) maps a rank `k` in `[0, len)` to the slot
/// `(start + k) % capacity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotRange {
    start: usize,
    len: usize,
    capacity: usize,
}

impl SlotRange {
    fn new(start: usize, len: usize, capacity: usize) -> Self {
        debug_assert!(start < capacity && len <= capacity);
        Self {
            start,
            len,
            capacity,
        }
    }

    /// Number of slots in the run.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Slot index of the `k`-th element of the run.
    pub fn get(&self, k: usize) -> usize {
        debug_assert!(k < self.len);
        (self.start + k) % self.capacity
    }
}

/// Destination of one batched write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WritePlan {
    /// Slot receiving the first retained row.
    pub start: usize,
    /// Number of trailing rows of the batch that are retained.
    pub kept: usize,
}

/// Cursor over a fixed-capacity circular buffer shared by `n_envs`
/// environments.
///
/// Tracks the next slot to overwrite (`pos`) and whether every slot has been
/// written at least once (`full`). The cursor is only advanced by the
/// inserter; the samplers query it for valid ranges.
#[derive(Clone, Debug)]
pub(crate) struct Cursor {
    capacity: usize,
    n_envs: usize,
    pos: usize,
    full: bool,
}

impl Cursor {
    pub fn new(capacity: usize, n_envs: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(
                ReplayError::InvalidArgument("capacity must be greater than zero".into()).into(),
            );
        }
        if n_envs == 0 {
            return Err(ReplayError::InvalidArgument(
                "the number of environments must be greater than zero".into(),
            )
            .into());
        }
        Ok(Self {
            capacity,
            n_envs,
            pos: 0,
            full: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn n_envs(&self) -> usize {
        self.n_envs
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Whether at least one record has been written.
    pub fn has_data(&self) -> bool {
        self.full || self.pos > 0
    }

    /// Destination of a write of `len` rows, without advancing the cursor.
    ///
    /// An oversized write keeps only its trailing `capacity` rows; they land
    /// as one wrapped run that ends where the cursor will point next, which
    /// leaves the same final state as writing the whole batch would.
    pub fn plan(&self, len: usize) -> WritePlan {
        if len > self.capacity {
            WritePlan {
                start: (self.pos + len) % self.capacity,
                kept: self.capacity,
            }
        } else {
            WritePlan {
                start: self.pos,
                kept: len,
            }
        }
    }

    /// Advances the cursor past `len` written rows.
    pub fn commit(&mut self, len: usize) {
        if self.pos + len >= self.capacity {
            self.full = true;
        }
        self.pos = (self.pos + len) % self.capacity;
    }

    /// Valid slots for single-step sampling.
    ///
    /// When full, slots are ordered oldest-first from `pos`; with
    /// `sample_next` the newest slot is excluded because its successor is the
    /// stale record at `pos`. When not yet full, only `[0, pos)` has been
    /// written, and `sample_next` additionally excludes the newest slot
    /// `pos - 1`.
    pub fn single_range(&self, sample_next: bool) -> Result<SlotRange> {
        if !self.has_data() {
            return Err(ReplayError::EmptyBuffer.into());
        }
        if self.full {
            let len = if sample_next {
                self.capacity - 1
            } else {
                self.capacity
            };
            if len == 0 {
                return Err(ReplayError::InsufficientData(
                    "sampling the next field needs at least two stored records".into(),
                )
                .into());
            }
            Ok(SlotRange::new(self.pos, len, self.capacity))
        } else {
            let len = if sample_next { self.pos - 1 } else { self.pos };
            if len == 0 {
                return Err(ReplayError::InsufficientData(
                    "sampling the next field needs at least two stored records".into(),
                )
                .into());
            }
            Ok(SlotRange::new(0, len, self.capacity))
        }
    }

    /// Valid window starts for sequence sampling.
    ///
    /// A window of `sequence_length` consecutive slots (modulo capacity) may
    /// not splice the newest records together with the oldest ones. When
    /// full, that forbids exactly the `sequence_length - 1` starts preceding
    /// `pos`; when not yet full, a window must fit inside `[0, pos)`.
    pub fn sequence_range(&self, sequence_length: usize) -> Result<SlotRange> {
        if sequence_length == 0 {
            return Err(ReplayError::InvalidArgument(
                "sequence length must be greater than zero".into(),
            )
            .into());
        }
        if !self.has_data() {
            return Err(ReplayError::EmptyBuffer.into());
        }
        if sequence_length > self.capacity {
            return Err(ReplayError::Capacity(format!(
                "sequence length {} exceeds the buffer capacity {}",
                sequence_length, self.capacity
            ))
            .into());
        }
        if self.full {
            Ok(SlotRange::new(
                self.pos,
                self.capacity - sequence_length + 1,
                self.capacity,
            ))
        } else {
            if self.pos < sequence_length {
                return Err(ReplayError::Capacity(format!(
                    "sequence length {} exceeds the {} records collected so far",
                    sequence_length, self.pos
                ))
                .into());
            }
            Ok(SlotRange::new(
                0,
                self.pos - sequence_length + 1,
                self.capacity,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn slots(range: &SlotRange) -> BTreeSet<usize> {
        (0..range.len()).map(|k| range.get(k)).collect()
    }

    #[test]
    fn rejects_zero_capacity_and_envs() {
        assert!(Cursor::new(0, 1).is_err());
        assert!(Cursor::new(1, 0).is_err());
        assert!(Cursor::new(1, 1).is_ok());
    }

    #[test]
    fn plan_without_wrap() {
        let mut c = Cursor::new(5, 1).unwrap();
        assert_eq!(c.plan(3), WritePlan { start: 0, kept: 3 });
        c.commit(3);
        assert_eq!(c.pos(), 3);
        assert!(!c.is_full());
    }

    #[test]
    fn plan_with_wrap_sets_full() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(3);
        assert_eq!(c.plan(4), WritePlan { start: 3, kept: 4 });
        c.commit(4);
        assert_eq!(c.pos(), 2);
        assert!(c.is_full());
    }

    #[test]
    fn oversized_plan_keeps_trailing_capacity_rows() {
        let c = Cursor::new(5, 1).unwrap();
        // 7 rows into 5 slots: the last 5 land as one run ending at pos 2.
        assert_eq!(c.plan(7), WritePlan { start: 2, kept: 5 });
    }

    #[test]
    fn full_flag_is_monotone() {
        let mut c = Cursor::new(4, 1).unwrap();
        c.commit(3);
        assert!(!c.is_full());
        c.commit(1);
        assert!(c.is_full());
        c.commit(2);
        assert!(c.is_full());
    }

    #[test]
    fn exact_fill_sets_full() {
        let mut c = Cursor::new(4, 1).unwrap();
        c.commit(4);
        assert!(c.is_full());
        assert_eq!(c.pos(), 0);
    }

    #[test]
    fn single_range_before_any_write_is_empty_buffer() {
        let c = Cursor::new(4, 1).unwrap();
        let err = c.single_range(false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::EmptyBuffer)
        ));
    }

    #[test]
    fn single_range_not_full() {
        let mut c = Cursor::new(8, 1).unwrap();
        c.commit(3);
        assert_eq!(slots(&c.single_range(false).unwrap()), (0..3).collect());
        assert_eq!(slots(&c.single_range(true).unwrap()), (0..2).collect());
    }

    #[test]
    fn single_range_needs_two_records_for_next() {
        let mut c = Cursor::new(8, 1).unwrap();
        c.commit(1);
        let err = c.single_range(true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::InsufficientData(_))
        ));
    }

    #[test]
    fn single_range_full_covers_every_slot() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(7);
        assert_eq!(slots(&c.single_range(false).unwrap()), (0..5).collect());
    }

    #[test]
    fn single_range_full_with_next_excludes_newest() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(7);
        // pos == 2, so slot 1 is the newest record and must not be drawn.
        let got = slots(&c.single_range(true).unwrap());
        assert_eq!(got, vec![0, 2, 3, 4].into_iter().collect());
    }

    #[test]
    fn single_range_full_with_next_at_pos_zero() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(5);
        // pos == 0 wraps the exclusion to the last slot.
        let got = slots(&c.single_range(true).unwrap());
        assert_eq!(got, (0..4).collect());
    }

    #[test]
    fn single_range_capacity_one_with_next() {
        let mut c = Cursor::new(1, 1).unwrap();
        c.commit(1);
        let err = c.single_range(true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::InsufficientData(_))
        ));
    }

    #[test]
    fn sequence_range_not_full() {
        let mut c = Cursor::new(8, 1).unwrap();
        c.commit(5);
        let range = c.sequence_range(3).unwrap();
        assert_eq!(slots(&range), (0..3).collect());
    }

    #[test]
    fn sequence_range_full_starts_at_pos() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(7);
        // pos == 2; starts 0 and 1 would splice newest and oldest records.
        let range = c.sequence_range(3).unwrap();
        assert_eq!(slots(&range), vec![2, 3, 4].into_iter().collect());
    }

    #[test]
    fn sequence_range_length_one_covers_every_slot_when_full() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(5);
        assert_eq!(slots(&c.sequence_range(1).unwrap()), (0..5).collect());
    }

    #[test]
    fn sequence_range_rejects_oversized_window() {
        let mut c = Cursor::new(5, 1).unwrap();
        c.commit(7);
        let err = c.sequence_range(6).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::Capacity(_))
        ));
    }

    #[test]
    fn sequence_range_rejects_window_longer_than_collected() {
        let mut c = Cursor::new(8, 1).unwrap();
        c.commit(2);
        let err = c.sequence_range(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::Capacity(_))
        ));
    }

    #[test]
    fn sequence_range_rejects_zero_length() {
        let mut c = Cursor::new(8, 1).unwrap();
        c.commit(2);
        let err = c.sequence_range(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::InvalidArgument(_))
        ));
    }
}
