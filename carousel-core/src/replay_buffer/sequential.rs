//! Sequence-window sampling.
use super::base::ReplayBuffer;
use crate::{error::ReplayError, SlotTable};
use anyhow::Result;
use rand::Rng;

impl<T> ReplayBuffer<T>
where
    T: SlotTable,
{
    /// Samples `batch_size * n_samples` sequence windows of
    /// `sequence_length` consecutive records each, uniformly with
    /// replacement over the valid window starts.
    ///
    /// Slot indices inside a window wrap modulo the capacity, and no window
    /// ever splices the newest records together with the oldest ones. Each
    /// window is pinned to one independently drawn environment for its whole
    /// length, preserving temporal coherence within the window.
    ///
    /// The result carries batch dims
    /// `[n_samples, sequence_length, batch_size]`.
    ///
    /// # Errors
    ///
    /// * [`ReplayError::InvalidArgument`] — zero window count or zero
    ///   `sequence_length`.
    /// * [`ReplayError::EmptyBuffer`] — nothing written yet.
    /// * [`ReplayError::Capacity`] — more windows than slots,
    ///   `sequence_length` over capacity, or (while filling) a window longer
    ///   than the data collected so far.
    /// * [`ReplayError::InsufficientData`] — fewer valid starts than
    ///   requested windows.
    pub fn sample_seq(
        &mut self,
        batch_size: usize,
        n_samples: usize,
        sequence_length: usize,
    ) -> Result<T::Data> {
        let n = batch_size * n_samples;
        if n == 0 {
            return Err(ReplayError::InvalidArgument(
                "batch size and number of samples must be greater than zero".into(),
            )
            .into());
        }
        if !self.cursor.has_data() {
            return Err(ReplayError::EmptyBuffer.into());
        }
        let capacity = self.cursor.capacity();
        if n > capacity {
            return Err(ReplayError::Capacity(format!(
                "n_samples * batch_size ({}) exceeds the buffer capacity ({})",
                n, capacity
            ))
            .into());
        }
        let range = self.cursor.sequence_range(sequence_length)?;
        if range.len() < n {
            return Err(ReplayError::InsufficientData(format!(
                "{} windows requested but only {} valid starts",
                n,
                range.len()
            ))
            .into());
        }

        let starts: Vec<usize> = (0..n)
            .map(|_| range.get(self.rng.gen_range(0..range.len())))
            .collect();
        let n_envs = self.cursor.n_envs();
        let envs: Vec<usize> = (0..n).map(|_| self.rng.gen_range(0..n_envs)).collect();

        let mut slots = Vec::with_capacity(n * sequence_length);
        for &start in &starts {
            for k in 0..sequence_length {
                slots.push((start + k) % capacity);
            }
        }
        self.table
            .get()?
            .gather_windows(&slots, &envs, [n_samples, sequence_length, batch_size])
    }
}
