//! Interfaces between the replay buffer engine and its storage backend.
//!
//! The engine in this crate only does index arithmetic; the actual column
//! storage lives behind [`SlotTable`], with [`BatchData`] describing the
//! batches moving in and out of it. A backend crate implements both for its
//! array type of choice.
use anyhow::Result;

/// A batch of records exchanged with a slot table.
///
/// Batches handed to [`SlotTable::write`] carry exactly two leading batch
/// dimensions, `[len, n_envs]`. Batches coming back from a gather carry
/// `[batch_size]` for single-step samples and
/// `[n_samples, sequence_length, batch_size]` for sequence windows.
pub trait BatchData: Sized {
    /// The type of one named column of this batch.
    type Field;

    /// Leading batch dimensions, shared by every field.
    fn batch_dims(&self) -> &[usize];

    /// Number of records along the leading dimension.
    fn len(&self) -> usize {
        self.batch_dims().first().copied().unwrap_or(0)
    }

    /// A copy of the trailing `n` records along the leading dimension.
    fn tail(&self, n: usize) -> Self;

    /// Adds a named column to the batch.
    ///
    /// Used to attach companion fields (e.g. next observations) to a
    /// gathered batch.
    fn insert(&mut self, name: &str, field: Self::Field);
}

/// A fixed-capacity column table addressed by `(slot, env)`.
///
/// Conceptually a `[capacity, n_envs]` grid of records, each field stored as
/// one contiguous column of shape `[capacity, n_envs, *field_shape]`. The
/// field set is fixed at allocation time from a prototype batch and validated
/// on every write.
pub trait SlotTable: Sized {
    /// Batches exchanged with the table.
    type Data: BatchData;

    /// Allocates a table of `capacity` slots per environment, taking the
    /// field names, element types and field shapes from `proto`.
    fn alloc(capacity: usize, n_envs: usize, proto: &Self::Data) -> Result<Self>;

    /// Writes the rows of `data` into consecutive slots starting at `ix`,
    /// wrapping modulo the capacity. Row `j` of `data` (all environments at
    /// once) lands in slot `(ix + j) % capacity`.
    fn write(&mut self, ix: usize, data: &Self::Data) -> Result<()>;

    /// Gathers single records at the given `(slot, env)` pairs.
    ///
    /// `slots` and `envs` have the same length; the result has that length
    /// as its only batch dimension.
    fn gather(&self, slots: &[usize], envs: &[usize]) -> Result<Self::Data>;

    /// Gathers one named field at the given `(slot, env)` pairs.
    fn gather_field(
        &self,
        name: &str,
        slots: &[usize],
        envs: &[usize],
    ) -> Result<<Self::Data as BatchData>::Field>;

    /// Gathers sequence windows and shapes them as
    /// `[n_samples, sequence_length, batch_size]`.
    ///
    /// `slots` lists window slots window-major and step-minor, flattened over
    /// `n_samples * batch_size` windows of `sequence_length` steps each;
    /// `envs` holds one environment per window, pinned across its steps.
    /// `dims` is `[n_samples, sequence_length, batch_size]`.
    fn gather_windows(
        &self,
        slots: &[usize],
        envs: &[usize],
        dims: [usize; 3],
    ) -> Result<Self::Data>;

    /// Field names of the schema, in enumeration order.
    fn fields(&self) -> Vec<&str>;

    /// Returns the full column stored under `name`.
    fn field(&self, name: &str) -> Result<&<Self::Data as BatchData>::Field>;

    /// Replaces the column stored under `name` in place.
    ///
    /// The replacement must match the stored column's element type and shape.
    fn set_field(&mut self, name: &str, field: <Self::Data as BatchData>::Field) -> Result<()>;
}
