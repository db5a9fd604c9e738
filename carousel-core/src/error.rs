//! Errors in the library.
use thiserror::Error;

/// Errors raised by replay buffer operations.
///
/// Every failure is detected synchronously and reported to the caller of the
/// failing operation; none of them poisons the buffer. Public APIs return
/// [`anyhow::Result`], so a caller that needs to branch on the kind of
/// failure can use [`anyhow::Error::downcast_ref`].
#[derive(Error, Debug)]
pub enum ReplayError {
    /// A constructor or sampling argument was out of its legal range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch did not match the shape contract of the buffer.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// Sampling was requested before any record was written.
    #[error("the buffer is empty; add at least one batch before sampling")]
    EmptyBuffer,

    /// The buffer holds fewer valid records than the request needs.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The request structurally cannot be served by a buffer of this size.
    #[error("over capacity: {0}")]
    Capacity(String),

    /// A read was attempted before the first insert allocated the table.
    #[error("storage is not initialized; add a batch first")]
    UninitializedStorage,

    /// A field name that is not part of the schema.
    #[error("unknown field: {0}")]
    UnknownField(String),
}
