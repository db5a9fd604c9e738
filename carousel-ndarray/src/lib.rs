#![warn(missing_docs)]
//! `ndarray` storage backend for Carousel replay buffers.
//!
//! [`ArrayTable`] stores each field of a record as one contiguous
//! [`ndarray`] column of shape `[capacity, n_envs, *field_shape]` and
//! implements the [`SlotTable`](carousel_core::SlotTable) seam of
//! `carousel-core`. [`Frame`] is the batch type moving in and out of the
//! buffer.
//!
//! # Examples
//!
//! ```rust
//! use carousel_core::replay_buffer::ReplayBufferConfig;
//! use carousel_ndarray::{ArrayReplayBuffer, BatchData, Frame};
//! use ndarray::Array3;
//!
//! let config = ReplayBufferConfig::default().capacity(100).n_envs(2);
//! let mut buffer = ArrayReplayBuffer::build(&config).unwrap();
//!
//! // 5 steps from 2 environments, observations of 3 floats each.
//! let obs = Array3::<f32>::zeros((5, 2, 3));
//! let frame = Frame::new([5, 2]).with_field("observations", obs).unwrap();
//! buffer.add(&frame).unwrap();
//!
//! let batch = buffer.sample(16, false).unwrap();
//! assert_eq!(batch.batch_dims(), &[16]);
//! ```
pub use carousel_core::BatchData;

mod frame;
mod table;

pub use frame::{Column, Dtype, Frame};
pub use table::ArrayTable;

/// Replay buffer backed by an [`ArrayTable`].
pub type ArrayReplayBuffer = carousel_core::replay_buffer::ReplayBuffer<ArrayTable>;
