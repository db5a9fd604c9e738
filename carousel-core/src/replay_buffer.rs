//! Fixed-capacity circular replay buffers over multiple environments.
//!
//! A [`ReplayBuffer`] accumulates batches of experience records into a
//! `[capacity, n_envs]` grid of slots, overwriting the oldest data once
//! every slot has been written. Two samplers draw from it uniformly with
//! replacement: single-step sampling with an optional next-step companion
//! field, and sequence-window sampling that returns contiguous runs of
//! records pinned to one environment per window.
//!
//! The concrete column storage is supplied by a [`SlotTable`](crate::SlotTable)
//! implementation; `carousel-ndarray` provides the stock one.
mod base;
mod config;
mod cursor;
mod sequential;

pub use base::ReplayBuffer;
pub use config::ReplayBufferConfig;
