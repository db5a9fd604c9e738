#![warn(missing_docs)]
//! A library for experience replay buffers.
//!
//! This crate provides the storage-agnostic engine of Carousel: a
//! fixed-capacity circular buffer over several parallel environments, with
//! uniform single-step sampling and contiguous sequence-window sampling.
//! Concrete column storage is supplied by a backend crate implementing the
//! [`SlotTable`] trait (see `carousel-ndarray`).
pub mod error;
pub mod replay_buffer;

mod base;
pub use base::{BatchData, SlotTable};
