//! Domain types shared by the Flux client crates.
//!
//! Everything here is pure data and validation: health and queue
//! signals, the model variant endpoint table, generation parameters
//! with their service-declared bounds, and the model catalog entries.

pub mod catalog;
pub mod error;
pub mod generation;
pub mod status;
pub mod types;
