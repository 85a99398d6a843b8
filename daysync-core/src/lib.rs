//! Core types for daysync.
//!
//! This crate provides the provider-neutral data model shared by the sync
//! and digest halves of the tool:
//! - `ExternalEvent` and related types for calendar events
//! - `TaskRecord` and its closed vocabularies (category, status, priority)
//! - `timeutil` for the effective-date rollover and the 3-day digest window

pub mod event;
pub mod record;
pub mod timeutil;

// Re-export the data model at crate root for convenience
pub use event::*;
pub use record::*;
