//! Core systems for Horizon Views.
//!
//! This crate provides the foundational pieces the collection view engine is
//! built on:
//!
//! - [`Signal`] for type-safe observer notifications
//! - [`ThreadAffinity`] for the single-writer threading model
//! - [`logging`] targets, tree formatting and performance spans
//!
//! Most applications depend on `horizon-views` directly, which re-exports the
//! types from this crate that appear in its public API.

pub mod error;
pub mod logging;
pub mod signal;
pub mod thread_check;

pub use error::AffinityViolation;
pub use logging::{PerfSpan, TreeFormatOptions, TreeStyle};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
