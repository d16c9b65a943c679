//! Error types for Horizon Views core.

use std::thread::ThreadId;

/// An object with thread affinity was touched from a foreign thread.
///
/// Returned by [`ThreadAffinity::check`](crate::ThreadAffinity::check) and
/// latched by views that observe a source being mutated off-thread.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("accessed from thread {current:?} ({current_name}), owned by thread {owner:?}")]
pub struct AffinityViolation {
    /// Thread the object belongs to.
    pub owner: ThreadId,
    /// Thread that performed the access.
    pub current: ThreadId,
    /// Name of the offending thread, or `<unnamed>`.
    pub current_name: String,
}

impl AffinityViolation {
    /// Describe an access from the calling thread to an object owned by `owner`.
    pub fn from_current(owner: ThreadId) -> Self {
        let thread = std::thread::current();
        Self {
            owner,
            current: thread.id(),
            current_name: thread.name().unwrap_or("<unnamed>").to_string(),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, AffinityViolation>;
