//! Thread affinity verification.
//!
//! Views follow a single-writer model: they belong to the thread that created
//! them and reject mutation from any other thread unless the owner opts in.
//! [`ThreadAffinity`] records the owning thread and offers both a fallible
//! check and panicking assertions.
//!
//! ```
//! use horizon_views_core::ThreadAffinity;
//!
//! struct Owned {
//!     affinity: ThreadAffinity,
//! }
//!
//! impl Owned {
//!     fn touch(&self) -> horizon_views_core::error::Result<()> {
//!         self.affinity.check()?;
//!         Ok(())
//!     }
//! }
//!
//! let owned = Owned { affinity: ThreadAffinity::current() };
//! assert!(owned.touch().is_ok());
//! ```

use std::thread::ThreadId;

use crate::error::AffinityViolation;

/// Tracks which thread an object belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Create a new thread affinity tracker for the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Get the thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Return an [`AffinityViolation`] if called from a foreign thread.
    pub fn check(&self) -> Result<(), AffinityViolation> {
        if self.is_same_thread() {
            Ok(())
        } else {
            Err(AffinityViolation::from_current(self.thread_id))
        }
    }

    /// Assert that we're on the correct thread.
    ///
    /// # Panics
    ///
    /// Panics if the current thread doesn't match the affinity.
    #[track_caller]
    pub fn assert_same_thread(&self) {
        if let Err(violation) = self.check() {
            panic!("Thread affinity violation: {violation}");
        }
    }

    /// Debug-only version of [`assert_same_thread`](Self::assert_same_thread).
    #[inline]
    #[track_caller]
    pub fn debug_assert_same_thread(&self) {
        #[cfg(debug_assertions)]
        self.assert_same_thread();
    }
}
