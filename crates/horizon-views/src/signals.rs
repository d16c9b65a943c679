//! Notifications raised by a view.

use std::sync::Arc;

use horizon_views_core::Signal;

use crate::group::GroupChange;
use crate::item::{ItemKey, ViewItem};
use crate::navigator::{CurrentChanged, CurrentChanging};

/// A change to the ordered item list of a view.
///
/// Indices are view positions. For `Moved`, `new_index` is counted after
/// removal from `old_index`.
#[derive(Debug)]
pub enum ViewChange<T> {
    /// `item` appeared at `index`.
    Added {
        /// New position.
        index: usize,
        /// The item.
        item: Arc<T>,
    },
    /// `item` left position `index`.
    Removed {
        /// Former position.
        index: usize,
        /// The item.
        item: Arc<T>,
    },
    /// The item at `index` was swapped in place.
    Replaced {
        /// Position.
        index: usize,
        /// Previous item.
        old: Arc<T>,
        /// Current item.
        new: Arc<T>,
    },
    /// `item` moved from `old_index` to `new_index`.
    Moved {
        /// Former position.
        old_index: usize,
        /// New position.
        new_index: usize,
        /// The item.
        item: Arc<T>,
    },
    /// The whole view was rebuilt.
    Reset,
}

impl<T> Clone for ViewChange<T> {
    fn clone(&self) -> Self {
        match self {
            ViewChange::Added { index, item } => ViewChange::Added {
                index: *index,
                item: item.clone(),
            },
            ViewChange::Removed { index, item } => ViewChange::Removed {
                index: *index,
                item: item.clone(),
            },
            ViewChange::Replaced { index, old, new } => ViewChange::Replaced {
                index: *index,
                old: old.clone(),
                new: new.clone(),
            },
            ViewChange::Moved {
                old_index,
                new_index,
                item,
            } => ViewChange::Moved {
                old_index: *old_index,
                new_index: *new_index,
                item: item.clone(),
            },
            ViewChange::Reset => ViewChange::Reset,
        }
    }
}

/// Non-fatal problems isolated by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The filter panicked for an item; the item is hidden.
    PredicateFault {
        /// The item.
        item: ItemKey,
        /// Panic message.
        message: String,
    },
    /// A group selector panicked; the item went to the ungroupable bucket.
    SelectorFault {
        /// The item.
        item: ItemKey,
        /// Grouping level whose selector failed.
        level: usize,
        /// Panic message.
        message: String,
    },
    /// The comparator is not a strict weak ordering; a range fell back to source order.
    InconsistentComparator {
        /// Number of entries placed in source order.
        fallback_len: usize,
    },
    /// A source notification did not match the view's bookkeeping; the view resynchronized.
    SourceOutOfSync {
        /// What did not match.
        detail: String,
    },
}

/// All signals of a collection view.
pub struct ViewSignals<T: ViewItem> {
    /// Structural changes of the ordered item list.
    pub collection_changed: Signal<ViewChange<T>>,
    /// The current item is about to change; handlers may cancel.
    pub current_changing: Signal<CurrentChanging>,
    /// The current item changed.
    pub current_changed: Signal<CurrentChanged<T>>,
    /// The group tree changed.
    pub groups_changed: Signal<GroupChange>,
    /// Isolated faults.
    pub diagnostic: Signal<Diagnostic>,
}

impl<T: ViewItem> Default for ViewSignals<T> {
    fn default() -> Self {
        Self {
            collection_changed: Signal::new(),
            current_changing: Signal::new(),
            current_changed: Signal::new(),
            groups_changed: Signal::new(),
            diagnostic: Signal::new(),
        }
    }
}
