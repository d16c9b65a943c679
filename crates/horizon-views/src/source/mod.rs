//! Backing sequences a view can be bound to.
//!
//! Every source implements [`ItemSource`]. Its [`SourceKind`] is read once
//! when a view binds and decides how the view treats the source's
//! notifications:
//!
//! - [`ObservableList`] announces precise structural changes.
//! - [`PlainList`] only ever announces [`SourceChange::Reset`].
//! - [`SortedList`] keeps itself ordered and takes over sorting.

mod adapter;
mod observable;
mod plain;
mod sorted;

pub(crate) use adapter::{ChangeSink, SourceAdapter};
pub use observable::ObservableList;
pub use plain::PlainList;
pub use sorted::SortedList;

use std::sync::Arc;

use horizon_views_core::Signal;

use crate::error::SourceError;
use crate::item::ViewItem;
use crate::shaping::SortDescription;

/// Shape of a source, resolved once at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Enumeration only; every mutation is seen as a reset.
    PlainSequence,
    /// Announces individual inserts, removes, replaces and moves.
    NotifyingSequence,
    /// Announces individual changes and sorts itself on request.
    SortAssistedSequence,
}

/// A structural change in a source.
///
/// Indices refer to the source sequence: `Insert` and `Move` give positions
/// after the change, `Remove` and `Replace` positions before it.
#[derive(Debug)]
pub enum SourceChange<T> {
    /// `item` now lives at `index`.
    Insert {
        /// Position of the new item.
        index: usize,
        /// The inserted item.
        item: Arc<T>,
    },
    /// The item at `index` was removed.
    Remove {
        /// Former position of the item.
        index: usize,
        /// The removed item.
        item: Arc<T>,
    },
    /// The item at `index` was swapped for another.
    Replace {
        /// Position of the replacement.
        index: usize,
        /// Item that was replaced.
        old: Arc<T>,
        /// Item now at `index`.
        new: Arc<T>,
    },
    /// An item moved from `old_index` to `new_index`.
    Move {
        /// Former position.
        old_index: usize,
        /// New position, counted after removal from `old_index`.
        new_index: usize,
        /// The moved item.
        item: Arc<T>,
    },
    /// Anything may have changed; re-read the whole source.
    Reset,
}

impl<T> Clone for SourceChange<T> {
    fn clone(&self) -> Self {
        match self {
            SourceChange::Insert { index, item } => SourceChange::Insert {
                index: *index,
                item: item.clone(),
            },
            SourceChange::Remove { index, item } => SourceChange::Remove {
                index: *index,
                item: item.clone(),
            },
            SourceChange::Replace { index, old, new } => SourceChange::Replace {
                index: *index,
                old: old.clone(),
                new: new.clone(),
            },
            SourceChange::Move {
                old_index,
                new_index,
                item,
            } => SourceChange::Move {
                old_index: *old_index,
                new_index: *new_index,
                item: item.clone(),
            },
            SourceChange::Reset => SourceChange::Reset,
        }
    }
}

/// A named property of an item changed value.
#[derive(Debug)]
pub struct PropertyChange<T> {
    /// The item whose property changed.
    pub item: Arc<T>,
    /// Name of the property.
    pub property: String,
}

impl<T> Clone for PropertyChange<T> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            property: self.property.clone(),
        }
    }
}

/// A mutable sequence of items a view can observe.
///
/// Only [`kind`](Self::kind), [`len`](Self::len), [`get`](Self::get),
/// [`snapshot`](Self::snapshot) and [`changes`](Self::changes) are required;
/// editing, sorting and property notifications are optional capabilities.
pub trait ItemSource<T: ViewItem>: Send + Sync {
    /// How this source announces changes.
    fn kind(&self) -> SourceKind;

    /// Number of items.
    fn len(&self) -> usize;

    /// Returns `true` if the source has no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `index`.
    fn get(&self, index: usize) -> Option<Arc<T>>;

    /// All items, in order.
    fn snapshot(&self) -> Vec<Arc<T>>;

    /// Structural change notifications.
    fn changes(&self) -> &Signal<SourceChange<T>>;

    /// Item property change notifications, if the source relays them.
    fn property_changes(&self) -> Option<&Signal<PropertyChange<T>>> {
        None
    }

    /// Whether [`insert`](Self::insert) and [`remove_at`](Self::remove_at) are supported.
    fn is_editable(&self) -> bool {
        false
    }

    /// Insert an item at `index`.
    ///
    /// Sources that keep their own order may place the item elsewhere; the
    /// change notification reports the actual position.
    fn insert(&self, _index: usize, _item: Arc<T>) -> Result<(), SourceError> {
        Err(SourceError::ReadOnly)
    }

    /// Remove and return the item at `index`.
    fn remove_at(&self, _index: usize) -> Result<Arc<T>, SourceError> {
        Err(SourceError::ReadOnly)
    }

    /// Reorder the source by `sorts`. Only sort-assisted sources support this.
    fn apply_sort(&self, _sorts: &[SortDescription]) -> Result<(), SourceError> {
        Err(SourceError::SortNotSupported)
    }
}
