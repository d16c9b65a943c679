//! Add-new and edit transactions.
//!
//! A view holds at most one pending transaction. While adding, the
//! provisional item is pinned outside the sorted range and exempt from the
//! filter and grouping. While editing, live shaping of the edited item is
//! postponed until commit.

use std::sync::Arc;

use horizon_views_core::logging::targets;

use crate::error::TransactionConflict;
use crate::item::{ItemKey, ViewItem};
use crate::value::Value;

/// Public summary of the pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Nothing pending.
    Idle,
    /// An add-new transaction is pending.
    AddingNew,
    /// An edit transaction is pending.
    EditingItem,
}

/// Result of [`commit_new`](crate::CollectionView::commit_new).
#[derive(Debug)]
pub struct CommitOutcome<T> {
    /// The committed item.
    pub item: Arc<T>,
    /// Its view index after shaping, or `None` if the filter rejected it.
    pub index: Option<usize>,
}

impl<T> CommitOutcome<T> {
    /// Whether the committed item is shown.
    pub fn is_visible(&self) -> bool {
        self.index.is_some()
    }
}

/// Property values captured by `edit_item`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EditSnapshot {
    values: Vec<(String, Value)>,
}

impl EditSnapshot {
    /// Captures every exposed property, or `None` if the item exposes none.
    pub fn capture<T: ViewItem>(item: &T) -> Option<Self> {
        let names = item.property_names();
        if names.is_empty() {
            return None;
        }
        let values = names
            .into_iter()
            .map(|name| {
                let value = item.property(&name);
                (name, value)
            })
            .collect();
        Some(Self { values })
    }

    /// Writes the captured values back. Returns how many were rejected.
    pub fn restore<T: ViewItem>(&self, item: &T) -> usize {
        self.values
            .iter()
            .filter(|(name, value)| !item.set_property(name, value.clone()))
            .count()
    }
}

pub(crate) struct PendingEdit<T> {
    pub item: Arc<T>,
    pub key: ItemKey,
    pub snapshot: Option<EditSnapshot>,
    /// A watched property changed during the edit.
    pub reshape_deferred: bool,
}

pub(crate) enum Transaction<T> {
    Idle,
    AddingNew { item: Arc<T> },
    EditingItem(PendingEdit<T>),
}

impl<T> Default for Transaction<T> {
    fn default() -> Self {
        Transaction::Idle
    }
}

impl<T> Transaction<T> {
    pub fn state(&self) -> TransactionState {
        match self {
            Transaction::Idle => TransactionState::Idle,
            Transaction::AddingNew { .. } => TransactionState::AddingNew,
            Transaction::EditingItem(_) => TransactionState::EditingItem,
        }
    }

    fn busy(&self) -> Result<(), TransactionConflict> {
        match self {
            Transaction::Idle => Ok(()),
            Transaction::AddingNew { .. } => Err(TransactionConflict::AddNewPending),
            Transaction::EditingItem(_) => Err(TransactionConflict::EditPending),
        }
    }

    pub fn check_can_add(&self) -> Result<(), TransactionConflict> {
        self.busy()
    }

    pub fn check_can_edit(&self) -> Result<(), TransactionConflict> {
        self.busy()
    }

    pub fn check_can_remove(&self, key: ItemKey) -> Result<(), TransactionConflict> {
        match self {
            Transaction::AddingNew { .. } => Err(TransactionConflict::RemoveDuringAddNew),
            Transaction::EditingItem(edit) if edit.key == key => {
                Err(TransactionConflict::RemoveItemUnderEdit(key))
            }
            _ => Ok(()),
        }
    }

    pub fn pending_new(&self) -> Option<&Arc<T>> {
        match self {
            Transaction::AddingNew { item } => Some(item),
            _ => None,
        }
    }

    pub fn pending_edit(&self) -> Option<&PendingEdit<T>> {
        match self {
            Transaction::EditingItem(edit) => Some(edit),
            _ => None,
        }
    }

    pub fn take_add(&mut self) -> Result<Arc<T>, TransactionConflict> {
        match std::mem::take(self) {
            Transaction::AddingNew { item } => Ok(item),
            other => {
                *self = other;
                Err(TransactionConflict::NoAddNewPending)
            }
        }
    }

    pub fn take_edit(&mut self) -> Result<PendingEdit<T>, TransactionConflict> {
        match std::mem::take(self) {
            Transaction::EditingItem(edit) => Ok(edit),
            other => {
                *self = other;
                Err(TransactionConflict::NoEditPending)
            }
        }
    }

    /// Records a postponed reshape if `key` is under edit.
    pub fn defer_reshape(&mut self, key: ItemKey) -> bool {
        match self {
            Transaction::EditingItem(edit) if edit.key == key => {
                if !edit.reshape_deferred {
                    tracing::trace!(target: targets::EDIT, ?key, "reshape deferred until edit ends");
                }
                edit.reshape_deferred = true;
                true
            }
            _ => false,
        }
    }

    /// Ends the transaction because its item left the source.
    pub fn abandon_item(&mut self, item: &Arc<T>, key: ItemKey) -> bool {
        let abandoned = match self {
            Transaction::AddingNew { item: pending } => Arc::ptr_eq(pending, item),
            Transaction::EditingItem(edit) => edit.key == key,
            Transaction::Idle => false,
        };
        if abandoned {
            tracing::debug!(target: targets::EDIT, state = ?self.state(), "transaction item removed by source");
            *self = Transaction::Idle;
        }
        abandoned
    }
}
