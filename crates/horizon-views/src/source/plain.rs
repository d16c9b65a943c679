//! A list without incremental notifications.

use std::sync::Arc;

use horizon_views_core::Signal;
use parking_lot::RwLock;

use super::{ItemSource, SourceChange, SourceKind};
use crate::error::SourceError;
use crate::item::ViewItem;

/// A list that only reports that "something changed".
///
/// Every mutation emits [`SourceChange::Reset`], so a view bound to it
/// re-reads the whole list each time. Useful for wrapping data whose owner
/// cannot describe individual changes.
pub struct PlainList<T: ViewItem> {
    items: RwLock<Vec<Arc<T>>>,
    changes: Signal<SourceChange<T>>,
}

impl<T: ViewItem> PlainList<T> {
    /// Creates a list from owned items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(Arc::new).collect()),
            changes: Signal::new(),
        }
    }

    /// Appends an item.
    pub fn push(&self, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.items.write().push(item.clone());
        self.changes.emit(SourceChange::Reset);
        item
    }

    /// Removes the item at `index`, or returns `None` if out of range.
    pub fn remove(&self, index: usize) -> Option<Arc<T>> {
        let removed = {
            let mut items = self.items.write();
            (index < items.len()).then(|| items.remove(index))
        };
        if removed.is_some() {
            self.changes.emit(SourceChange::Reset);
        }
        removed
    }

    /// Mutates the underlying vector in place and announces a reset.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<Arc<T>>) -> R,
    {
        let result = f(&mut self.items.write());
        self.changes.emit(SourceChange::Reset);
        result
    }
}

impl<T: ViewItem> ItemSource<T> for PlainList<T> {
    fn kind(&self) -> SourceKind {
        SourceKind::PlainSequence
    }

    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.read().get(index).cloned()
    }

    fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    fn changes(&self) -> &Signal<SourceChange<T>> {
        &self.changes
    }

    fn is_editable(&self) -> bool {
        true
    }

    fn insert(&self, index: usize, item: Arc<T>) -> Result<(), SourceError> {
        {
            let mut items = self.items.write();
            if index > items.len() {
                return Err(SourceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, item);
        }
        self.changes.emit(SourceChange::Reset);
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<Arc<T>, SourceError> {
        let len = self.len();
        self.remove(index)
            .ok_or(SourceError::IndexOutOfRange { index, len })
    }
}
