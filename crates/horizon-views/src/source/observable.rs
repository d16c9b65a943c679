//! A list that announces every structural change.

use std::sync::Arc;

use horizon_views_core::Signal;
use parking_lot::RwLock;

use super::{ItemSource, PropertyChange, SourceChange, SourceKind};
use crate::error::SourceError;
use crate::item::ViewItem;
use crate::value::Value;

/// A shared, observable list of items.
///
/// Each mutation updates the list first and then emits exactly one
/// [`SourceChange`] describing it. The item lock is released before
/// emitting, so handlers may read the list again.
///
/// # Example
///
/// ```
/// use horizon_views::{ObservableList, ItemSource};
///
/// let list = ObservableList::new(vec![1i64, 2, 3]);
/// list.push(4);
/// let removed = list.remove(0);
/// assert_eq!(removed.as_deref(), Some(&1));
/// assert_eq!(list.len(), 3);
/// ```
pub struct ObservableList<T: ViewItem> {
    items: RwLock<Vec<Arc<T>>>,
    changes: Signal<SourceChange<T>>,
    property_changes: Signal<PropertyChange<T>>,
}

impl<T: ViewItem> ObservableList<T> {
    /// Creates a list from owned items.
    pub fn new(items: Vec<T>) -> Self {
        Self::from_shared(items.into_iter().map(Arc::new).collect())
    }

    /// Creates a list from shared item handles.
    pub fn from_shared(items: Vec<Arc<T>>) -> Self {
        Self {
            items: RwLock::new(items),
            changes: Signal::new(),
            property_changes: Signal::new(),
        }
    }

    /// Creates an empty list.
    pub fn empty() -> Self {
        Self::from_shared(Vec::new())
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Appends an item and returns its shared handle.
    pub fn push(&self, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.push_shared(item.clone());
        item
    }

    /// Appends an existing handle.
    pub fn push_shared(&self, item: Arc<T>) {
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.changes.emit(SourceChange::Insert { index, item });
    }

    /// Inserts an item at `index` and returns its shared handle.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.items.write().insert(index, item.clone());
        self.changes.emit(SourceChange::Insert {
            index,
            item: item.clone(),
        });
        item
    }

    /// Removes the item at `index`, or returns `None` if out of range.
    pub fn remove(&self, index: usize) -> Option<Arc<T>> {
        let item = {
            let mut items = self.items.write();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.changes.emit(SourceChange::Remove {
            index,
            item: item.clone(),
        });
        Some(item)
    }

    /// Removes the first occurrence of `item` (by reference).
    pub fn remove_item(&self, item: &Arc<T>) -> bool {
        match self.position(item) {
            Some(index) => self.remove(index).is_some(),
            None => false,
        }
    }

    /// Replaces the item at `index`, returning the old one.
    pub fn replace(&self, index: usize, item: T) -> Option<Arc<T>> {
        let new = Arc::new(item);
        let old = {
            let mut items = self.items.write();
            let slot = items.get_mut(index)?;
            std::mem::replace(slot, new.clone())
        };
        self.changes.emit(SourceChange::Replace {
            index,
            old: old.clone(),
            new,
        });
        Some(old)
    }

    /// Moves the item at `from` so that it ends up at `to`.
    ///
    /// Returns `false` if either index is out of range.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let item = {
            let mut items = self.items.write();
            if from >= items.len() || to >= items.len() {
                return false;
            }
            if from == to {
                return true;
            }
            let item = items.remove(from);
            items.insert(to, item.clone());
            item
        };
        self.changes.emit(SourceChange::Move {
            old_index: from,
            new_index: to,
            item,
        });
        true
    }

    /// Removes all items.
    pub fn clear(&self) {
        self.items.write().clear();
        self.changes.emit(SourceChange::Reset);
    }

    /// Replaces all items.
    pub fn set_items(&self, items: Vec<T>) {
        *self.items.write() = items.into_iter().map(Arc::new).collect();
        self.changes.emit(SourceChange::Reset);
    }

    /// Returns a copy of the item handles.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    /// Position of `item` (by reference).
    pub fn position(&self, item: &Arc<T>) -> Option<usize> {
        self.items.read().iter().position(|x| Arc::ptr_eq(x, item))
    }

    /// Runs `f` on the item at `index` and announces the given properties as changed.
    pub fn modify<F, R>(&self, index: usize, properties: &[&str], f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let item = self.items.read().get(index).cloned()?;
        let result = f(&item);
        for property in properties {
            self.notify_property_changed(&item, property);
        }
        Some(result)
    }

    /// Writes a property through [`ViewItem::set_property`] and announces it.
    pub fn set_property(&self, item: &Arc<T>, name: &str, value: impl Into<Value>) -> bool {
        let written = item.set_property(name, value.into());
        if written {
            self.notify_property_changed(item, name);
        }
        written
    }

    /// Announces that a property of `item` changed.
    pub fn notify_property_changed(&self, item: &Arc<T>, property: &str) {
        self.property_changes.emit(PropertyChange {
            item: item.clone(),
            property: property.to_string(),
        });
    }

    /// Structural change signal.
    pub fn changes(&self) -> &Signal<SourceChange<T>> {
        &self.changes
    }

    /// Property change signal.
    pub fn property_changes(&self) -> &Signal<PropertyChange<T>> {
        &self.property_changes
    }
}

impl<T: ViewItem> Default for ObservableList<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ViewItem> ItemSource<T> for ObservableList<T> {
    fn kind(&self) -> SourceKind {
        SourceKind::NotifyingSequence
    }

    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.read().get(index).cloned()
    }

    fn snapshot(&self) -> Vec<Arc<T>> {
        self.items()
    }

    fn changes(&self) -> &Signal<SourceChange<T>> {
        &self.changes
    }

    fn property_changes(&self) -> Option<&Signal<PropertyChange<T>>> {
        Some(&self.property_changes)
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
            items.insert(index, item.clone());
        }
        self.changes.emit(SourceChange::Insert { index, item });
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<Arc<T>, SourceError> {
        let len = self.len();
        self.remove(index)
            .ok_or(SourceError::IndexOutOfRange { index, len })
    }
}
