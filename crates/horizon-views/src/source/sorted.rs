//! A list that keeps itself sorted.

use std::cmp::Ordering;
use std::sync::Arc;

use horizon_views_core::logging::targets;
use horizon_views_core::Signal;
use parking_lot::RwLock;

use super::{ItemSource, PropertyChange, SourceChange, SourceKind};
use crate::error::SourceError;
use crate::item::ViewItem;
use crate::shaping::{compare_by_descriptions, guarded_sort, SortDescription};

/// A sort-assisted source.
///
/// The list orders itself by its current sort descriptions. A view bound
/// to it hands its sort descriptions to [`ItemSource::apply_sort`] instead
/// of sorting, and follows the source order. Inserts land in sorted
/// position whatever index is requested, and a property change that
/// breaks the order moves the item and emits [`SourceChange::Move`].
pub struct SortedList<T: ViewItem> {
    items: RwLock<Vec<Arc<T>>>,
    sorts: RwLock<Vec<SortDescription>>,
    changes: Signal<SourceChange<T>>,
    property_changes: Signal<PropertyChange<T>>,
}

impl<T: ViewItem> SortedList<T> {
    /// Creates an unsorted list; order is insertion order until a sort is applied.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(Arc::new).collect()),
            sorts: RwLock::new(Vec::new()),
            changes: Signal::new(),
            property_changes: Signal::new(),
        }
    }

    /// Current sort descriptions.
    pub fn sort_descriptions(&self) -> Vec<SortDescription> {
        self.sorts.read().clone()
    }

    /// Inserts an item at its sorted position and returns the handle.
    pub fn add(&self, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.insert_sorted(item.clone());
        item
    }

    /// Removes the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Arc<T>> {
        let item = {
            let mut items = self.items.write();
            (index < items.len()).then(|| items.remove(index))?
        };
        self.changes.emit(SourceChange::Remove {
            index,
            item: item.clone(),
        });
        Some(item)
    }

    /// Writes a property, announces it, and restores sorted order.
    pub fn set_property(&self, item: &Arc<T>, name: &str, value: impl Into<crate::Value>) -> bool {
        let written = item.set_property(name, value.into());
        if written {
            self.notify_property_changed(item, name);
        }
        written
    }

    /// Announces a property change and repositions the item if needed.
    pub fn notify_property_changed(&self, item: &Arc<T>, property: &str) {
        self.property_changes.emit(PropertyChange {
            item: item.clone(),
            property: property.to_string(),
        });

        let moved = {
            let sorts = self.sorts.read();
            if !sorts.iter().any(|s| s.property == property) {
                return;
            }
            let mut items = self.items.write();
            let Some(from) = items.iter().position(|x| Arc::ptr_eq(x, item)) else {
                return;
            };
            let in_order = (from == 0
                || compare_by_descriptions(&sorts, &*items[from - 1], &**item) != Ordering::Greater)
                && (from + 1 >= items.len()
                    || compare_by_descriptions(&sorts, &**item, &*items[from + 1]) != Ordering::Greater);
            if in_order {
                return;
            }
            let moved = items.remove(from);
            let to = items.partition_point(|x| compare_by_descriptions(&sorts, &**x, &*moved) != Ordering::Greater);
            items.insert(to, moved.clone());
            (from, to, moved)
        };

        let (old_index, new_index, item) = moved;
        tracing::trace!(target: targets::SOURCE, old_index, new_index, "sorted list repositioned item");
        if old_index != new_index {
            self.changes.emit(SourceChange::Move {
                old_index,
                new_index,
                item,
            });
        }
    }

    fn insert_sorted(&self, item: Arc<T>) -> usize {
        let index = {
            let sorts = self.sorts.read();
            let mut items = self.items.write();
            let index = if sorts.is_empty() {
                items.len()
            } else {
                items.partition_point(|x| compare_by_descriptions(&sorts, &**x, &*item) != Ordering::Greater)
            };
            items.insert(index, item.clone());
            index
        };
        self.changes.emit(SourceChange::Insert { index, item });
        index
    }
}

impl<T: ViewItem> ItemSource<T> for SortedList<T> {
    fn kind(&self) -> SourceKind {
        SourceKind::SortAssistedSequence
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

    fn property_changes(&self) -> Option<&Signal<PropertyChange<T>>> {
        Some(&self.property_changes)
    }

    fn is_editable(&self) -> bool {
        true
    }

    fn insert(&self, _index: usize, item: Arc<T>) -> Result<(), SourceError> {
        self.insert_sorted(item);
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<Arc<T>, SourceError> {
        let len = self.len();
        self.remove(index)
            .ok_or(SourceError::IndexOutOfRange { index, len })
    }

    fn apply_sort(&self, sorts: &[SortDescription]) -> Result<(), SourceError> {
        {
            let mut items = self.items.write();
            let mut order: Vec<usize> = (0..items.len()).collect();
            guarded_sort(
                &mut order,
                |a, b| compare_by_descriptions(sorts, &*items[a], &*items[b]),
                |i| i,
            );
            let sorted: Vec<Arc<T>> = order.iter().map(|&i| items[i].clone()).collect();
            *items = sorted;
            *self.sorts.write() = sorts.to_vec();
        }
        tracing::debug!(target: targets::SOURCE, sort_count = sorts.len(), "sorted list re-sorted");
        self.changes.emit(SourceChange::Reset);
        Ok(())
    }
}
