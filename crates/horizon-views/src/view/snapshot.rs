use std::sync::Arc;

use super::state::ViewState;
use crate::group::{GroupNode, GroupPath};
use crate::index_table::Entry;
use crate::item::{ItemKey, ViewItem};
use crate::navigator::CurrentPosition;

/// Details of one shown item.
#[derive(Debug)]
pub struct ViewEntry<T> {
    /// The item.
    pub item: Arc<T>,
    /// Its identity key.
    pub key: ItemKey,
    /// Position in the source.
    pub source_index: usize,
    /// Position in the view.
    pub view_index: usize,
    /// Group path, empty when ungrouped.
    pub group_path: GroupPath,
    /// Whether this is the pending add-new item.
    pub provisional: bool,
}

impl<T> ViewEntry<T> {
    pub(crate) fn from_entry(entry: &Entry<T>) -> Self {
        Self {
            item: entry.item.clone(),
            key: entry.key,
            source_index: entry.source_index,
            view_index: entry.view_index.unwrap_or_default(),
            group_path: entry.group_path.clone(),
            provisional: entry.provisional,
        }
    }
}

impl<T> Clone for ViewEntry<T> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            key: self.key,
            source_index: self.source_index,
            view_index: self.view_index,
            group_path: self.group_path.clone(),
            provisional: self.provisional,
        }
    }
}

/// An immutable copy of a view, safe to hand to other threads.
#[derive(Debug)]
pub struct ViewSnapshot<T> {
    items: Vec<Arc<T>>,
    current: CurrentPosition,
    groups: Option<GroupNode<T>>,
}

impl<T: ViewItem> ViewSnapshot<T> {
    pub(crate) fn capture(state: &ViewState<T>) -> Self {
        Self {
            items: state.items(),
            current: state.current_position(),
            groups: state.groups(),
        }
    }
}

impl<T> ViewSnapshot<T> {
    /// Items in view order.
    pub fn items(&self) -> &[Arc<T>] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the view was empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cursor position at capture time.
    pub fn current_position(&self) -> CurrentPosition {
        self.current
    }

    /// Current item at capture time.
    pub fn current_item(&self) -> Option<&Arc<T>> {
        self.current.index().and_then(|index| self.items.get(index))
    }

    /// Group tree at capture time.
    pub fn groups(&self) -> Option<&GroupNode<T>> {
        self.groups.as_ref()
    }
}

static_assertions::assert_impl_all!(ViewSnapshot<crate::Record>: Send, Sync);
