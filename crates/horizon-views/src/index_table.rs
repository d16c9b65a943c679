//! Entry storage for a view.
//!
//! Every source item owns one [`Entry`] in an arena. Two orderings index the
//! arena: `source_order` mirrors the backing sequence and `view_order` lists
//! the entries currently shown. Entries that fail the filter stay in the
//! arena (with `view_index == None`) so a live property change can readmit
//! them without rescanning the source.

use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use crate::group::{GroupId, GroupPath};
use crate::item::ItemKey;

new_key_type! {
    /// Arena key of a view entry.
    pub struct EntryId;
}

/// Per-item bookkeeping.
#[derive(Debug)]
pub(crate) struct Entry<T> {
    pub item: Arc<T>,
    pub key: ItemKey,
    pub source_index: usize,
    pub view_index: Option<usize>,
    pub passes_filter: bool,
    pub group_path: GroupPath,
    pub group: Option<GroupId>,
    pub provisional: bool,
}

#[derive(Debug)]
pub(crate) struct IndexTable<T> {
    entries: SlotMap<EntryId, Entry<T>>,
    source_order: Vec<EntryId>,
    view_order: Vec<EntryId>,
    by_key: HashMap<ItemKey, Vec<EntryId>>,
    stale: bool,
}

impl<T> Default for IndexTable<T> {
    fn default() -> Self {
        Self {
            entries: SlotMap::with_key(),
            source_order: Vec::new(),
            view_order: Vec::new(),
            by_key: HashMap::new(),
            stale: false,
        }
    }
}

impl<T> IndexTable<T> {
    pub fn clear(&mut self) {
        self.entries.clear();
        self.source_order.clear();
        self.view_order.clear();
        self.by_key.clear();
        self.stale = false;
    }

    /// Marks source indices as out of date until the next rebuild.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry<T>> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry<T>> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn source_len(&self) -> usize {
        self.source_order.len()
    }

    pub fn source_id(&self, index: usize) -> Option<EntryId> {
        self.source_order.get(index).copied()
    }

    pub fn source_ids(&self) -> &[EntryId] {
        &self.source_order
    }

    /// Number of shown entries.
    pub fn count(&self) -> usize {
        self.view_order.len()
    }

    pub fn view_ids(&self) -> &[EntryId] {
        &self.view_order
    }

    pub fn view_id(&self, view_index: usize) -> Option<EntryId> {
        self.view_order.get(view_index).copied()
    }

    pub fn item_at(&self, view_index: usize) -> Option<&Arc<T>> {
        let id = self.view_id(view_index)?;
        self.entries.get(id).map(|entry| &entry.item)
    }

    /// All entries sharing `key`, in no particular order.
    pub fn ids_for_key(&self, key: ItemKey) -> &[EntryId] {
        self.by_key.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lowest view index among shown entries with `key`.
    pub fn index_of(&self, key: ItemKey) -> Option<usize> {
        self.ids_for_key(key)
            .iter()
            .filter_map(|&id| self.entries.get(id)?.view_index)
            .min()
    }

    /// Adds a new entry at source position `index`.
    pub fn insert_source(&mut self, index: usize, item: Arc<T>, key: ItemKey) -> EntryId {
        let index = index.min(self.source_order.len());
        let id = self.entries.insert(Entry {
            item,
            key,
            source_index: index,
            view_index: None,
            passes_filter: false,
            group_path: GroupPath::new(),
            group: None,
            provisional: false,
        });
        self.source_order.insert(index, id);
        self.by_key.entry(key).or_default().push(id);
        self.renumber_source(index, self.source_order.len());
        id
    }

    /// Drops the entry at source position `index`.
    ///
    /// The entry must already be hidden (see [`view_remove`](Self::view_remove)).
    pub fn remove_source(&mut self, index: usize) -> Option<Entry<T>> {
        if index >= self.source_order.len() {
            return None;
        }
        let id = self.source_order.remove(index);
        self.renumber_source(index, self.source_order.len());
        let entry = self.entries.remove(id)?;
        debug_assert!(entry.view_index.is_none(), "removing a shown entry");
        self.forget_key(entry.key, id);
        Some(entry)
    }

    /// Moves the entry at source position `from` to `to`.
    pub fn move_source(&mut self, from: usize, to: usize) -> Option<EntryId> {
        if from >= self.source_order.len() || to >= self.source_order.len() {
            return None;
        }
        let id = self.source_order.remove(from);
        self.source_order.insert(to, id);
        self.renumber_source(from.min(to), from.max(to) + 1);
        Some(id)
    }

    /// Swaps the item of an entry, keeping its position.
    pub fn rekey(&mut self, id: EntryId, item: Arc<T>, key: ItemKey) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        let old_key = std::mem::replace(&mut entry.key, key);
        entry.item = item;
        if old_key != key {
            self.forget_key(old_key, id);
            self.by_key.entry(key).or_default().push(id);
        }
    }

    /// Shows `id` at `position`.
    pub fn view_insert(&mut self, position: usize, id: EntryId) {
        let position = position.min(self.view_order.len());
        self.view_order.insert(position, id);
        self.renumber_view(position);
    }

    /// Hides the entry at `position`.
    pub fn view_remove(&mut self, position: usize) -> Option<EntryId> {
        if position >= self.view_order.len() {
            return None;
        }
        let id = self.view_order.remove(position);
        if let Some(entry) = self.entries.get_mut(id) {
            entry.view_index = None;
        }
        self.renumber_view(position);
        Some(id)
    }

    /// Replaces the shown entries wholesale.
    pub fn set_view_order(&mut self, order: Vec<EntryId>) {
        for &id in &self.view_order {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.view_index = None;
            }
        }
        self.view_order = order;
        self.renumber_view(0);
    }

    fn renumber_source(&mut self, from: usize, to: usize) {
        for (offset, &id) in self.source_order[from..to].iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.source_index = from + offset;
            }
        }
    }

    fn renumber_view(&mut self, from: usize) {
        for (offset, &id) in self.view_order[from..].iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.view_index = Some(from + offset);
            }
        }
    }

    fn forget_key(&mut self, key: ItemKey, id: EntryId) {
        if let Some(ids) = self.by_key.get_mut(&key) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_key.remove(&key);
            }
        }
    }

    /// Checks every bookkeeping invariant, describing the first failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.entries.len() != self.source_order.len() {
            return Err(format!(
                "{} entries but {} source positions",
                self.entries.len(),
                self.source_order.len()
            ));
        }
        if !self.stale {
            for (index, &id) in self.source_order.iter().enumerate() {
                let entry = self.entries.get(id).ok_or("dangling source id")?;
                if entry.source_index != index {
                    return Err(format!("source index {} stored as {}", index, entry.source_index));
                }
            }
        }
        for (index, &id) in self.view_order.iter().enumerate() {
            let entry = self.entries.get(id).ok_or("dangling view id")?;
            if entry.view_index != Some(index) {
                return Err(format!("view index {} stored as {:?}", index, entry.view_index));
            }
        }
        let shown = self.entries.values().filter(|e| e.view_index.is_some()).count();
        if shown != self.view_order.len() {
            return Err(format!("{shown} entries claim a view index, {} shown", self.view_order.len()));
        }
        Ok(())
    }
}

impl<T> Index<EntryId> for IndexTable<T> {
    type Output = Entry<T>;

    fn index(&self, id: EntryId) -> &Entry<T> {
        &self.entries[id]
    }
}
