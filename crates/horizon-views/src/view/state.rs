//! The mutable core of a view.
//!
//! Every method runs under the view's state lock and appends the
//! notifications it produces to an outbox; nothing here calls user
//! handlers. Filter, sort and group callbacks do run here, so they must
//! not call back into the view.

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use horizon_views_core::logging::{span_names, targets};
use horizon_views_core::PerfSpan;

use crate::config::{NewItemPlaceholderPosition, ViewConfig};
use crate::debug::GroupTreeDebug;
use crate::edit::Transaction;
use crate::group::{GroupChange, GroupNode, GroupPath, Grouping};
use crate::index_table::{EntryId, IndexTable};
use crate::item::{Identity, ItemKey, ViewItem};
use crate::navigator::{self, CurrentChanged, CurrentPosition, Cursor};
use crate::shaping::{guarded_sort, Filter, OrderContext, SortDescription, SortReport, Sorter};
use crate::signals::{Diagnostic, ViewChange};
use crate::source::{PropertyChange, SourceChange, SourceKind};

pub(crate) type NewItemFactory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A notification waiting for delivery.
pub(crate) enum Notice<T> {
    Collection(ViewChange<T>),
    Groups(GroupChange),
    Diagnostic(Diagnostic),
    CurrentChanged(CurrentChanged<T>),
    /// Run the changing/changed protocol towards `target`.
    CurrentMove {
        from: CurrentPosition,
        target: Cursor<T>,
        forced: bool,
    },
}

/// Which shaping aspects to re-evaluate for an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Aspects {
    pub filter: bool,
    pub sort: bool,
    pub group: bool,
}

impl Aspects {
    fn any(self) -> bool {
        self.filter || self.sort || self.group
    }
}

struct Shown {
    index: usize,
    path: Option<GroupPath>,
    groups: Vec<GroupPath>,
}

pub(crate) struct ViewState<T: ViewItem> {
    pub config: ViewConfig,
    pub kind: SourceKind,
    pub identity: Identity<T>,
    pub table: IndexTable<T>,
    pub filter: Option<Filter<T>>,
    pub sort_descriptions: Vec<SortDescription>,
    pub sorter: Sorter<T>,
    pub grouping: Grouping<T>,
    pub transaction: Transaction<T>,
    pub cursor: Cursor<T>,
    pub new_item_factory: Option<NewItemFactory<T>>,
    /// Entry of the pending add-new item, once the source reported it.
    pub provisional: Option<EntryId>,
    pub needs_refresh: bool,
}

impl<T: ViewItem> ViewState<T> {
    pub fn new(config: ViewConfig, kind: SourceKind, identity: Identity<T>) -> Self {
        Self {
            config,
            kind,
            identity,
            table: IndexTable::default(),
            filter: None,
            sort_descriptions: Vec::new(),
            sorter: Sorter::Unsorted,
            grouping: Grouping::default(),
            transaction: Transaction::Idle,
            cursor: Cursor::BeforeFirst,
            new_item_factory: None,
            provisional: None,
            needs_refresh: false,
        }
    }

    fn order(&self) -> OrderContext<'_, T> {
        OrderContext {
            table: &self.table,
            sorter: &self.sorter,
            grouping: &self.grouping,
        }
    }

    /// View positions subject to ordering; excludes the pinned provisional item.
    pub fn sorted_range(&self) -> Range<usize> {
        let count = self.table.count();
        match self.provisional {
            Some(_) if self.config.new_item_placeholder_position == NewItemPlaceholderPosition::Beginning => {
                1.min(count)..count
            }
            Some(_) => 0..count.saturating_sub(1),
            None => 0..count,
        }
    }

    fn placeholder_index(&self) -> usize {
        match self.config.new_item_placeholder_position {
            NewItemPlaceholderPosition::Beginning => 0,
            NewItemPlaceholderPosition::None | NewItemPlaceholderPosition::End => self.table.count(),
        }
    }

    // Queries

    pub fn current_position(&self) -> CurrentPosition {
        match &self.cursor {
            Cursor::BeforeFirst => CurrentPosition::BeforeFirst,
            Cursor::AfterLast => CurrentPosition::AfterLast,
            Cursor::On { id, .. } => self
                .table
                .get(*id)
                .and_then(|entry| entry.view_index)
                .map_or(CurrentPosition::BeforeFirst, CurrentPosition::OnItem),
        }
    }

    pub fn current_item(&self) -> Option<Arc<T>> {
        match &self.cursor {
            Cursor::On { id, item } if self.is_shown(*id) => Some(item.clone()),
            _ => None,
        }
    }

    pub fn current_changed(&self) -> CurrentChanged<T> {
        CurrentChanged {
            position: self.current_position(),
            item: self.current_item(),
        }
    }

    pub fn is_shown(&self, id: EntryId) -> bool {
        self.table.get(id).is_some_and(|entry| entry.view_index.is_some())
    }

    /// The cursor value for a resolved position.
    pub fn cursor_at(&self, position: CurrentPosition) -> Cursor<T> {
        match position {
            CurrentPosition::BeforeFirst => Cursor::BeforeFirst,
            CurrentPosition::AfterLast => Cursor::AfterLast,
            CurrentPosition::OnItem(index) => match self.table.view_id(index) {
                Some(id) => Cursor::On {
                    id,
                    item: self.table[id].item.clone(),
                },
                None => Cursor::BeforeFirst,
            },
        }
    }

    /// Where `cursor` would sit now, or `None` if its entry is gone.
    pub fn position_of(&self, cursor: &Cursor<T>) -> Option<CurrentPosition> {
        match cursor {
            Cursor::BeforeFirst => Some(CurrentPosition::BeforeFirst),
            Cursor::AfterLast => Some(CurrentPosition::AfterLast),
            Cursor::On { id, .. } => self.table.get(*id)?.view_index.map(CurrentPosition::OnItem),
        }
    }

    pub fn items(&self) -> Vec<Arc<T>> {
        self.table
            .view_ids()
            .iter()
            .map(|&id| self.table[id].item.clone())
            .collect()
    }

    /// Shown entry matching `item` by pointer, then by key.
    pub fn find_shown(&self, item: &Arc<T>) -> Option<EntryId> {
        let key = self.identity.key_of(item);
        let shown: Vec<EntryId> = self
            .table
            .ids_for_key(key)
            .iter()
            .copied()
            .filter(|&id| self.is_shown(id))
            .collect();
        shown
            .iter()
            .copied()
            .find(|&id| Arc::ptr_eq(&self.table[id].item, item))
            .or_else(|| shown.iter().copied().min_by_key(|&id| self.table[id].view_index))
    }

    /// Source position of `item`, if the table is current.
    pub fn source_index_of(&self, item: &Arc<T>) -> Option<usize> {
        if self.table.is_stale() {
            return None;
        }
        let key = self.identity.key_of(item);
        self.table
            .ids_for_key(key)
            .iter()
            .find(|&&id| Arc::ptr_eq(&self.table[id].item, item))
            .map(|&id| self.table[id].source_index)
    }

    pub fn groups(&self) -> Option<GroupNode<T>> {
        if !self.grouping.is_active() {
            return None;
        }
        let items: Vec<Arc<T>> = self.table.view_ids()[self.sorted_range()]
            .iter()
            .map(|&id| self.table[id].item.clone())
            .collect();
        Some(self.grouping.snapshot(&items))
    }

    // Shaping primitives

    fn evaluate_filter(&mut self, id: EntryId, out: &mut Vec<Notice<T>>) -> bool {
        let passes = match &self.filter {
            None => true,
            Some(filter) => {
                let entry = &self.table[id];
                match filter.evaluate(&entry.item) {
                    Ok(passes) => passes,
                    Err(message) => {
                        tracing::warn!(target: targets::SHAPING, key = ?entry.key, %message, "filter panicked; item hidden");
                        out.push(Notice::Diagnostic(Diagnostic::PredicateFault {
                            item: entry.key,
                            message,
                        }));
                        false
                    }
                }
            }
        };
        if let Some(entry) = self.table.get_mut(id) {
            entry.passes_filter = passes;
        }
        passes
    }

    fn compute_group_path(&self, id: EntryId, out: &mut Vec<Notice<T>>) -> GroupPath {
        if !self.grouping.is_active() {
            return GroupPath::new();
        }
        let entry = &self.table[id];
        match self.grouping.compute_path(&entry.item) {
            Ok(path) => path,
            Err((path, fault)) => {
                tracing::warn!(
                    target: targets::GROUPING,
                    key = ?entry.key,
                    level = fault.level,
                    message = %fault.message,
                    "group selector panicked; item is ungroupable"
                );
                out.push(Notice::Diagnostic(Diagnostic::SelectorFault {
                    item: entry.key,
                    level: fault.level,
                    message: fault.message,
                }));
                path
            }
        }
    }

    /// Shows a hidden entry at its ordered position, joining its group.
    fn show(&mut self, id: EntryId) -> Shown {
        let (path, groups) = if self.grouping.is_active() {
            let path = self.table[id].group_path.clone();
            let (leaf, created) = self.grouping.add(&path);
            if let Some(entry) = self.table.get_mut(id) {
                entry.group = Some(leaf);
            }
            (Some(path), created)
        } else {
            (None, Vec::new())
        };
        let index = self.order().insertion_point(id, self.sorted_range());
        self.table.view_insert(index, id);
        Shown { index, path, groups }
    }

    /// Hides a shown entry, leaving its group. Does not touch the cursor.
    fn hide(&mut self, id: EntryId) -> Option<Shown> {
        let index = self.table.get(id)?.view_index?;
        self.table.view_remove(index);
        let leaf = self.table.get_mut(id).and_then(|entry| entry.group.take());
        let (path, groups) = match leaf {
            Some(leaf) => (Some(self.table[id].group_path.clone()), self.grouping.remove(leaf)),
            None => (None, Vec::new()),
        };
        Some(Shown { index, path, groups })
    }

    /// Moves the cursor off an entry that just left the view.
    fn cursor_lost(&mut self, id: EntryId, former_index: usize, out: &mut Vec<Notice<T>>) {
        if !self.cursor.is_on(id) {
            return;
        }
        let fallback = navigator::neighbour_after_removal(former_index, self.table.count());
        let target = self.cursor_at(fallback);
        tracing::debug!(target: targets::CURRENCY, former_index, ?fallback, "current item left the view");
        self.cursor = Cursor::BeforeFirst;
        out.push(Notice::CurrentMove {
            from: CurrentPosition::OnItem(former_index),
            target,
            forced: true,
        });
    }

    fn emit_hidden(&mut self, id: EntryId, hidden: Shown, item: Arc<T>, out: &mut Vec<Notice<T>>) {
        out.push(Notice::Collection(ViewChange::Removed {
            index: hidden.index,
            item,
        }));
        if let Some(path) = hidden.path {
            out.push(Notice::Groups(GroupChange::ItemRemoved {
                path,
                removed: hidden.groups,
            }));
        }
        self.cursor_lost(id, hidden.index, out);
    }

    fn emit_shown(shown: Shown, item: Arc<T>, out: &mut Vec<Notice<T>>) {
        out.push(Notice::Collection(ViewChange::Added {
            index: shown.index,
            item,
        }));
        if let Some(path) = shown.path {
            out.push(Notice::Groups(GroupChange::ItemAdded {
                path,
                created: shown.groups,
            }));
        }
    }

    /// Re-places a shown entry whose sort key may have changed.
    fn reposition(&mut self, id: EntryId, out: &mut Vec<Notice<T>>) {
        let Some(old_index) = self.table.get(id).and_then(|entry| entry.view_index) else {
            return;
        };
        if self.order().is_in_place(id, old_index, self.sorted_range()) {
            return;
        }
        self.table.view_remove(old_index);
        let new_index = self.order().insertion_point(id, self.sorted_range());
        self.table.view_insert(new_index, id);
        if new_index != old_index {
            tracing::trace!(target: targets::SHAPING, old_index, new_index, "item repositioned");
            out.push(Notice::Collection(ViewChange::Moved {
                old_index,
                new_index,
                item: self.table[id].item.clone(),
            }));
        }
    }

    // Full rebuild

    /// Rebuilds every index from `items`, the complete source contents.
    pub fn rebuild(&mut self, items: Vec<Arc<T>>, out: &mut Vec<Notice<T>>) {
        let _span = tracing::debug_span!(target: targets::VIEW, span_names::REFRESH, len = items.len()).entered();
        let _perf = PerfSpan::new(span_names::REFRESH);

        let had_groups = self.grouping.is_active() || self.grouping.get(self.grouping.root()).is_some_and(|g| !g.subgroups.is_empty());
        let previous_cursor = self.cursor.clone();
        let previous_position = self.current_position();
        let had_provisional = self.provisional.is_some();

        self.table.clear();
        self.grouping.reset();
        self.provisional = None;

        let pending = self.transaction.pending_new().cloned();
        let mut shown = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let key = self.identity.key_of(&item);
            let is_pending = pending.as_ref().is_some_and(|p| Arc::ptr_eq(p, &item));
            let id = self.table.insert_source(index, item, key);
            if is_pending && self.provisional.is_none() {
                if let Some(entry) = self.table.get_mut(id) {
                    entry.provisional = true;
                }
                self.provisional = Some(id);
                continue;
            }
            if !self.evaluate_filter(id, out) {
                continue;
            }
            let path = self.compute_group_path(id, out);
            if let Some(entry) = self.table.get_mut(id) {
                entry.group_path = path;
            }
            shown.push(id);
        }

        if self.grouping.is_active() {
            for &id in &shown {
                let (leaf, _) = self.grouping.add(&self.table[id].group_path);
                if let Some(entry) = self.table.get_mut(id) {
                    entry.group = Some(leaf);
                }
            }
            // Items follow the tree's leaf order whatever the comparators do.
            let ranks = self.grouping.leaf_ranks();
            let table = &self.table;
            shown.sort_by_key(|&id| table[id].group.and_then(|leaf| ranks.get(leaf).copied()));
        }

        if self.sorter.is_sorted() {
            let order = self.order();
            let table = &self.table;
            let mut report = SortReport::default();
            for run in shown.chunk_by_mut(|&a, &b| table[a].group == table[b].group) {
                let run_report = guarded_sort(run, |a, b| order.compare(a, b), |id| table[id].source_index);
                report.comparisons += run_report.comparisons;
                report.fallback_len += run_report.fallback_len;
            }
            tracing::trace!(target: targets::PERF, comparisons = report.comparisons, "view sorted");
            if report.fallback_len > 0 {
                tracing::warn!(
                    target: targets::SHAPING,
                    fallback_len = report.fallback_len,
                    "comparator is inconsistent; range kept in source order"
                );
                out.push(Notice::Diagnostic(Diagnostic::InconsistentComparator {
                    fallback_len: report.fallback_len,
                }));
            }
        }

        if let Some(id) = self.provisional {
            match self.config.new_item_placeholder_position {
                NewItemPlaceholderPosition::Beginning => shown.insert(0, id),
                NewItemPlaceholderPosition::None | NewItemPlaceholderPosition::End => shown.push(id),
            }
        }
        self.table.set_view_order(shown);
        self.needs_refresh = false;

        out.push(Notice::Collection(ViewChange::Reset));
        if had_groups || self.grouping.is_active() {
            out.push(Notice::Groups(GroupChange::Reset));
        }

        self.restore_cursor(previous_cursor, previous_position, out);
        if let (Some(id), false) = (self.provisional, had_provisional) {
            if !self.cursor.is_on(id) {
                out.push(Notice::CurrentMove {
                    from: self.current_position(),
                    target: Cursor::On {
                        id,
                        item: self.table[id].item.clone(),
                    },
                    forced: false,
                });
            }
        }

        tracing::debug!(
            target: targets::VIEW,
            source_len = self.table.source_len(),
            count = self.table.count(),
            "view rebuilt"
        );
        if self.grouping.is_active() && tracing::enabled!(target: targets::GROUPING, tracing::Level::TRACE) {
            if let Some(root) = self.groups() {
                tracing::trace!(target: targets::GROUPING, "group tree:\n{}", GroupTreeDebug::new(&root));
            }
        }
    }

    /// Re-finds the current item after a rebuild; falls back to the first item.
    fn restore_cursor(&mut self, previous: Cursor<T>, previous_position: CurrentPosition, out: &mut Vec<Notice<T>>) {
        let Cursor::On { item, .. } = previous else {
            self.cursor = previous;
            return;
        };
        let key = self.identity.key_of(&item);
        let found = self
            .table
            .ids_for_key(key)
            .iter()
            .copied()
            .filter(|&id| self.is_shown(id))
            .min_by_key(|&id| self.table[id].view_index);
        match found {
            Some(id) => {
                let item = self.table[id].item.clone();
                self.cursor = Cursor::On { id, item };
            }
            None => {
                let target = self.cursor_at(if self.table.count() > 0 {
                    CurrentPosition::OnItem(0)
                } else {
                    CurrentPosition::BeforeFirst
                });
                self.cursor = Cursor::BeforeFirst;
                out.push(Notice::CurrentMove {
                    from: previous_position,
                    target,
                    forced: true,
                });
            }
        }
    }

    /// Positions the cursor on the first item without notifications.
    pub fn init_cursor(&mut self) {
        self.cursor = self.cursor_at(CurrentPosition::OnItem(0));
    }

    // Incremental source changes

    /// Applies one structural change. `Err` means the change does not match
    /// the table and the caller must resynchronize.
    pub fn apply_change(&mut self, change: SourceChange<T>, out: &mut Vec<Notice<T>>) -> Result<(), String> {
        let _span = tracing::trace_span!(target: targets::VIEW, span_names::SOURCE_CHANGE).entered();
        if self.table.is_stale() {
            return Err("view indices are stale".into());
        }
        match change {
            SourceChange::Insert { index, item } => {
                if index > self.table.source_len() {
                    return Err(format!(
                        "insert at {index} beyond source length {}",
                        self.table.source_len()
                    ));
                }
                self.apply_insert(index, item, out);
            }
            SourceChange::Remove { index, item } => {
                self.expect_item(index, &item)?;
                self.apply_remove(index, out);
            }
            SourceChange::Replace { index, old, new } => {
                self.expect_item(index, &old)?;
                self.apply_replace(index, new, out);
            }
            SourceChange::Move {
                old_index,
                new_index,
                item,
            } => {
                self.expect_item(old_index, &item)?;
                if new_index >= self.table.source_len() {
                    return Err(format!("move target {new_index} out of range"));
                }
                self.apply_move(old_index, new_index, out);
            }
            SourceChange::Reset => return Err("reset must be handled by a rebuild".into()),
        }
        Ok(())
    }

    fn expect_item(&self, index: usize, item: &Arc<T>) -> Result<(), String> {
        let id = self
            .table
            .source_id(index)
            .ok_or_else(|| format!("source index {index} out of range"))?;
        if Arc::ptr_eq(&self.table[id].item, item) {
            Ok(())
        } else {
            Err(format!("item at source index {index} does not match"))
        }
    }

    fn apply_insert(&mut self, index: usize, item: Arc<T>, out: &mut Vec<Notice<T>>) {
        let key = self.identity.key_of(&item);
        let is_pending = self
            .transaction
            .pending_new()
            .is_some_and(|p| Arc::ptr_eq(p, &item));
        let id = self.table.insert_source(index, item.clone(), key);

        if is_pending && self.provisional.is_none() {
            let from = self.current_position();
            let position = self.placeholder_index();
            if let Some(entry) = self.table.get_mut(id) {
                entry.provisional = true;
            }
            self.table.view_insert(position, id);
            self.provisional = Some(id);
            tracing::debug!(target: targets::EDIT, position, "provisional item pinned");
            out.push(Notice::Collection(ViewChange::Added {
                index: position,
                item: item.clone(),
            }));
            out.push(Notice::CurrentMove {
                from,
                target: Cursor::On { id, item },
                forced: false,
            });
            return;
        }

        if !self.evaluate_filter(id, out) {
            tracing::trace!(target: targets::SHAPING, index, "inserted item filtered out");
            return;
        }
        let path = self.compute_group_path(id, out);
        if let Some(entry) = self.table.get_mut(id) {
            entry.group_path = path;
        }
        let shown = self.show(id);
        Self::emit_shown(shown, item, out);
    }

    fn apply_remove(&mut self, index: usize, out: &mut Vec<Notice<T>>) {
        let Some(id) = self.table.source_id(index) else {
            return;
        };
        let (item, key) = {
            let entry = &self.table[id];
            (entry.item.clone(), entry.key)
        };
        if self.provisional == Some(id) {
            self.provisional = None;
        }
        self.transaction.abandon_item(&item, key);
        if let Some(hidden) = self.hide(id) {
            self.emit_hidden(id, hidden, item, out);
        }
        self.table.remove_source(index);
    }

    fn apply_replace(&mut self, index: usize, new: Arc<T>, out: &mut Vec<Notice<T>>) {
        let Some(id) = self.table.source_id(index) else {
            return;
        };
        if self.provisional == Some(id) {
            self.apply_remove(index, out);
            self.apply_insert(index, new, out);
            return;
        }

        let (old, old_key) = {
            let entry = &self.table[id];
            (entry.item.clone(), entry.key)
        };
        self.transaction.abandon_item(&old, old_key);
        let was_current = self.cursor.is_on(id);
        let hidden = self.hide(id);

        let key = self.identity.key_of(&new);
        self.table.rekey(id, new.clone(), key);
        let shown = if self.evaluate_filter(id, out) {
            let path = self.compute_group_path(id, out);
            if let Some(entry) = self.table.get_mut(id) {
                entry.group_path = path;
            }
            Some(self.show(id))
        } else {
            None
        };

        match (hidden, shown) {
            (Some(hidden), Some(shown)) => {
                if hidden.index == shown.index {
                    out.push(Notice::Collection(ViewChange::Replaced {
                        index: shown.index,
                        old,
                        new: new.clone(),
                    }));
                } else {
                    out.push(Notice::Collection(ViewChange::Removed {
                        index: hidden.index,
                        item: old,
                    }));
                    out.push(Notice::Collection(ViewChange::Added {
                        index: shown.index,
                        item: new.clone(),
                    }));
                }
                if let (Some(from), Some(to)) = (hidden.path, shown.path) {
                    if self.grouping.compare_paths(&from, &to) != Ordering::Equal
                        || !hidden.groups.is_empty()
                        || !shown.groups.is_empty()
                    {
                        out.push(Notice::Groups(GroupChange::ItemRegrouped {
                            from,
                            to,
                            created: shown.groups,
                            removed: hidden.groups,
                        }));
                    }
                }
                if was_current {
                    self.cursor = Cursor::On { id, item: new };
                    out.push(Notice::CurrentChanged(self.current_changed()));
                }
            }
            (Some(hidden), None) => self.emit_hidden(id, hidden, old, out),
            (None, Some(shown)) => Self::emit_shown(shown, new, out),
            (None, None) => {}
        }
    }

    fn apply_move(&mut self, old_index: usize, new_index: usize, out: &mut Vec<Notice<T>>) {
        let Some(id) = self.table.move_source(old_index, new_index) else {
            return;
        };
        if self.provisional != Some(id) {
            self.reposition(id, out);
        }
    }

    // Live shaping

    /// Which aspects a change of `property` affects under the current configuration.
    pub fn live_aspects(&self, property: &str) -> Aspects {
        Aspects {
            filter: self.config.live_filtering && self.filter.as_ref().is_some_and(|f| f.watches(property)),
            sort: self.config.live_sorting
                && self.kind != SourceKind::SortAssistedSequence
                && self.sorter.watches(property),
            group: self.config.live_grouping && self.grouping.watches(property),
        }
    }

    /// Every aspect the view is configured with.
    pub fn all_aspects(&self) -> Aspects {
        Aspects {
            filter: self.filter.is_some(),
            sort: self.sorter.is_sorted() && self.kind != SourceKind::SortAssistedSequence,
            group: self.grouping.is_active(),
        }
    }

    pub fn on_property_changed(&mut self, change: PropertyChange<T>, out: &mut Vec<Notice<T>>) {
        if self.table.is_stale() {
            return;
        }
        let aspects = self.live_aspects(&change.property);
        if !aspects.any() {
            return;
        }
        let key = self.identity.key_of(&change.item);
        if self.transaction.defer_reshape(key) {
            return;
        }
        let _span = tracing::trace_span!(target: targets::SHAPING, span_names::RESHAPE, property = %change.property).entered();
        for id in self.table.ids_for_key(key).to_vec() {
            self.reshape(id, aspects, out);
        }
    }

    /// Re-evaluates `aspects` for one entry.
    ///
    /// Exclusion wins over regrouping: an item that fails the filter is
    /// removed without a regroup notification.
    pub fn reshape(&mut self, id: EntryId, aspects: Aspects, out: &mut Vec<Notice<T>>) {
        let Some(entry) = self.table.get(id) else {
            return;
        };
        if entry.provisional {
            return;
        }
        let item = entry.item.clone();
        let was_shown = entry.view_index.is_some();

        let passes = if aspects.filter {
            self.evaluate_filter(id, out)
        } else {
            self.table[id].passes_filter
        };
        if !passes {
            if let Some(hidden) = self.hide(id) {
                tracing::trace!(target: targets::SHAPING, index = hidden.index, "item no longer passes filter");
                self.emit_hidden(id, hidden, item, out);
            }
            return;
        }

        if !was_shown {
            let path = self.compute_group_path(id, out);
            if let Some(entry) = self.table.get_mut(id) {
                entry.group_path = path;
            }
            let shown = self.show(id);
            Self::emit_shown(shown, item, out);
            return;
        }

        if aspects.group {
            let new_path = self.compute_group_path(id, out);
            let old_path = self.table[id].group_path.clone();
            if self.grouping.compare_paths(&old_path, &new_path) != Ordering::Equal {
                self.regroup(id, old_path, new_path, item, out);
                return;
            }
        }
        if aspects.sort {
            self.reposition(id, out);
        }
    }

    fn regroup(&mut self, id: EntryId, from: GroupPath, to: GroupPath, item: Arc<T>, out: &mut Vec<Notice<T>>) {
        let Some(hidden) = self.hide(id) else {
            return;
        };
        if let Some(entry) = self.table.get_mut(id) {
            entry.group_path = to.clone();
        }
        let shown = self.show(id);
        tracing::trace!(target: targets::GROUPING, ?from, ?to, "item regrouped");
        out.push(Notice::Groups(GroupChange::ItemRegrouped {
            from,
            to,
            created: shown.groups,
            removed: hidden.groups,
        }));
        if hidden.index != shown.index {
            out.push(Notice::Collection(ViewChange::Moved {
                old_index: hidden.index,
                new_index: shown.index,
                item,
            }));
        }
    }

    /// Reshapes every entry for `key` with the given aspects.
    pub fn reshape_key(&mut self, key: ItemKey, aspects: Aspects, out: &mut Vec<Notice<T>>) {
        if self.table.is_stale() || !aspects.any() {
            return;
        }
        for id in self.table.ids_for_key(key).to_vec() {
            self.reshape(id, aspects, out);
        }
    }

    // Add-new

    /// Releases the provisional item into normal shaping.
    pub fn release_provisional(&mut self, out: &mut Vec<Notice<T>>) -> Option<usize> {
        let id = self.provisional.take()?;
        let item = self.table.get(id)?.item.clone();
        if let Some(entry) = self.table.get_mut(id) {
            entry.provisional = false;
        }
        let Some(pinned_at) = self.table[id].view_index else {
            return None;
        };
        self.table.view_remove(pinned_at);

        if !self.evaluate_filter(id, out) {
            tracing::debug!(target: targets::EDIT, "committed item filtered out");
            out.push(Notice::Collection(ViewChange::Removed {
                index: pinned_at,
                item,
            }));
            self.cursor_lost(id, pinned_at, out);
            return None;
        }
        let path = self.compute_group_path(id, out);
        if let Some(entry) = self.table.get_mut(id) {
            entry.group_path = path;
        }
        let shown = self.show(id);
        let index = shown.index;
        if index != pinned_at {
            out.push(Notice::Collection(ViewChange::Moved {
                old_index: pinned_at,
                new_index: index,
                item,
            }));
        }
        if let Some(path) = shown.path {
            out.push(Notice::Groups(GroupChange::ItemAdded {
                path,
                created: shown.groups,
            }));
        }
        Some(index)
    }

    /// Checks every cross-structure invariant.
    pub fn validate(&self) -> Result<(), String> {
        self.table.validate()?;
        self.grouping.validate()?;

        let range = self.sorted_range();
        for (index, &id) in self.table.view_ids().iter().enumerate() {
            let entry = &self.table[id];
            if entry.provisional {
                if range.contains(&index) {
                    return Err(format!("provisional item at {index} inside the sorted range"));
                }
                continue;
            }
            if !entry.passes_filter {
                return Err(format!("item at {index} is shown but fails the filter"));
            }
            if self.grouping.is_active() != entry.group.is_some() {
                return Err(format!("item at {index} has inconsistent group membership"));
            }
        }
        if self.grouping.is_active() {
            let root = self
                .grouping
                .get(self.grouping.root())
                .ok_or("missing root group")?;
            if root.item_count != range.len() {
                return Err(format!("root group counts {} of {} grouped items", root.item_count, range.len()));
            }
            let ranks = self.grouping.leaf_ranks();
            let mut previous = 0;
            for index in range {
                let entry = &self.table[self.table.view_ids()[index]];
                let rank = entry
                    .group
                    .and_then(|leaf| ranks.get(leaf).copied())
                    .ok_or_else(|| format!("item at {index} belongs to no leaf group"))?;
                if rank < previous {
                    return Err(format!("item at {index} is out of group order"));
                }
                previous = rank;
            }
        }
        if let Cursor::On { id, .. } = &self.cursor {
            if !self.is_shown(*id) {
                return Err("current item is not shown".into());
            }
        }
        Ok(())
    }
}
