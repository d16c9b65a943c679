//! The collection view.
//!
//! # Dispatch
//!
//! Source notifications land in an inbox; state changes produce notices in
//! an outbox. A single pump drains both, one notice at a time, so a handler
//! that mutates the source from inside a notification never observes a
//! half-applied change: its mutation is queued and processed after the
//! current notice has been delivered to every handler.
//!
//! # Threading
//!
//! A view belongs to the thread that created it. Public operations from any
//! other thread return [`ViewError::CrossThreadAccess`]. A source mutated
//! from a foreign thread latches a violation until
//! [`CollectionView::acknowledge_violation`] is called, unless
//! [`CollectionView::set_synchronized`] opted in to cross-thread sources.

mod builder;
mod snapshot;
mod state;

pub use builder::ViewBuilder;
pub use snapshot::{ViewEntry, ViewSnapshot};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use horizon_views_core::logging::{span_names, targets};
use horizon_views_core::{AffinityViolation, ThreadAffinity};
use parking_lot::Mutex;

use crate::config::{NewItemPlaceholderPosition, ViewConfig};
use crate::edit::{CommitOutcome, EditSnapshot, PendingEdit, Transaction, TransactionState};
use crate::error::{ConfigurationError, Result, SourceError, TransactionConflict, ViewError};
use crate::group::{GroupDescription, GroupNode};
use crate::item::{Identity, ItemKey, ViewItem};
use crate::navigator::{self, CurrentChanging, CurrentPosition, Cursor, Navigation};
use crate::shaping::{CustomSort, Filter, SortDescription, Sorter};
use crate::signals::{Diagnostic, ViewSignals};
use crate::source::{ChangeSink, ItemSource, PropertyChange, SourceAdapter, SourceChange, SourceKind};
use state::{Notice, ViewState};

enum Inbound<T> {
    Structural(SourceChange<T>),
    Property(PropertyChange<T>),
}

/// A filtered, sorted, grouped, navigable projection of an item source.
///
/// The view never owns the source's items; it shares the same `Arc`s and
/// keeps its own ordering over them.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_views::{CollectionView, Filter, ObservableList, SortDescription};
///
/// let list = Arc::new(ObservableList::new(vec![3i64, 1, 2]));
/// let view = CollectionView::builder(list.clone())
///     .filter(Filter::new(|n: &i64| *n > 1))
///     .sort(vec![SortDescription::ascending("")])
///     .build()
///     .unwrap();
/// assert_eq!(view.items().iter().map(|n| **n).collect::<Vec<_>>(), vec![2, 3]);
///
/// list.push(0);
/// list.push(5);
/// assert_eq!(view.items().iter().map(|n| **n).collect::<Vec<_>>(), vec![2, 3, 5]);
/// ```
pub struct CollectionView<T: ViewItem> {
    source: Arc<dyn ItemSource<T>>,
    kind: SourceKind,
    state: Mutex<ViewState<T>>,
    adapter: Mutex<SourceAdapter<T>>,
    signals: ViewSignals<T>,
    affinity: ThreadAffinity,
    violation: Mutex<Option<AffinityViolation>>,
    inbox: Mutex<VecDeque<Inbound<T>>>,
    outbox: Mutex<VecDeque<Notice<T>>>,
    dispatching: AtomicBool,
    defer_depth: AtomicUsize,
    detached: AtomicBool,
    this: Weak<Self>,
}

impl<T: ViewItem> CollectionView<T> {
    /// Create a view over `source` with default configuration.
    pub fn new(source: Arc<dyn ItemSource<T>>) -> Arc<Self> {
        let state = ViewState::new(ViewConfig::default(), source.kind(), Identity::default());
        Self::from_state(source, state)
    }

    /// Start configuring a view over `source`.
    pub fn builder(source: Arc<dyn ItemSource<T>>) -> ViewBuilder<T> {
        ViewBuilder::new(source)
    }

    fn from_state(source: Arc<dyn ItemSource<T>>, state: ViewState<T>) -> Arc<Self> {
        let affinity = ThreadAffinity::current();
        let kind = source.kind();

        let view = Arc::new_cyclic(|this| Self {
            adapter: Mutex::new(SourceAdapter::new(source.clone(), affinity)),
            source,
            kind,
            state: Mutex::new(state),
            signals: ViewSignals::default(),
            affinity,
            violation: Mutex::new(None),
            inbox: Mutex::new(VecDeque::new()),
            outbox: Mutex::new(VecDeque::new()),
            dispatching: AtomicBool::new(false),
            defer_depth: AtomicUsize::new(0),
            detached: AtomicBool::new(false),
            this: this.clone(),
        });

        {
            let sink: Weak<dyn ChangeSink<T>> = view.this.clone();
            view.adapter.lock().subscribe(sink);
        }
        view.update_property_watch();

        {
            let items = view.source.snapshot();
            let mut out = Vec::new();
            let mut state = view.state.lock();
            state.rebuild(items, &mut out);
            state.init_cursor();
        }
        tracing::debug!(target: targets::VIEW, kind = ?view.kind, count = view.count(), "view created");
        view
    }

    /// The view's signals.
    pub fn signals(&self) -> &ViewSignals<T> {
        &self.signals
    }

    /// The bound source.
    pub fn source(&self) -> &Arc<dyn ItemSource<T>> {
        &self.source
    }

    /// How the source notifies.
    pub fn source_kind(&self) -> SourceKind {
        self.kind
    }

    /// The thread that owns the view.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    // Access checks

    fn check_access(&self) -> Result<()> {
        self.affinity.check()?;
        if self.detached.load(Ordering::SeqCst) {
            return Err(ViewError::Detached);
        }
        if let Some(violation) = self.violation.lock().clone() {
            return Err(ViewError::CrossThreadAccess(violation));
        }
        Ok(())
    }

    fn debug_check_reader(&self) {
        if !self.adapter.lock().is_synchronized() {
            self.affinity.debug_assert_same_thread();
        }
    }

    /// The latched cross-thread violation, if any.
    pub fn violation(&self) -> Option<AffinityViolation> {
        self.violation.lock().clone()
    }

    /// Clears a latched violation and resynchronizes with the source.
    pub fn acknowledge_violation(&self) -> Result<()> {
        self.affinity.check()?;
        let Some(violation) = self.violation.lock().take() else {
            return Ok(());
        };
        tracing::info!(target: targets::VIEW, %violation, "cross-thread violation acknowledged; resynchronizing");
        self.refresh_or_defer();
        Ok(())
    }

    /// Accept source notifications from any thread.
    ///
    /// The caller guarantees the source serializes its own mutations.
    pub fn set_synchronized(&self, synchronized: bool) -> Result<()> {
        self.affinity.check()?;
        self.adapter.lock().set_synchronized(synchronized);
        tracing::debug!(target: targets::VIEW, synchronized, "cross-thread source access");
        Ok(())
    }

    /// Whether cross-thread source notifications are accepted.
    pub fn is_synchronized(&self) -> bool {
        self.adapter.lock().is_synchronized()
    }

    // Dispatch

    fn post(&self, notices: Vec<Notice<T>>) {
        if notices.is_empty() {
            return;
        }
        self.outbox.lock().extend(notices);
        self.pump();
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ViewState<T>, &mut Vec<Notice<T>>) -> R) -> R {
        let mut out = Vec::new();
        let result = {
            let mut state = self.state.lock();
            f(&mut state, &mut out)
        };
        self.post(out);
        result
    }

    fn pump(&self) {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            return;
        }
        let _span = tracing::trace_span!(target: targets::VIEW, span_names::DISPATCH).entered();
        loop {
            let notice = self.outbox.lock().pop_front();
            if let Some(notice) = notice {
                self.deliver(notice);
                continue;
            }
            let inbound = self.inbox.lock().pop_front();
            if let Some(inbound) = inbound {
                self.process(inbound);
                continue;
            }
            self.dispatching.store(false, Ordering::SeqCst);
            // Another thread may have queued work after the last pop.
            let idle = self.outbox.lock().is_empty() && self.inbox.lock().is_empty();
            if idle || self.dispatching.swap(true, Ordering::SeqCst) {
                break;
            }
        }
    }

    fn process(&self, inbound: Inbound<T>) {
        if self.detached.load(Ordering::SeqCst) {
            return;
        }
        if self.defer_depth.load(Ordering::SeqCst) > 0 {
            let mut state = self.state.lock();
            state.table.mark_stale();
            state.needs_refresh = true;
            return;
        }
        match inbound {
            Inbound::Structural(SourceChange::Reset) => self.resync(),
            Inbound::Structural(change) => {
                let result = self.with_state(|state, out| state.apply_change(change, out));
                if let Err(detail) = result {
                    tracing::warn!(target: targets::VIEW, %detail, "source out of sync; rebuilding");
                    self.post(vec![Notice::Diagnostic(Diagnostic::SourceOutOfSync { detail })]);
                    self.resync();
                }
            }
            Inbound::Property(change) => self.with_state(|state, out| state.on_property_changed(change, out)),
        }
    }

    fn deliver(&self, notice: Notice<T>) {
        match notice {
            Notice::Collection(change) => self.signals.collection_changed.emit(change),
            Notice::Groups(change) => self.signals.groups_changed.emit(change),
            Notice::Diagnostic(diagnostic) => self.signals.diagnostic.emit(diagnostic),
            Notice::CurrentChanged(changed) => self.signals.current_changed.emit(changed),
            Notice::CurrentMove { from, target, forced } => {
                self.run_current_move(from, target, forced);
            }
        }
    }

    /// Rebuilds from the source now. Pending inbound changes are subsumed.
    fn resync(&self) {
        let items = {
            self.inbox.lock().clear();
            self.source.snapshot()
        };
        self.with_state(|state, out| state.rebuild(items, out));
    }

    fn refresh_or_defer(&self) {
        if self.defer_depth.load(Ordering::SeqCst) > 0 {
            self.state.lock().needs_refresh = true;
            return;
        }
        self.resync();
    }

    // Current item

    /// Runs the changing/changed protocol.
    ///
    /// A forced move always reports `current_changed`; a vetoed forced move
    /// leaves the cursor before the first item.
    fn run_current_move(&self, from: CurrentPosition, target: Cursor<T>, forced: bool) -> bool {
        let to = self
            .state
            .lock()
            .position_of(&target)
            .unwrap_or(CurrentPosition::BeforeFirst);
        let changing = CurrentChanging::new(from, to, forced);
        self.signals.current_changing.emit(changing.clone());

        let canceled = changing.is_canceled();
        let changed = {
            let mut state = self.state.lock();
            if !canceled {
                state.cursor = match state.position_of(&target) {
                    Some(_) => target,
                    None => Cursor::BeforeFirst,
                };
            }
            (forced || !canceled).then(|| state.current_changed())
        };
        if canceled {
            tracing::debug!(target: targets::CURRENCY, ?from, ?to, forced, "current change vetoed");
        }
        match changed {
            Some(changed) => {
                self.signals.current_changed.emit(changed);
                true
            }
            None => false,
        }
    }

    fn navigate(&self, navigation: Navigation) -> Result<bool> {
        self.check_access()?;
        let (from, to, target) = {
            let state = self.state.lock();
            let from = state.current_position();
            let to = navigator::resolve(navigation, from, state.table.count())?;
            (from, to, state.cursor_at(to))
        };
        if from != to {
            self.run_current_move(from, target, false);
        }
        Ok(self.current_item().is_some())
    }

    /// Move to the first item. Returns whether the cursor is on an item.
    pub fn move_current_to_first(&self) -> Result<bool> {
        self.navigate(Navigation::First)
    }

    /// Move to the last item.
    pub fn move_current_to_last(&self) -> Result<bool> {
        self.navigate(Navigation::Last)
    }

    /// Move to the next item, or after the last.
    pub fn move_current_to_next(&self) -> Result<bool> {
        self.navigate(Navigation::Next)
    }

    /// Move to the previous item, or before the first.
    pub fn move_current_to_previous(&self) -> Result<bool> {
        self.navigate(Navigation::Previous)
    }

    /// Move to `position`; `-1` is before the first item and `count` after the last.
    pub fn move_current_to_position(&self, position: isize) -> Result<bool> {
        self.navigate(Navigation::Position(position))
    }

    /// Move to `item`, which must be shown.
    pub fn move_current_to(&self, item: &Arc<T>) -> Result<bool> {
        let index = {
            let state = self.state.lock();
            let id = state.find_shown(item).ok_or(ViewError::ItemNotInView)?;
            state.table[id].view_index.ok_or(ViewError::ItemNotInView)?
        };
        self.navigate(Navigation::Position(index as isize))
    }

    /// Where the cursor is.
    pub fn current_position(&self) -> CurrentPosition {
        self.debug_check_reader();
        self.state.lock().current_position()
    }

    /// The current item.
    pub fn current_item(&self) -> Option<Arc<T>> {
        self.debug_check_reader();
        self.state.lock().current_item()
    }

    /// Whether the cursor is before the first item.
    pub fn is_current_before_first(&self) -> bool {
        self.current_position() == CurrentPosition::BeforeFirst
    }

    /// Whether the cursor is after the last item.
    pub fn is_current_after_last(&self) -> bool {
        self.current_position() == CurrentPosition::AfterLast
    }

    // Queries

    /// Number of shown items, including a pending add-new item.
    pub fn count(&self) -> usize {
        self.debug_check_reader();
        self.state.lock().table.count()
    }

    /// Whether nothing is shown.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The item at view position `index`.
    pub fn item_at(&self, index: usize) -> Option<Arc<T>> {
        self.debug_check_reader();
        self.state.lock().table.item_at(index).cloned()
    }

    /// View position of `item`.
    pub fn index_of(&self, item: &Arc<T>) -> Option<usize> {
        self.debug_check_reader();
        let state = self.state.lock();
        let id = state.find_shown(item)?;
        state.table[id].view_index
    }

    /// View position of the item identified by `key`.
    pub fn index_of_key(&self, key: ItemKey) -> Option<usize> {
        self.debug_check_reader();
        let state = self.state.lock();
        state
            .table
            .ids_for_key(key)
            .iter()
            .filter_map(|&id| state.table[id].view_index)
            .min()
    }

    /// Whether `item` is shown.
    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.index_of(item).is_some()
    }

    /// Shown items in view order.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.debug_check_reader();
        self.state.lock().items()
    }

    /// Details of the entry at view position `index`.
    pub fn entry_at(&self, index: usize) -> Option<ViewEntry<T>> {
        self.debug_check_reader();
        let state = self.state.lock();
        let id = state.table.view_id(index)?;
        Some(ViewEntry::from_entry(&state.table[id]))
    }

    /// The group tree, when grouping is configured.
    pub fn groups(&self) -> Option<GroupNode<T>> {
        self.debug_check_reader();
        self.state.lock().groups()
    }

    /// A consistent copy of the view, readable from any thread.
    pub fn snapshot(&self) -> ViewSnapshot<T> {
        let state = self.state.lock();
        ViewSnapshot::capture(&state)
    }

    /// Whether a deferred refresh is outstanding.
    pub fn needs_refresh(&self) -> bool {
        self.state.lock().needs_refresh
    }

    /// The current configuration.
    pub fn config(&self) -> ViewConfig {
        self.state.lock().config.clone()
    }

    /// Current sort descriptions.
    pub fn sort_descriptions(&self) -> Vec<SortDescription> {
        self.state.lock().sort_descriptions.clone()
    }

    /// Whether a filter is set.
    pub fn has_filter(&self) -> bool {
        self.state.lock().filter.is_some()
    }

    /// Whether a custom comparator is set.
    pub fn has_custom_sort(&self) -> bool {
        matches!(self.state.lock().sorter, Sorter::Custom(_))
    }

    /// Whether the view can create new items.
    pub fn can_add_new(&self) -> bool {
        self.source.is_editable() && self.state.lock().new_item_factory.is_some()
    }

    /// Whether the view can remove items.
    pub fn can_remove(&self) -> bool {
        self.source.is_editable()
    }

    /// Whether custom comparators are accepted.
    pub fn can_custom_sort(&self) -> bool {
        self.kind != SourceKind::SortAssistedSequence
    }

    /// Checks every internal invariant, describing the first failure.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.state.lock().validate()
    }

    // Configuration

    fn update_property_watch(&self) {
        let live = self.state.lock().config.is_live();
        let sink: Option<Weak<dyn ChangeSink<T>>> = if live {
            let sink: Weak<dyn ChangeSink<T>> = self.this.clone();
            Some(sink)
        } else {
            None
        };
        if !self.adapter.lock().watch_properties(sink) && live {
            tracing::debug!(target: targets::VIEW, "source does not relay property changes; live shaping inactive");
        }
    }

    /// Rebuild from the source now, or when the outermost deferral ends.
    pub fn refresh(&self) -> Result<()> {
        self.check_access()?;
        self.refresh_or_defer();
        Ok(())
    }

    /// Replace the filter.
    pub fn set_filter(&self, filter: Filter<T>) -> Result<()> {
        self.check_access()?;
        self.state.lock().filter = Some(filter);
        self.refresh_or_defer();
        Ok(())
    }

    /// Remove the filter.
    pub fn clear_filter(&self) -> Result<()> {
        self.check_access()?;
        self.state.lock().filter = None;
        self.refresh_or_defer();
        Ok(())
    }

    /// Replace the sort descriptions.
    ///
    /// A sort-assisted source is asked to sort itself; every other source is
    /// sorted by the view.
    pub fn set_sort_descriptions(&self, sorts: Vec<SortDescription>) -> Result<()> {
        self.check_access()?;
        let previous = {
            let mut state = self.state.lock();
            if matches!(state.sorter, Sorter::Custom(_)) && !sorts.is_empty() {
                return Err(ConfigurationError::ConflictingSort.into());
            }
            let previous = std::mem::replace(&mut state.sort_descriptions, sorts.clone());
            state.grouping.update_directions(&sorts);
            state.sorter = if sorts.is_empty() || self.kind == SourceKind::SortAssistedSequence {
                Sorter::Unsorted
            } else {
                Sorter::Descriptions(sorts.clone())
            };
            previous
        };
        if self.kind == SourceKind::SortAssistedSequence {
            // The source answers with a reset.
            if let Err(error) = self.source.apply_sort(&sorts) {
                let mut state = self.state.lock();
                state.grouping.update_directions(&previous);
                state.sort_descriptions = previous;
                tracing::warn!(target: targets::VIEW, %error, "source rejected sort; descriptions kept");
                return Err(error.into());
            }
            return Ok(());
        }
        self.refresh_or_defer();
        Ok(())
    }

    /// Set a custom comparator. Fails while sort descriptions are set.
    pub fn set_custom_sort(&self, sort: CustomSort<T>) -> Result<()> {
        self.check_access()?;
        if self.kind == SourceKind::SortAssistedSequence {
            return Err(ConfigurationError::CustomSortNotSupported.into());
        }
        {
            let mut state = self.state.lock();
            if !state.sort_descriptions.is_empty() {
                return Err(ConfigurationError::ConflictingSort.into());
            }
            state.sorter = Sorter::Custom(sort);
        }
        self.refresh_or_defer();
        Ok(())
    }

    /// Remove every sort.
    pub fn clear_sort(&self) -> Result<()> {
        self.check_access()?;
        {
            let mut state = self.state.lock();
            state.sort_descriptions.clear();
            state.sorter = Sorter::Unsorted;
            state.grouping.update_directions(&[]);
        }
        self.refresh_or_defer();
        Ok(())
    }

    /// Replace the grouping levels.
    pub fn set_group_descriptions(&self, descriptions: Vec<GroupDescription<T>>) -> Result<()> {
        self.check_access()?;
        {
            let mut state = self.state.lock();
            let sorts = state.sort_descriptions.clone();
            state.grouping.set_descriptions(descriptions, &sorts);
        }
        self.refresh_or_defer();
        Ok(())
    }

    /// Remove grouping.
    pub fn clear_grouping(&self) -> Result<()> {
        self.set_group_descriptions(Vec::new())
    }

    fn update_config(&self, f: impl FnOnce(&mut ViewConfig)) -> Result<()> {
        self.check_access()?;
        f(&mut self.state.lock().config);
        self.update_property_watch();
        Ok(())
    }

    /// Toggle live filtering.
    pub fn set_live_filtering(&self, enabled: bool) -> Result<()> {
        self.update_config(|config| config.live_filtering = enabled)
    }

    /// Toggle live sorting.
    pub fn set_live_sorting(&self, enabled: bool) -> Result<()> {
        self.update_config(|config| config.live_sorting = enabled)
    }

    /// Toggle live grouping.
    pub fn set_live_grouping(&self, enabled: bool) -> Result<()> {
        self.update_config(|config| config.live_grouping = enabled)
    }

    /// Toggle edit snapshots.
    pub fn set_can_cancel_edit(&self, enabled: bool) -> Result<()> {
        self.update_config(|config| config.can_cancel_edit = enabled)
    }

    /// Change where a pending add-new item is pinned.
    pub fn set_new_item_placeholder_position(&self, position: NewItemPlaceholderPosition) -> Result<()> {
        self.check_access()?;
        {
            let mut state = self.state.lock();
            if state.transaction.state() == TransactionState::AddingNew {
                return Err(ConfigurationError::PlaceholderChangeDuringAddNew.into());
            }
            state.config.new_item_placeholder_position = position;
        }
        Ok(())
    }

    /// Set the factory `add_new` creates items with.
    pub fn set_new_item_factory<F>(&self, factory: F) -> Result<()>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.check_access()?;
        self.state.lock().new_item_factory = Some(Arc::new(factory));
        Ok(())
    }

    // Deferral

    /// Suspend incremental maintenance until the guard drops.
    ///
    /// Source changes during the scope are not applied one by one. When the
    /// outermost guard drops, the view rebuilds once and emits a single reset
    /// if anything happened.
    pub fn defer_refresh(&self) -> Result<DeferRefresh<'_, T>> {
        self.begin_defer()?;
        Ok(DeferRefresh { view: self })
    }

    /// Open a deferral scope by hand. Every call needs a matching
    /// [`end_defer`](Self::end_defer).
    pub fn begin_defer(&self) -> Result<()> {
        self.check_access()?;
        self.defer_depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Close a scope opened by [`begin_defer`](Self::begin_defer).
    ///
    /// Unbalanced calls are ignored.
    pub fn end_defer(&self) -> Result<()> {
        self.affinity.check()?;
        self.close_defer();
        Ok(())
    }

    /// Whether a deferral scope is open.
    pub fn is_refresh_deferred(&self) -> bool {
        self.defer_depth.load(Ordering::SeqCst) > 0
    }

    fn close_defer(&self) {
        let previous = self
            .defer_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| depth.checked_sub(1));
        if previous != Ok(1) {
            return;
        }
        if self.detached.load(Ordering::SeqCst) || self.affinity.check().is_err() {
            return;
        }
        if self.state.lock().needs_refresh {
            tracing::debug!(target: targets::VIEW, "deferred refresh");
            self.resync();
        }
    }

    // Editing

    /// The pending transaction.
    pub fn transaction_state(&self) -> TransactionState {
        self.state.lock().transaction.state()
    }

    /// The item pending in an add-new transaction.
    pub fn current_add_item(&self) -> Option<Arc<T>> {
        self.state.lock().transaction.pending_new().cloned()
    }

    /// The item under edit.
    pub fn current_edit_item(&self) -> Option<Arc<T>> {
        self.state.lock().transaction.pending_edit().map(|edit| edit.item.clone())
    }

    /// Create an item with the factory, append it to the source, and make it current.
    ///
    /// The new item is pinned at the placeholder position, outside sorting,
    /// filtering and grouping, until [`commit_new`](Self::commit_new).
    pub fn add_new(&self) -> Result<Arc<T>> {
        self.check_access()?;
        let item = {
            let mut state = self.state.lock();
            state.transaction.check_can_add()?;
            let factory = state
                .new_item_factory
                .clone()
                .ok_or(ConfigurationError::NoNewItemFactory)?;
            if !self.source.is_editable() {
                return Err(SourceError::ReadOnly.into());
            }
            let item = Arc::new(factory());
            state.transaction = Transaction::AddingNew { item: item.clone() };
            item
        };
        tracing::debug!(target: targets::EDIT, "add-new started");
        if let Err(error) = self.source.insert(self.source.len(), item.clone()) {
            self.state.lock().transaction = Transaction::Idle;
            return Err(error.into());
        }
        self.pump();
        Ok(item)
    }

    /// Release the pending item into normal shaping.
    pub fn commit_new(&self) -> Result<CommitOutcome<T>> {
        self.check_access()?;
        let outcome = self.with_state(|state, out| {
            let item = state.transaction.take_add()?;
            let index = state.release_provisional(out);
            Ok::<_, ViewError>(CommitOutcome { item, index })
        })?;
        tracing::debug!(target: targets::EDIT, index = ?outcome.index, "add-new committed");
        Ok(outcome)
    }

    /// Remove the pending item from the source.
    pub fn cancel_new(&self) -> Result<()> {
        self.check_access()?;
        let (item, index) = {
            let mut state = self.state.lock();
            let item = state.transaction.take_add()?;
            let index = state.source_index_of(&item);
            (item, index)
        };
        if let Some(index) = self.locate_in_source(&item, index) {
            if let Err(error) = self.source.remove_at(index) {
                self.state.lock().transaction = Transaction::AddingNew { item };
                return Err(error.into());
            }
        }
        tracing::debug!(target: targets::EDIT, "add-new canceled");
        self.pump();
        Ok(())
    }

    /// Begin editing `item`. Live shaping of the item waits for the commit.
    pub fn edit_item(&self, item: &Arc<T>) -> Result<()> {
        self.check_access()?;
        let mut state = self.state.lock();
        state.transaction.check_can_edit()?;
        let id = state.find_shown(item).ok_or(ViewError::ItemNotInView)?;
        let item = state.table[id].item.clone();
        let key = state.table[id].key;
        let snapshot = if state.config.can_cancel_edit {
            EditSnapshot::capture(&*item)
        } else {
            None
        };
        state.transaction = Transaction::EditingItem(PendingEdit {
            item,
            key,
            snapshot,
            reshape_deferred: false,
        });
        tracing::debug!(target: targets::EDIT, ?key, "edit started");
        Ok(())
    }

    /// End the edit and re-evaluate the item against filter, sort and grouping.
    pub fn commit_edit(&self) -> Result<()> {
        self.check_access()?;
        self.with_state(|state, out| {
            let edit = state.transaction.take_edit()?;
            let aspects = state.all_aspects();
            state.reshape_key(edit.key, aspects, out);
            tracing::debug!(target: targets::EDIT, key = ?edit.key, "edit committed");
            Ok::<(), ViewError>(())
        })
    }

    /// Restore the values captured by [`edit_item`](Self::edit_item).
    pub fn cancel_edit(&self) -> Result<()> {
        self.check_access()?;
        let edit = {
            let mut state = self.state.lock();
            let edit = state
                .transaction
                .pending_edit()
                .ok_or(TransactionConflict::NoEditPending)?;
            if edit.snapshot.is_none() {
                return Err(ConfigurationError::CancelEditNotSupported.into());
            }
            state.transaction.take_edit()?
        };

        let rejected = edit.snapshot.as_ref().map_or(0, |snapshot| snapshot.restore(&*edit.item));
        if rejected > 0 {
            tracing::warn!(target: targets::EDIT, rejected, "some properties could not be restored");
        }
        if edit.reshape_deferred {
            self.with_state(|state, out| {
                let aspects = state.all_aspects();
                state.reshape_key(edit.key, aspects, out);
            });
        }
        tracing::debug!(target: targets::EDIT, key = ?edit.key, "edit canceled");
        Ok(())
    }

    /// Remove a shown item from the source.
    pub fn remove(&self, item: &Arc<T>) -> Result<()> {
        self.check_access()?;
        let (found, hint) = {
            let state = self.state.lock();
            let key = state.identity.key_of(item);
            state.transaction.check_can_remove(key)?;
            let id = state.find_shown(item).ok_or(ViewError::ItemNotInView)?;
            let found = state.table[id].item.clone();
            let hint = state.source_index_of(&found);
            (found, hint)
        };
        if !self.source.is_editable() {
            return Err(SourceError::ReadOnly.into());
        }
        let index = self
            .locate_in_source(&found, hint)
            .ok_or(ViewError::ItemNotInView)?;
        self.source.remove_at(index)?;
        self.pump();
        Ok(())
    }

    /// Remove the item at view position `index` from the source.
    pub fn remove_at(&self, index: usize) -> Result<()> {
        self.check_access()?;
        let item = self.item_at(index).ok_or_else(|| ViewError::PositionOutOfRange {
            position: isize::try_from(index).unwrap_or(isize::MAX),
            count: self.count(),
        })?;
        self.remove(&item)
    }

    /// Where `item` sits in the source right now.
    ///
    /// The table lags the source while changes wait in the inbox, so `hint`
    /// is only trusted if the source still holds `item` there.
    fn locate_in_source(&self, item: &Arc<T>, hint: Option<usize>) -> Option<usize> {
        if let Some(index) = hint {
            if self.source.get(index).is_some_and(|found| Arc::ptr_eq(&found, item)) {
                return Some(index);
            }
        }
        self.source.snapshot().iter().position(|other| Arc::ptr_eq(other, item))
    }

    // Lifecycle

    /// Stop following the source. The view keeps its last contents.
    pub fn detach(&self) -> Result<()> {
        self.affinity.check()?;
        if self.detached.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.adapter.lock().unsubscribe();
        self.inbox.lock().clear();
        tracing::debug!(target: targets::VIEW, "view detached");
        Ok(())
    }

    /// Whether [`detach`](Self::detach) was called.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl<T: ViewItem> ChangeSink<T> for CollectionView<T> {
    fn source_changed(&self, change: SourceChange<T>) {
        self.inbox.lock().push_back(Inbound::Structural(change));
        self.pump();
    }

    fn property_changed(&self, change: PropertyChange<T>) {
        self.inbox.lock().push_back(Inbound::Property(change));
        self.pump();
    }

    fn access_violation(&self, violation: AffinityViolation) {
        tracing::error!(target: targets::VIEW, %violation, "source changed from a foreign thread");
        let mut latched = self.violation.lock();
        if latched.is_none() {
            *latched = Some(violation);
        }
        let mut state = self.state.lock();
        state.table.mark_stale();
        state.needs_refresh = true;
    }
}

impl<T: ViewItem> std::fmt::Debug for CollectionView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CollectionView")
            .field("kind", &self.kind)
            .field("count", &state.table.count())
            .field("source_len", &state.table.source_len())
            .field("current", &state.current_position())
            .field("transaction", &state.transaction.state())
            .finish()
    }
}

/// Keeps a view's refresh deferred while alive.
///
/// Returned by [`CollectionView::defer_refresh`]. Scopes nest; only the
/// outermost one triggers the rebuild.
#[must_use = "the deferral ends when the guard is dropped"]
pub struct DeferRefresh<'a, T: ViewItem> {
    view: &'a CollectionView<T>,
}

impl<T: ViewItem> Drop for DeferRefresh<'_, T> {
    fn drop(&mut self) {
        self.view.close_defer();
    }
}

static_assertions::assert_impl_all!(CollectionView<crate::Record>: Send, Sync);
