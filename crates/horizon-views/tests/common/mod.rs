//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use horizon_views::{
    CollectionView, CurrentChanged, CurrentChanging, Diagnostic, Filter, GroupChange, ObservableList, Record,
    SortDescription, Value, ViewChange, ViewConfig,
};
use parking_lot::Mutex;

pub fn record(v: i64) -> Record {
    Record::new().with("v", v)
}

pub fn list_of(values: &[i64]) -> Arc<ObservableList<Record>> {
    Arc::new(ObservableList::new(values.iter().map(|&v| record(v)).collect()))
}

pub fn values(view: &CollectionView<Record>) -> Vec<i64> {
    view.items().iter().map(|r| r.get("v").as_int().unwrap_or(-1)).collect()
}

pub fn value_of(item: &Arc<Record>) -> i64 {
    item.get("v").as_int().unwrap_or(-1)
}

pub fn greater_than(limit: i64) -> Filter<Record> {
    Filter::on_property("v", move |v: &Value| v.as_int().is_some_and(|n| n > limit))
}

/// `[3,1,2]`, filter `v > 1`, ascending on `v`, live filtering on.
pub fn filtered_sorted(values: &[i64], config: ViewConfig) -> (Arc<ObservableList<Record>>, Arc<CollectionView<Record>>) {
    let list = list_of(values);
    let view = CollectionView::builder(list.clone())
        .config(config)
        .filter(greater_than(1))
        .sort(vec![SortDescription::ascending("v")])
        .build()
        .unwrap();
    (list, view)
}

/// Everything a view announced, in order.
#[derive(Debug, Clone)]
pub enum Event {
    Collection(ViewChange<Record>),
    Groups(GroupChange),
    Changing { from: horizon_views::CurrentPosition, to: horizon_views::CurrentPosition, forced: bool },
    Changed(Option<i64>),
    Diagnostic(Diagnostic),
}

#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn attach(view: &CollectionView<Record>) -> Self {
        let recorder = Self::default();
        let signals = view.signals();

        let events = recorder.events.clone();
        signals.collection_changed.connect(move |change: &ViewChange<Record>| {
            events.lock().push(Event::Collection(change.clone()));
        });
        let events = recorder.events.clone();
        signals.groups_changed.connect(move |change: &GroupChange| {
            events.lock().push(Event::Groups(change.clone()));
        });
        let events = recorder.events.clone();
        signals.current_changing.connect(move |change: &CurrentChanging| {
            events.lock().push(Event::Changing {
                from: change.from,
                to: change.to,
                forced: change.forced,
            });
        });
        let events = recorder.events.clone();
        signals.current_changed.connect(move |change: &CurrentChanged<Record>| {
            events.lock().push(Event::Changed(change.item.as_ref().map(value_of)));
        });
        let events = recorder.events.clone();
        signals.diagnostic.connect(move |diagnostic: &Diagnostic| {
            events.lock().push(Event::Diagnostic(diagnostic.clone()));
        });
        recorder
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn collection(&self) -> Vec<ViewChange<Record>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Collection(change) => Some(change.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn groups(&self) -> Vec<GroupChange> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Groups(change) => Some(change.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Diagnostic(diagnostic) => Some(diagnostic.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn resets(&self) -> usize {
        self.collection()
            .iter()
            .filter(|change| matches!(change, ViewChange::Reset))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
