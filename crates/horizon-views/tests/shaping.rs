//! Filtering and sorting, incremental and live.

mod common;

use std::cmp::Ordering;
use std::sync::Arc;

use common::*;
use horizon_views::{
    CollectionView, ConfigurationError, CustomSort, Diagnostic, Filter, ItemSource, ObservableList, PlainList,
    Record, SortDescription, SortedList, ViewChange, ViewConfig, ViewError,
};

#[test]
fn test_filtered_sorted_scenario() {
    let (list, view) = filtered_sorted(&[3, 1, 2], ViewConfig::new().live_filtering(true));
    assert_eq!(values(&view), vec![2, 3]);
    let recorder = Recorder::attach(&view);

    list.insert(0, record(0));
    assert_eq!(values(&view), vec![2, 3]);
    assert!(recorder.collection().is_empty());

    let one = list.items().into_iter().find(|r| value_of(r) == 1).unwrap();
    list.set_property(&one, "v", 5);
    assert_eq!(values(&view), vec![2, 3, 5]);

    let changes = recorder.collection();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], ViewChange::Added { index: 2, item } if Arc::ptr_eq(item, &one)));
    view.check_invariants().unwrap();
}

#[test]
fn test_live_filter_exclusion_only_removes_that_item() {
    let (list, view) = filtered_sorted(&[3, 4, 2, 5], ViewConfig::new().live_filtering(true));
    assert_eq!(values(&view), vec![2, 3, 4, 5]);
    let before = view.items();
    let recorder = Recorder::attach(&view);

    let three = before[1].clone();
    list.set_property(&three, "v", 0);

    let after = view.items();
    assert_eq!(values(&view), vec![2, 4, 5]);
    let changes = recorder.collection();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], ViewChange::Removed { index: 1, .. }));

    let survivors: Vec<_> = before.iter().filter(|r| !Arc::ptr_eq(r, &three)).collect();
    for (kept, now) in survivors.iter().zip(&after) {
        assert!(Arc::ptr_eq(kept, now));
    }
}

#[test]
fn test_property_changes_ignored_without_live_filtering() {
    let (list, view) = filtered_sorted(&[3, 1, 2], ViewConfig::new());
    let one = list.items().into_iter().find(|r| value_of(r) == 1).unwrap();
    list.set_property(&one, "v", 5);
    assert_eq!(values(&view), vec![2, 3]);

    view.refresh().unwrap();
    assert_eq!(values(&view), vec![2, 3, 5]);
}

#[test]
fn test_live_sorting_moves_single_item() {
    let (list, view) = filtered_sorted(&[2, 3, 4], ViewConfig::new().live_sorting(true));
    let recorder = Recorder::attach(&view);

    let two = view.item_at(0).unwrap();
    list.set_property(&two, "v", 10);
    assert_eq!(values(&view), vec![3, 4, 10]);

    let changes = recorder.collection();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], ViewChange::Moved { old_index: 0, new_index: 2, .. }));
    view.check_invariants().unwrap();
}

#[test]
fn test_reapplying_configuration_is_idempotent() {
    let (_list, view) = filtered_sorted(&[5, 3, 9, 1, 7, 3], ViewConfig::new());
    let before = view.items();

    view.set_filter(greater_than(1)).unwrap();
    view.set_sort_descriptions(vec![SortDescription::ascending("v")]).unwrap();
    view.refresh().unwrap();

    let after = view.items();
    assert_eq!(before.len(), after.len());
    assert!(before.iter().zip(&after).all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[test]
fn test_equal_keys_keep_source_order() {
    let list = Arc::new(ObservableList::new(vec![
        Record::new().with("k", 1).with("id", "a"),
        Record::new().with("k", 0).with("id", "b"),
        Record::new().with("k", 1).with("id", "c"),
        Record::new().with("k", 0).with("id", "d"),
    ]));
    let view = CollectionView::builder(list)
        .sort(vec![SortDescription::ascending("k")])
        .build()
        .unwrap();
    let ids: Vec<String> = view.items().iter().map(|r| r.get("id").to_string()).collect();
    assert_eq!(ids, ["b", "d", "a", "c"]);
}

#[test]
fn test_unsorted_view_follows_source_edits() {
    let list = list_of(&[1, 2, 3]);
    let view = CollectionView::new(list.clone());
    let recorder = Recorder::attach(&view);

    list.move_item(0, 2);
    assert_eq!(values(&view), vec![2, 3, 1]);
    list.replace(1, record(7));
    assert_eq!(values(&view), vec![2, 7, 1]);
    list.remove(0);
    assert_eq!(values(&view), vec![7, 1]);

    let changes = recorder.collection();
    assert!(matches!(&changes[0], ViewChange::Moved { old_index: 0, new_index: 2, .. }));
    assert!(matches!(&changes[1], ViewChange::Replaced { index: 1, .. }));
    assert!(matches!(&changes[2], ViewChange::Removed { index: 0, .. }));
    view.check_invariants().unwrap();
}

#[test]
fn test_replace_that_reorders_reports_remove_and_add() {
    let (list, view) = filtered_sorted(&[2, 3, 4], ViewConfig::new());
    let recorder = Recorder::attach(&view);

    list.replace(0, record(9));
    assert_eq!(values(&view), vec![3, 4, 9]);
    let changes = recorder.collection();
    assert!(matches!(&changes[0], ViewChange::Removed { index: 0, .. }));
    assert!(matches!(&changes[1], ViewChange::Added { index: 2, .. }));
}

#[test]
fn test_custom_sort_conflicts_with_descriptions() {
    let (_list, view) = filtered_sorted(&[1, 2], ViewConfig::new());
    let result = view.set_custom_sort(CustomSort::new(|a: &Record, b: &Record| value_of_ref(b).cmp(&value_of_ref(a))));
    assert_eq!(result, Err(ViewError::Configuration(ConfigurationError::ConflictingSort)));

    view.clear_sort().unwrap();
    view.clear_filter().unwrap();
    view.set_custom_sort(CustomSort::new(|a: &Record, b: &Record| value_of_ref(b).cmp(&value_of_ref(a))))
        .unwrap();
    assert_eq!(values(&view), vec![2, 1]);
    assert_eq!(
        view.set_sort_descriptions(vec![SortDescription::ascending("v")]),
        Err(ViewError::Configuration(ConfigurationError::ConflictingSort))
    );
}

fn value_of_ref(record: &Record) -> i64 {
    record.get("v").as_int().unwrap_or(0)
}

#[test]
fn test_inconsistent_comparator_does_not_corrupt_view() {
    let list = list_of(&(0..40).collect::<Vec<_>>());
    // Rock-paper-scissors on v % 3.
    let cyclic = CustomSort::new(|a: &Record, b: &Record| {
        let (x, y) = (value_of_ref(a) % 3, value_of_ref(b) % 3);
        if x == y {
            Ordering::Equal
        } else if (x + 1) % 3 == y {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    })
    .watching(["v"]);
    let view = CollectionView::builder(list.clone())
        .config(ViewConfig::new().live_sorting(true))
        .custom_sort(cyclic)
        .build()
        .unwrap();

    assert_eq!(view.count(), 40);
    list.push(record(41));
    list.push(record(42));
    let first = view.item_at(0).unwrap();
    list.set_property(&first, "v", 100);
    assert_eq!(view.count(), 42);
    view.check_invariants().unwrap();

    let mut seen = values(&view);
    seen.sort();
    let mut expected: Vec<i64> = view.source().snapshot().iter().map(value_of).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_panicking_filter_isolates_item() {
    let list = list_of(&[1, 2]);
    let view = CollectionView::builder(list.clone())
        .filter(Filter::new(|r: &Record| {
            if r.get("v").as_int() == Some(13) {
                panic!("unlucky item");
            }
            true
        }))
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    list.push(record(13));
    list.push(record(3));
    assert_eq!(values(&view), vec![1, 2, 3]);

    let diagnostics = recorder.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(&diagnostics[0], Diagnostic::PredicateFault { message, .. } if message == "unlucky item"));
}

#[test]
fn test_sort_assisted_source_sorts_itself() {
    let list = Arc::new(SortedList::new(vec![record(3), record(1), record(2)]));
    let view = CollectionView::builder(list.clone())
        .sort(vec![SortDescription::ascending("v")])
        .build()
        .unwrap();
    assert_eq!(values(&view), vec![1, 2, 3]);
    assert_eq!(list.snapshot().iter().map(value_of).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(!view.can_custom_sort());
    assert_eq!(
        view.set_custom_sort(CustomSort::new(|_: &Record, _: &Record| Ordering::Equal)),
        Err(ViewError::Configuration(ConfigurationError::CustomSortNotSupported))
    );

    list.add(record(0));
    assert_eq!(values(&view), vec![0, 1, 2, 3]);

    let one = view.item_at(1).unwrap();
    list.set_property(&one, "v", 9);
    assert_eq!(values(&view), vec![0, 2, 3, 9]);

    view.set_sort_descriptions(vec![SortDescription::descending("v")]).unwrap();
    assert_eq!(values(&view), vec![9, 3, 2, 0]);
    view.check_invariants().unwrap();
}

#[test]
fn test_plain_source_changes_are_resets() {
    let list = Arc::new(PlainList::new(vec![record(2), record(1)]));
    let view = CollectionView::builder(list.clone())
        .sort(vec![SortDescription::ascending("v")])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    list.push(record(0));
    assert_eq!(values(&view), vec![0, 1, 2]);
    assert_eq!(recorder.collection().len(), 1);
    assert_eq!(recorder.resets(), 1);
}

#[test]
fn test_lookup_by_key_identity() {
    let list = Arc::new(ObservableList::new(vec![
        Record::new().with("id", "a").with("v", 2),
        Record::new().with("id", "b").with("v", 1),
    ]));
    let view = CollectionView::builder(list.clone())
        .identity_key(|r: &Record| horizon_views::ItemKey::from_hash(&r.get("id").to_string()))
        .sort(vec![SortDescription::ascending("v")])
        .build()
        .unwrap();

    let b = horizon_views::ItemKey::from_hash(&"b".to_string());
    assert_eq!(view.index_of_key(b), Some(0));
    // An equal record in a different allocation is the same item.
    let lookalike = Arc::new(Record::new().with("id", "a"));
    assert_eq!(view.index_of(&lookalike), Some(1));
    assert!(view.contains(&lookalike));
    assert_eq!(view.entry_at(1).unwrap().source_index, 0);
}
