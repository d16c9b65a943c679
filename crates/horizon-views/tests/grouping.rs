//! Group trees and live regrouping.

mod common;

use std::sync::Arc;

use common::*;
use horizon_views::{
    CollectionView, Diagnostic, Filter, GroupChange, GroupDescription, GroupKey, GroupTreeDebug, ObservableList,
    Record, SortDescription, TreeFormatOptions, TreeStyle, Value, ViewChange, ViewConfig,
};

fn parity() -> GroupDescription<Record> {
    GroupDescription::by_selector(|r: &Record| Value::Int(r.get("v").as_int().unwrap_or(0).rem_euclid(2)))
        .watching(["v"])
}

fn group_values(root: &horizon_views::GroupNode<Record>, key: i64) -> Vec<i64> {
    root.find(&[Value::Int(key)])
        .map(|group| group.items().map(value_of).collect())
        .unwrap_or_default()
}

#[test]
fn test_parity_groups_scenario() {
    let list = list_of(&[1, 2, 3, 4]);
    let view = CollectionView::builder(list.clone())
        .group_by(vec![parity()])
        .build()
        .unwrap();

    let root = view.groups().unwrap();
    assert_eq!(root.item_count(), 4);
    let keys: Vec<GroupKey> = root.subgroups().filter_map(|g| g.key().cloned()).collect();
    assert_eq!(keys, vec![GroupKey::from(0i64), GroupKey::from(1i64)]);
    assert_eq!(group_values(&root, 0), vec![2, 4]);
    assert_eq!(group_values(&root, 1), vec![1, 3]);
    assert_eq!(values(&view), vec![2, 4, 1, 3]);

    let recorder = Recorder::attach(&view);
    list.remove(3);
    let root = view.groups().unwrap();
    let even = root.find(&[Value::Int(0)]).unwrap();
    assert_eq!(even.item_count(), 1);
    assert_eq!(group_values(&root, 0), vec![2]);
    assert_eq!(
        recorder.groups(),
        vec![GroupChange::ItemRemoved {
            path: vec![GroupKey::from(0i64)],
            removed: vec![],
        }]
    );
    view.check_invariants().unwrap();
}

#[test]
fn test_empty_group_is_removed() {
    let list = list_of(&[1, 2, 3]);
    let view = CollectionView::builder(list.clone())
        .group_by(vec![parity()])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    list.remove(1);
    assert!(view.groups().unwrap().find(&[Value::Int(0)]).is_none());
    assert_eq!(
        recorder.groups(),
        vec![GroupChange::ItemRemoved {
            path: vec![GroupKey::from(0i64)],
            removed: vec![vec![GroupKey::from(0i64)]],
        }]
    );

    list.push(record(8));
    assert_eq!(
        recorder.groups()[1],
        GroupChange::ItemAdded {
            path: vec![GroupKey::from(0i64)],
            created: vec![vec![GroupKey::from(0i64)]],
        }
    );
}

#[test]
fn test_live_regroup_is_one_notification() {
    let list = list_of(&[1, 2, 3, 4]);
    let view = CollectionView::builder(list.clone())
        .config(ViewConfig::new().live_grouping(true))
        .group_by(vec![parity()])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    let one = list.items()[0].clone();
    list.set_property(&one, "v", 6);

    assert_eq!(
        recorder.groups(),
        vec![GroupChange::ItemRegrouped {
            from: vec![GroupKey::from(1i64)],
            to: vec![GroupKey::from(0i64)],
            created: vec![],
            removed: vec![],
        }]
    );
    let changes = recorder.collection();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], ViewChange::Moved { old_index: 2, new_index: 0, item } if Arc::ptr_eq(item, &one)));

    let root = view.groups().unwrap();
    assert_eq!(group_values(&root, 0), vec![6, 2, 4]);
    assert_eq!(group_values(&root, 1), vec![3]);
    view.check_invariants().unwrap();
}

#[test]
fn test_exclusion_takes_precedence_over_regroup() {
    let list = list_of(&[1, 2, 3]);
    let view = CollectionView::builder(list.clone())
        .config(ViewConfig::new().live_filtering(true).live_grouping(true))
        .filter(Filter::on_property("v", |v: &Value| v.as_int().is_some_and(|n| n < 10)))
        .group_by(vec![parity()])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    let three = list.items()[2].clone();
    list.set_property(&three, "v", 12);

    let groups = recorder.groups();
    assert_eq!(groups.len(), 1);
    assert!(matches!(&groups[0], GroupChange::ItemRemoved { path, .. } if path == &vec![GroupKey::from(1i64)]));
    let changes = recorder.collection();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], ViewChange::Removed { .. }));
    assert_eq!(values(&view), vec![2, 1]);
}

#[test]
fn test_failing_selector_uses_ungroupable_bucket() {
    let list = list_of(&[1, 2]);
    let selector = GroupDescription::by_selector(|r: &Record| {
        let v = r.get("v").as_int().unwrap_or(0);
        assert_ne!(v, 13, "selector rejects 13");
        Value::Int(v % 2)
    });
    let view = CollectionView::builder(list.clone())
        .group_by(vec![selector])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    list.push(record(13));
    let root = view.groups().unwrap();
    let last = root.subgroups().last().unwrap();
    assert_eq!(last.key(), Some(&GroupKey::Ungroupable));
    assert_eq!(last.items().map(value_of).collect::<Vec<_>>(), vec![13]);
    assert_eq!(values(&view), vec![2, 1, 13]);
    assert!(matches!(&recorder.diagnostics()[0], Diagnostic::SelectorFault { level: 0, .. }));
}

#[test]
fn test_group_order_follows_sort_direction() {
    let list = Arc::new(ObservableList::new(vec![
        Record::new().with("team", "blue").with("v", 2),
        Record::new().with("team", "red").with("v", 1),
        Record::new().with("team", "blue").with("v", 1),
    ]));
    let view = CollectionView::builder(list)
        .sort(vec![SortDescription::descending("team"), SortDescription::ascending("v")])
        .group_by(vec![GroupDescription::by_property("team")])
        .build()
        .unwrap();

    let root = view.groups().unwrap();
    let teams: Vec<String> = root.subgroups().filter_map(|g| g.key()).map(|k| k.to_string()).collect();
    assert_eq!(teams, ["red", "blue"]);
    assert_eq!(values(&view), vec![1, 1, 2]);
}

#[test]
fn test_explicit_group_comparer() {
    let list = list_of(&[1, 2, 3]);
    let view = CollectionView::builder(list)
        .group_by(vec![parity().with_comparer(|a: &Value, b: &Value| b.compare(a, Default::default()))])
        .build()
        .unwrap();
    assert_eq!(values(&view), vec![1, 3, 2]);
}

#[test]
fn test_pinned_group_names_survive_when_empty() {
    let list = Arc::new(ObservableList::new(vec![Record::new().with("team", "red").with("v", 1)]));
    let view = CollectionView::builder(list.clone())
        .group_by(vec![GroupDescription::by_property("team").with_group_names(["blue", "red", "green"])])
        .build()
        .unwrap();

    let root = view.groups().unwrap();
    let teams: Vec<String> = root.subgroups().filter_map(|g| g.key()).map(|k| k.to_string()).collect();
    assert_eq!(teams, ["blue", "green", "red"]);

    list.remove(0);
    let root = view.groups().unwrap();
    assert_eq!(root.subgroups().count(), 3);
    assert_eq!(root.item_count(), 0);
}

#[test]
fn test_nested_groups_and_debug_output() {
    let list = Arc::new(ObservableList::new(vec![
        Record::new().with("team", "red").with("v", 1),
        Record::new().with("team", "red").with("v", 2),
        Record::new().with("team", "blue").with("v", 3),
    ]));
    let view = CollectionView::builder(list)
        .group_by(vec![GroupDescription::by_property("team"), parity()])
        .build()
        .unwrap();

    let root = view.groups().unwrap();
    let red = root.find(&[Value::from("red")]).unwrap();
    assert_eq!(red.item_count(), 2);
    assert_eq!(red.subgroups().count(), 2);
    assert_eq!(values(&view), vec![3, 2, 1]);

    let options = TreeFormatOptions {
        style: TreeStyle::Ascii,
        ..TreeFormatOptions::default()
    };
    let text = GroupTreeDebug::with_options(&root, options).to_string();
    assert_eq!(text, "(root) (3)\n+-- blue (1)\n|  `-- 1 (1)\n`-- red (2)\n|  +-- 0 (1)\n|  `-- 1 (1)");
}

#[test]
fn test_clearing_grouping_emits_group_reset() {
    let list = list_of(&[1, 2]);
    let view = CollectionView::builder(list)
        .group_by(vec![parity()])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    view.clear_grouping().unwrap();
    assert!(view.groups().is_none());
    assert_eq!(recorder.groups(), vec![GroupChange::Reset]);
    assert_eq!(values(&view), vec![1, 2]);
}

#[test]
fn test_groups_can_outlive_their_items() {
    let list = list_of(&[1, 2, 3]);
    let view = CollectionView::builder(list.clone())
        .group_by(vec![parity().hides_if_empty(false)])
        .build()
        .unwrap();
    let recorder = Recorder::attach(&view);

    list.remove(1);
    let root = view.groups().unwrap();
    assert_eq!(root.find(&[Value::Int(0)]).unwrap().item_count(), 0);
    assert_eq!(
        recorder.groups(),
        vec![GroupChange::ItemRemoved {
            path: vec![GroupKey::from(0i64)],
            removed: vec![],
        }]
    );
    view.check_invariants().unwrap();
}

#[test]
fn test_inconsistent_comparator_keeps_groups_contiguous() {
    let list = list_of(&[2, 0, 1, 4, 5, 3, 8, 6, 7, 10, 9, 11]);
    let view = CollectionView::builder(list)
        .group_by(vec![parity()])
        .custom_sort(horizon_views::CustomSort::new(|_: &Record, _: &Record| std::cmp::Ordering::Greater))
        .build()
        .unwrap();
    view.check_invariants().unwrap();

    let root = view.groups().unwrap();
    assert_eq!(group_values(&root, 0), vec![2, 0, 4, 8, 6, 10]);
    assert_eq!(group_values(&root, 1), vec![1, 5, 3, 7, 9, 11]);
    assert_eq!(values(&view), vec![2, 0, 4, 8, 6, 10, 1, 5, 3, 7, 9, 11]);

    let recorder = Recorder::attach(&view);
    view.refresh().unwrap();
    assert!(recorder
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::InconsistentComparator { .. })));
    view.check_invariants().unwrap();
}
