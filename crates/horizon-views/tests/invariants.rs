//! Randomized source edits against a live filtered, sorted, grouped view.

mod common;

use std::sync::Arc;

use common::*;
use horizon_views::{
    CollectionView, Filter, GroupDescription, ObservableList, Record, SortDescription, Value, ViewConfig,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn not_multiple_of_three() -> Filter<Record> {
    Filter::on_property("v", |v: &Value| v.as_int().is_some_and(|n| n % 3 != 0))
}

fn parity() -> GroupDescription<Record> {
    GroupDescription::by_selector(|r: &Record| Value::Int(r.get("v").as_int().unwrap_or(0).rem_euclid(2)))
        .watching(["v"])
}

/// What the view should show, computed from scratch.
fn expected(list: &ObservableList<Record>, grouped: bool) -> Vec<i64> {
    let mut kept: Vec<(i64, i64, usize)> = list
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| (value_of(item), index))
        .filter(|(v, _)| v % 3 != 0)
        .map(|(v, index)| (if grouped { v.rem_euclid(2) } else { 0 }, v, index))
        .collect();
    kept.sort();
    kept.into_iter().map(|(_, v, _)| v).collect()
}

fn build(list: &Arc<ObservableList<Record>>, grouped: bool) -> Arc<CollectionView<Record>> {
    let builder = CollectionView::builder(list.clone())
        .config(ViewConfig::new().live_shaping())
        .filter(not_multiple_of_three())
        .sort(vec![SortDescription::ascending("v")]);
    let builder = if grouped { builder.group_by(vec![parity()]) } else { builder };
    builder.build().unwrap()
}

fn step(rng: &mut SmallRng, list: &ObservableList<Record>, view: &CollectionView<Record>) {
    let len = list.len();
    match rng.gen_range(0..7) {
        0 => {
            list.insert(rng.gen_range(0..=len), record(rng.gen_range(0..40)));
        }
        1 if len > 0 => {
            list.remove(rng.gen_range(0..len));
        }
        2 if len > 0 => {
            list.replace(rng.gen_range(0..len), record(rng.gen_range(0..40)));
        }
        3 if len > 0 => {
            list.move_item(rng.gen_range(0..len), rng.gen_range(0..len));
        }
        4 if len > 0 => {
            let item = list.items()[rng.gen_range(0..len)].clone();
            list.set_property(&item, "v", rng.gen_range(0..40));
        }
        5 => {
            let position = rng.gen_range(-1..=view.count() as isize);
            view.move_current_to_position(position).unwrap();
        }
        6 => {
            let _deferred = view.defer_refresh().unwrap();
            for _ in 0..3 {
                list.push(record(rng.gen_range(0..40)));
            }
            if list.len() > 4 {
                list.remove(0);
            }
        }
        _ => {}
    }
}

fn run(seed: u64, grouped: bool) {
    // RUST_LOG=horizon_views=trace shows every step.
    let _log = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .set_default();
    let mut rng = SmallRng::seed_from_u64(seed);
    let list = list_of(&(0..12).map(|_| rng.gen_range(0..40)).collect::<Vec<_>>());
    let view = build(&list, grouped);

    for round in 0..250 {
        step(&mut rng, &list, &view);
        if let Err(problem) = view.check_invariants() {
            panic!("seed {seed}, round {round}: {problem}");
        }
        assert_eq!(values(&view), expected(&list, grouped), "seed {seed}, round {round}");
        if let Some(current) = view.current_item() {
            assert!(view.contains(&current), "seed {seed}, round {round}: current item not shown");
        }
        if grouped {
            assert_eq!(view.groups().unwrap().item_count(), view.count());
        }
    }
}

#[test]
fn test_random_edits_keep_view_consistent() {
    for seed in 0..6 {
        run(seed, false);
    }
}

#[test]
fn test_random_edits_keep_grouped_view_consistent() {
    for seed in 100..106 {
        run(seed, true);
    }
}

#[test]
fn test_random_edits_match_a_fresh_view() {
    let mut rng = SmallRng::seed_from_u64(7);
    let list = list_of(&[5, 8, 1, 13, 2]);
    let live = build(&list, true);
    for _ in 0..200 {
        step(&mut rng, &list, &live);
    }
    let fresh = build(&list, true);
    let live_items = live.items();
    let fresh_items = fresh.items();
    assert_eq!(live_items.len(), fresh_items.len());
    assert!(live_items.iter().zip(&fresh_items).all(|(a, b)| Arc::ptr_eq(a, b)));
}
