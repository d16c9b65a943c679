//! Filtering and ordering of view entries.
//!
//! The final view order is a single total order over entries:
//!
//! 1. group path, level by level, in group order;
//! 2. the sort comparator (sort descriptions or a custom comparator);
//! 3. source position.
//!
//! Because the last key is unique per entry, an entry's position can be
//! found by binary search, which is how single-item changes are applied
//! without re-sorting.

pub(crate) mod filter;
pub(crate) mod sort;

pub use filter::{Filter, FilterFn};
pub use sort::{compare_by_descriptions, CompareFn, CustomSort, ListSortDirection, SortDescription};

pub(crate) use sort::{guarded_sort, SortReport, Sorter};

use std::cmp::Ordering;

use crate::group::Grouping;
use crate::index_table::{EntryId, IndexTable};
use crate::item::ViewItem;

/// Borrowed view state needed to compare two entries.
pub(crate) struct OrderContext<'a, T> {
    pub table: &'a IndexTable<T>,
    pub sorter: &'a Sorter<T>,
    pub grouping: &'a Grouping<T>,
}

impl<T: ViewItem> OrderContext<'_, T> {
    pub fn compare(&self, a: EntryId, b: EntryId) -> Ordering {
        let (ea, eb) = (&self.table[a], &self.table[b]);
        self.grouping
            .compare_paths(&ea.group_path, &eb.group_path)
            .then_with(|| self.sorter.compare(&ea.item, &eb.item))
            .then_with(|| ea.source_index.cmp(&eb.source_index))
    }

    /// Position at which `id` belongs within `range` of the view order.
    ///
    /// `id` itself must not be in the view order.
    pub fn insertion_point(&self, id: EntryId, range: std::ops::Range<usize>) -> usize {
        let ids = &self.table.view_ids()[range.clone()];
        range.start + ids.partition_point(|&other| self.compare(other, id) == Ordering::Less)
    }

    /// Whether `id`, shown at `index`, is still ordered against its neighbours.
    pub fn is_in_place(&self, id: EntryId, index: usize, range: std::ops::Range<usize>) -> bool {
        let ids = self.table.view_ids();
        let before_ok = index <= range.start || self.compare(ids[index - 1], id) != Ordering::Greater;
        let after_ok = index + 1 >= range.end || self.compare(id, ids[index + 1]) != Ordering::Greater;
        before_ok && after_ok
    }
}
