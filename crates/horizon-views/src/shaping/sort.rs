//! Sort descriptions, custom comparators and the guarded sort.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::item::ViewItem;
use crate::value::Collation;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListSortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl ListSortDirection {
    /// Applies the direction to an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            ListSortDirection::Ascending => ordering,
            ListSortDirection::Descending => ordering.reverse(),
        }
    }
}

/// One sort key: a property, a direction and a string collation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortDescription {
    /// Property to compare.
    pub property: String,
    /// Direction.
    pub direction: ListSortDirection,
    /// How string values compare.
    pub collation: Collation,
}

impl SortDescription {
    /// Creates a sort description.
    pub fn new(property: impl Into<String>, direction: ListSortDirection) -> Self {
        Self {
            property: property.into(),
            direction,
            collation: Collation::default(),
        }
    }

    /// Ascending by `property`.
    pub fn ascending(property: impl Into<String>) -> Self {
        Self::new(property, ListSortDirection::Ascending)
    }

    /// Descending by `property`.
    pub fn descending(property: impl Into<String>) -> Self {
        Self::new(property, ListSortDirection::Descending)
    }

    /// Sets the string collation.
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Compares two items by this key.
    pub fn compare<T: ViewItem + ?Sized>(&self, a: &T, b: &T) -> Ordering {
        let ordering = a
            .property(&self.property)
            .compare(&b.property(&self.property), self.collation);
        self.direction.apply(ordering)
    }
}

/// Compares two items by a chain of sort descriptions.
///
/// Ties on one key fall through to the next; items equal on every key
/// compare `Equal`.
pub fn compare_by_descriptions<T: ViewItem + ?Sized>(
    sorts: &[SortDescription],
    a: &T,
    b: &T,
) -> Ordering {
    sorts
        .iter()
        .map(|sort| sort.compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Type alias for custom comparators.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// A caller-supplied comparator plus the properties it reads.
pub struct CustomSort<T> {
    compare: CompareFn<T>,
    watched: Vec<String>,
}

impl<T> CustomSort<T> {
    /// Wraps a comparator with no declared dependencies.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
            watched: Vec::new(),
        }
    }

    /// Declares properties the comparator reads, for live sorting.
    pub fn watching<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched.extend(properties.into_iter().map(Into::into));
        self
    }

    /// Compares two items.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}

impl<T> Clone for CustomSort<T> {
    fn clone(&self) -> Self {
        Self {
            compare: self.compare.clone(),
            watched: self.watched.clone(),
        }
    }
}

/// The comparator a view orders its items with.
pub(crate) enum Sorter<T> {
    /// Source order.
    Unsorted,
    /// Chained sort descriptions.
    Descriptions(Vec<SortDescription>),
    /// Custom comparator.
    Custom(CustomSort<T>),
}

impl<T: ViewItem> Sorter<T> {
    pub(crate) fn compare(&self, a: &T, b: &T) -> Ordering {
        match self {
            Sorter::Unsorted => Ordering::Equal,
            Sorter::Descriptions(sorts) => compare_by_descriptions(sorts, a, b),
            Sorter::Custom(custom) => custom.compare(a, b),
        }
    }

    pub(crate) fn watches(&self, property: &str) -> bool {
        match self {
            Sorter::Unsorted => false,
            Sorter::Descriptions(sorts) => sorts.iter().any(|s| s.property == property),
            Sorter::Custom(custom) => custom.watched.iter().any(|p| p == property),
        }
    }

    pub(crate) fn is_sorted(&self) -> bool {
        !matches!(self, Sorter::Unsorted)
    }
}

/// Outcome of [`guarded_sort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SortReport {
    /// Comparator calls made.
    pub comparisons: usize,
    /// Length of the range that fell back to source order.
    pub fallback_len: usize,
}

/// Stable merge sort that tolerates inconsistent comparators.
///
/// After sorting, each element is checked against its successor and the
/// one after that. If any check fails, the smallest range covering all
/// failures is re-sorted by `fallback_key`, which must be a total order.
/// The comparator is called at most `n log n + 2n` times.
pub(crate) fn guarded_sort<I, C, K>(items: &mut [I], mut compare: C, mut fallback_key: K) -> SortReport
where
    I: Copy,
    C: FnMut(I, I) -> Ordering,
    K: FnMut(I) -> usize,
{
    let mut report = SortReport::default();
    merge_sort(items, &mut compare, &mut report.comparisons);

    let mut conflict: Option<(usize, usize)> = None;
    let mut widen = |lo: usize, hi: usize| {
        conflict = Some(match conflict {
            Some((l, h)) => (l.min(lo), h.max(hi)),
            None => (lo, hi),
        });
    };
    for i in 1..items.len() {
        report.comparisons += 1;
        if compare(items[i - 1], items[i]) == Ordering::Greater {
            widen(i - 1, i);
        }
        if i >= 2 {
            report.comparisons += 1;
            if compare(items[i - 2], items[i]) == Ordering::Greater {
                widen(i - 2, i);
            }
        }
    }

    if let Some((lo, hi)) = conflict {
        items[lo..=hi].sort_by_key(|&item| fallback_key(item));
        report.fallback_len = hi - lo + 1;
    }
    report
}

fn merge_sort<I, C>(slice: &mut [I], compare: &mut C, comparisons: &mut usize)
where
    I: Copy,
    C: FnMut(I, I) -> Ordering,
{
    let len = slice.len();
    if len < 2 {
        return;
    }
    let mut items = slice.to_vec();
    let mut buffer = items.clone();
    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            merge(
                &items[start..mid],
                &items[mid..end],
                &mut buffer[start..end],
                compare,
                comparisons,
            );
            start += 2 * width;
        }
        std::mem::swap(&mut items, &mut buffer);
        width *= 2;
    }
    slice.copy_from_slice(&items);
}

fn merge<I, C>(left: &[I], right: &[I], out: &mut [I], compare: &mut C, comparisons: &mut usize)
where
    I: Copy,
    C: FnMut(I, I) -> Ordering,
{
    let (mut l, mut r) = (0, 0);
    for slot in out.iter_mut() {
        let take_right = if l == left.len() {
            true
        } else if r == right.len() {
            false
        } else {
            *comparisons += 1;
            compare(right[r], left[l]) == Ordering::Less
        };
        if take_right {
            *slot = right[r];
            r += 1;
        } else {
            *slot = left[l];
            l += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Record;

    #[test]
    fn test_guarded_sort_is_stable() {
        let keys = [3, 1, 2, 1, 3, 0];
        let mut ids: Vec<usize> = (0..keys.len()).collect();
        let report = guarded_sort(&mut ids, |a, b| keys[a].cmp(&keys[b]), |i| i);
        assert_eq!(ids, vec![5, 1, 3, 2, 0, 4]);
        assert_eq!(report.fallback_len, 0);
    }

    #[test]
    fn test_guarded_sort_cycle_falls_back_to_source_order() {
        // Rock-paper-scissors: 0 < 1 < 2 < 0.
        let beats = |a: usize, b: usize| match (a % 3, b % 3) {
            (x, y) if x == y => Ordering::Equal,
            (0, 1) | (1, 2) | (2, 0) => Ordering::Less,
            _ => Ordering::Greater,
        };
        let mut ids = vec![2, 0, 1];
        let report = guarded_sort(&mut ids, beats, |i| i);
        assert!(report.fallback_len > 0);
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_guarded_sort_random_comparator_terminates() {
        let mut state = 17u64;
        let mut ids: Vec<usize> = (0..200).collect();
        let report = guarded_sort(
            &mut ids,
            |_, _| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                match state >> 62 {
                    0 => Ordering::Less,
                    1 => Ordering::Equal,
                    _ => Ordering::Greater,
                }
            },
            |i| i,
        );
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..200).collect::<Vec<_>>());
        assert!(report.comparisons <= 200 * 8 + 400);
    }

    #[test]
    fn test_descriptions_chain() {
        let a = Record::new().with("last", "Smith").with("first", "Ann");
        let b = Record::new().with("last", "Smith").with("first", "Bob");
        let c = Record::new().with("last", "Jones").with("first", "Cy");
        let sorts = vec![SortDescription::ascending("last"), SortDescription::descending("first")];
        assert_eq!(compare_by_descriptions(&sorts, &a, &b), Ordering::Greater);
        assert_eq!(compare_by_descriptions(&sorts, &c, &a), Ordering::Less);
        assert_eq!(compare_by_descriptions(&sorts, &a, &a), Ordering::Equal);
    }
}
