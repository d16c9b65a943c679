//! Multi-level grouping.
//!
//! Groups live in an arena keyed by [`GroupId`]; a group refers to its parent
//! and subgroups by id. Only counts are stored per group: the items of a
//! leaf group are the contiguous run of the view's ordered entries that
//! share its path, so the view order is the single source of truth.

use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::item::ViewItem;
use crate::shaping::filter::panic_message;
use crate::shaping::{ListSortDirection, SortDescription};
use crate::value::{Collation, Value};

new_key_type! {
    /// Arena key of a group.
    pub struct GroupId;
}

/// Name of a group at one level.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// A selector result.
    Value(Value),
    /// The reserved bucket for items whose selector failed.
    Ungroupable,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Value(value) => write!(f, "{value}"),
            GroupKey::Ungroupable => write!(f, "(ungroupable)"),
        }
    }
}

macro_rules! impl_group_key_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for GroupKey {
                fn from(value: $ty) -> Self {
                    GroupKey::Value(value.into())
                }
            }
        )*
    };
}

impl_group_key_from!(Value, bool, i32, i64, f64, &str, String);

/// Keys from the top level down to a group.
pub type GroupPath = Vec<GroupKey>;

/// Type alias for custom group selectors.
pub type SelectorFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Type alias for group name comparators.
pub type GroupCompareFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

enum Selector<T> {
    Property(String),
    Custom { select: SelectorFn<T>, watched: Vec<String> },
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        match self {
            Selector::Property(name) => Selector::Property(name.clone()),
            Selector::Custom { select, watched } => Selector::Custom {
                select: select.clone(),
                watched: watched.clone(),
            },
        }
    }
}

/// How items are bucketed at one grouping level.
///
/// # Example
///
/// ```
/// use horizon_views::{GroupDescription, Record, Value};
///
/// let by_team = GroupDescription::<Record>::by_property("team")
///     .with_group_names(["red", "blue"]);
/// let by_parity = GroupDescription::<Record>::by_selector(|r| {
///     Value::Int(r.get("n").as_int().unwrap_or(0) % 2)
/// })
/// .watching(["n"]);
/// assert_eq!(by_team.property(), Some("team"));
/// assert_eq!(by_parity.property(), None);
/// ```
pub struct GroupDescription<T> {
    selector: Selector<T>,
    collation: Collation,
    compare: Option<GroupCompareFn>,
    group_names: Vec<Value>,
    hides_if_empty: bool,
}

impl<T> Clone for GroupDescription<T> {
    fn clone(&self) -> Self {
        Self {
            selector: self.selector.clone(),
            collation: self.collation,
            compare: self.compare.clone(),
            group_names: self.group_names.clone(),
            hides_if_empty: self.hides_if_empty,
        }
    }
}

impl<T> fmt::Debug for GroupDescription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selector = match &self.selector {
            Selector::Property(name) => name.as_str(),
            Selector::Custom { .. } => "<custom>",
        };
        f.debug_struct("GroupDescription")
            .field("selector", &selector)
            .field("collation", &self.collation)
            .field("group_names", &self.group_names)
            .field("hides_if_empty", &self.hides_if_empty)
            .finish_non_exhaustive()
    }
}

impl<T: ViewItem> GroupDescription<T> {
    /// Groups by the value of a property.
    pub fn by_property(property: impl Into<String>) -> Self {
        Self::with_selector(Selector::Property(property.into()))
    }

    /// Groups by a custom selector.
    pub fn by_selector<F>(select: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self::with_selector(Selector::Custom {
            select: Arc::new(select),
            watched: Vec::new(),
        })
    }

    fn with_selector(selector: Selector<T>) -> Self {
        Self {
            selector,
            collation: Collation::default(),
            compare: None,
            group_names: Vec::new(),
            hides_if_empty: true,
        }
    }

    /// Declares properties a custom selector reads, for live grouping.
    pub fn watching<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut self.selector {
            Selector::Property(_) => {}
            Selector::Custom { watched, .. } => {
                watched.extend(properties.into_iter().map(Into::into));
            }
        }
        self
    }

    /// Sets the collation used to order group names.
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Orders sibling groups with an explicit comparator.
    pub fn with_comparer<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.compare = Some(Arc::new(compare));
        self
    }

    /// Pre-declares groups that exist even while empty.
    pub fn with_group_names<I, V>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.group_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether groups at this level disappear when their last item leaves.
    pub fn hides_if_empty(mut self, hides: bool) -> Self {
        self.hides_if_empty = hides;
        self
    }

    /// The grouped property, for property-based descriptions.
    pub fn property(&self) -> Option<&str> {
        match &self.selector {
            Selector::Property(name) => Some(name),
            Selector::Custom { .. } => None,
        }
    }

    /// Whether a change to `property` can move items between groups.
    pub fn watches(&self, property: &str) -> bool {
        match &self.selector {
            Selector::Property(name) => name == property,
            Selector::Custom { watched, .. } => watched.iter().any(|p| p == property),
        }
    }

    fn select(&self, item: &T) -> Result<Value, String> {
        panic::catch_unwind(AssertUnwindSafe(|| match &self.selector {
            Selector::Property(name) => item.property(name),
            Selector::Custom { select, .. } => select(item),
        }))
        .map_err(panic_message)
    }
}

/// A selector panicked while computing a group path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectorFault {
    pub level: usize,
    pub message: String,
}

#[derive(Debug)]
pub(crate) struct Group {
    pub key: GroupKey,
    pub parent: Option<GroupId>,
    pub depth: usize,
    pub subgroups: Vec<GroupId>,
    pub item_count: usize,
    pub pinned: bool,
}

/// Group descriptions plus the live group tree they produce.
pub(crate) struct Grouping<T> {
    descriptions: Vec<GroupDescription<T>>,
    directions: Vec<ListSortDirection>,
    groups: SlotMap<GroupId, Group>,
    root: GroupId,
}

impl<T: ViewItem> Default for Grouping<T> {
    fn default() -> Self {
        let mut groups = SlotMap::with_key();
        let root = groups.insert(Group {
            key: GroupKey::Ungroupable,
            parent: None,
            depth: 0,
            subgroups: Vec::new(),
            item_count: 0,
            pinned: true,
        });
        Self {
            descriptions: Vec::new(),
            directions: Vec::new(),
            groups,
            root,
        }
    }
}

impl<T: ViewItem> Grouping<T> {
    pub fn is_active(&self) -> bool {
        !self.descriptions.is_empty()
    }

    pub fn descriptions(&self) -> &[GroupDescription<T>] {
        &self.descriptions
    }

    pub fn set_descriptions(&mut self, descriptions: Vec<GroupDescription<T>>, sorts: &[SortDescription]) {
        self.descriptions = descriptions;
        self.update_directions(sorts);
    }

    /// Sibling order follows a sort description on the same property.
    pub fn update_directions(&mut self, sorts: &[SortDescription]) {
        self.directions = self
            .descriptions
            .iter()
            .map(|desc| {
                desc.property()
                    .and_then(|p| sorts.iter().find(|s| s.property == p))
                    .map_or(ListSortDirection::Ascending, |s| s.direction)
            })
            .collect();
    }

    pub fn watches(&self, property: &str) -> bool {
        self.descriptions.iter().any(|d| d.watches(property))
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Empties the tree, keeping only pre-declared groups.
    pub fn reset(&mut self) {
        self.groups.clear();
        self.root = self.groups.insert(Group {
            key: GroupKey::Ungroupable,
            parent: None,
            depth: 0,
            subgroups: Vec::new(),
            item_count: 0,
            pinned: true,
        });
        let mut created = Vec::new();
        self.create_pinned_children(self.root, &mut created);
    }

    /// Computes an item's group path. A failing selector yields the
    /// top-level ungroupable bucket.
    pub fn compute_path(&self, item: &T) -> Result<GroupPath, (GroupPath, SelectorFault)> {
        let mut path = GroupPath::with_capacity(self.descriptions.len());
        for (level, desc) in self.descriptions.iter().enumerate() {
            match desc.select(item) {
                Ok(value) => path.push(GroupKey::Value(value)),
                Err(message) => {
                    return Err((vec![GroupKey::Ungroupable], SelectorFault { level, message }));
                }
            }
        }
        Ok(path)
    }

    pub fn compare_keys(&self, level: usize, a: &GroupKey, b: &GroupKey) -> Ordering {
        match (a, b) {
            (GroupKey::Ungroupable, GroupKey::Ungroupable) => Ordering::Equal,
            (GroupKey::Ungroupable, _) => Ordering::Greater,
            (_, GroupKey::Ungroupable) => Ordering::Less,
            (GroupKey::Value(a), GroupKey::Value(b)) => match self.descriptions.get(level) {
                Some(desc) => match &desc.compare {
                    Some(compare) => compare(a, b),
                    None => {
                        let direction = self.directions.get(level).copied().unwrap_or_default();
                        direction.apply(a.compare(b, desc.collation))
                    }
                },
                None => a.compare(b, Collation::Ordinal),
            },
        }
    }

    pub fn compare_paths(&self, a: &[GroupKey], b: &[GroupKey]) -> Ordering {
        a.iter()
            .zip(b)
            .enumerate()
            .map(|(level, (ka, kb))| self.compare_keys(level, ka, kb))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len()))
    }

    /// Adds one item under `path`, creating missing groups.
    ///
    /// Returns the leaf group and the paths of groups created on the way.
    pub fn add(&mut self, path: &[GroupKey]) -> (GroupId, Vec<GroupPath>) {
        let mut created = Vec::new();
        let mut current = self.root;
        for (level, key) in path.iter().enumerate() {
            current = match self.find_child(current, level, key) {
                Ok(position) => self.groups[current].subgroups[position],
                Err(position) => {
                    let child = self.groups.insert(Group {
                        key: key.clone(),
                        parent: Some(current),
                        depth: level + 1,
                        subgroups: Vec::new(),
                        item_count: 0,
                        pinned: false,
                    });
                    self.groups[current].subgroups.insert(position, child);
                    created.push(path[..=level].to_vec());
                    if level + 1 < path.len() {
                        self.create_pinned_children(child, &mut created);
                    }
                    child
                }
            };
        }

        let mut cursor = Some(current);
        while let Some(id) = cursor {
            let group = &mut self.groups[id];
            group.item_count += 1;
            cursor = group.parent;
        }
        (current, created)
    }

    /// Removes one item from `leaf`, pruning groups that became empty.
    ///
    /// Returns the paths of removed groups, deepest first.
    pub fn remove(&mut self, leaf: GroupId) -> Vec<GroupPath> {
        let mut cursor = Some(leaf);
        while let Some(id) = cursor {
            let Some(group) = self.groups.get_mut(id) else {
                break;
            };
            group.item_count = group.item_count.saturating_sub(1);
            cursor = group.parent;
        }

        let mut removed = Vec::new();
        let mut current = leaf;
        while let Some(group) = self.groups.get(current) {
            let Some(parent) = group.parent else {
                break;
            };
            if group.item_count > 0 || group.pinned || !self.hides_if_empty(group) {
                break;
            }
            removed.push(self.path_of(current));
            self.groups[parent].subgroups.retain(|&child| child != current);
            self.remove_subtree(current);
            current = parent;
        }
        removed
    }

    pub fn path_of(&self, id: GroupId) -> GroupPath {
        let mut path = GroupPath::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(group) = self.groups.get(current) else {
                break;
            };
            if group.parent.is_some() {
                path.push(group.key.clone());
            }
            cursor = group.parent;
        }
        path.reverse();
        path
    }

    /// Builds a read-only tree over `items`, the grouped entries in view order.
    pub fn snapshot(&self, items: &[Arc<T>]) -> GroupNode<T> {
        let mut offset = 0;
        self.snapshot_node(self.root, items, &mut offset)
    }

    fn snapshot_node(&self, id: GroupId, items: &[Arc<T>], offset: &mut usize) -> GroupNode<T> {
        let group = &self.groups[id];
        let children = if group.subgroups.is_empty() {
            let start = (*offset).min(items.len());
            let end = (start + group.item_count).min(items.len());
            *offset = end;
            items[start..end].iter().cloned().map(GroupChild::Item).collect()
        } else {
            group
                .subgroups
                .iter()
                .map(|&child| GroupChild::Group(self.snapshot_node(child, items, offset)))
                .collect()
        };
        GroupNode {
            key: group.parent.map(|_| group.key.clone()),
            path: self.path_of(id),
            item_count: group.item_count,
            children,
        }
    }

    /// Depth-first rank of every leaf group, the order their items take in the view.
    pub fn leaf_ranks(&self) -> SecondaryMap<GroupId, usize> {
        let mut ranks = SecondaryMap::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let group = &self.groups[id];
            if group.subgroups.is_empty() {
                let rank = ranks.len();
                ranks.insert(id, rank);
            } else {
                stack.extend(group.subgroups.iter().rev());
            }
        }
        ranks
    }

    /// Checks that every group's count equals the sum of its subgroups.
    pub fn validate(&self) -> Result<(), String> {
        for (id, group) in &self.groups {
            if group.subgroups.is_empty() {
                continue;
            }
            let sum: usize = group
                .subgroups
                .iter()
                .map(|&child| self.groups.get(child).map_or(0, |g| g.item_count))
                .sum();
            if sum != group.item_count {
                return Err(format!(
                    "group {:?} counts {} but its subgroups hold {}",
                    self.path_of(id),
                    group.item_count,
                    sum
                ));
            }
        }
        Ok(())
    }

    fn hides_if_empty(&self, group: &Group) -> bool {
        match group.key {
            GroupKey::Ungroupable => true,
            GroupKey::Value(_) => self
                .descriptions
                .get(group.depth.saturating_sub(1))
                .is_none_or(|desc| desc.hides_if_empty),
        }
    }

    fn find_child(&self, parent: GroupId, level: usize, key: &GroupKey) -> Result<usize, usize> {
        self.groups[parent]
            .subgroups
            .binary_search_by(|&child| self.compare_keys(level, &self.groups[child].key, key))
    }

    fn create_pinned_children(&mut self, parent: GroupId, created: &mut Vec<GroupPath>) {
        let level = self.groups[parent].depth;
        let Some(desc) = self.descriptions.get(level) else {
            return;
        };
        let names = desc.group_names.clone();
        for name in names {
            let key = GroupKey::Value(name);
            let Err(position) = self.find_child(parent, level, &key) else {
                continue;
            };
            let child = self.groups.insert(Group {
                key,
                parent: Some(parent),
                depth: level + 1,
                subgroups: Vec::new(),
                item_count: 0,
                pinned: true,
            });
            self.groups[parent].subgroups.insert(position, child);
            created.push(self.path_of(child));
            self.create_pinned_children(child, created);
        }
    }

    fn remove_subtree(&mut self, id: GroupId) {
        if let Some(group) = self.groups.remove(id) {
            for child in group.subgroups {
                self.remove_subtree(child);
            }
        }
    }
}

/// Read-only snapshot of a group and its contents.
#[derive(Debug)]
pub struct GroupNode<T> {
    key: Option<GroupKey>,
    path: GroupPath,
    item_count: usize,
    children: Vec<GroupChild<T>>,
}

/// A child of a [`GroupNode`]: a subgroup or, in leaf groups, an item.
#[derive(Debug)]
pub enum GroupChild<T> {
    /// A nested group.
    Group(GroupNode<T>),
    /// An item of a leaf group.
    Item(Arc<T>),
}

impl<T> GroupNode<T> {
    /// The group name, `None` for the root.
    pub fn key(&self) -> Option<&GroupKey> {
        self.key.as_ref()
    }

    /// Keys from the top level down to this group.
    pub fn path(&self) -> &[GroupKey] {
        &self.path
    }

    /// Number of items in this group and its subgroups.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Subgroups or items, in view order.
    pub fn children(&self) -> &[GroupChild<T>] {
        &self.children
    }

    /// Direct subgroups.
    pub fn subgroups(&self) -> impl Iterator<Item = &GroupNode<T>> {
        self.children.iter().filter_map(|child| match child {
            GroupChild::Group(group) => Some(group),
            GroupChild::Item(_) => None,
        })
    }

    /// Direct items (non-empty only for leaf groups).
    pub fn items(&self) -> impl Iterator<Item = &Arc<T>> {
        self.children.iter().filter_map(|child| match child {
            GroupChild::Item(item) => Some(item),
            GroupChild::Group(_) => None,
        })
    }

    /// Finds a descendant by its group names.
    pub fn find(&self, names: &[Value]) -> Option<&GroupNode<T>> {
        let keys: GroupPath = names.iter().cloned().map(GroupKey::Value).collect();
        self.find_path(&keys)
    }

    /// Finds a descendant by its keys.
    pub fn find_path(&self, path: &[GroupKey]) -> Option<&GroupNode<T>> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        self.subgroups()
            .find(|group| group.key.as_ref() == Some(first))?
            .find_path(rest)
    }
}

/// A change to the group tree, delivered on `groups_changed`.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupChange {
    /// An item joined the group at `path`.
    ItemAdded {
        /// Leaf group the item joined.
        path: GroupPath,
        /// Groups created for it, outermost first.
        created: Vec<GroupPath>,
    },
    /// An item left the group at `path`.
    ItemRemoved {
        /// Leaf group the item left.
        path: GroupPath,
        /// Groups removed because they emptied, deepest first.
        removed: Vec<GroupPath>,
    },
    /// An item moved between groups in a single step.
    ItemRegrouped {
        /// Former leaf group.
        from: GroupPath,
        /// New leaf group.
        to: GroupPath,
        /// Groups created for the move.
        created: Vec<GroupPath>,
        /// Groups removed by the move.
        removed: Vec<GroupPath>,
    },
    /// The tree was rebuilt.
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Record;

    fn parity() -> GroupDescription<Record> {
        GroupDescription::by_selector(|r: &Record| Value::Int(r.get("n").as_int().unwrap_or(0) % 2))
            .watching(["n"])
    }

    fn key(n: i64) -> GroupKey {
        GroupKey::Value(Value::Int(n))
    }

    #[test]
    fn test_add_creates_and_remove_prunes() {
        let mut grouping = Grouping::<Record>::default();
        grouping.set_descriptions(vec![parity()], &[]);
        grouping.reset();

        let (odd, created) = grouping.add(&[key(1)]);
        assert_eq!(created, vec![vec![key(1)]]);
        let (_, created) = grouping.add(&[key(1)]);
        assert!(created.is_empty());
        let (even, _) = grouping.add(&[key(0)]);

        let root = grouping.root();
        let order: Vec<GroupKey> = grouping.get(root).unwrap().subgroups.iter()
            .map(|&g| grouping.get(g).unwrap().key.clone())
            .collect();
        assert_eq!(order, vec![key(0), key(1)]);

        assert!(grouping.remove(odd).is_empty());
        assert_eq!(grouping.remove(odd), vec![vec![key(1)]]);
        assert_eq!(grouping.get(root).unwrap().item_count, 1);
        assert!(grouping.get(even).is_some());
        assert!(grouping.validate().is_ok());
    }

    #[test]
    fn test_leaf_ranks_follow_group_order() {
        let mut grouping = Grouping::<Record>::default();
        grouping.set_descriptions(vec![parity(), parity()], &[]);
        grouping.reset();

        let (odd, _) = grouping.add(&[key(1), key(1)]);
        let (even, _) = grouping.add(&[key(0), key(0)]);
        let ranks = grouping.leaf_ranks();
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[even], 0);
        assert_eq!(ranks[odd], 1);
    }

    #[test]
    fn test_pinned_groups_survive_empty() {
        let mut grouping = Grouping::<Record>::default();
        grouping.set_descriptions(
            vec![GroupDescription::by_property("team").with_group_names(["red", "blue"])],
            &[],
        );
        grouping.reset();
        assert_eq!(grouping.get(grouping.root()).unwrap().subgroups.len(), 2);

        let (red, created) = grouping.add(&[GroupKey::from("red")]);
        assert!(created.is_empty());
        assert!(grouping.remove(red).is_empty());
        assert!(grouping.get(red).is_some());
    }

    #[test]
    fn test_selector_panic_routes_to_ungroupable() {
        let mut grouping = Grouping::<Record>::default();
        grouping.set_descriptions(
            vec![GroupDescription::by_selector(|_: &Record| -> Value { panic!("bad selector") })],
            &[],
        );
        let (path, fault) = grouping.compute_path(&Record::new()).unwrap_err();
        assert_eq!(path, vec![GroupKey::Ungroupable]);
        assert_eq!(fault.level, 0);
        assert_eq!(fault.message, "bad selector");
    }

    #[test]
    fn test_direction_follows_matching_sort() {
        let mut grouping = Grouping::<Record>::default();
        grouping.set_descriptions(
            vec![GroupDescription::by_property("n")],
            &[SortDescription::descending("n")],
        );
        assert_eq!(grouping.compare_keys(0, &key(1), &key(2)), Ordering::Greater);
        assert_eq!(grouping.compare_keys(0, &GroupKey::Ungroupable, &key(2)), Ordering::Greater);
    }

    #[test]
    fn test_multi_level_paths_and_snapshot() {
        let mut grouping = Grouping::<Record>::default();
        grouping.set_descriptions(
            vec![GroupDescription::by_property("a"), GroupDescription::by_property("b")],
            &[],
        );
        grouping.reset();
        grouping.add(&[key(1), key(2)]);
        grouping.add(&[key(1), key(3)]);
        grouping.add(&[key(2), key(2)]);
        assert!(grouping.validate().is_ok());

        let items: Vec<Arc<Record>> = (0..3).map(|_| Arc::new(Record::new())).collect();
        let root = grouping.snapshot(&items);
        assert_eq!(root.item_count(), 3);
        let inner = root.find(&[Value::Int(1), Value::Int(3)]).unwrap();
        assert_eq!(inner.item_count(), 1);
        assert!(Arc::ptr_eq(inner.items().next().unwrap(), &items[1]));
    }
}
