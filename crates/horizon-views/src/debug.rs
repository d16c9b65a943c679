//! Text rendering of group trees for logs and tests.

use std::fmt::{self, Write};

use horizon_views_core::TreeFormatOptions;

use crate::group::{GroupChild, GroupNode};
use crate::item::ViewItem;

/// Renders a [`GroupNode`] tree.
///
/// ```
/// use std::sync::Arc;
/// use horizon_views::{CollectionView, GroupDescription, GroupTreeDebug, ObservableList, Record};
///
/// let list = Arc::new(ObservableList::new(vec![
///     Record::new().with("kind", "a"),
///     Record::new().with("kind", "b"),
/// ]));
/// let view = CollectionView::new(list);
/// view.set_group_descriptions(vec![GroupDescription::by_property("kind")]).unwrap();
///
/// let root = view.groups().unwrap();
/// let text = GroupTreeDebug::new(&root).to_string();
/// assert!(text.contains("a (1)"));
/// ```
pub struct GroupTreeDebug<'a, T> {
    root: &'a GroupNode<T>,
    options: TreeFormatOptions,
}

impl<'a, T: ViewItem> GroupTreeDebug<'a, T> {
    /// Create a renderer with default options.
    pub fn new(root: &'a GroupNode<T>) -> Self {
        Self::with_options(root, TreeFormatOptions::default())
    }

    /// Create a renderer with custom options.
    pub fn with_options(root: &'a GroupNode<T>, options: TreeFormatOptions) -> Self {
        Self { root, options }
    }

    fn format_node(&self, node: &GroupNode<T>, depth: usize, is_last: bool, out: &mut String) -> fmt::Result {
        if let Some(max) = self.options.max_depth {
            if depth > max {
                return Ok(());
            }
        }

        out.push_str(&self.options.node_prefix(depth, is_last));
        match node.key() {
            Some(key) => write!(out, "{key}")?,
            None => out.push_str("(root)"),
        }
        if self.options.show_counts {
            write!(out, " ({})", node.item_count())?;
        }
        out.push('\n');

        let children = node.children();
        for (i, child) in children.iter().enumerate() {
            let child_is_last = i + 1 == children.len();
            match child {
                GroupChild::Group(group) => self.format_node(group, depth + 1, child_is_last, out)?,
                GroupChild::Item(item) if self.options.show_items => {
                    out.push_str(&self.options.node_prefix(depth + 1, child_is_last));
                    out.push_str(&item_label(&**item));
                    out.push('\n');
                }
                GroupChild::Item(_) => {}
            }
        }
        Ok(())
    }
}

impl<T: ViewItem> fmt::Display for GroupTreeDebug<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.format_node(self.root, 0, true, &mut out)?;
        f.write_str(out.trim_end())
    }
}

fn item_label<T: ViewItem>(item: &T) -> String {
    let names = item.property_names();
    if names.is_empty() {
        return item.property("").to_string();
    }
    let fields: Vec<String> = names
        .iter()
        .map(|name| format!("{name}={}", item.property(name)))
        .collect();
    format!("{{{}}}", fields.join(", "))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use horizon_views_core::TreeStyle;

    use super::*;
    use crate::group::{GroupDescription, Grouping};
    use crate::value::Value;

    #[test]
    fn test_renders_nested_groups_with_items() {
        let mut grouping = Grouping::<i64>::default();
        grouping.set_descriptions(
            vec![GroupDescription::by_selector(|n: &i64| Value::Int(n % 2))],
            &[],
        );
        grouping.reset();
        let items: Vec<Arc<i64>> = vec![Arc::new(2), Arc::new(1), Arc::new(3)];
        grouping.add(&[0i64.into()]);
        grouping.add(&[1i64.into()]);
        grouping.add(&[1i64.into()]);
        let root = grouping.snapshot(&items);

        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..TreeFormatOptions::detailed()
        };
        let text = GroupTreeDebug::with_options(&root, options).to_string();
        let expected = "(root) (3)\n+-- 0 (1)\n|  `-- 2\n`-- 1 (2)\n|  +-- 1\n|  `-- 3";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_max_depth_hides_items() {
        let mut grouping = Grouping::<i64>::default();
        grouping.set_descriptions(
            vec![GroupDescription::by_selector(|n: &i64| Value::Int(*n))],
            &[],
        );
        grouping.reset();
        grouping.add(&[5i64.into()]);
        let root = grouping.snapshot(&[Arc::new(5)]);
        let options = TreeFormatOptions {
            max_depth: Some(0),
            ..TreeFormatOptions::minimal()
        };
        assert_eq!(GroupTreeDebug::with_options(&root, options).to_string(), "(root)");
    }
}
