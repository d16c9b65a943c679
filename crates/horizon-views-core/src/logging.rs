//! Logging and debugging facilities for Horizon Views.
//!
//! This module provides:
//! - Stable `tracing` targets and span names for filtering
//! - Tree formatting primitives used by the group tree debug output
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! Horizon Views uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_views=debug")
//!         .init();
//! }
//! ```

/// Span names used throughout Horizon Views for tracing.
pub mod span_names {
    /// Full filter/sort/group pass over the source.
    pub const REFRESH: &str = "horizon_views::refresh";
    /// Incremental application of one source change.
    pub const SOURCE_CHANGE: &str = "horizon_views::source_change";
    /// Live re-evaluation of a single item.
    pub const RESHAPE: &str = "horizon_views::reshape";
    /// Notification delivery.
    pub const DISPATCH: &str = "horizon_views::dispatch";
}

/// Target names for log filtering.
pub mod targets {
    /// Core target.
    pub const CORE: &str = "horizon_views_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_views_core::signal";
    /// View pipeline target.
    pub const VIEW: &str = "horizon_views::view";
    /// Source adapter target.
    pub const SOURCE: &str = "horizon_views::source";
    /// Filtering and sorting target.
    pub const SHAPING: &str = "horizon_views::shaping";
    /// Grouping engine target.
    pub const GROUPING: &str = "horizon_views::grouping";
    /// Add-new/edit transactions target.
    pub const EDIT: &str = "horizon_views::edit";
    /// Current-item navigation target.
    pub const CURRENCY: &str = "horizon_views::currency";
    /// Performance spans target.
    pub const PERF: &str = "horizon_views::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact dash-prefixed representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show item counts next to nodes.
    pub show_counts: bool,
    /// Whether to list leaf items under their nodes.
    pub show_items: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_counts: true,
            show_items: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_items: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_counts: false,
            show_items: false,
            ..Default::default()
        }
    }

    /// Build the prefix string for a tree node at `depth`.
    pub fn node_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            for _ in 0..self.indent_size {
                prefix.push(' ');
            }
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to time full pipeline passes.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_views::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
