//! Horizon Views - live collection views over mutable item sources.
//!
//! A [`CollectionView`] presents the items of an [`ItemSource`] filtered,
//! sorted and grouped, keeps that presentation up to date as the source
//! changes, tracks a current item, and runs add-new and edit transactions.
//!
//! - **Sources**: [`ObservableList`] (precise change notifications),
//!   [`PlainList`] (reset-only), [`SortedList`] (sorts itself)
//! - **Shaping**: [`Filter`], [`SortDescription`] / [`CustomSort`],
//!   [`GroupDescription`]
//! - **Live shaping**: items re-filter, re-sort and re-group when a watched
//!   property changes, see [`ViewConfig`]
//! - **Currency**: navigation with cancelable `current_changing`
//! - **Editing**: [`CollectionView::add_new`], [`CollectionView::edit_item`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_views::{
//!     CollectionView, Filter, GroupDescription, ObservableList, Record, SortDescription, ViewConfig, Value,
//! };
//!
//! let list = Arc::new(ObservableList::new(vec![
//!     Record::new().with("name", "pear").with("kind", "fruit").with("stock", 3),
//!     Record::new().with("name", "leek").with("kind", "vegetable").with("stock", 0),
//!     Record::new().with("name", "apple").with("kind", "fruit").with("stock", 5),
//! ]));
//!
//! let view = CollectionView::builder(list.clone())
//!     .config(ViewConfig::new().live_filtering(true))
//!     .filter(Filter::on_property("stock", |v: &Value| v.as_int().unwrap_or(0) > 0))
//!     .sort(vec![SortDescription::ascending("name")])
//!     .group_by(vec![GroupDescription::by_property("kind")])
//!     .build()
//!     .unwrap();
//!
//! let names: Vec<String> = view.items().iter().map(|r| r.get("name").to_string()).collect();
//! assert_eq!(names, ["apple", "pear"]);
//!
//! // Restocking the leek brings it into view.
//! let leek = list.items()[1].clone();
//! list.set_property(&leek, "stock", 4);
//! assert_eq!(view.count(), 3);
//! assert_eq!(view.groups().unwrap().subgroups().count(), 2);
//! ```

mod config;
mod debug;
mod edit;
mod error;
mod group;
mod index_table;
mod item;
mod navigator;
mod registry;
mod shaping;
mod signals;
mod source;
mod value;
mod view;

pub use config::{NewItemPlaceholderPosition, ViewConfig};
pub use debug::GroupTreeDebug;
pub use edit::{CommitOutcome, TransactionState};
pub use error::{ConfigurationError, Result, SourceError, TransactionConflict, ViewError};
pub use group::{
    GroupChange, GroupChild, GroupCompareFn, GroupDescription, GroupKey, GroupNode, GroupPath, SelectorFn,
};
pub use item::{Identity, ItemKey, KeyFn, Record, ViewItem};
pub use navigator::{CurrentChanged, CurrentChanging, CurrentPosition};
pub use registry::ViewRegistry;
pub use shaping::{
    compare_by_descriptions, CompareFn, CustomSort, Filter, FilterFn, ListSortDirection, SortDescription,
};
pub use signals::{Diagnostic, ViewChange, ViewSignals};
pub use source::{
    ItemSource, ObservableList, PlainList, PropertyChange, SortedList, SourceChange, SourceKind,
};
pub use value::{Collation, Value};
pub use view::{CollectionView, DeferRefresh, ViewBuilder, ViewEntry, ViewSnapshot};

pub use horizon_views_core::{
    AffinityViolation, ConnectionGuard, ConnectionId, Signal, ThreadAffinity, TreeFormatOptions, TreeStyle,
};
