use std::sync::Arc;

use horizon_views_core::logging::targets;

use super::state::ViewState;
use super::CollectionView;
use crate::config::ViewConfig;
use crate::error::{ConfigurationError, Result};
use crate::group::GroupDescription;
use crate::item::{Identity, ItemKey, ViewItem};
use crate::shaping::{CustomSort, Filter, SortDescription, Sorter};
use crate::source::{ItemSource, SourceKind};

enum SortChoice<T> {
    None,
    Descriptions(Vec<SortDescription>),
    Custom(CustomSort<T>),
}

/// Configures a [`CollectionView`] before its first build.
///
/// Setting sort descriptions replaces a custom comparator and vice versa.
pub struct ViewBuilder<T: ViewItem> {
    source: Arc<dyn ItemSource<T>>,
    config: ViewConfig,
    identity: Identity<T>,
    filter: Option<Filter<T>>,
    sort: SortChoice<T>,
    groups: Vec<GroupDescription<T>>,
    factory: Option<Arc<dyn Fn() -> T + Send + Sync>>,
}

impl<T: ViewItem> ViewBuilder<T> {
    /// Start a builder over `source`.
    pub fn new(source: Arc<dyn ItemSource<T>>) -> Self {
        Self {
            source,
            config: ViewConfig::default(),
            identity: Identity::default(),
            filter: None,
            sort: SortChoice::None,
            groups: Vec::new(),
            factory: None,
        }
    }

    /// Use `config`.
    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Show only items accepted by `filter`.
    pub fn filter(mut self, filter: Filter<T>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sort by chained descriptions.
    pub fn sort(mut self, sorts: Vec<SortDescription>) -> Self {
        self.sort = SortChoice::Descriptions(sorts);
        self
    }

    /// Sort with a custom comparator.
    pub fn custom_sort(mut self, sort: CustomSort<T>) -> Self {
        self.sort = SortChoice::Custom(sort);
        self
    }

    /// Group by `descriptions`, outermost level first.
    pub fn group_by(mut self, descriptions: Vec<GroupDescription<T>>) -> Self {
        self.groups = descriptions;
        self
    }

    /// Identify items by a key instead of by reference.
    pub fn identity_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&T) -> ItemKey + Send + Sync + 'static,
    {
        self.identity = Identity::key(key);
        self
    }

    /// Factory for [`CollectionView::add_new`].
    pub fn new_item_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Build the view and populate it from the source.
    ///
    /// A sort-assisted source is asked to apply the sort descriptions
    /// before the first population.
    pub fn build(self) -> Result<Arc<CollectionView<T>>> {
        let kind = self.source.kind();
        let mut state = ViewState::new(self.config, kind, self.identity);
        state.filter = self.filter;
        state.new_item_factory = self.factory;

        match self.sort {
            SortChoice::None => {}
            SortChoice::Custom(_) if kind == SourceKind::SortAssistedSequence => {
                return Err(ConfigurationError::CustomSortNotSupported.into());
            }
            SortChoice::Custom(custom) => state.sorter = Sorter::Custom(custom),
            SortChoice::Descriptions(sorts) if kind == SourceKind::SortAssistedSequence => {
                self.source.apply_sort(&sorts)?;
                state.sort_descriptions = sorts;
            }
            SortChoice::Descriptions(sorts) => {
                if !sorts.is_empty() {
                    state.sorter = Sorter::Descriptions(sorts.clone());
                }
                state.sort_descriptions = sorts;
            }
        }
        let sorts = state.sort_descriptions.clone();
        state.grouping.set_descriptions(self.groups, &sorts);

        tracing::trace!(
            target: targets::VIEW,
            filtered = state.filter.is_some(),
            sorted = !sorts.is_empty(),
            levels = state.grouping.descriptions().len(),
            "building view"
        );
        Ok(CollectionView::from_state(self.source, state))
    }
}
