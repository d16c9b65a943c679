//! Default views per source.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_views_core::logging::targets;
use parking_lot::Mutex;

use crate::error::Result;
use crate::item::ViewItem;
use crate::source::ItemSource;
use crate::view::CollectionView;

fn source_key<T: ViewItem>(source: &Arc<dyn ItemSource<T>>) -> usize {
    Arc::as_ptr(source) as *const () as usize
}

/// Hands out one shared default view per source.
///
/// Sources are matched by identity. The registry keeps its views (and so
/// their sources) alive until evicted.
pub struct ViewRegistry<T: ViewItem> {
    views: Mutex<HashMap<usize, Arc<CollectionView<T>>>>,
}

impl<T: ViewItem> Default for ViewRegistry<T> {
    fn default() -> Self {
        Self {
            views: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: ViewItem> ViewRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default view of `source`, created with default settings on first use.
    pub fn get_or_create(&self, source: &Arc<dyn ItemSource<T>>) -> Arc<CollectionView<T>> {
        let mut views = self.views.lock();
        views
            .entry(source_key(source))
            .or_insert_with(|| {
                tracing::debug!(target: targets::VIEW, "creating default view");
                CollectionView::new(source.clone())
            })
            .clone()
    }

    /// The default view of `source`, created by `create` on first use.
    pub fn get_or_try_create<F>(&self, source: &Arc<dyn ItemSource<T>>, create: F) -> Result<Arc<CollectionView<T>>>
    where
        F: FnOnce(Arc<dyn ItemSource<T>>) -> Result<Arc<CollectionView<T>>>,
    {
        let mut views = self.views.lock();
        let key = source_key(source);
        if let Some(view) = views.get(&key) {
            return Ok(view.clone());
        }
        let view = create(source.clone())?;
        views.insert(key, view.clone());
        Ok(view)
    }

    /// The default view of `source`, if one exists.
    pub fn get(&self, source: &Arc<dyn ItemSource<T>>) -> Option<Arc<CollectionView<T>>> {
        self.views.lock().get(&source_key(source)).cloned()
    }

    /// Forget and detach the default view of `source`.
    pub fn evict(&self, source: &Arc<dyn ItemSource<T>>) -> Option<Arc<CollectionView<T>>> {
        let view = self.views.lock().remove(&source_key(source))?;
        if let Err(error) = view.detach() {
            tracing::warn!(target: targets::VIEW, %error, "evicted view could not detach");
        }
        Some(view)
    }

    /// Number of registered views.
    pub fn len(&self) -> usize {
        self.views.lock().len()
    }

    /// Whether no views are registered.
    pub fn is_empty(&self) -> bool {
        self.views.lock().is_empty()
    }

    /// Forget every view.
    pub fn clear(&self) {
        let views: Vec<_> = self.views.lock().drain().map(|(_, view)| view).collect();
        for view in views {
            let _ = view.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ObservableList;

    #[test]
    fn test_one_view_per_source() {
        let registry = ViewRegistry::<i64>::new();
        let a: Arc<dyn ItemSource<i64>> = Arc::new(ObservableList::new(vec![1, 2]));
        let b: Arc<dyn ItemSource<i64>> = Arc::new(ObservableList::new(vec![3]));

        let first = registry.get_or_create(&a);
        let again = registry.get_or_create(&a);
        assert!(Arc::ptr_eq(&first, &again));
        assert!(registry.get(&b).is_none());

        registry.get_or_create(&b);
        assert_eq!(registry.len(), 2);

        let evicted = registry.evict(&a).unwrap();
        assert!(evicted.is_detached());
        assert!(registry.get(&a).is_none());

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_custom_creation_errors_are_not_cached() {
        let registry = ViewRegistry::<i64>::new();
        let source: Arc<dyn ItemSource<i64>> = Arc::new(ObservableList::new(vec![1]));
        let result = registry.get_or_try_create(&source, |_| Err(crate::ViewError::Detached));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
