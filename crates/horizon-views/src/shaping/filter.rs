//! Filter predicates.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::item::ViewItem;
use crate::value::Value;

/// Type alias for filter predicates.
pub type FilterFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A filter predicate plus the item properties it depends on.
///
/// The dependency list drives live filtering: when live filtering is on, a
/// change to one of these properties re-evaluates the predicate for that
/// item only.
///
/// # Example
///
/// ```
/// use horizon_views::{Filter, Record};
///
/// let adults = Filter::<Record>::new(|r| r.get("age").as_int().unwrap_or(0) >= 18)
///     .watching(["age"]);
/// assert!(adults.watches("age"));
///
/// // Same thing, with the dependency declared automatically.
/// let adults = Filter::<Record>::on_property("age", |v| v.as_int().unwrap_or(0) >= 18);
/// assert!(adults.watches("age"));
/// ```
pub struct Filter<T> {
    predicate: FilterFn<T>,
    watched: Vec<String>,
}

impl<T: ViewItem> Filter<T> {
    /// Wraps a predicate with no declared dependencies.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            watched: Vec::new(),
        }
    }

    /// A predicate over a single property, which is watched automatically.
    pub fn on_property<F>(property: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let property = property.into();
        let name = property.clone();
        Self {
            predicate: Arc::new(move |item: &T| predicate(&item.property(&name))),
            watched: vec![property],
        }
    }

    /// Declares properties the predicate reads.
    pub fn watching<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched.extend(properties.into_iter().map(Into::into));
        self
    }

    /// Properties the predicate depends on.
    pub fn watched_properties(&self) -> &[String] {
        &self.watched
    }

    /// Whether `property` is a declared dependency.
    pub fn watches(&self, property: &str) -> bool {
        self.watched.iter().any(|p| p == property)
    }

    /// Runs the predicate, converting a panic into `Err(message)`.
    pub(crate) fn evaluate(&self, item: &T) -> Result<bool, String> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.predicate)(item))).map_err(panic_message)
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            watched: self.watched.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
