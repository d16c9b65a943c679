//! Items shown by a view and how they are identified.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

/// An item that can be projected through a collection view.
///
/// Views never own items; they hold `Arc<T>` handles shared with the source.
/// Filtering, sorting and grouping read item state through
/// [`property`](Self::property). The empty name and `"."` conventionally
/// refer to the item itself.
pub trait ViewItem: Send + Sync + 'static {
    /// Read a named property.
    fn property(&self, name: &str) -> Value;

    /// Write a named property. Returns `false` if the item is read-only or
    /// has no such property.
    fn set_property(&self, _name: &str, _value: Value) -> bool {
        false
    }

    /// Names of the properties captured when an edit transaction starts.
    ///
    /// Items that return an empty list cannot have their edits reverted.
    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }
}

macro_rules! impl_scalar_item {
    ($($ty:ty),*) => {
        $(
            impl ViewItem for $ty {
                fn property(&self, name: &str) -> Value {
                    match name {
                        "" | "." => Value::from(self.clone()),
                        _ => Value::None,
                    }
                }
            }
        )*
    };
}

impl_scalar_item!(bool, i32, i64, f64, String);

/// A thread-safe bag of named values.
///
/// `Record` is the general-purpose item type: properties can be read and
/// written through [`ViewItem`], so it supports live shaping and
/// cancelable edits out of the box.
///
/// ```
/// use horizon_views::{Record, Value, ViewItem};
///
/// let person = Record::new().with("name", "Ada").with("age", 36);
/// assert_eq!(person.property("age"), Value::Int(36));
/// person.set("age", 37);
/// assert_eq!(person.get("age"), Value::Int(37));
/// ```
#[derive(Debug, Default)]
pub struct Record {
    fields: RwLock<BTreeMap<String, Value>>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field initialization.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.write().insert(name.into(), value.into());
        self
    }

    /// Read a field, `Value::None` when absent.
    pub fn get(&self, name: &str) -> Value {
        self.fields.read().get(name).cloned().unwrap_or_default()
    }

    /// Write a field, returning the previous value.
    ///
    /// This does not notify anyone; announce the change through the source
    /// (for example [`ObservableList::set_property`](crate::ObservableList::set_property)).
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Value {
        self.fields
            .write()
            .insert(name.into(), value.into())
            .unwrap_or_default()
    }
}

impl Clone for Record {
    fn clone(&self) -> Self {
        Self {
            fields: RwLock::new(self.fields.read().clone()),
        }
    }
}

impl ViewItem for Record {
    fn property(&self, name: &str) -> Value {
        self.get(name)
    }

    fn set_property(&self, name: &str, value: Value) -> bool {
        self.set(name, value);
        true
    }

    fn property_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }
}

/// Identity of an item inside a view.
///
/// By default this is the address of the shared `Arc`, so two handles to the
/// same allocation are the same item and equal values in different
/// allocations are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(u64);

impl ItemKey {
    /// Identity by reference.
    pub fn of<T: ?Sized>(item: &Arc<T>) -> Self {
        Self(Arc::as_ptr(item) as *const () as usize as u64)
    }

    /// Identity derived from a hashable caller-supplied key.
    pub fn from_hash(key: &impl Hash) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Identity from a raw numeric key.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw key value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Caller-supplied identity function.
pub type KeyFn<T> = Arc<dyn Fn(&T) -> ItemKey + Send + Sync>;

/// How a view decides whether two handles refer to the same item.
pub enum Identity<T> {
    /// Reference equality of the `Arc` allocation.
    Reference,
    /// A caller-supplied key.
    Key(KeyFn<T>),
}

impl<T> Identity<T> {
    /// Identity by a key function.
    pub fn key<F>(key_fn: F) -> Self
    where
        F: Fn(&T) -> ItemKey + Send + Sync + 'static,
    {
        Identity::Key(Arc::new(key_fn))
    }

    /// Compute the key of an item.
    pub fn key_of(&self, item: &Arc<T>) -> ItemKey {
        match self {
            Identity::Reference => ItemKey::of(item),
            Identity::Key(key_fn) => key_fn(item),
        }
    }
}

impl<T> Clone for Identity<T> {
    fn clone(&self) -> Self {
        match self {
            Identity::Reference => Identity::Reference,
            Identity::Key(key_fn) => Identity::Key(key_fn.clone()),
        }
    }
}

impl<T> Default for Identity<T> {
    fn default() -> Self {
        Identity::Reference
    }
}

impl<T> std::fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Reference => write!(f, "Identity::Reference"),
            Identity::Key(_) => write!(f, "Identity::Key(..)"),
        }
    }
}
