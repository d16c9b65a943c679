//! Error types for collection views.

use horizon_views_core::AffinityViolation;

use crate::item::ItemKey;

/// Errors returned by view operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    /// The requested configuration is invalid.
    #[error("invalid view configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The operation conflicts with the pending add-new or edit transaction.
    #[error("transaction conflict: {0}")]
    TransactionConflict(#[from] TransactionConflict),

    /// The view or its source was touched from a foreign thread.
    #[error("cross-thread access violation: {0}")]
    CrossThreadAccess(#[from] AffinityViolation),

    /// The source rejected the operation.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// The item is not shown by the view.
    #[error("item is not part of the view")]
    ItemNotInView,

    /// A position outside `-1..=count` was requested.
    #[error("position {position} is out of range for a view of {count} items")]
    PositionOutOfRange {
        /// Requested position.
        position: isize,
        /// Number of items in the view.
        count: usize,
    },

    /// The view has been detached from its source.
    #[error("view has been detached from its source")]
    Detached,
}

impl ViewError {
    /// Returns `true` for [`ViewError::CrossThreadAccess`].
    pub fn is_cross_thread(&self) -> bool {
        matches!(self, ViewError::CrossThreadAccess(_))
    }
}

/// Invalid or unsupported view configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Sort descriptions and a custom comparator cannot both be set.
    #[error("sort descriptions and a custom comparator cannot both be set")]
    ConflictingSort,

    /// The source sorts itself and cannot take a custom comparator.
    #[error("a sort-assisted source does not accept a custom comparator")]
    CustomSortNotSupported,

    /// `add_new` requires a new-item factory.
    #[error("no new-item factory is configured")]
    NoNewItemFactory,

    /// `cancel_edit` requires `can_cancel_edit` and an item that exposes its properties.
    #[error("the pending edit cannot be canceled")]
    CancelEditNotSupported,

    /// The placeholder position cannot change while an add-new is pending.
    #[error("placeholder position cannot change during add-new")]
    PlaceholderChangeDuringAddNew,
}

/// The pending add-new or edit transaction forbids the operation.
///
/// View state is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionConflict {
    /// An add-new transaction is already pending.
    #[error("an add-new transaction is pending")]
    AddNewPending,

    /// An edit transaction is already pending.
    #[error("an edit transaction is pending")]
    EditPending,

    /// `commit_new`/`cancel_new` without a pending add-new.
    #[error("no add-new transaction is pending")]
    NoAddNewPending,

    /// `commit_edit`/`cancel_edit` without a pending edit.
    #[error("no edit transaction is pending")]
    NoEditPending,

    /// Remove was requested while an add-new is pending.
    #[error("cannot remove items while an add-new transaction is pending")]
    RemoveDuringAddNew,

    /// Remove targeted the item under edit.
    #[error("cannot remove item {0:?} while it is being edited")]
    RemoveItemUnderEdit(ItemKey),
}

/// Errors raised by item sources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source cannot be modified through the view.
    #[error("source is read-only")]
    ReadOnly,

    /// An index outside the source was used.
    #[error("index {index} is out of bounds for a source of {len} items")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Source length.
        len: usize,
    },

    /// The source does not sort itself.
    #[error("source does not support sorting")]
    SortNotSupported,
}

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, ViewError>;
