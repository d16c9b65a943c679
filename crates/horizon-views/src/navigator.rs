//! The current-item cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ViewError;
use crate::index_table::EntryId;

/// Where the cursor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentPosition {
    /// Before the first item.
    BeforeFirst,
    /// On the item at this view index.
    OnItem(usize),
    /// After the last item.
    AfterLast,
}

impl CurrentPosition {
    /// The view index, when on an item.
    pub fn index(self) -> Option<usize> {
        match self {
            CurrentPosition::OnItem(index) => Some(index),
            _ => None,
        }
    }
}

/// The cursor as stored by the view: sentinels or a specific entry.
pub(crate) enum Cursor<T> {
    BeforeFirst,
    AfterLast,
    On { id: EntryId, item: Arc<T> },
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        match self {
            Cursor::BeforeFirst => Cursor::BeforeFirst,
            Cursor::AfterLast => Cursor::AfterLast,
            Cursor::On { id, item } => Cursor::On {
                id: *id,
                item: item.clone(),
            },
        }
    }
}

impl<T> Cursor<T> {
    pub fn entry(&self) -> Option<EntryId> {
        match self {
            Cursor::On { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_on(&self, entry: EntryId) -> bool {
        self.entry() == Some(entry)
    }
}

/// A navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Navigation {
    First,
    Last,
    Next,
    Previous,
    Position(isize),
}

/// Where a navigation request lands, given the cursor and item count.
pub(crate) fn resolve(
    navigation: Navigation,
    current: CurrentPosition,
    count: usize,
) -> Result<CurrentPosition, ViewError> {
    use CurrentPosition::*;

    Ok(match navigation {
        Navigation::First if count > 0 => OnItem(0),
        Navigation::Last if count > 0 => OnItem(count - 1),
        Navigation::First | Navigation::Last => BeforeFirst,
        Navigation::Next => match current {
            BeforeFirst if count > 0 => OnItem(0),
            OnItem(index) if index + 1 < count => OnItem(index + 1),
            _ => AfterLast,
        },
        Navigation::Previous => match current {
            AfterLast if count > 0 => OnItem(count - 1),
            OnItem(index) if index > 0 => OnItem(index - 1),
            _ => BeforeFirst,
        },
        Navigation::Position(-1) => BeforeFirst,
        Navigation::Position(position) if position >= 0 && (position as usize) < count => {
            OnItem(position as usize)
        }
        Navigation::Position(position) if position >= 0 && position as usize == count => AfterLast,
        Navigation::Position(position) => {
            return Err(ViewError::PositionOutOfRange { position, count });
        }
    })
}

/// Where the cursor goes when the item it was on disappears.
///
/// The item that slid into the vacated index, else the new last item,
/// else before-first when the view is empty.
pub(crate) fn neighbour_after_removal(removed_index: usize, count_after: usize) -> CurrentPosition {
    if count_after == 0 {
        CurrentPosition::BeforeFirst
    } else {
        CurrentPosition::OnItem(removed_index.min(count_after - 1))
    }
}

/// Raised before the current item changes.
///
/// Call [`cancel`](Self::cancel) from a handler to veto the move.
#[derive(Debug, Clone)]
pub struct CurrentChanging {
    /// Position before the move.
    pub from: CurrentPosition,
    /// Proposed position.
    pub to: CurrentPosition,
    /// Whether the move was forced by the item leaving the view.
    pub forced: bool,
    canceled: Arc<AtomicBool>,
}

impl CurrentChanging {
    pub(crate) fn new(from: CurrentPosition, to: CurrentPosition, forced: bool) -> Self {
        Self {
            from,
            to,
            forced,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Veto the move.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Whether a handler vetoed the move.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Raised after the current item changed.
#[derive(Debug)]
pub struct CurrentChanged<T> {
    /// New position.
    pub position: CurrentPosition,
    /// New current item, if on one.
    pub item: Option<Arc<T>>,
}

impl<T> Clone for CurrentChanged<T> {
    fn clone(&self) -> Self {
        Self {
            position: self.position,
            item: self.item.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CurrentPosition::*;

    #[test]
    fn test_resolve_sequential_moves() {
        assert_eq!(resolve(Navigation::Next, BeforeFirst, 2).unwrap(), OnItem(0));
        assert_eq!(resolve(Navigation::Next, OnItem(1), 2).unwrap(), AfterLast);
        assert_eq!(resolve(Navigation::Next, AfterLast, 2).unwrap(), AfterLast);
        assert_eq!(resolve(Navigation::Previous, OnItem(0), 2).unwrap(), BeforeFirst);
        assert_eq!(resolve(Navigation::Previous, AfterLast, 2).unwrap(), OnItem(1));
        assert_eq!(resolve(Navigation::Next, BeforeFirst, 0).unwrap(), AfterLast);
    }

    #[test]
    fn test_resolve_positions() {
        assert_eq!(resolve(Navigation::Position(-1), OnItem(0), 3).unwrap(), BeforeFirst);
        assert_eq!(resolve(Navigation::Position(2), BeforeFirst, 3).unwrap(), OnItem(2));
        assert_eq!(resolve(Navigation::Position(3), BeforeFirst, 3).unwrap(), AfterLast);
        assert_eq!(
            resolve(Navigation::Position(4), BeforeFirst, 3),
            Err(ViewError::PositionOutOfRange { position: 4, count: 3 })
        );
        assert!(resolve(Navigation::Position(-2), BeforeFirst, 3).is_err());
        assert_eq!(resolve(Navigation::Last, BeforeFirst, 0).unwrap(), BeforeFirst);
    }

    #[test]
    fn test_neighbour_after_removal() {
        assert_eq!(neighbour_after_removal(1, 3), OnItem(1));
        assert_eq!(neighbour_after_removal(3, 3), OnItem(2));
        assert_eq!(neighbour_after_removal(0, 0), BeforeFirst);
    }

    #[test]
    fn test_changing_cancel_is_shared_between_clones() {
        let event = CurrentChanging::new(BeforeFirst, OnItem(0), false);
        let handed_out = event.clone();
        handed_out.cancel();
        assert!(event.is_canceled());
    }
}
