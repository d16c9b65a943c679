//! View configuration.

/// Where the provisional add-new item is pinned while pending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NewItemPlaceholderPosition {
    /// No placeholder row; the pending item is pinned at the end.
    #[default]
    None,
    /// Pinned at index 0.
    Beginning,
    /// Pinned after the last item.
    End,
}

/// Behavioural switches of a collection view.
///
/// # Example
///
/// ```
/// use horizon_views::{NewItemPlaceholderPosition, ViewConfig};
///
/// let config = ViewConfig::new()
///     .live_filtering(true)
///     .live_sorting(true)
///     .new_item_placeholder_position(NewItemPlaceholderPosition::End);
/// assert!(config.live_filtering);
/// assert!(!config.live_grouping);
/// assert!(config.is_live());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViewConfig {
    /// Re-filter an item when a property its filter watches changes.
    pub live_filtering: bool,
    /// Re-position an item when a property its sort watches changes.
    pub live_sorting: bool,
    /// Re-group an item when a property its grouping watches changes.
    pub live_grouping: bool,
    /// Placement of the pending add-new item.
    pub new_item_placeholder_position: NewItemPlaceholderPosition,
    /// Capture item state on `edit_item` so `cancel_edit` can restore it.
    pub can_cancel_edit: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            live_filtering: false,
            live_sorting: false,
            live_grouping: false,
            new_item_placeholder_position: NewItemPlaceholderPosition::None,
            can_cancel_edit: true,
        }
    }
}

impl ViewConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable live filtering.
    pub fn live_filtering(mut self, enabled: bool) -> Self {
        self.live_filtering = enabled;
        self
    }

    /// Enable or disable live sorting.
    pub fn live_sorting(mut self, enabled: bool) -> Self {
        self.live_sorting = enabled;
        self
    }

    /// Enable or disable live grouping.
    pub fn live_grouping(mut self, enabled: bool) -> Self {
        self.live_grouping = enabled;
        self
    }

    /// Enable all three live shaping modes.
    pub fn live_shaping(self) -> Self {
        self.live_filtering(true).live_sorting(true).live_grouping(true)
    }

    /// Set the placeholder position for add-new.
    pub fn new_item_placeholder_position(mut self, position: NewItemPlaceholderPosition) -> Self {
        self.new_item_placeholder_position = position;
        self
    }

    /// Enable or disable edit snapshots.
    pub fn can_cancel_edit(mut self, enabled: bool) -> Self {
        self.can_cancel_edit = enabled;
        self
    }

    /// Whether any live shaping mode is on.
    pub fn is_live(&self) -> bool {
        self.live_filtering || self.live_sorting || self.live_grouping
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ViewConfig::new()
            .live_grouping(true)
            .new_item_placeholder_position(NewItemPlaceholderPosition::Beginning);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<ViewConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ViewConfig = serde_json::from_str(r#"{"live_sorting": true}"#).unwrap();
        assert!(config.live_sorting);
        assert!(config.can_cancel_edit);
    }
}
