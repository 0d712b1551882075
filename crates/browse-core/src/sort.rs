//! Sort choices for container listings.

use browse_proto::config::BrowseConfig;
use browse_proto::protocol::{SortField, SortOrder};

/// Active sort of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// One pick from the sort menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortSelection {
    Field(SortField),
    Order(SortOrder),
}

/// Menu entries: label, field, and the order a field pick implies.
pub const SORT_CHOICES: &[(&str, SortField, SortOrder)] = &[
    ("Name", SortField::SortName, SortOrder::Ascending),
    ("Date added", SortField::DateCreated, SortOrder::Descending),
    ("Premiere date", SortField::PremiereDate, SortOrder::Descending),
    ("Critic rating", SortField::CriticRating, SortOrder::Descending),
    ("Air order", SortField::AiredEpisodeOrder, SortOrder::Descending),
];

pub fn default_order(field: SortField) -> SortOrder {
    SORT_CHOICES
        .iter()
        .find(|(_, f, _)| *f == field)
        .map(|(_, _, order)| *order)
        .unwrap_or_default()
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Apply a menu pick.  Returns `true` when the listing must be reloaded.
    ///
    /// Picking a field always adopts that field's default order but only
    /// reloads when the field itself changed.
    pub fn apply(&mut self, selection: SortSelection) -> bool {
        match selection {
            SortSelection::Field(field) => {
                let changed = self.field != field;
                self.field = field;
                self.order = default_order(field);
                changed
            }
            SortSelection::Order(order) => {
                let changed = self.order != order;
                self.order = order;
                changed
            }
        }
    }

    pub fn label(&self) -> String {
        let name = SORT_CHOICES
            .iter()
            .find(|(_, f, _)| *f == self.field)
            .map(|(label, _, _)| *label)
            .unwrap_or("Unknown");
        let arrow = match self.order {
            SortOrder::Ascending => "↑",
            SortOrder::Descending => "↓",
        };
        format!("{} {}", name, arrow)
    }
}

impl From<&BrowseConfig> for SortSpec {
    fn from(config: &BrowseConfig) -> Self {
        Self::new(config.sort_by, config.sort_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_change_reloads_with_default_order() {
        let mut spec = SortSpec::default();
        assert!(spec.apply(SortSelection::Field(SortField::DateCreated)));
        assert_eq!(spec.order, SortOrder::Descending);
    }

    #[test]
    fn test_same_field_resets_order_without_reload() {
        let mut spec = SortSpec::new(SortField::DateCreated, SortOrder::Ascending);
        assert!(!spec.apply(SortSelection::Field(SortField::DateCreated)));
        assert_eq!(spec.order, SortOrder::Descending);
    }

    #[test]
    fn test_order_pick_reloads_only_on_change() {
        let mut spec = SortSpec::default();
        assert!(!spec.apply(SortSelection::Order(SortOrder::Ascending)));
        assert!(spec.apply(SortSelection::Order(SortOrder::Descending)));
        assert_eq!(spec.label(), "Name ↓");
    }
}
