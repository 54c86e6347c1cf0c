//! Item model
//!
//! An item is a leaf product record. Items relate to sections (an item
//! may be listed in several sections besides its tree position) and to
//! other items ("relative" products shown next to it).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Description shown on the public page
    pub description: Option<String>,
    /// Visibility flag
    pub show: bool,
    /// Price; `None` when not priced yet
    pub price: Option<f64>,
    /// Stock quantity; 0 means out of stock
    pub quantity: Option<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Create a new item. The ID is assigned by the database.
    pub fn new(name: String, description: Option<String>, price: Option<f64>, quantity: Option<i64>) -> Self {
        Self {
            id: 0,
            name,
            description,
            show: true,
            price,
            quantity,
            created_at: Utc::now(),
        }
    }

    pub fn in_stock(&self) -> bool {
        self.quantity.map_or(false, |q| q > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_new() {
        let item = Item::new("Hammer".to_string(), None, Some(12.5), Some(3));
        assert_eq!(item.id, 0);
        assert!(item.show);
        assert!(item.in_stock());
    }

    #[test]
    fn test_in_stock() {
        let mut item = Item::new("Hammer".to_string(), None, None, None);
        assert!(!item.in_stock());
        item.quantity = Some(0);
        assert!(!item.in_stock());
        item.quantity = Some(1);
        assert!(item.in_stock());
    }
}
