//! Section model
//!
//! A section is a category node of the catalog. Meta-items are stored in
//! the same table with the `is_meta` flag set: a meta-item is a virtual
//! grouping over items whose price is derived from its children, and it
//! may not contain further sections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tree_item::ContentKind;

/// Section entity (category or meta-item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Description shown on the public page
    pub description: Option<String>,
    /// Visibility flag
    pub show: bool,
    /// Whether this row is a meta-item rather than a plain section
    pub is_meta: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Section {
    /// Create a new plain section. The ID is assigned by the database.
    pub fn new(name: String, description: Option<String>) -> Self {
        Self {
            id: 0,
            name,
            description,
            show: true,
            is_meta: false,
            created_at: Utc::now(),
        }
    }

    /// Create a new meta-item.
    pub fn new_meta(name: String, description: Option<String>) -> Self {
        Self {
            is_meta: true,
            ..Self::new(name, description)
        }
    }

    /// The content kind this row represents in the tree.
    pub fn kind(&self) -> ContentKind {
        if self.is_meta {
            ContentKind::MetaItem
        } else {
            ContentKind::Section
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_kind() {
        let section = Section::new("Tools".to_string(), None);
        assert_eq!(section.kind(), ContentKind::Section);
        assert!(!section.is_meta);

        let meta = Section::new_meta("Drill bundle".to_string(), Some("All drills".to_string()));
        assert_eq!(meta.kind(), ContentKind::MetaItem);
        assert!(meta.is_meta);
        assert!(meta.show);
    }
}
