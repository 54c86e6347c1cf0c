//! Catalog image model
//!
//! Images attach polymorphically to any content object through the same
//! kind + id pair the tree uses. Palette images are rendered full-size
//! after the description instead of in the thumbnail strip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tree_item::ContentRef;

/// Image attached to a catalog content object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItemImage {
    /// Unique identifier
    pub id: i64,
    /// Content row the image belongs to
    pub content: ContentRef,
    /// Path of the stored image, relative to the upload root
    pub path: String,
    /// Palette flag: render full-size after the description
    pub palette: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl TreeItemImage {
    /// Create a new image record. The ID is assigned by the database.
    pub fn new(content: ContentRef, path: String, palette: bool) -> Self {
        Self {
            id: 0,
            content,
            path,
            palette,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;

    #[test]
    fn test_image_new() {
        let image = TreeItemImage::new(
            ContentRef::new(ContentKind::Item, 9),
            "catalog/9/front.jpg".to_string(),
            false,
        );
        assert_eq!(image.id, 0);
        assert_eq!(image.content.id, 9);
        assert!(!image.palette);
    }
}
