//! Tree item model
//!
//! A `TreeItem` is a node in the catalog hierarchy. It does not carry
//! content itself; instead it references a concrete content row (section,
//! meta-item or item) through a tagged `ContentKind` + `content_id` pair.
//! Several tree items may reference the same content row, which is how
//! "links" are represented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind tag of the content object a tree item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Category node, may contain subsections and items
    Section,
    /// Virtual grouping over items with a derived price
    MetaItem,
    /// Leaf product record
    Item,
}

impl ContentKind {
    /// All kinds registered in the catalog, in display order.
    pub const ALL: [ContentKind; 3] = [ContentKind::Section, ContentKind::MetaItem, ContentKind::Item];

    /// Database/wire representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Section => "section",
            ContentKind::MetaItem => "metaitem",
            ContentKind::Item => "item",
        }
    }

    /// Whether a node of this kind is rendered as a folder in the tree widget.
    pub fn is_folder(&self) -> bool {
        !matches!(self, ContentKind::Item)
    }

    /// The move compatibility matrix: whether a node of this kind may be
    /// placed under a parent of the given kind. A `None` parent is the
    /// tree root, which accepts everything.
    pub fn may_nest_under(&self, parent: Option<ContentKind>) -> bool {
        let Some(parent) = parent else {
            return true;
        };
        match self {
            ContentKind::Item => matches!(parent, ContentKind::Section | ContentKind::MetaItem),
            ContentKind::MetaItem => matches!(parent, ContentKind::Section),
            ContentKind::Section => matches!(parent, ContentKind::Section),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "section" => Ok(ContentKind::Section),
            "metaitem" => Ok(ContentKind::MetaItem),
            "item" => Ok(ContentKind::Item),
            other => Err(anyhow::anyhow!("Unknown content kind: {}", other)),
        }
    }
}

/// Tagged reference to a concrete content row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: i64,
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// Where to place a moved node relative to the move target.
///
/// The admin widget sends `above`/`below` for sibling drops; anything else
/// (typically `append`) makes the node the target's last child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePoint {
    Above,
    Below,
    LastChild,
}

impl MovePoint {
    pub fn from_param(point: &str) -> Self {
        match point {
            "above" => MovePoint::Above,
            "below" => MovePoint::Below,
            _ => MovePoint::LastChild,
        }
    }
}

/// A node in the catalog hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    /// Unique identifier
    pub id: i64,
    /// Parent tree item; `None` for root-level nodes
    pub parent_id: Option<i64>,
    /// Ordering within the parent
    pub sort_order: i32,
    /// Visibility flag for public rendering
    pub show: bool,
    /// URL slug of the node
    pub slug: String,
    /// Referenced content row
    pub content: ContentRef,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl TreeItem {
    /// Create a new tree item. The ID is assigned by the database.
    pub fn new(parent_id: Option<i64>, slug: String, content: ContentRef) -> Self {
        Self {
            id: 0,
            parent_id,
            sort_order: 0,
            show: true,
            slug,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A tree item joined with the summary fields of its content row.
///
/// This is the projection the JSON tree and grid endpoints are built from:
/// one query resolves the polymorphic reference for a whole sibling set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogNode {
    pub tree_id: i64,
    pub parent_id: Option<i64>,
    pub sort_order: i32,
    pub show: bool,
    pub slug: String,
    pub content: ContentRef,
    /// Name of the content row
    pub name: String,
    /// Description of the content row, if any
    pub description: Option<String>,
    /// Item price; `None` for folder kinds
    pub price: Option<f64>,
    /// Item stock quantity; `None` for folder kinds
    pub quantity: Option<i64>,
    /// Whether the node has no children
    pub leaf: bool,
    /// Whether any image is attached to the content row
    pub has_image: bool,
}

impl CatalogNode {
    pub fn has_description(&self) -> bool {
        self.description.as_deref().map_or(false, |d| !d.is_empty())
    }

    /// Style class used by the tree/grid widget.
    pub fn css_class(&self) -> &'static str {
        if self.content.kind.is_folder() {
            "folder"
        } else {
            "leaf"
        }
    }

    /// Public URL of the node (`/{slug}-{id}`).
    pub fn url(&self) -> String {
        format!("/{}-{}", self.slug, self.tree_id)
    }
}

/// A catalog node with its resolved children, for recursive rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: CatalogNode,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(node: CatalogNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn with_children(node: CatalogNode, children: Vec<TreeNode>) -> Self {
        Self { node, children }
    }

    /// Total count of this node and all descendants.
    pub fn total_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.total_count()).sum::<usize>()
    }
}
