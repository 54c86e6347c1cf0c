//! Domain models
//!
//! Entities for the catalog tree and its content objects, plus the
//! user/session types backing admin authentication.

pub mod image;
pub mod item;
pub mod section;
pub mod tree_item;
pub mod user;

pub use image::TreeItemImage;
pub use item::Item;
pub use section::Section;
pub use tree_item::{CatalogNode, ContentKind, ContentRef, MovePoint, TreeItem, TreeNode};
pub use user::{Session, User, UserRole};
