//! Repository layer
//!
//! Trait-based data access. Services depend on the traits; the SQLx
//! implementations dispatch on the pool driver.

pub mod image;
pub mod item;
pub mod section;
pub mod tree_item;
pub mod user;

pub use image::{ImageRepository, SqlxImageRepository};
pub use item::{ItemRepository, SqlxItemRepository};
pub use section::{SectionRepository, SqlxSectionRepository};
pub use tree_item::{SortDir, SqlxTreeItemRepository, TreeItemRepository};
pub use user::{SqlxUserRepository, UserRepository};
