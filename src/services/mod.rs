//! Service layer
//!
//! Business logic between the HTTP handlers and the repositories.

pub mod auth;
pub mod catalog;
pub mod columns;
pub mod password;
pub mod registry;

pub use auth::{AuthError, AuthService};
pub use catalog::{
    CatalogError, CatalogService, GridRow, ItemInput, RelativeEntry, SectionInput, TreeEntry,
};
pub use columns::{Column, ColumnModel, ColumnType};
pub use registry::{ContentRegistry, DisplayField, KindSpec};
