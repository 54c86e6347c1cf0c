//! Rubrica: a hierarchical content catalog.
//!
//! Content lives in a tree of sections, meta-items and items. The same
//! content row may be linked into the tree more than once. An admin
//! console drives the tree over form and remoting endpoints, and public
//! pages are rendered from embedded templates with an on-disk override
//! directory.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod render;
pub mod services;
