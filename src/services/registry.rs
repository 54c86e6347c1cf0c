//! Content kind registry
//!
//! The catalog resolves polymorphic tree references through an explicit
//! registry built at startup: each content kind declares the fields the
//! admin grid shows for it and the row filters applied when listing.
//! Configuration can add equality filters globally or per kind.

use std::collections::HashMap;

use crate::config::CatalogConfig;
use crate::models::{CatalogNode, ContentKind};

use super::columns::ColumnType;

/// A field a content kind exposes to the admin grid
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayField {
    /// Field name, matching a `CatalogNode` projection column
    pub name: String,
    /// Value type for column inference
    pub ty: ColumnType,
    /// Relative position in the grid
    pub order: i32,
}

impl DisplayField {
    pub fn new(name: impl Into<String>, ty: ColumnType, order: i32) -> Self {
        Self {
            name: name.into(),
            ty,
            order,
        }
    }
}

/// Registration record of one content kind
#[derive(Debug, Clone)]
pub struct KindSpec {
    /// The kind being registered
    pub kind: ContentKind,
    /// Fields shown in the admin grid
    pub display: Vec<DisplayField>,
    /// Equality filters applied when listing rows of this kind
    pub filters: HashMap<String, String>,
}

impl KindSpec {
    pub fn new(kind: ContentKind, display: Vec<DisplayField>) -> Self {
        Self {
            kind,
            display,
            filters: HashMap::new(),
        }
    }
}

/// Startup-built registry of catalog content kinds
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    specs: Vec<KindSpec>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in kinds: sections and meta-items show
    /// name and visibility, items add price and quantity.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(KindSpec::new(
            ContentKind::Section,
            vec![
                DisplayField::new("name", ColumnType::Text, 0),
                DisplayField::new("show", ColumnType::Boolean, 1),
            ],
        ));
        registry.register(KindSpec::new(
            ContentKind::MetaItem,
            vec![
                DisplayField::new("name", ColumnType::Text, 0),
                DisplayField::new("show", ColumnType::Boolean, 1),
            ],
        ));
        registry.register(KindSpec::new(
            ContentKind::Item,
            vec![
                DisplayField::new("name", ColumnType::Text, 0),
                DisplayField::new("show", ColumnType::Boolean, 1),
                DisplayField::new("price", ColumnType::Number, 2),
                DisplayField::new("quantity", ColumnType::Number, 3),
            ],
        ));
        registry
    }

    /// Default registry with configuration filters applied on top.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut registry = Self::with_defaults();
        for spec in &mut registry.specs {
            for (field, value) in &config.filters {
                spec.filters.insert(field.clone(), value.clone());
            }
            if let Some(kind_filters) = config.kind_filters.get(spec.kind.as_str()) {
                for (field, value) in kind_filters {
                    spec.filters.insert(field.clone(), value.clone());
                }
            }
        }
        registry
    }

    /// Register a kind, replacing an earlier registration of the same kind.
    pub fn register(&mut self, spec: KindSpec) {
        self.specs.retain(|existing| existing.kind != spec.kind);
        self.specs.push(spec);
    }

    pub fn kinds(&self) -> &[KindSpec] {
        &self.specs
    }

    pub fn get(&self, kind: ContentKind) -> Option<&KindSpec> {
        self.specs.iter().find(|spec| spec.kind == kind)
    }

    /// Whether a node passes the filters registered for its kind.
    ///
    /// Filters compare against the string form of the projected field;
    /// unknown field names never match.
    pub fn passes_filters(&self, node: &CatalogNode) -> bool {
        let Some(spec) = self.get(node.content.kind) else {
            return false;
        };
        spec.filters
            .iter()
            .all(|(field, value)| field_as_string(node, field).as_deref() == Some(value.as_str()))
    }
}

fn field_as_string(node: &CatalogNode, field: &str) -> Option<String> {
    match field {
        "name" => Some(node.name.clone()),
        "slug" => Some(node.slug.clone()),
        "show" | "visible" => Some(if node.show { "1" } else { "0" }.to_string()),
        "price" => node.price.map(|p| p.to_string()),
        "quantity" => node.quantity.map(|q| q.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentRef;

    fn node(kind: ContentKind, show: bool, price: Option<f64>) -> CatalogNode {
        CatalogNode {
            tree_id: 1,
            parent_id: None,
            sort_order: 0,
            show,
            slug: "x".to_string(),
            content: ContentRef::new(kind, 1),
            name: "X".to_string(),
            description: None,
            price,
            quantity: None,
            leaf: true,
            has_image: false,
        }
    }

    #[test]
    fn test_defaults_register_all_kinds() {
        let registry = ContentRegistry::with_defaults();
        for kind in ContentKind::ALL {
            assert!(registry.get(kind).is_some(), "missing kind {}", kind);
        }
        assert_eq!(registry.get(ContentKind::Item).unwrap().display.len(), 4);
        assert_eq!(registry.get(ContentKind::Section).unwrap().display.len(), 2);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ContentRegistry::with_defaults();
        registry.register(KindSpec::new(
            ContentKind::Item,
            vec![DisplayField::new("name", ColumnType::Text, 0)],
        ));
        assert_eq!(registry.kinds().len(), 3);
        assert_eq!(registry.get(ContentKind::Item).unwrap().display.len(), 1);
    }

    #[test]
    fn test_filters_from_config() {
        let mut config = CatalogConfig::default();
        config.filters.insert("show".to_string(), "1".to_string());
        config.kind_filters.insert(
            "item".to_string(),
            HashMap::from([("price".to_string(), "10".to_string())]),
        );

        let registry = ContentRegistry::from_config(&config);

        // Global filter: hidden nodes of any kind fail
        assert!(registry.passes_filters(&node(ContentKind::Section, true, None)));
        assert!(!registry.passes_filters(&node(ContentKind::Section, false, None)));

        // Kind filter: items additionally need the matching price
        assert!(registry.passes_filters(&node(ContentKind::Item, true, Some(10.0))));
        assert!(!registry.passes_filters(&node(ContentKind::Item, true, Some(12.0))));
        assert!(!registry.passes_filters(&node(ContentKind::Item, true, None)));
    }

    #[test]
    fn test_no_filters_pass_everything() {
        let registry = ContentRegistry::with_defaults();
        assert!(registry.passes_filters(&node(ContentKind::Item, false, None)));
    }

    #[test]
    fn test_unknown_filter_field_never_matches() {
        let mut registry = ContentRegistry::with_defaults();
        let mut spec = KindSpec::new(ContentKind::Item, vec![]);
        spec.filters.insert("color".to_string(), "red".to_string());
        registry.register(spec);

        assert!(!registry.passes_filters(&node(ContentKind::Item, true, None)));
    }
}
