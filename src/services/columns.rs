//! Column model inference for the admin grid
//!
//! The grid shows every registered content kind in one table, so its
//! column set is merged from the display fields each kind declares.
//! Merge rules: a field name shared by several kinds keeps its type only
//! when all kinds agree, otherwise it degrades to text; the column order
//! is the maximum order seen for that name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::registry::{ContentRegistry, DisplayField};

/// Column value type for the grid widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
}

impl ColumnType {
    /// Widget column class for this type
    pub fn xtype(&self) -> &'static str {
        match self {
            ColumnType::Text => "gridcolumn",
            ColumnType::Number => "numbercolumn",
            ColumnType::Boolean => "booleancolumn",
        }
    }
}

/// A merged grid column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Field name, also the data index into the row projection
    pub name: String,
    /// Value type after merging across kinds
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Sort position within the column model
    pub order: i32,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType, order: i32) -> Self {
        Self {
            name: name.into(),
            ty,
            order,
        }
    }

    /// Merge another declaration of the same field into this column.
    /// Types must agree to survive; orders take the maximum.
    pub fn merge(&mut self, other: &Column) {
        if self.ty != other.ty {
            self.ty = ColumnType::Text;
        }
        self.order = self.order.max(other.order);
    }

    /// Widget description of this column
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "xtype": self.ty.xtype(),
            "header": self.name,
            "dataIndex": self.name,
            "sortable": true,
        })
    }
}

/// The merged column model over all registered kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnModel {
    pub columns: Vec<Column>,
}

impl ColumnModel {
    /// Build the merged column model from the registry.
    pub fn build(registry: &ContentRegistry) -> Self {
        let mut merged: HashMap<String, Column> = HashMap::new();

        for spec in registry.kinds() {
            for field in &spec.display {
                let column = field_to_column(field);
                merged
                    .entry(column.name.clone())
                    .and_modify(|existing| existing.merge(&column))
                    .or_insert(column);
            }
        }

        let mut columns: Vec<Column> = merged.into_values().collect();
        columns.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Self { columns }
    }

    /// Widget column-model description, in column order
    pub fn describe(&self) -> Vec<serde_json::Value> {
        self.columns.iter().map(Column::describe).collect()
    }
}

fn field_to_column(field: &DisplayField) -> Column {
    Column::new(field.name.clone(), field.ty, field.order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;
    use crate::services::registry::KindSpec;
    use proptest::prelude::*;

    #[test]
    fn test_merge_same_type_keeps_type_and_max_order() {
        let mut a = Column::new("price", ColumnType::Number, 2);
        let b = Column::new("price", ColumnType::Number, 5);
        a.merge(&b);
        assert_eq!(a.ty, ColumnType::Number);
        assert_eq!(a.order, 5);
    }

    #[test]
    fn test_merge_differing_types_degrades_to_text() {
        let mut a = Column::new("show", ColumnType::Boolean, 1);
        let b = Column::new("show", ColumnType::Number, 0);
        a.merge(&b);
        assert_eq!(a.ty, ColumnType::Text);
        assert_eq!(a.order, 1);
    }

    #[test]
    fn test_build_merges_across_kinds() {
        let registry = ContentRegistry::with_defaults();
        let model = ColumnModel::build(&registry);

        let names: Vec<&str> = model.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "show", "price", "quantity"]);

        let name = model.columns.iter().find(|c| c.name == "name").unwrap();
        assert_eq!(name.ty, ColumnType::Text);
        let show = model.columns.iter().find(|c| c.name == "show").unwrap();
        assert_eq!(show.ty, ColumnType::Boolean);
        let price = model.columns.iter().find(|c| c.name == "price").unwrap();
        assert_eq!(price.ty, ColumnType::Number);
    }

    #[test]
    fn test_build_conflicting_kind_declarations() {
        let mut registry = ContentRegistry::new();
        registry.register(KindSpec::new(
            ContentKind::Section,
            vec![DisplayField::new("price", ColumnType::Text, 1)],
        ));
        registry.register(KindSpec::new(
            ContentKind::Item,
            vec![DisplayField::new("price", ColumnType::Number, 3)],
        ));

        let model = ColumnModel::build(&registry);
        assert_eq!(model.columns.len(), 1);
        assert_eq!(model.columns[0].ty, ColumnType::Text);
        assert_eq!(model.columns[0].order, 3);
    }

    #[test]
    fn test_describe_xtypes() {
        let model = ColumnModel {
            columns: vec![
                Column::new("name", ColumnType::Text, 0),
                Column::new("show", ColumnType::Boolean, 1),
                Column::new("price", ColumnType::Number, 2),
            ],
        };
        let described = model.describe();
        assert_eq!(described[0]["xtype"], "gridcolumn");
        assert_eq!(described[1]["xtype"], "booleancolumn");
        assert_eq!(described[2]["xtype"], "numbercolumn");
        assert_eq!(described[2]["dataIndex"], "price");
    }

    fn arb_type() -> impl Strategy<Value = ColumnType> {
        prop_oneof![
            Just(ColumnType::Text),
            Just(ColumnType::Number),
            Just(ColumnType::Boolean),
        ]
    }

    proptest! {
        /// Merging is commutative in its observable result.
        #[test]
        fn prop_merge_commutative(
            ty_a in arb_type(),
            ty_b in arb_type(),
            order_a in 0i32..100,
            order_b in 0i32..100,
        ) {
            let mut left = Column::new("f", ty_a, order_a);
            left.merge(&Column::new("f", ty_b, order_b));

            let mut right = Column::new("f", ty_b, order_b);
            right.merge(&Column::new("f", ty_a, order_a));

            prop_assert_eq!(left.ty, right.ty);
            prop_assert_eq!(left.order, right.order);
        }

        /// Merged order is never below either input order.
        #[test]
        fn prop_merge_order_is_max(
            ty in arb_type(),
            order_a in 0i32..100,
            order_b in 0i32..100,
        ) {
            let mut col = Column::new("f", ty, order_a);
            col.merge(&Column::new("f", ty, order_b));
            prop_assert_eq!(col.order, order_a.max(order_b));
            prop_assert_eq!(col.ty, ty);
        }
    }
}
