//! Tree item repository
//!
//! Database operations for the catalog hierarchy:
//! - `TreeItemRepository` trait defining the interface for tree data access
//! - `SqlxTreeItemRepository` implementing the trait for SQLite and MySQL
//!
//! The polymorphic content reference is resolved in SQL: one joined query
//! projects a sibling set into `CatalogNode`s, so listing a tree level
//! never issues per-row lookups. Ancestors and descendants use recursive
//! CTEs. Batch moves and cascading deletes run inside a transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CatalogNode, ContentKind, ContentRef, MovePoint, TreeItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Sort direction for the flat grid query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn from_param(dir: &str) -> Self {
        if dir.eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Tree item repository trait
#[async_trait]
pub trait TreeItemRepository: Send + Sync {
    /// Create a new tree item, appended as the last child of its parent
    async fn create(&self, item: &TreeItem) -> Result<TreeItem>;

    /// Get a tree item by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<TreeItem>>;

    /// Direct children of a node (`None` = root level), in tree order
    async fn children(&self, parent_id: Option<i64>) -> Result<Vec<TreeItem>>;

    /// Direct children joined with their content rows
    async fn children_nodes(&self, parent_id: Option<i64>) -> Result<Vec<CatalogNode>>;

    /// A single node joined with its content row
    async fn node(&self, id: i64) -> Result<Option<CatalogNode>>;

    /// All nodes joined with their content rows, in tree order
    async fn all_nodes(&self) -> Result<Vec<CatalogNode>>;

    /// A page of the flat node projection plus the total row count
    async fn nodes_page(
        &self,
        start: i64,
        limit: i64,
        sort: &str,
        dir: SortDir,
    ) -> Result<(Vec<CatalogNode>, i64)>;

    /// Ancestor chain of a node, root first, excluding the node itself
    async fn ancestors(&self, id: i64) -> Result<Vec<TreeItem>>;

    /// IDs of a node and all its descendants
    async fn descendant_ids(&self, id: i64) -> Result<Vec<i64>>;

    /// All tree items referencing a content row
    async fn links_to(&self, content: ContentRef) -> Result<Vec<TreeItem>>;

    /// Move a batch of nodes relative to the target, all inside one
    /// transaction. Callers validate the moves first; this method only
    /// performs them.
    async fn move_all(&self, sources: &[i64], target: Option<i64>, point: MovePoint) -> Result<()>;

    /// Set the visibility flag on a set of nodes
    async fn set_visibility(&self, ids: &[i64], show: bool) -> Result<u64>;

    /// Delete a node and its subtree. Content rows are deleted per
    /// object: each one is removed only when no tree item outside the
    /// deleted subtree still links to it, together with its images.
    async fn delete_cascade(&self, id: i64) -> Result<()>;
}

/// SQLx-based tree item repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTreeItemRepository {
    pool: DynDatabasePool,
}

impl SqlxTreeItemRepository {
    /// Create a new SQLx tree item repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TreeItemRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TreeItemRepository for SqlxTreeItemRepository {
    async fn create(&self, item: &TreeItem) -> Result<TreeItem> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), item).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), item).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TreeItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn children(&self, parent_id: Option<i64>) -> Result<Vec<TreeItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                children_sqlite(self.pool.as_sqlite().unwrap(), parent_id).await
            }
            DatabaseDriver::Mysql => children_mysql(self.pool.as_mysql().unwrap(), parent_id).await,
        }
    }

    async fn children_nodes(&self, parent_id: Option<i64>) -> Result<Vec<CatalogNode>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                children_nodes_sqlite(self.pool.as_sqlite().unwrap(), parent_id).await
            }
            DatabaseDriver::Mysql => {
                children_nodes_mysql(self.pool.as_mysql().unwrap(), parent_id).await
            }
        }
    }

    async fn node(&self, id: i64) -> Result<Option<CatalogNode>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => node_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => node_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn all_nodes(&self) -> Result<Vec<CatalogNode>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => all_nodes_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => all_nodes_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn nodes_page(
        &self,
        start: i64,
        limit: i64,
        sort: &str,
        dir: SortDir,
    ) -> Result<(Vec<CatalogNode>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                nodes_page_sqlite(self.pool.as_sqlite().unwrap(), start, limit, sort, dir).await
            }
            DatabaseDriver::Mysql => {
                nodes_page_mysql(self.pool.as_mysql().unwrap(), start, limit, sort, dir).await
            }
        }
    }

    async fn ancestors(&self, id: i64) -> Result<Vec<TreeItem>> {
        let mut chain = match self.pool.driver() {
            DatabaseDriver::Sqlite => ancestors_sqlite(self.pool.as_sqlite().unwrap(), id).await?,
            DatabaseDriver::Mysql => ancestors_mysql(self.pool.as_mysql().unwrap(), id).await?,
        };
        // CTE yields self, parent, ... up to the root; drop self, root first
        chain.retain(|item| item.id != id);
        chain.reverse();
        Ok(chain)
    }

    async fn descendant_ids(&self, id: i64) -> Result<Vec<i64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                descendant_ids_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => descendant_ids_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn links_to(&self, content: ContentRef) -> Result<Vec<TreeItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => links_to_sqlite(self.pool.as_sqlite().unwrap(), content).await,
            DatabaseDriver::Mysql => links_to_mysql(self.pool.as_mysql().unwrap(), content).await,
        }
    }

    async fn move_all(&self, sources: &[i64], target: Option<i64>, point: MovePoint) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                move_all_sqlite(self.pool.as_sqlite().unwrap(), sources, target, point).await
            }
            DatabaseDriver::Mysql => {
                move_all_mysql(self.pool.as_mysql().unwrap(), sources, target, point).await
            }
        }
    }

    async fn set_visibility(&self, ids: &[i64], show: bool) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_visibility_sqlite(self.pool.as_sqlite().unwrap(), ids, show).await
            }
            DatabaseDriver::Mysql => {
                set_visibility_mysql(self.pool.as_mysql().unwrap(), ids, show).await
            }
        }
    }

    async fn delete_cascade(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_cascade_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => delete_cascade_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

// ============================================================================
// Shared SQL fragments and pure helpers
// ============================================================================

const TREE_ITEM_COLUMNS: &str = "id, parent_id, sort_order, visible, slug, content_kind, content_id, created_at";

/// The joined projection resolving the polymorphic content reference.
const NODE_SELECT: &str = r#"
    SELECT t.id AS tree_id, t.parent_id, t.sort_order, t.visible, t.slug,
           t.content_kind, t.content_id,
           COALESCE(s.name, i.name, '') AS name,
           COALESCE(s.description, i.description) AS description,
           i.price AS price, i.quantity AS quantity,
           (CASE WHEN EXISTS(SELECT 1 FROM tree_items c WHERE c.parent_id = t.id) THEN 0 ELSE 1 END) AS leaf,
           (CASE WHEN EXISTS(SELECT 1 FROM tree_item_images m
                             WHERE m.content_kind = t.content_kind AND m.content_id = t.content_id)
                 THEN 1 ELSE 0 END) AS has_image
    FROM tree_items t
    LEFT JOIN sections s ON t.content_kind IN ('section', 'metaitem') AND s.id = t.content_id
    LEFT JOIN items i ON t.content_kind = 'item' AND i.id = t.content_id
"#;

/// Sort columns the grid may request, mapped to projection columns.
fn grid_sort_column(sort: &str) -> &'static str {
    match sort {
        "name" => "name",
        "price" => "price",
        "quantity" => "quantity",
        "show" | "visible" => "t.visible",
        "type" => "t.content_kind",
        _ => "t.id",
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Compute the final child order of the move destination.
///
/// `siblings` is the destination parent's child list (source already
/// re-parented and sitting at the end); the returned vector is the
/// desired ordering.
fn splice_order(siblings: Vec<i64>, source: i64, anchor: Option<i64>, before: bool) -> Vec<i64> {
    let mut order: Vec<i64> = siblings.into_iter().filter(|&id| id != source).collect();
    let position = match anchor.and_then(|a| order.iter().position(|&id| id == a)) {
        Some(idx) if before => idx,
        Some(idx) => idx + 1,
        None => order.len(),
    };
    order.insert(position, source);
    order
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_tree_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<TreeItem> {
    let kind = ContentKind::from_str(row.get("content_kind"))?;
    Ok(TreeItem {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        sort_order: row.get("sort_order"),
        show: row.get("visible"),
        slug: row.get("slug"),
        content: ContentRef::new(kind, row.get("content_id")),
        created_at: row.get("created_at"),
    })
}

fn row_to_node_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogNode> {
    let kind = ContentKind::from_str(row.get("content_kind"))?;
    Ok(CatalogNode {
        tree_id: row.get("tree_id"),
        parent_id: row.get("parent_id"),
        sort_order: row.get("sort_order"),
        show: row.get("visible"),
        slug: row.get("slug"),
        content: ContentRef::new(kind, row.get("content_id")),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        quantity: row.get("quantity"),
        leaf: row.get::<i64, _>("leaf") != 0,
        has_image: row.get::<i64, _>("has_image") != 0,
    })
}

async fn create_sqlite(pool: &SqlitePool, item: &TreeItem) -> Result<TreeItem> {
    let next_order: i64 = if let Some(parent_id) = item.parent_id {
        sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 AS next FROM tree_items WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(pool)
            .await
            .context("Failed to compute sort order")?
            .get("next")
    } else {
        sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 AS next FROM tree_items WHERE parent_id IS NULL")
            .fetch_one(pool)
            .await
            .context("Failed to compute sort order")?
            .get("next")
    };

    let result = sqlx::query(
        r#"
        INSERT INTO tree_items (parent_id, sort_order, visible, slug, content_kind, content_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.parent_id)
    .bind(next_order)
    .bind(item.show)
    .bind(&item.slug)
    .bind(item.content.kind.as_str())
    .bind(item.content.id)
    .bind(item.created_at)
    .execute(pool)
    .await
    .context("Failed to create tree item")?;

    Ok(TreeItem {
        id: result.last_insert_rowid(),
        sort_order: next_order as i32,
        ..item.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<TreeItem>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tree_items WHERE id = ?",
        TREE_ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get tree item by ID")?;

    row.map(|row| row_to_tree_item_sqlite(&row)).transpose()
}

async fn children_sqlite(pool: &SqlitePool, parent_id: Option<i64>) -> Result<Vec<TreeItem>> {
    let rows = match parent_id {
        Some(parent_id) => {
            sqlx::query(&format!(
                "SELECT {} FROM tree_items WHERE parent_id = ? ORDER BY sort_order, id",
                TREE_ITEM_COLUMNS
            ))
            .bind(parent_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM tree_items WHERE parent_id IS NULL ORDER BY sort_order, id",
                TREE_ITEM_COLUMNS
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list children")?;

    rows.iter().map(row_to_tree_item_sqlite).collect()
}

async fn children_nodes_sqlite(pool: &SqlitePool, parent_id: Option<i64>) -> Result<Vec<CatalogNode>> {
    let rows = match parent_id {
        Some(parent_id) => {
            sqlx::query(&format!(
                "{} WHERE t.parent_id = ? ORDER BY t.sort_order, t.id",
                NODE_SELECT
            ))
            .bind(parent_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "{} WHERE t.parent_id IS NULL ORDER BY t.sort_order, t.id",
                NODE_SELECT
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list child nodes")?;

    rows.iter().map(row_to_node_sqlite).collect()
}

async fn node_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<CatalogNode>> {
    let row = sqlx::query(&format!("{} WHERE t.id = ?", NODE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get node")?;

    row.map(|row| row_to_node_sqlite(&row)).transpose()
}

async fn all_nodes_sqlite(pool: &SqlitePool) -> Result<Vec<CatalogNode>> {
    let rows = sqlx::query(&format!("{} ORDER BY t.sort_order, t.id", NODE_SELECT))
        .fetch_all(pool)
        .await
        .context("Failed to list nodes")?;

    rows.iter().map(row_to_node_sqlite).collect()
}

async fn nodes_page_sqlite(
    pool: &SqlitePool,
    start: i64,
    limit: i64,
    sort: &str,
    dir: SortDir,
) -> Result<(Vec<CatalogNode>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM tree_items")
        .fetch_one(pool)
        .await
        .context("Failed to count tree items")?
        .get("count");

    let rows = sqlx::query(&format!(
        "{} ORDER BY {} {} LIMIT ? OFFSET ?",
        NODE_SELECT,
        grid_sort_column(sort),
        dir.as_sql()
    ))
    .bind(limit)
    .bind(start)
    .fetch_all(pool)
    .await
    .context("Failed to fetch node page")?;

    let nodes = rows.iter().map(row_to_node_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((nodes, total))
}

async fn ancestors_sqlite(pool: &SqlitePool, id: i64) -> Result<Vec<TreeItem>> {
    let rows = sqlx::query(&format!(
        r#"
        WITH RECURSIVE chain AS (
            SELECT {cols} FROM tree_items WHERE id = ?
            UNION ALL
            SELECT t.id, t.parent_id, t.sort_order, t.visible, t.slug, t.content_kind, t.content_id, t.created_at
            FROM tree_items t
            INNER JOIN chain c ON t.id = c.parent_id
        )
        SELECT {cols} FROM chain
        "#,
        cols = TREE_ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to resolve ancestors")?;

    rows.iter().map(row_to_tree_item_sqlite).collect()
}

async fn descendant_ids_sqlite(pool: &SqlitePool, id: i64) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        r#"
        WITH RECURSIVE descendants AS (
            SELECT id FROM tree_items WHERE id = ?
            UNION ALL
            SELECT t.id FROM tree_items t
            INNER JOIN descendants d ON t.parent_id = d.id
        )
        SELECT id FROM descendants
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to resolve descendants")?;

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

async fn links_to_sqlite(pool: &SqlitePool, content: ContentRef) -> Result<Vec<TreeItem>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tree_items WHERE content_kind = ? AND content_id = ? ORDER BY id",
        TREE_ITEM_COLUMNS
    ))
    .bind(content.kind.as_str())
    .bind(content.id)
    .fetch_all(pool)
    .await
    .context("Failed to list links to content")?;

    rows.iter().map(row_to_tree_item_sqlite).collect()
}

async fn move_all_sqlite(
    pool: &SqlitePool,
    sources: &[i64],
    target: Option<i64>,
    point: MovePoint,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin move transaction")?;

    for &source in sources {
        // Resolve the destination against current state; earlier moves in
        // the batch may have reshuffled sibling orders.
        let (new_parent, anchor, before) = match (target, point) {
            (Some(target_id), MovePoint::Above) | (Some(target_id), MovePoint::Below) => {
                let row = sqlx::query("SELECT parent_id FROM tree_items WHERE id = ?")
                    .bind(target_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Move target disappeared")?;
                let parent: Option<i64> = row.get("parent_id");
                (parent, Some(target_id), point == MovePoint::Above)
            }
            (Some(target_id), MovePoint::LastChild) => (Some(target_id), None, false),
            (None, _) => (None, None, false),
        };

        sqlx::query("UPDATE tree_items SET parent_id = ?, sort_order = ? WHERE id = ?")
            .bind(new_parent)
            .bind(i32::MAX)
            .bind(source)
            .execute(&mut *tx)
            .await
            .context("Failed to re-parent tree item")?;

        let sibling_rows = match new_parent {
            Some(parent_id) => {
                sqlx::query("SELECT id FROM tree_items WHERE parent_id = ? ORDER BY sort_order, id")
                    .bind(parent_id)
                    .fetch_all(&mut *tx)
                    .await
            }
            None => {
                sqlx::query("SELECT id FROM tree_items WHERE parent_id IS NULL ORDER BY sort_order, id")
                    .fetch_all(&mut *tx)
                    .await
            }
        }
        .context("Failed to list destination siblings")?;

        let siblings: Vec<i64> = sibling_rows.iter().map(|row| row.get("id")).collect();
        let order = splice_order(siblings, source, anchor, before);

        for (index, id) in order.iter().enumerate() {
            sqlx::query("UPDATE tree_items SET sort_order = ? WHERE id = ?")
                .bind(index as i32)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to renumber siblings")?;
        }
    }

    tx.commit().await.context("Failed to commit move transaction")
}

async fn set_visibility_sqlite(pool: &SqlitePool, ids: &[i64], show: bool) -> Result<u64> {
    let sql = format!(
        "UPDATE tree_items SET visible = ? WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql).bind(show);
    for id in ids {
        query = query.bind(id);
    }
    let result = query
        .execute(pool)
        .await
        .context("Failed to update visibility")?;
    Ok(result.rows_affected())
}

async fn delete_cascade_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin delete transaction")?;

    // Collect the subtree with content references before deleting it.
    let rows = sqlx::query(
        r#"
        WITH RECURSIVE descendants AS (
            SELECT id, content_kind, content_id FROM tree_items WHERE id = ?
            UNION ALL
            SELECT t.id, t.content_kind, t.content_id FROM tree_items t
            INNER JOIN descendants d ON t.parent_id = d.id
        )
        SELECT id, content_kind, content_id FROM descendants
        "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to collect subtree")?;

    let mut contents = Vec::with_capacity(rows.len());
    for row in &rows {
        let kind = ContentKind::from_str(row.get("content_kind"))?;
        contents.push(ContentRef::new(kind, row.get("content_id")));
    }

    // The FK cascade removes the subtree rows with the root.
    sqlx::query("DELETE FROM tree_items WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete tree item")?;

    // Per-object content cleanup: a content row survives while some tree
    // item outside the deleted subtree still links to it.
    for content in contents {
        let remaining: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM tree_items WHERE content_kind = ? AND content_id = ?",
        )
        .bind(content.kind.as_str())
        .bind(content.id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count remaining links")?
        .get("count");

        if remaining == 0 {
            sqlx::query("DELETE FROM tree_item_images WHERE content_kind = ? AND content_id = ?")
                .bind(content.kind.as_str())
                .bind(content.id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete content images")?;

            let table = match content.kind {
                ContentKind::Section | ContentKind::MetaItem => "sections",
                ContentKind::Item => "items",
            };
            sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
                .bind(content.id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete content row")?;
        }
    }

    tx.commit().await.context("Failed to commit delete transaction")
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_tree_item_mysql(row: &sqlx::mysql::MySqlRow) -> Result<TreeItem> {
    let kind = ContentKind::from_str(row.get("content_kind"))?;
    Ok(TreeItem {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        sort_order: row.get("sort_order"),
        show: row.get("visible"),
        slug: row.get("slug"),
        content: ContentRef::new(kind, row.get("content_id")),
        created_at: row.get("created_at"),
    })
}

fn row_to_node_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CatalogNode> {
    let kind = ContentKind::from_str(row.get("content_kind"))?;
    Ok(CatalogNode {
        tree_id: row.get("tree_id"),
        parent_id: row.get("parent_id"),
        sort_order: row.get("sort_order"),
        show: row.get("visible"),
        slug: row.get("slug"),
        content: ContentRef::new(kind, row.get("content_id")),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        quantity: row.get("quantity"),
        leaf: row.get::<i64, _>("leaf") != 0,
        has_image: row.get::<i64, _>("has_image") != 0,
    })
}

async fn create_mysql(pool: &MySqlPool, item: &TreeItem) -> Result<TreeItem> {
    let next_order: i64 = if let Some(parent_id) = item.parent_id {
        sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 AS next FROM tree_items WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(pool)
            .await
            .context("Failed to compute sort order")?
            .get("next")
    } else {
        sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 AS next FROM tree_items WHERE parent_id IS NULL")
            .fetch_one(pool)
            .await
            .context("Failed to compute sort order")?
            .get("next")
    };

    let result = sqlx::query(
        r#"
        INSERT INTO tree_items (parent_id, sort_order, visible, slug, content_kind, content_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.parent_id)
    .bind(next_order)
    .bind(item.show)
    .bind(&item.slug)
    .bind(item.content.kind.as_str())
    .bind(item.content.id)
    .bind(item.created_at)
    .execute(pool)
    .await
    .context("Failed to create tree item")?;

    Ok(TreeItem {
        id: result.last_insert_id() as i64,
        sort_order: next_order as i32,
        ..item.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<TreeItem>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tree_items WHERE id = ?",
        TREE_ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get tree item by ID")?;

    row.map(|row| row_to_tree_item_mysql(&row)).transpose()
}

async fn children_mysql(pool: &MySqlPool, parent_id: Option<i64>) -> Result<Vec<TreeItem>> {
    let rows = match parent_id {
        Some(parent_id) => {
            sqlx::query(&format!(
                "SELECT {} FROM tree_items WHERE parent_id = ? ORDER BY sort_order, id",
                TREE_ITEM_COLUMNS
            ))
            .bind(parent_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM tree_items WHERE parent_id IS NULL ORDER BY sort_order, id",
                TREE_ITEM_COLUMNS
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list children")?;

    rows.iter().map(row_to_tree_item_mysql).collect()
}

async fn children_nodes_mysql(pool: &MySqlPool, parent_id: Option<i64>) -> Result<Vec<CatalogNode>> {
    let rows = match parent_id {
        Some(parent_id) => {
            sqlx::query(&format!(
                "{} WHERE t.parent_id = ? ORDER BY t.sort_order, t.id",
                NODE_SELECT
            ))
            .bind(parent_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "{} WHERE t.parent_id IS NULL ORDER BY t.sort_order, t.id",
                NODE_SELECT
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list child nodes")?;

    rows.iter().map(row_to_node_mysql).collect()
}

async fn node_mysql(pool: &MySqlPool, id: i64) -> Result<Option<CatalogNode>> {
    let row = sqlx::query(&format!("{} WHERE t.id = ?", NODE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get node")?;

    row.map(|row| row_to_node_mysql(&row)).transpose()
}

async fn all_nodes_mysql(pool: &MySqlPool) -> Result<Vec<CatalogNode>> {
    let rows = sqlx::query(&format!("{} ORDER BY t.sort_order, t.id", NODE_SELECT))
        .fetch_all(pool)
        .await
        .context("Failed to list nodes")?;

    rows.iter().map(row_to_node_mysql).collect()
}

async fn nodes_page_mysql(
    pool: &MySqlPool,
    start: i64,
    limit: i64,
    sort: &str,
    dir: SortDir,
) -> Result<(Vec<CatalogNode>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM tree_items")
        .fetch_one(pool)
        .await
        .context("Failed to count tree items")?
        .get("count");

    let rows = sqlx::query(&format!(
        "{} ORDER BY {} {} LIMIT ? OFFSET ?",
        NODE_SELECT,
        grid_sort_column(sort),
        dir.as_sql()
    ))
    .bind(limit)
    .bind(start)
    .fetch_all(pool)
    .await
    .context("Failed to fetch node page")?;

    let nodes = rows.iter().map(row_to_node_mysql).collect::<Result<Vec<_>>>()?;
    Ok((nodes, total))
}

async fn ancestors_mysql(pool: &MySqlPool, id: i64) -> Result<Vec<TreeItem>> {
    let rows = sqlx::query(&format!(
        r#"
        WITH RECURSIVE chain AS (
            SELECT {cols} FROM tree_items WHERE id = ?
            UNION ALL
            SELECT t.id, t.parent_id, t.sort_order, t.visible, t.slug, t.content_kind, t.content_id, t.created_at
            FROM tree_items t
            INNER JOIN chain c ON t.id = c.parent_id
        )
        SELECT {cols} FROM chain
        "#,
        cols = TREE_ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to resolve ancestors")?;

    rows.iter().map(row_to_tree_item_mysql).collect()
}

async fn descendant_ids_mysql(pool: &MySqlPool, id: i64) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        r#"
        WITH RECURSIVE descendants AS (
            SELECT id FROM tree_items WHERE id = ?
            UNION ALL
            SELECT t.id FROM tree_items t
            INNER JOIN descendants d ON t.parent_id = d.id
        )
        SELECT id FROM descendants
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to resolve descendants")?;

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

async fn links_to_mysql(pool: &MySqlPool, content: ContentRef) -> Result<Vec<TreeItem>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tree_items WHERE content_kind = ? AND content_id = ? ORDER BY id",
        TREE_ITEM_COLUMNS
    ))
    .bind(content.kind.as_str())
    .bind(content.id)
    .fetch_all(pool)
    .await
    .context("Failed to list links to content")?;

    rows.iter().map(row_to_tree_item_mysql).collect()
}

async fn move_all_mysql(
    pool: &MySqlPool,
    sources: &[i64],
    target: Option<i64>,
    point: MovePoint,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin move transaction")?;

    for &source in sources {
        let (new_parent, anchor, before) = match (target, point) {
            (Some(target_id), MovePoint::Above) | (Some(target_id), MovePoint::Below) => {
                let row = sqlx::query("SELECT parent_id FROM tree_items WHERE id = ?")
                    .bind(target_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Move target disappeared")?;
                let parent: Option<i64> = row.get("parent_id");
                (parent, Some(target_id), point == MovePoint::Above)
            }
            (Some(target_id), MovePoint::LastChild) => (Some(target_id), None, false),
            (None, _) => (None, None, false),
        };

        sqlx::query("UPDATE tree_items SET parent_id = ?, sort_order = ? WHERE id = ?")
            .bind(new_parent)
            .bind(i32::MAX)
            .bind(source)
            .execute(&mut *tx)
            .await
            .context("Failed to re-parent tree item")?;

        let sibling_rows = match new_parent {
            Some(parent_id) => {
                sqlx::query("SELECT id FROM tree_items WHERE parent_id = ? ORDER BY sort_order, id")
                    .bind(parent_id)
                    .fetch_all(&mut *tx)
                    .await
            }
            None => {
                sqlx::query("SELECT id FROM tree_items WHERE parent_id IS NULL ORDER BY sort_order, id")
                    .fetch_all(&mut *tx)
                    .await
            }
        }
        .context("Failed to list destination siblings")?;

        let siblings: Vec<i64> = sibling_rows.iter().map(|row| row.get("id")).collect();
        let order = splice_order(siblings, source, anchor, before);

        for (index, id) in order.iter().enumerate() {
            sqlx::query("UPDATE tree_items SET sort_order = ? WHERE id = ?")
                .bind(index as i32)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to renumber siblings")?;
        }
    }

    tx.commit().await.context("Failed to commit move transaction")
}

async fn set_visibility_mysql(pool: &MySqlPool, ids: &[i64], show: bool) -> Result<u64> {
    let sql = format!(
        "UPDATE tree_items SET visible = ? WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql).bind(show);
    for id in ids {
        query = query.bind(id);
    }
    let result = query
        .execute(pool)
        .await
        .context("Failed to update visibility")?;
    Ok(result.rows_affected())
}

async fn delete_cascade_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin delete transaction")?;

    let rows = sqlx::query(
        r#"
        WITH RECURSIVE descendants AS (
            SELECT id, content_kind, content_id FROM tree_items WHERE id = ?
            UNION ALL
            SELECT t.id, t.content_kind, t.content_id FROM tree_items t
            INNER JOIN descendants d ON t.parent_id = d.id
        )
        SELECT id, content_kind, content_id FROM descendants
        "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to collect subtree")?;

    let mut contents = Vec::with_capacity(rows.len());
    for row in &rows {
        let kind = ContentKind::from_str(row.get("content_kind"))?;
        contents.push(ContentRef::new(kind, row.get("content_id")));
    }

    sqlx::query("DELETE FROM tree_items WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete tree item")?;

    for content in contents {
        let remaining: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM tree_items WHERE content_kind = ? AND content_id = ?",
        )
        .bind(content.kind.as_str())
        .bind(content.id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count remaining links")?
        .get("count");

        if remaining == 0 {
            sqlx::query("DELETE FROM tree_item_images WHERE content_kind = ? AND content_id = ?")
                .bind(content.kind.as_str())
                .bind(content.id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete content images")?;

            let table = match content.kind {
                ContentKind::Section | ContentKind::MetaItem => "sections",
                ContentKind::Item => "items",
            };
            sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
                .bind(content.id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete content row")?;
        }
    }

    tx.commit().await.context("Failed to commit delete transaction")
}
