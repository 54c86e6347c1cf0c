//! Section repository
//!
//! CRUD for sections and meta-items plus the derived meta-item price:
//! the minimum price among the child items of a tree node.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Section;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Section repository trait
#[async_trait]
pub trait SectionRepository: Send + Sync {
    /// Create a new section or meta-item
    async fn create(&self, section: &Section) -> Result<Section>;

    /// Get a section by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Section>>;

    /// Update name, description and visibility of a section
    async fn update(&self, section: &Section) -> Result<()>;

    /// Minimum price among the child items of a tree node.
    /// `None` when there are no priced child items.
    async fn min_child_price(&self, tree_id: i64) -> Result<Option<f64>>;
}

/// SQLx-based section repository implementation
pub struct SqlxSectionRepository {
    pool: DynDatabasePool,
}

impl SqlxSectionRepository {
    /// Create a new SQLx section repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SectionRepository> {
        Arc::new(Self::new(pool))
    }
}

const SECTION_COLUMNS: &str = "id, name, description, visible, is_meta, created_at";

const MIN_CHILD_PRICE_SQL: &str = r#"
    SELECT MIN(i.price) AS min_price
    FROM tree_items t
    INNER JOIN items i ON t.content_kind = 'item' AND i.id = t.content_id
    WHERE t.parent_id = ?
"#;

#[async_trait]
impl SectionRepository for SqlxSectionRepository {
    async fn create(&self, section: &Section) -> Result<Section> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), section).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), section).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Section>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn update(&self, section: &Section) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), section).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), section).await,
        }
    }

    async fn min_child_price(&self, tree_id: i64) -> Result<Option<f64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(MIN_CHILD_PRICE_SQL)
                    .bind(tree_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to compute minimum child price")?;
                Ok(row.get("min_price"))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(MIN_CHILD_PRICE_SQL)
                    .bind(tree_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to compute minimum child price")?;
                Ok(row.get("min_price"))
            }
        }
    }
}

fn row_to_section_sqlite(row: &sqlx::sqlite::SqliteRow) -> Section {
    Section {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        show: row.get("visible"),
        is_meta: row.get("is_meta"),
        created_at: row.get("created_at"),
    }
}

fn row_to_section_mysql(row: &sqlx::mysql::MySqlRow) -> Section {
    Section {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        show: row.get("visible"),
        is_meta: row.get("is_meta"),
        created_at: row.get("created_at"),
    }
}

async fn create_sqlite(pool: &SqlitePool, section: &Section) -> Result<Section> {
    let result = sqlx::query(
        "INSERT INTO sections (name, description, visible, is_meta, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&section.name)
    .bind(&section.description)
    .bind(section.show)
    .bind(section.is_meta)
    .bind(section.created_at)
    .execute(pool)
    .await
    .context("Failed to create section")?;

    Ok(Section {
        id: result.last_insert_rowid(),
        ..section.clone()
    })
}

async fn create_mysql(pool: &MySqlPool, section: &Section) -> Result<Section> {
    let result = sqlx::query(
        "INSERT INTO sections (name, description, visible, is_meta, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&section.name)
    .bind(&section.description)
    .bind(section.show)
    .bind(section.is_meta)
    .bind(section.created_at)
    .execute(pool)
    .await
    .context("Failed to create section")?;

    Ok(Section {
        id: result.last_insert_id() as i64,
        ..section.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Section>> {
    let row = sqlx::query(&format!("SELECT {} FROM sections WHERE id = ?", SECTION_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get section by ID")?;
    Ok(row.map(|row| row_to_section_sqlite(&row)))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Section>> {
    let row = sqlx::query(&format!("SELECT {} FROM sections WHERE id = ?", SECTION_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get section by ID")?;
    Ok(row.map(|row| row_to_section_mysql(&row)))
}

async fn update_sqlite(pool: &SqlitePool, section: &Section) -> Result<()> {
    sqlx::query("UPDATE sections SET name = ?, description = ?, visible = ? WHERE id = ?")
        .bind(&section.name)
        .bind(&section.description)
        .bind(section.show)
        .bind(section.id)
        .execute(pool)
        .await
        .context("Failed to update section")?;
    Ok(())
}

async fn update_mysql(pool: &MySqlPool, section: &Section) -> Result<()> {
    sqlx::query("UPDATE sections SET name = ?, description = ?, visible = ? WHERE id = ?")
        .bind(&section.name)
        .bind(&section.description)
        .bind(section.show)
        .bind(section.id)
        .execute(pool)
        .await
        .context("Failed to update section")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ItemRepository, SqlxItemRepository, SqlxTreeItemRepository, TreeItemRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ContentKind, ContentRef, Item, TreeItem};

    async fn setup() -> (DynDatabasePool, SqlxSectionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSectionRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup().await;
        let created = repo
            .create(&Section::new("Tools".to_string(), Some("Hand tools".to_string())))
            .await
            .unwrap();
        assert!(created.id > 0);

        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Tools");
        assert!(!loaded.is_meta);
    }

    #[tokio::test]
    async fn test_meta_flag_persists() {
        let (_pool, repo) = setup().await;
        let created = repo
            .create(&Section::new_meta("Drill bundle".to_string(), None))
            .await
            .unwrap();
        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert!(loaded.is_meta);
        assert_eq!(loaded.kind(), ContentKind::MetaItem);
    }

    #[tokio::test]
    async fn test_update() {
        let (_pool, repo) = setup().await;
        let mut section = repo
            .create(&Section::new("Tools".to_string(), None))
            .await
            .unwrap();
        section.name = "Power tools".to_string();
        section.show = false;
        repo.update(&section).await.unwrap();

        let loaded = repo.get_by_id(section.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Power tools");
        assert!(!loaded.show);
    }

    #[tokio::test]
    async fn test_min_child_price() {
        let (pool, repo) = setup().await;
        let tree = SqlxTreeItemRepository::new(pool.clone());
        let items = SqlxItemRepository::new(pool.clone());

        let meta = repo
            .create(&Section::new_meta("Bundle".to_string(), None))
            .await
            .unwrap();
        let node = tree
            .create(&TreeItem::new(
                None,
                "bundle".to_string(),
                ContentRef::new(ContentKind::MetaItem, meta.id),
            ))
            .await
            .unwrap();

        for price in [30.0, 10.0, 20.0] {
            let item = items
                .create(&Item::new(format!("Variant {}", price), None, Some(price), Some(1)))
                .await
                .unwrap();
            tree.create(&TreeItem::new(
                Some(node.id),
                "variant".to_string(),
                ContentRef::new(ContentKind::Item, item.id),
            ))
            .await
            .unwrap();
        }

        let min = repo.min_child_price(node.id).await.unwrap();
        assert_eq!(min, Some(10.0));
    }

    #[tokio::test]
    async fn test_min_child_price_empty() {
        let (pool, repo) = setup().await;
        let tree = SqlxTreeItemRepository::new(pool.clone());
        let meta = repo
            .create(&Section::new_meta("Empty".to_string(), None))
            .await
            .unwrap();
        let node = tree
            .create(&TreeItem::new(
                None,
                "empty".to_string(),
                ContentRef::new(ContentKind::MetaItem, meta.id),
            ))
            .await
            .unwrap();

        assert_eq!(repo.min_child_price(node.id).await.unwrap(), None);
    }
}
