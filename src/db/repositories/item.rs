//! Item repository
//!
//! CRUD for items plus the relative-item and item-section link tables.
//! Relative links are saved as a diff against the stored set so an
//! unchanged link keeps its row.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Item;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

/// Item repository trait
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Create a new item
    async fn create(&self, item: &Item) -> Result<Item>;

    /// Get an item by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Item>>;

    /// Update name, description, visibility, price and quantity
    async fn update(&self, item: &Item) -> Result<()>;

    /// IDs of items related to this one
    async fn relatives(&self, item_id: i64) -> Result<Vec<i64>>;

    /// Replace the relative set with `relative_ids`, adding and removing
    /// only the difference
    async fn save_relatives(&self, item_id: i64, relative_ids: &[i64]) -> Result<()>;

    /// IDs of sections the item is additionally listed in
    async fn section_ids(&self, item_id: i64) -> Result<Vec<i64>>;

    /// Replace the section membership set, diff-based like relatives
    async fn save_sections(&self, item_id: i64, section_ids: &[i64]) -> Result<()>;
}

/// SQLx-based item repository implementation
pub struct SqlxItemRepository {
    pool: DynDatabasePool,
}

impl SqlxItemRepository {
    /// Create a new SQLx item repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ItemRepository> {
        Arc::new(Self::new(pool))
    }
}

const ITEM_COLUMNS: &str = "id, name, description, visible, price, quantity, created_at";

#[async_trait]
impl ItemRepository for SqlxItemRepository {
    async fn create(&self, item: &Item) -> Result<Item> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), item).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), item).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Item>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn update(&self, item: &Item) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), item).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), item).await,
        }
    }

    async fn relatives(&self, item_id: i64) -> Result<Vec<i64>> {
        self.linked_ids("item_relatives", "relative_id", item_id).await
    }

    async fn save_relatives(&self, item_id: i64, relative_ids: &[i64]) -> Result<()> {
        self.save_links("item_relatives", "relative_id", item_id, relative_ids)
            .await
    }

    async fn section_ids(&self, item_id: i64) -> Result<Vec<i64>> {
        self.linked_ids("item_sections", "section_id", item_id).await
    }

    async fn save_sections(&self, item_id: i64, section_ids: &[i64]) -> Result<()> {
        self.save_links("item_sections", "section_id", item_id, section_ids)
            .await
    }
}

impl SqlxItemRepository {
    async fn linked_ids(&self, table: &str, column: &str, item_id: i64) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT {col} FROM {table} WHERE item_id = ? ORDER BY {col}",
            col = column,
            table = table
        );
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(item_id)
                .fetch_all(self.pool.as_sqlite().unwrap())
                .await
                .with_context(|| format!("Failed to list {} links", table))?
                .iter()
                .map(|row| row.get::<i64, _>(column))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(item_id)
                .fetch_all(self.pool.as_mysql().unwrap())
                .await
                .with_context(|| format!("Failed to list {} links", table))?
                .iter()
                .map(|row| row.get::<i64, _>(column))
                .collect(),
        };
        Ok(ids)
    }

    async fn save_links(
        &self,
        table: &str,
        column: &str,
        item_id: i64,
        wanted: &[i64],
    ) -> Result<()> {
        let current: HashSet<i64> = self.linked_ids(table, column, item_id).await?.into_iter().collect();
        let wanted_set: HashSet<i64> = wanted.iter().copied().collect();

        let to_add: Vec<i64> = wanted_set.difference(&current).copied().collect();
        let to_remove: Vec<i64> = current.difference(&wanted_set).copied().collect();

        let insert_sql = format!("INSERT INTO {} (item_id, {}) VALUES (?, ?)", table, column);
        let delete_sql = format!("DELETE FROM {} WHERE item_id = ? AND {} = ?", table, column);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.as_sqlite().unwrap();
                let mut tx = pool.begin().await.context("Failed to begin link transaction")?;
                for id in &to_add {
                    sqlx::query(&insert_sql)
                        .bind(item_id)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to add {} link", table))?;
                }
                for id in &to_remove {
                    sqlx::query(&delete_sql)
                        .bind(item_id)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to remove {} link", table))?;
                }
                tx.commit().await.context("Failed to commit link transaction")?;
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.as_mysql().unwrap();
                let mut tx = pool.begin().await.context("Failed to begin link transaction")?;
                for id in &to_add {
                    sqlx::query(&insert_sql)
                        .bind(item_id)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to add {} link", table))?;
                }
                for id in &to_remove {
                    sqlx::query(&delete_sql)
                        .bind(item_id)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to remove {} link", table))?;
                }
                tx.commit().await.context("Failed to commit link transaction")?;
            }
        }

        Ok(())
    }
}

fn row_to_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Item {
    Item {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        show: row.get("visible"),
        price: row.get("price"),
        quantity: row.get("quantity"),
        created_at: row.get("created_at"),
    }
}

fn row_to_item_mysql(row: &sqlx::mysql::MySqlRow) -> Item {
    Item {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        show: row.get("visible"),
        price: row.get("price"),
        quantity: row.get("quantity"),
        created_at: row.get("created_at"),
    }
}

async fn create_sqlite(pool: &SqlitePool, item: &Item) -> Result<Item> {
    let result = sqlx::query(
        "INSERT INTO items (name, description, visible, price, quantity, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.show)
    .bind(item.price)
    .bind(item.quantity)
    .bind(item.created_at)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    Ok(Item {
        id: result.last_insert_rowid(),
        ..item.clone()
    })
}

async fn create_mysql(pool: &MySqlPool, item: &Item) -> Result<Item> {
    let result = sqlx::query(
        "INSERT INTO items (name, description, visible, price, quantity, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.show)
    .bind(item.price)
    .bind(item.quantity)
    .bind(item.created_at)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    Ok(Item {
        id: result.last_insert_id() as i64,
        ..item.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by ID")?;
    Ok(row.map(|row| row_to_item_sqlite(&row)))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by ID")?;
    Ok(row.map(|row| row_to_item_mysql(&row)))
}

async fn update_sqlite(pool: &SqlitePool, item: &Item) -> Result<()> {
    sqlx::query(
        "UPDATE items SET name = ?, description = ?, visible = ?, price = ?, quantity = ? WHERE id = ?",
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.show)
    .bind(item.price)
    .bind(item.quantity)
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;
    Ok(())
}

async fn update_mysql(pool: &MySqlPool, item: &Item) -> Result<()> {
    sqlx::query(
        "UPDATE items SET name = ?, description = ?, visible = ?, price = ?, quantity = ? WHERE id = ?",
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.show)
    .bind(item.price)
    .bind(item.quantity)
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxItemRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxItemRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup().await;
        let created = repo
            .create(&Item::new("Hammer".to_string(), None, Some(12.5), Some(3)))
            .await
            .unwrap();
        assert!(created.id > 0);

        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Hammer");
        assert_eq!(loaded.price, Some(12.5));
        assert_eq!(loaded.quantity, Some(3));
    }

    #[tokio::test]
    async fn test_update() {
        let repo = setup().await;
        let mut item = repo
            .create(&Item::new("Hammer".to_string(), None, None, None))
            .await
            .unwrap();
        item.price = Some(15.0);
        item.show = false;
        repo.update(&item).await.unwrap();

        let loaded = repo.get_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.price, Some(15.0));
        assert!(!loaded.show);
    }

    #[tokio::test]
    async fn test_save_relatives_diff() {
        let repo = setup().await;
        let a = repo.create(&Item::new("A".to_string(), None, None, None)).await.unwrap();
        let b = repo.create(&Item::new("B".to_string(), None, None, None)).await.unwrap();
        let c = repo.create(&Item::new("C".to_string(), None, None, None)).await.unwrap();

        repo.save_relatives(a.id, &[b.id, c.id]).await.unwrap();
        assert_eq!(repo.relatives(a.id).await.unwrap(), vec![b.id, c.id]);

        // B stays, C is removed, nothing new
        repo.save_relatives(a.id, &[b.id]).await.unwrap();
        assert_eq!(repo.relatives(a.id).await.unwrap(), vec![b.id]);

        repo.save_relatives(a.id, &[]).await.unwrap();
        assert!(repo.relatives(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_relatives_idempotent() {
        let repo = setup().await;
        let a = repo.create(&Item::new("A".to_string(), None, None, None)).await.unwrap();
        let b = repo.create(&Item::new("B".to_string(), None, None, None)).await.unwrap();

        repo.save_relatives(a.id, &[b.id]).await.unwrap();
        repo.save_relatives(a.id, &[b.id]).await.unwrap();
        assert_eq!(repo.relatives(a.id).await.unwrap(), vec![b.id]);
    }

    #[tokio::test]
    async fn test_section_membership() {
        let repo = setup().await;
        let item = repo.create(&Item::new("A".to_string(), None, None, None)).await.unwrap();

        // A section row to link against
        use crate::db::repositories::SectionRepository;
        let sections = crate::db::repositories::SqlxSectionRepository::new(repo.pool.clone());
        let section = sections
            .create(&crate::models::Section::new("Tools".to_string(), None))
            .await
            .unwrap();

        repo.save_sections(item.id, &[section.id]).await.unwrap();
        assert_eq!(repo.section_ids(item.id).await.unwrap(), vec![section.id]);
    }
}
