//! Image repository
//!
//! Images attach to content rows through the kind + id pair; the tree
//! never references images directly.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ContentKind, ContentRef, TreeItemImage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Image repository trait
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Attach an image to a content row
    async fn create(&self, image: &TreeItemImage) -> Result<TreeItemImage>;

    /// All images of a content row, oldest first
    async fn list_for(&self, content: ContentRef) -> Result<Vec<TreeItemImage>>;

    /// Delete an image by ID
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based image repository implementation
pub struct SqlxImageRepository {
    pool: DynDatabasePool,
}

impl SqlxImageRepository {
    /// Create a new SQLx image repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ImageRepository> {
        Arc::new(Self::new(pool))
    }
}

const IMAGE_COLUMNS: &str = "id, content_kind, content_id, path, palette, created_at";

#[async_trait]
impl ImageRepository for SqlxImageRepository {
    async fn create(&self, image: &TreeItemImage) -> Result<TreeItemImage> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), image).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), image).await,
        }
    }

    async fn list_for(&self, content: ContentRef) -> Result<Vec<TreeItemImage>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_sqlite(self.pool.as_sqlite().unwrap(), content).await
            }
            DatabaseDriver::Mysql => list_for_mysql(self.pool.as_mysql().unwrap(), content).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM tree_item_images WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete image")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete image")?;
            }
        }
        Ok(())
    }
}

fn row_to_image_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<TreeItemImage> {
    let kind = ContentKind::from_str(row.get("content_kind"))?;
    Ok(TreeItemImage {
        id: row.get("id"),
        content: ContentRef::new(kind, row.get("content_id")),
        path: row.get("path"),
        palette: row.get("palette"),
        created_at: row.get("created_at"),
    })
}

fn row_to_image_mysql(row: &sqlx::mysql::MySqlRow) -> Result<TreeItemImage> {
    let kind = ContentKind::from_str(row.get("content_kind"))?;
    Ok(TreeItemImage {
        id: row.get("id"),
        content: ContentRef::new(kind, row.get("content_id")),
        path: row.get("path"),
        palette: row.get("palette"),
        created_at: row.get("created_at"),
    })
}

async fn create_sqlite(pool: &SqlitePool, image: &TreeItemImage) -> Result<TreeItemImage> {
    let result = sqlx::query(
        "INSERT INTO tree_item_images (content_kind, content_id, path, palette, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(image.content.kind.as_str())
    .bind(image.content.id)
    .bind(&image.path)
    .bind(image.palette)
    .bind(image.created_at)
    .execute(pool)
    .await
    .context("Failed to create image")?;

    Ok(TreeItemImage {
        id: result.last_insert_rowid(),
        ..image.clone()
    })
}

async fn create_mysql(pool: &MySqlPool, image: &TreeItemImage) -> Result<TreeItemImage> {
    let result = sqlx::query(
        "INSERT INTO tree_item_images (content_kind, content_id, path, palette, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(image.content.kind.as_str())
    .bind(image.content.id)
    .bind(&image.path)
    .bind(image.palette)
    .bind(image.created_at)
    .execute(pool)
    .await
    .context("Failed to create image")?;

    Ok(TreeItemImage {
        id: result.last_insert_id() as i64,
        ..image.clone()
    })
}

async fn list_for_sqlite(pool: &SqlitePool, content: ContentRef) -> Result<Vec<TreeItemImage>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tree_item_images WHERE content_kind = ? AND content_id = ? ORDER BY id",
        IMAGE_COLUMNS
    ))
    .bind(content.kind.as_str())
    .bind(content.id)
    .fetch_all(pool)
    .await
    .context("Failed to list images")?;

    rows.iter().map(row_to_image_sqlite).collect()
}

async fn list_for_mysql(pool: &MySqlPool, content: ContentRef) -> Result<Vec<TreeItemImage>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tree_item_images WHERE content_kind = ? AND content_id = ? ORDER BY id",
        IMAGE_COLUMNS
    ))
    .bind(content.kind.as_str())
    .bind(content.id)
    .fetch_all(pool)
    .await
    .context("Failed to list images")?;

    rows.iter().map(row_to_image_mysql).collect()
}
