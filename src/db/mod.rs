//! Database layer
//!
//! Database abstraction for Rubrica. Supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The driver is selected from configuration; repositories dispatch on
//! `DatabasePool::driver()` so the rest of the application never knows
//! which backend it is talking to.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
