//! Persistence layer (§3.A).
//!
//! One [`sea_orm::DatabaseConnection`] per process, built from
//! `DATABASE_URL` at startup and shared behind an `Arc`.

pub mod entities;
pub mod migration;

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Connect and run migrations. Call once at process startup.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    migration::run(&db).await?;
    Ok(db)
}
