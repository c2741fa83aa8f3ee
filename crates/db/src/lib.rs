use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use utils::assets::db_path;

pub mod entities;
pub mod models;
pub mod types;

pub use sea_orm::{ConnectionTrait, DbErr, SqlErr, TransactionTrait};

#[derive(Clone)]
pub struct DBService {
    pub connection: DatabaseConnection,
}

impl DBService {
    /// Connects to the on-disk database and brings the schema up to date.
    /// A failure here is fatal: the process must not serve without storage.
    pub async fn new() -> Result<DBService, DbErr> {
        let database_url = format!("sqlite://{}?mode=rwc", db_path().to_string_lossy());
        Self::new_with_url(&database_url).await
    }

    pub async fn new_with_url(database_url: &str) -> Result<DBService, DbErr> {
        // In-memory databases must stay on a single connection or every
        // pooled connection sees its own empty database.
        let max_connections = if database_url.contains("memory") { 1 } else { 5 };

        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .max_connections(max_connections)
            .connect_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let connection = Database::connect(options).await?;
        connection
            .execute_unprepared("PRAGMA journal_mode = WAL;")
            .await?;
        connection
            .execute_unprepared("PRAGMA busy_timeout = 30000;")
            .await?;
        db_migration::Migrator::up(&connection, None).await?;
        tracing::debug!("Database ready at {database_url}");

        Ok(DBService { connection })
    }
}
