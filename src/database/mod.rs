use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};

use crate::config::DatabaseConfig;
use crate::error::AppResult;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options.max_connections(config.max_connections);
    Ok(Database::connect(options).await?)
}

pub async fn run_migrations(pool: &DatabaseConnection) -> AppResult<()> {
    Migrator::up(pool, None).await?;
    Ok(())
}

/// Whether a database error is a unique-constraint violation.
///
/// Losing an insert race on a unique index is an expected outcome for entry
/// and student creation; callers translate it into "read the row the winner
/// committed".
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
