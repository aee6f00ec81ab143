//! Embedded schema migrations from `keeper_core/migrations/`.

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(known = MIGRATOR.iter().count(), "schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_schema_is_embedded() {
        assert!(MIGRATOR.iter().any(|m| m.description == "init"));
    }
}
