//! Versioned PostgreSQL schema migrations.
//!
//! Migrations are embedded at compile time and applied in order when a
//! store opens. Each one runs in its own transaction together with the row
//! recording it, under a transaction-scoped advisory lock so that several
//! processes opening the same database apply it exactly once.

use crate::{Error, Result};
use deadpool_postgres::Pool;

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// SQL to apply; may contain several statements.
    pub sql: &'static str,
}

/// Applies [`Migration`]s and tracks them in `{prefix}_schema_migrations`.
pub struct MigrationRunner {
    pool: Pool,
    prefix: String,
}

fn migration_error(operation: impl Into<String>, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.into(),
        cause: e.to_string(),
    }
}

impl MigrationRunner {
    /// Creates a runner whose tracking table is named after `prefix`.
    #[must_use]
    pub fn new(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn tracking_table(&self) -> String {
        format!("{}_schema_migrations", self.prefix)
    }

    /// Advisory lock key derived from the prefix, stable across processes.
    fn lock_key(&self) -> i64 {
        self.prefix
            .bytes()
            .fold(0x0d15_c0e7_i64, |acc, b| acc.wrapping_mul(31).wrapping_add(i64::from(b)))
    }

    /// Applies every migration newer than the recorded version.
    ///
    /// Returns the number of migrations applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if a migration fails; that
    /// migration is rolled back and later ones are not attempted.
    pub async fn run(&self, migrations: &[Migration]) -> Result<usize> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| migration_error("migration_get_connection", e))?;

        let tracking = self.tracking_table();
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {tracking} (
                    version INTEGER PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )"
            ))
            .await
            .map_err(|e| migration_error("create_migrations_table", e))?;

        let mut applied = 0;
        for migration in migrations {
            let tx = client
                .transaction()
                .await
                .map_err(|e| migration_error(format!("migration_v{}_begin_tx", migration.version), e))?;

            tx.execute("SELECT pg_advisory_xact_lock($1)", &[&self.lock_key()])
                .await
                .map_err(|e| migration_error("migration_lock", e))?;

            let current: i32 = tx
                .query_one(&format!("SELECT COALESCE(MAX(version), 0) FROM {tracking}"), &[])
                .await
                .map_err(|e| migration_error("migration_current_version", e))?
                .get(0);

            if migration.version <= current {
                continue;
            }

            tx.batch_execute(migration.sql).await.map_err(|e| {
                migration_error(
                    format!("migration_v{}: {}", migration.version, migration.description),
                    e,
                )
            })?;

            tx.execute(
                &format!("INSERT INTO {tracking} (version, description) VALUES ($1, $2)"),
                &[&migration.version, &migration.description],
            )
            .await
            .map_err(|e| migration_error("record_migration", e))?;

            tx.commit()
                .await
                .map_err(|e| migration_error(format!("migration_v{}_commit", migration.version), e))?;

            tracing::info!(
                version = migration.version,
                description = migration.description,
                prefix = self.prefix,
                "Applied migration"
            );
            applied += 1;
        }

        Ok(applied)
    }
}
