//! PostgreSQL-backed link store.

use crate::models::{Reference, ShellId, SpecificAssetId};
use crate::storage::migrations::{Migration, MigrationRunner};
use crate::storage::metrics::{record_operation_metrics, status_of};
use crate::storage::query::{Dialect, constraint_set, search_sql};
use crate::storage::traits::{LinkQuery, LinkStore, ShellPage, distinct_pairs, validate_pairs};
use crate::{Error, Result};
use deadpool_postgres::{Config, Pool, Runtime};
use std::time::{Duration, Instant};
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;
use tracing::instrument;

const BACKEND: &str = "postgresql";

/// Embedded migrations compiled into the binary.
///
/// `shell_id` uses the `"C"` collation so ordering and the cursor bound
/// compare bytes, independent of the database locale.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Shell identifier and asset link tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS shell_identifier (
                id BIGSERIAL PRIMARY KEY,
                shell_id TEXT COLLATE "C" NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS asset_link (
                id BIGSERIAL PRIMARY KEY,
                shell_ref BIGINT NOT NULL REFERENCES shell_identifier(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                external_subject_id JSONB
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Lookup indexes",
        sql: r"
            CREATE INDEX IF NOT EXISTS idx_asset_link_name_value ON asset_link (name, value);
            CREATE INDEX IF NOT EXISTS idx_asset_link_shell_ref ON asset_link (shell_ref);
        ",
    },
];

/// Default maximum connections in pool.
const DEFAULT_POOL_MAX_SIZE: usize = 20;

fn pool_error(e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "postgres_get_client".to_string(),
        cause: e.to_string(),
    }
}

fn query_error(op: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: op.to_string(),
        cause: e.to_string(),
    }
}

/// PostgreSQL link store.
///
/// Owns a small tokio runtime that drives the async pool, so the store can
/// be called from synchronous code. Its methods must not be called from
/// inside another tokio runtime; use `spawn_blocking` there.
pub struct PostgresLinkStore {
    pool: Pool,
    runtime: tokio::runtime::Runtime,
}

impl PostgresLinkStore {
    /// Connects and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the pool cannot be created or
    /// a migration fails.
    pub fn new(connection_url: &str) -> Result<Self> {
        Self::with_pool_size(connection_url, None)
    }

    /// Connects with a maximum pool size (defaults to 20).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the pool cannot be created or
    /// a migration fails.
    pub fn with_pool_size(connection_url: &str, pool_max_size: Option<usize>) -> Result<Self> {
        let config = connection_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| query_error("postgres_parse_url", e))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("discovery-postgres")
            .enable_all()
            .build()
            .map_err(|e| query_error("postgres_create_runtime", e))?;

        let pool = build_pool_config(&config, pool_max_size)
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| query_error("postgres_create_pool", e))?;

        let store = Self { pool, runtime };
        let applied = store.block_on(async {
            MigrationRunner::new(store.pool.clone(), "discovery")
                .run(MIGRATIONS)
                .await
        })?;
        tracing::debug!(applied, "PostgreSQL link store ready");
        Ok(store)
    }

    fn block_on<F, T>(&self, f: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.runtime.block_on(f)
    }

    async fn put_async(&self, shell: &ShellId, pairs: &[SpecificAssetId]) -> Result<()> {
        validate_pairs(pairs)?;
        let pairs = distinct_pairs(pairs);

        let mut client = self.pool.get().await.map_err(pool_error)?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| query_error("begin_transaction", e))?;

        if pairs.is_empty() {
            tx.execute(
                "DELETE FROM shell_identifier WHERE shell_id = $1",
                &[&shell.as_str()],
            )
            .await
            .map_err(|e| query_error("put_links", e))?;
        } else {
            let shell_ref: i64 = tx
                .query_one(
                    "INSERT INTO shell_identifier (shell_id) VALUES ($1)
                     ON CONFLICT (shell_id) DO UPDATE SET shell_id = EXCLUDED.shell_id
                     RETURNING id",
                    &[&shell.as_str()],
                )
                .await
                .map_err(|e| query_error("upsert_shell", e))?
                .get(0);

            tx.execute("DELETE FROM asset_link WHERE shell_ref = $1", &[&shell_ref])
                .await
                .map_err(|e| query_error("clear_links", e))?;

            let insert = tx
                .prepare(
                    "INSERT INTO asset_link (shell_ref, position, name, value, external_subject_id)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .await
                .map_err(|e| query_error("insert_links", e))?;

            for (position, pair) in (0_i32..).zip(pairs.iter()) {
                let subject = pair.external_subject_id.as_ref().map(Reference::as_value);
                tx.execute(
                    &insert,
                    &[&shell_ref, &position, &pair.name, &pair.value, &subject],
                )
                .await
                .map_err(|e| query_error("insert_links", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| query_error("commit_transaction", e))
    }

    async fn get_async(&self, shell: &ShellId) -> Result<Vec<SpecificAssetId>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(
                "SELECT l.name, l.value, l.external_subject_id
                 FROM asset_link l
                 JOIN shell_identifier s ON s.id = l.shell_ref
                 WHERE s.shell_id = $1
                 ORDER BY l.position ASC",
                &[&shell.as_str()],
            )
            .await
            .map_err(|e| query_error("get_links", e))?;

        if rows.is_empty() {
            return Err(Error::NotFound(format!("shell '{shell}'")));
        }

        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(|e| query_error("get_links", e))?;
                let value: String = row.try_get(1).map_err(|e| query_error("get_links", e))?;
                let subject: Option<serde_json::Value> =
                    row.try_get(2).map_err(|e| query_error("get_links", e))?;

                let pair = SpecificAssetId::new(name, value);
                Ok(match subject {
                    Some(json) => pair.with_external_subject_id(Reference::new(json)),
                    None => pair,
                })
            })
            .collect()
    }

    async fn delete_async(&self, shell: &ShellId) -> Result<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let deleted = client
            .execute(
                "DELETE FROM shell_identifier WHERE shell_id = $1",
                &[&shell.as_str()],
            )
            .await
            .map_err(|e| query_error("delete_links", e))?;

        if deleted == 0 {
            return Err(Error::NotFound(format!("shell '{shell}'")));
        }
        Ok(())
    }

    async fn search_async(&self, query: &LinkQuery) -> Result<ShellPage> {
        let has_constraints = !query.constraints.is_empty();
        let sql = search_sql(Dialect::Postgres, has_constraints, query.start_at.is_some());
        let fetch = i64::try_from(query.fetch_size()).unwrap_or(i64::MAX);
        let count = i64::try_from(query.constraints.len()).unwrap_or(i64::MAX);
        let constraints = constraint_set(&query.constraints);
        let start = query.start_at.as_ref().map(ShellId::as_str);

        let mut bound: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(4);
        if let Some(start) = &start {
            bound.push(start);
        }
        if has_constraints {
            bound.push(&constraints);
            bound.push(&count);
        }
        bound.push(&fetch);

        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(sql.as_str(), &bound)
            .await
            .map_err(|e| query_error("search", e))?;

        let ids = rows
            .iter()
            .map(|row| {
                let id: String = row.try_get(0).map_err(|e| query_error("search", e))?;
                ShellId::new(id).map_err(|e| query_error("search", e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ShellPage::from_peeked(ids, query.limit))
    }
}

#[cfg(unix)]
fn host_to_string(h: &tokio_postgres::config::Host) -> String {
    match h {
        tokio_postgres::config::Host::Tcp(s) => s.clone(),
        tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
    }
}

#[cfg(not(unix))]
fn host_to_string(h: &tokio_postgres::config::Host) -> String {
    let tokio_postgres::config::Host::Tcp(s) = h;
    s.clone()
}

/// Builds a deadpool config with a bounded pool and 5 second timeouts.
fn build_pool_config(config: &tokio_postgres::Config, pool_max_size: Option<usize>) -> Config {
    let mut cfg = Config::new();
    cfg.host = config.get_hosts().first().map(host_to_string);
    cfg.port = config.get_ports().first().copied();
    cfg.user = config.get_user().map(String::from);
    cfg.password = config
        .get_password()
        .map(|p| String::from_utf8_lossy(p).to_string());
    cfg.dbname = config.get_dbname().map(String::from);

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });
    cfg.manager = Some(deadpool_postgres::ManagerConfig {
        recycling_method: deadpool_postgres::RecyclingMethod::Fast,
    });
    cfg
}

impl LinkStore for PostgresLinkStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(
        skip_all,
        fields(operation = "put", backend = BACKEND, shell_id = %shell, pairs = pairs.len())
    )]
    fn put(&self, shell: &ShellId, pairs: &[SpecificAssetId]) -> Result<()> {
        let start = Instant::now();
        let result = self.block_on(self.put_async(shell, pairs));
        record_operation_metrics(BACKEND, "put", start, status_of(&result));
        result
    }

    #[instrument(skip_all, fields(operation = "get", backend = BACKEND, shell_id = %shell))]
    fn get(&self, shell: &ShellId) -> Result<Vec<SpecificAssetId>> {
        let start = Instant::now();
        let result = self.block_on(self.get_async(shell));
        record_operation_metrics(BACKEND, "get", start, status_of(&result));
        result
    }

    #[instrument(skip_all, fields(operation = "delete", backend = BACKEND, shell_id = %shell))]
    fn delete(&self, shell: &ShellId) -> Result<()> {
        let start = Instant::now();
        let result = self.block_on(self.delete_async(shell));
        record_operation_metrics(BACKEND, "delete", start, status_of(&result));
        result
    }

    #[instrument(
        skip_all,
        fields(
            operation = "search",
            backend = BACKEND,
            constraints = query.constraints.len(),
            limit = query.limit
        )
    )]
    fn search(&self, query: &LinkQuery) -> Result<ShellPage> {
        let start = Instant::now();
        let result = self.block_on(self.search_async(query));
        record_operation_metrics(BACKEND, "search", start, status_of(&result));
        result
    }
}
