//! `SQLite`-backed link store.

use crate::models::{Reference, ShellId, SpecificAssetId};
use crate::storage::metrics::{record_operation_metrics, status_of};
use crate::storage::query::{Dialect, constraint_set, search_sql};
use crate::storage::sqlite::{acquire_lock, configure_connection};
use crate::storage::traits::{LinkQuery, LinkStore, ShellPage, distinct_pairs, validate_pairs};
use crate::{Error, Result};
use rusqlite::{Connection, ToSql, TransactionBehavior, params};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS shell_identifier (
        id INTEGER PRIMARY KEY,
        shell_id TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS asset_link (
        id INTEGER PRIMARY KEY,
        shell_ref INTEGER NOT NULL REFERENCES shell_identifier(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        value TEXT NOT NULL,
        external_subject_id TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_asset_link_name_value ON asset_link(name, value);
    CREATE INDEX IF NOT EXISTS idx_asset_link_shell_ref ON asset_link(shell_ref);
";

fn storage_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// `SQLite` link store.
///
/// A single `Mutex<Connection>` serializes access; WAL mode lets a file
/// database serve readers from other processes while a write is in flight.
/// Writes run in `BEGIN IMMEDIATE` transactions so the write lock is taken
/// up front rather than on the first write statement.
///
/// Text columns compare with the default `BINARY` collation, which orders
/// UTF-8 by bytes and matches [`ShellId`] ordering.
pub struct SqliteLinkStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteLinkStore {
    /// Opens or creates a file-backed store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_data_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(storage_error("open_sqlite"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error("open_sqlite_in_memory"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)
            .map_err(storage_error("create_schema"))
    }

    fn put_inner(&self, shell: &ShellId, pairs: &[SpecificAssetId]) -> Result<()> {
        validate_pairs(pairs)?;
        let pairs = distinct_pairs(pairs);

        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error("begin_transaction"))?;

        if pairs.is_empty() {
            tx.execute(
                "DELETE FROM shell_identifier WHERE shell_id = ?1",
                params![shell.as_str()],
            )
            .map_err(storage_error("put_links"))?;
        } else {
            let shell_ref: i64 = tx
                .query_row(
                    "INSERT INTO shell_identifier (shell_id) VALUES (?1)
                     ON CONFLICT(shell_id) DO UPDATE SET shell_id = excluded.shell_id
                     RETURNING id",
                    params![shell.as_str()],
                    |row| row.get(0),
                )
                .map_err(storage_error("upsert_shell"))?;

            tx.execute(
                "DELETE FROM asset_link WHERE shell_ref = ?1",
                params![shell_ref],
            )
            .map_err(storage_error("clear_links"))?;

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO asset_link (shell_ref, position, name, value, external_subject_id)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(storage_error("insert_links"))?;
                for (position, pair) in (0_i64..).zip(pairs.iter()) {
                    let subject = pair
                        .external_subject_id
                        .as_ref()
                        .map(Reference::to_json_string);
                    stmt.execute(params![shell_ref, position, pair.name, pair.value, subject])
                        .map_err(storage_error("insert_links"))?;
                }
            }
        }

        // Dropping an uncommitted transaction rolls it back.
        tx.commit().map_err(storage_error("commit_transaction"))
    }

    fn get_inner(&self, shell: &ShellId) -> Result<Vec<SpecificAssetId>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare_cached(
                "SELECT l.name, l.value, l.external_subject_id
                 FROM asset_link l
                 JOIN shell_identifier s ON s.id = l.shell_ref
                 WHERE s.shell_id = ?1
                 ORDER BY l.position ASC",
            )
            .map_err(storage_error("get_links"))?;

        let rows = stmt
            .query_map(params![shell.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(storage_error("get_links"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("get_links"))?;

        if rows.is_empty() {
            return Err(Error::NotFound(format!("shell '{shell}'")));
        }

        rows.into_iter()
            .map(|(name, value, subject)| {
                let mut pair = SpecificAssetId::new(name, value);
                if let Some(text) = subject {
                    pair = pair.with_external_subject_id(Reference::from_json_str(&text)?);
                }
                Ok(pair)
            })
            .collect()
    }

    fn delete_inner(&self, shell: &ShellId) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        // Single statement; the cascade removes the pairs atomically with it.
        let deleted = conn
            .execute(
                "DELETE FROM shell_identifier WHERE shell_id = ?1",
                params![shell.as_str()],
            )
            .map_err(storage_error("delete_links"))?;

        if deleted == 0 {
            return Err(Error::NotFound(format!("shell '{shell}'")));
        }
        Ok(())
    }

    fn search_inner(&self, query: &LinkQuery) -> Result<ShellPage> {
        let has_constraints = !query.constraints.is_empty();
        let sql = search_sql(Dialect::Sqlite, has_constraints, query.start_at.is_some());
        let fetch = i64::try_from(query.fetch_size()).unwrap_or(i64::MAX);
        let count = i64::try_from(query.constraints.len()).unwrap_or(i64::MAX);
        let constraints = constraint_set(&query.constraints).to_string();

        let start = query.start_at.as_ref().map(ShellId::as_str);

        let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(4);
        if let Some(start) = &start {
            bound.push(start);
        }
        if has_constraints {
            bound.push(&constraints);
            bound.push(&count);
        }
        bound.push(&fetch);

        let conn = acquire_lock(&self.conn);
        let mut stmt = conn.prepare(&sql).map_err(storage_error("search"))?;
        let rows = stmt
            .query_map(bound.as_slice(), |row| row.get::<_, String>(0))
            .map_err(storage_error("search"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("search"))?;

        let ids = rows
            .into_iter()
            .map(|id| {
                ShellId::new(id).map_err(|e| Error::OperationFailed {
                    operation: "search".to_string(),
                    cause: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ShellPage::from_peeked(ids, query.limit))
    }
}

impl LinkStore for SqliteLinkStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(
        skip_all,
        fields(operation = "put", backend = BACKEND, shell_id = %shell, pairs = pairs.len())
    )]
    fn put(&self, shell: &ShellId, pairs: &[SpecificAssetId]) -> Result<()> {
        let start = Instant::now();
        let result = self.put_inner(shell, pairs);
        record_operation_metrics(BACKEND, "put", start, status_of(&result));
        result
    }

    #[instrument(skip_all, fields(operation = "get", backend = BACKEND, shell_id = %shell))]
    fn get(&self, shell: &ShellId) -> Result<Vec<SpecificAssetId>> {
        let start = Instant::now();
        let result = self.get_inner(shell);
        record_operation_metrics(BACKEND, "get", start, status_of(&result));
        result
    }

    #[instrument(skip_all, fields(operation = "delete", backend = BACKEND, shell_id = %shell))]
    fn delete(&self, shell: &ShellId) -> Result<()> {
        let start = Instant::now();
        let result = self.delete_inner(shell);
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
        let result = self.search_inner(query);
        record_operation_metrics(BACKEND, "search", start, status_of(&result));
        result
    }
}
