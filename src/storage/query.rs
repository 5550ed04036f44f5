//! Shared SQL for link store backends.
//!
//! Both backends use the same two-table layout: `shell_identifier` holds one
//! row per present shell, `asset_link` holds its pairs and cascades on delete.
//!
//! Constraints travel as a single JSON array parameter that the database
//! expands into a numbered constraint relation `v(ord, name, value)`. The
//! search joins links against `v` and keeps shells that matched every
//! `ord`, so statement size and parameter count stay fixed however many
//! constraints a search carries.

use serde_json::{Value, json};

use crate::models::AssetLink;

/// SQL dialect of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `SQLite`: `?N` placeholders, `json_each`.
    Sqlite,
    /// PostgreSQL: `$N` placeholders, `jsonb_array_elements`.
    Postgres,
}

impl Dialect {
    fn at(self, index: usize) -> String {
        match self {
            Self::Sqlite => format!("?{index}"),
            Self::Postgres => format!("${index}"),
        }
    }

    fn constraint_relation(self, param: &str) -> String {
        match self {
            Self::Sqlite => format!(
                "SELECT c.key, json_extract(c.value, '$.name'), json_extract(c.value, '$.value') \
                 FROM json_each({param}) AS c"
            ),
            Self::Postgres => format!(
                "SELECT t.ord, t.e ->> 'name', t.e ->> 'value' \
                 FROM jsonb_array_elements({param}::jsonb) WITH ORDINALITY AS t(e, ord)"
            ),
        }
    }
}

/// Encodes constraints as the JSON array bound to the search statement.
#[must_use]
pub fn constraint_set(constraints: &[AssetLink]) -> Value {
    Value::Array(
        constraints
            .iter()
            .map(|link| json!({"name": link.name, "value": link.value}))
            .collect(),
    )
}

/// Builds the search statement.
///
/// Bind order: the start identifier (only when `has_start`), then the
/// constraint set and the constraint count (only when `has_constraints`),
/// then the row limit.
#[must_use]
pub fn search_sql(dialect: Dialect, has_constraints: bool, has_start: bool) -> String {
    let mut index = 1;
    let start_clause = if has_start {
        let clause = format!(" WHERE s.shell_id >= {}", dialect.at(index));
        index += 1;
        clause
    } else {
        String::new()
    };

    if !has_constraints {
        return format!(
            "SELECT s.shell_id FROM shell_identifier s{start_clause} \
             ORDER BY s.shell_id ASC LIMIT {}",
            dialect.at(index)
        );
    }

    let relation = dialect.constraint_relation(&dialect.at(index));
    let count = dialect.at(index + 1);
    let limit = dialect.at(index + 2);

    format!(
        "WITH v(ord, name, value) AS ({relation}) \
         SELECT s.shell_id FROM shell_identifier s \
         JOIN asset_link l ON l.shell_ref = s.id \
         JOIN v ON v.name = l.name AND v.value = l.value{start_clause} \
         GROUP BY s.id, s.shell_id \
         HAVING COUNT(DISTINCT v.ord) = {count} \
         ORDER BY s.shell_id ASC LIMIT {limit}"
    )
}
