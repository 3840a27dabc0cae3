//! Backend adapters built on sqlx.
//!
//! Each adapter is compiled in by the Cargo feature of the same name.
//! [`create_database`] picks one from a descriptor's scheme.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::database::{ColumnInfo, ConnectionDescriptor, Database, LinkError};
use crate::error::{SquallError, SquallResult};
use std::sync::Arc;

/// Schemes understood by [`create_database`], with whether each was compiled in.
pub const BACKENDS: &[(&str, bool)] = &[
    ("sqlite", cfg!(feature = "sqlite")),
    ("mysql", cfg!(feature = "mysql")),
    ("postgres", cfg!(feature = "postgres")),
];

/// Names of the backends available in this build.
pub fn available_backends() -> Vec<&'static str> {
    BACKENDS
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| *name)
        .collect()
}

/// Build the adapter for `descriptor.scheme`.
///
/// Unknown schemes and backends left out of the build fail with
/// [`SquallError::DatabaseModule`].
pub fn create_database(descriptor: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    match descriptor.scheme.as_str() {
        "sqlite" => sqlite_database(descriptor),
        "mysql" => mysql_database(descriptor),
        "postgres" | "postgresql" => postgres_database(descriptor),
        other => Err(SquallError::DatabaseModule(format!(
            "unknown database scheme '{other}' (known: {})",
            BACKENDS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
        ))),
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_database(descriptor: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    Ok(Arc::new(sqlite::SqliteDatabase::new(descriptor)?))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_database(_: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    Err(missing_feature("sqlite"))
}

#[cfg(feature = "mysql")]
fn mysql_database(descriptor: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    Ok(Arc::new(mysql::MySqlDatabase::new(descriptor)?))
}

#[cfg(not(feature = "mysql"))]
fn mysql_database(_: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    Err(missing_feature("mysql"))
}

#[cfg(feature = "postgres")]
fn postgres_database(descriptor: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    Ok(Arc::new(postgres::PostgresDatabase::new(descriptor)?))
}

#[cfg(not(feature = "postgres"))]
fn postgres_database(_: &ConnectionDescriptor) -> SquallResult<Arc<dyn Database>> {
    Err(missing_feature("postgres"))
}

#[allow(dead_code)]
fn missing_feature(name: &str) -> SquallError {
    SquallError::DatabaseModule(format!(
        "squall was built without the '{name}' feature; rebuild with `--features {name}`"
    ))
}

/// Column names and type names of a row or statement description.
#[allow(dead_code)]
pub(crate) fn column_info<C: sqlx::Column>(columns: &[C]) -> Vec<ColumnInfo> {
    use sqlx::TypeInfo as _;

    columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            type_name: c.type_info().name().to_string(),
        })
        .collect()
}

/// Whether `sql` is a statement that yields rows, and so has columns to
/// describe when it yields none.
#[allow(dead_code)]
pub(crate) fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    ["SELECT", "WITH", "VALUES", "SHOW", "PRAGMA", "EXPLAIN"]
        .iter()
        .any(|k| keyword.eq_ignore_ascii_case(k))
}

impl From<sqlx::Error> for LinkError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => LinkError::Database {
                code: db.code().map(|c| c.into_owned()),
                message: db.message().to_string(),
            },
            sqlx::Error::Io(io) => LinkError::Io(io.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => LinkError::Closed,
            e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                LinkError::Unsupported(e.to_string())
            }
            other => LinkError::Driver(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_scheme() {
        let err = create_database(&ConnectionDescriptor::new("oracle")).unwrap_err();
        assert!(matches!(err, SquallError::DatabaseModule(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_available_backends_match_features() {
        let available = available_backends();
        assert_eq!(available.contains(&"sqlite"), cfg!(feature = "sqlite"));
        assert_eq!(available.contains(&"mysql"), cfg!(feature = "mysql"));
        assert_eq!(available.contains(&"postgres"), cfg!(feature = "postgres"));
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  (select id FROM t) UNION (SELECT 2)"));
        assert!(returns_rows("with x AS (SELECT 1) SELECT * FROM x"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
        assert!(!returns_rows("CREATE TABLE selection (id INT)"));
        assert!(!returns_rows(""));
    }

    #[test]
    fn test_io_errors_are_link_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(matches!(LinkError::from(sqlx::Error::Io(io)), LinkError::Io(_)));
        assert!(matches!(LinkError::from(sqlx::Error::PoolClosed), LinkError::Closed));
        assert!(matches!(
            LinkError::from(sqlx::Error::RowNotFound),
            LinkError::Driver(_)
        ));
    }
}
