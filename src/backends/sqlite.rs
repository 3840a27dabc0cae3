//! SQLite adapter.
//!
//! Descriptor: `database` is a file path (`:memory:` when absent). Options:
//! `timeout` (busy timeout in seconds, default 5) and `journal_mode`.

use crate::compiler::dialects::sqlite as dialect;
use crate::compiler::Compiler;
use super::{column_info, returns_rows};
use crate::database::{
    ConnectionDescriptor, Database, LinkError, RawCursor, RawLink, WireConverters, WireParam,
};
use crate::error::{SquallError, SquallResult};
use crate::expr::{Column, Expr};
use crate::value::{format_interval, Row, Value};
use crate::variables::Variable;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow,
};
use sqlx::{ConnectOptions, Connection as _, Either, Executor, Row as _, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    options: SqliteConnectOptions,
    filename: String,
}

impl SqliteDatabase {
    pub fn new(descriptor: &ConnectionDescriptor) -> SquallResult<Self> {
        let filename = descriptor
            .database
            .clone()
            .unwrap_or_else(|| ":memory:".to_string());
        let mut options = if filename == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| SquallError::Config(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&filename)
                .create_if_missing(true)
        };

        let timeout = descriptor
            .parse_option::<f64>("timeout")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !timeout.is_finite() || timeout < 0.0 {
            return Err(SquallError::Config(format!("invalid sqlite timeout {timeout}")));
        }
        options = options.busy_timeout(Duration::from_secs_f64(timeout));

        if let Some(mode) = descriptor.option("journal_mode") {
            let mode = SqliteJournalMode::from_str(mode)
                .map_err(|_| SquallError::Config(format!("unknown sqlite journal mode '{mode}'")))?;
            options = options.journal_mode(mode);
        }

        Ok(Self { options, filename })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn compiler(&self) -> Arc<Compiler> {
        dialect::compiler()
    }

    async fn connect(&self) -> Result<Box<dyn RawLink>, LinkError> {
        let conn = self.options.connect().await?;
        Ok(Box::new(SqliteLink { conn }))
    }

    /// SQLite stores every temporal, decimal, interval and boolean as text or integers.
    fn default_converters(&self) -> WireConverters {
        WireConverters::all_text()
    }

    /// Rows are identified by their rowid.
    fn insert_identity(
        &self,
        last_insert_id: Option<i64>,
        primary_columns: &[Column],
        _primary_variables: &[Variable],
    ) -> SquallResult<Expr> {
        let table = primary_columns.iter().find_map(|c| c.table.clone());
        match (last_insert_id, table) {
            (Some(rowid), Some(table)) => Ok(Expr::from(Column::qualified(table, "OID")).eq(rowid)),
            (None, _) => Err(SquallError::MissingIdentity(
                "sqlite reported no rowid for the statement".to_string(),
            )),
            (_, None) => Err(SquallError::MissingIdentity(
                "primary key columns name no table".to_string(),
            )),
        }
    }
}

struct SqliteLink {
    conn: SqliteConnection,
}

#[async_trait]
impl RawLink for SqliteLink {
    async fn begin(&mut self) -> Result<(), LinkError> {
        self.conn.execute("BEGIN").await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: Vec<WireParam>) -> Result<RawCursor, LinkError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind(query, param.value)?;
        }

        let mut cursor = RawCursor::default();
        let mut stream = query.fetch_many(&mut self.conn);
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => {
                    cursor.rows_affected += done.rows_affected();
                    if done.rows_affected() > 0 && done.last_insert_rowid() != 0 {
                        cursor.last_insert_id = Some(done.last_insert_rowid());
                    }
                }
                Either::Right(row) => {
                    if cursor.columns.is_empty() {
                        cursor.columns = column_info(row.columns());
                    }
                    cursor.rows.push_back(decode_row(&row)?);
                }
            }
        }
        drop(stream);

        if cursor.columns.is_empty() && returns_rows(sql) {
            let description = self.conn.describe(sql).await?;
            cursor.columns = column_info(description.columns());
        }
        Ok(cursor)
    }

    async fn commit(&mut self) -> Result<(), LinkError> {
        self.conn.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), LinkError> {
        self.conn.execute("ROLLBACK").await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), LinkError> {
        self.conn.close().await?;
        Ok(())
    }
}

fn bind<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, LinkError> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Date(d) => query.bind(d),
        Value::Time(t) => query.bind(t),
        Value::DateTime(dt) => query.bind(dt),
        Value::DateTimeTz(dt) => query.bind(dt),
        Value::Interval(d) => query.bind(format_interval(d)),
        Value::Json(j) => query.bind(j.to_string()),
        Value::List(_) => {
            return Err(LinkError::Unsupported("sqlite cannot bind a list parameter".to_string()));
        }
    })
}


/// Decode by the storage class of each value, not the declared column type.
fn decode_row(row: &SqliteRow) -> Result<Row, LinkError> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let storage = raw.type_info().name().to_string();
            let value = match storage.as_str() {
                "INTEGER" => Value::Int(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(i)?),
                "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                _ => Value::Text(row.try_get_unchecked::<String, _>(i)?),
            };
            Ok(value)
        })
        .collect()
}
