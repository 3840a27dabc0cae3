//! MySQL adapter.
//!
//! Descriptor: host, port, username, password and database. Options:
//! `unix_socket` (connect through a socket path instead of TCP) and `charset`
//! (default `utf8mb4`).

use super::{column_info, returns_rows};
use crate::compiler::dialects::mysql as dialect;
use crate::compiler::Compiler;
use crate::database::{
    ColumnInfo, ConnectionDescriptor, Database, LinkError, RawCursor, RawLink, WireConverters,
    WireParam,
};
use crate::error::SquallResult;
use crate::value::{format_interval, Row, Value};
use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column as _, ConnectOptions, Connection as _, Either, Executor, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;

/// Server error numbers that mean the session is gone.
pub const DISCONNECTION_ERRORS: &[u16] = &[
    2006, // server has gone away
    2013, // lost connection during query
    1053, // server shutdown in progress
    1927, // connection was killed
    4031, // disconnected by the server because of inactivity
];

/// Column types whose values are character data.
const TEXT_TYPES: &[&str] = &[
    "CHAR", "VARCHAR", "TINYTEXT", "TEXT", "MEDIUMTEXT", "LONGTEXT", "ENUM", "SET",
];

#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    options: MySqlConnectOptions,
}

impl MySqlDatabase {
    pub fn new(descriptor: &ConnectionDescriptor) -> SquallResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .charset(descriptor.option("charset").unwrap_or("utf8mb4"));
        if let Some(socket) = descriptor.option("unix_socket") {
            options = options.socket(socket);
        } else {
            if let Some(host) = &descriptor.host {
                options = options.host(host);
            }
            if let Some(port) = descriptor.port {
                options = options.port(port);
            }
        }
        if let Some(username) = &descriptor.username {
            options = options.username(username);
        }
        if let Some(password) = &descriptor.password {
            options = options.password(password);
        }
        if let Some(database) = &descriptor.database {
            options = options.database(database);
        }
        Ok(Self { options })
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    fn name(&self) -> &str {
        "mysql"
    }

    fn compiler(&self) -> Arc<Compiler> {
        dialect::compiler()
    }

    async fn connect(&self) -> Result<Box<dyn RawLink>, LinkError> {
        let conn = self.options.connect().await.map_err(link_error)?;
        Ok(Box::new(MySqlLink { conn }))
    }

    fn is_disconnection_error(&self, error: &LinkError) -> bool {
        match error {
            LinkError::Io(_) | LinkError::Closed => true,
            LinkError::Database { code: Some(code), .. } => code
                .parse::<u16>()
                .is_ok_and(|number| DISCONNECTION_ERRORS.contains(&number)),
            _ => false,
        }
    }

    /// MySQL has no interval type, and JSON goes over the wire as text.
    fn default_converters(&self) -> WireConverters {
        WireConverters {
            interval_as_text: true,
            json_as_text: true,
            ..WireConverters::default()
        }
    }

    /// Character columns arrive as raw bytes; hand them on as text.
    fn from_wire_row(&self, columns: &[ColumnInfo], row: Row) -> SquallResult<Row> {
        Ok(row
            .into_iter()
            .zip(columns)
            .map(|(value, column)| match value {
                Value::Bytes(bytes) if TEXT_TYPES.contains(&column.type_name.as_str()) => {
                    match String::from_utf8(bytes) {
                        Ok(text) => Value::Text(text),
                        Err(e) => Value::Bytes(e.into_bytes()),
                    }
                }
                other => other,
            })
            .collect())
    }
}

/// Keep the server error number as the code, so the disconnection predicate can see it.
fn link_error(e: sqlx::Error) -> LinkError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(mysql) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return LinkError::Database {
                code: Some(mysql.number().to_string()),
                message: mysql.message().to_string(),
            };
        }
    }
    LinkError::from(e)
}

struct MySqlLink {
    conn: MySqlConnection,
}

#[async_trait]
impl RawLink for MySqlLink {
    async fn begin(&mut self) -> Result<(), LinkError> {
        self.conn.execute("BEGIN").await.map_err(link_error)?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: Vec<WireParam>) -> Result<RawCursor, LinkError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind(query, param.value)?;
        }

        let mut cursor = RawCursor::default();
        let mut stream = query.fetch_many(&mut self.conn);
        while let Some(step) = stream.try_next().await.map_err(link_error)? {
            match step {
                Either::Left(done) => {
                    cursor.rows_affected += done.rows_affected();
                    if done.last_insert_id() != 0 {
                        cursor.last_insert_id = i64::try_from(done.last_insert_id()).ok();
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
            let description = self.conn.describe(sql).await.map_err(link_error)?;
            cursor.columns = column_info(description.columns());
        }
        Ok(cursor)
    }

    async fn commit(&mut self) -> Result<(), LinkError> {
        self.conn.execute("COMMIT").await.map_err(link_error)?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), LinkError> {
        self.conn.execute("ROLLBACK").await.map_err(link_error)?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), LinkError> {
        self.conn.close().await.map_err(link_error)
    }
}

fn bind<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: Value,
) -> Result<Query<'q, MySql, MySqlArguments>, LinkError> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Decimal(d) => query.bind(d),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Date(d) => query.bind(d),
        Value::Time(t) => query.bind(t),
        Value::DateTime(dt) => query.bind(dt),
        Value::DateTimeTz(dt) => query.bind(dt),
        Value::Interval(d) => query.bind(format_interval(d)),
        Value::Json(j) => query.bind(j.to_string()),
        Value::List(_) => {
            return Err(LinkError::Unsupported("mysql cannot bind a list parameter".to_string()));
        }
    })
}


fn decode_row(row: &MySqlRow) -> Result<Row, LinkError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            if row.try_get_raw(i)?.is_null() {
                return Ok(Value::Null);
            }
            let value = match column.type_info().name() {
                "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(i)?),
                "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                    Value::Int(row.try_get_unchecked::<i64, _>(i)?)
                }
                "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
                | "BIGINT UNSIGNED" => {
                    let n = row.try_get_unchecked::<u64, _>(i)?;
                    i64::try_from(n)
                        .map(Value::Int)
                        .unwrap_or_else(|_| Value::Decimal(Decimal::from(n)))
                }
                "FLOAT" => Value::Float(row.try_get_unchecked::<f32, _>(i)? as f64),
                "DOUBLE" => Value::Float(row.try_get_unchecked::<f64, _>(i)?),
                "DECIMAL" => Value::Decimal(row.try_get_unchecked::<Decimal, _>(i)?),
                "DATE" => Value::Date(row.try_get_unchecked(i)?),
                "TIME" => Value::Time(row.try_get_unchecked(i)?),
                "DATETIME" => Value::DateTime(row.try_get_unchecked(i)?),
                "TIMESTAMP" => Value::DateTimeTz(row.try_get_unchecked(i)?),
                "JSON" => Value::Json(row.try_get_unchecked::<Json<serde_json::Value>, _>(i)?.0),
                // Character data is decoded by `from_wire_row`.
                _ => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
            };
            Ok(value)
        })
        .collect()
}
