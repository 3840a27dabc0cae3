//! PostgreSQL adapter.
//!
//! Descriptor: host, port, username, password and database. Option:
//! `encoding` (sent as `client_encoding`).
//!
//! Identities of inserted rows come back through `RETURNING`, so this
//! adapter never reports `last_insert_id`.

mod array;

pub use array::parse_array;

use crate::backends::{column_info, returns_rows};
use crate::compiler::dialects::postgres as dialect;
use crate::compiler::{Compiler, ParamMark};
use crate::database::{
    ConnectionDescriptor, Database, LinkError, QueryResult, RawCursor, RawLink, WireParam,
};
use crate::error::SquallResult;
use crate::value::{Row, Value};
use crate::variables::{Variable, VariableKind};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column as _, ConnectOptions, Connection as _, Either, Executor, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;

/// SQLSTATE codes, besides class 08, that mean the session is gone.
pub const DISCONNECTION_STATES: &[&str] = &[
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
];

#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    options: PgConnectOptions,
}

impl PostgresDatabase {
    pub fn new(descriptor: &ConnectionDescriptor) -> SquallResult<Self> {
        let mut options = PgConnectOptions::new();
        if let Some(host) = &descriptor.host {
            options = options.host(host);
        }
        if let Some(port) = descriptor.port {
            options = options.port(port);
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
        if let Some(encoding) = descriptor.option("encoding") {
            options = options.options([("client_encoding", encoding)]);
        }
        Ok(Self { options })
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn name(&self) -> &str {
        "postgres"
    }

    fn compiler(&self) -> Arc<Compiler> {
        dialect::compiler()
    }

    fn param_mark(&self) -> ParamMark {
        ParamMark::Numbered
    }

    async fn connect(&self) -> Result<Box<dyn RawLink>, LinkError> {
        let conn = self.options.connect().await?;
        Ok(Box::new(PgLink { conn }))
    }

    fn is_disconnection_error(&self, error: &LinkError) -> bool {
        match error {
            LinkError::Io(_) | LinkError::Closed => true,
            LinkError::Database { code: Some(code), .. } => {
                code.starts_with("08") || DISCONNECTION_STATES.contains(&code.as_str())
            }
            _ => false,
        }
    }

    /// Arrays that were cast to text are parsed back into lists.
    fn prepare_wire_value(&self, variable: &Variable, value: Value) -> SquallResult<Value> {
        match (variable.kind(), value) {
            (VariableKind::List(_), Value::Text(text)) => parse_array(&text),
            (_, value) => Ok(value),
        }
    }

    /// Undefined primary-key variables take the row returned by `RETURNING`.
    ///
    /// Unlike the single `lastrowid` the other backends get, `RETURNING`
    /// yields the stored value of every undefined key column, so composite
    /// keys are filled in full (see the generated-identity decision in DESIGN.md).
    fn recover_insert_identity(&self, result: &mut QueryResult<'_>) -> SquallResult<()> {
        let Some(row) = result.get_one()? else {
            return Ok(());
        };
        let pending: Vec<usize> = result
            .primary_variables()
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_defined())
            .map(|(i, _)| i)
            .collect();
        for (index, value) in pending.into_iter().zip(row) {
            let mut variable = result.primary_variables()[index].clone();
            result.set_variable(&mut variable, value)?;
            result.primary_variables_mut()[index] = variable;
        }
        Ok(())
    }
}

struct PgLink {
    conn: PgConnection,
}

#[async_trait]
impl RawLink for PgLink {
    async fn begin(&mut self) -> Result<(), LinkError> {
        self.conn.execute("BEGIN").await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: Vec<WireParam>) -> Result<RawCursor, LinkError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind(query, param)?;
        }

        let mut cursor = RawCursor::default();
        let mut stream = query.fetch_many(&mut self.conn);
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => cursor.rows_affected += done.rows_affected(),
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

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn bind(query: PgQuery<'_>, param: WireParam) -> Result<PgQuery<'_>, LinkError> {
    Ok(match (param.value, param.kind) {
        (Value::Null, kind) => bind_null(query, &kind),
        (Value::Bool(b), _) => query.bind(b),
        (Value::Int(i), _) => query.bind(i),
        (Value::Float(f), _) => query.bind(f),
        (Value::Decimal(d), _) => query.bind(d),
        (Value::Text(s), VariableKind::Json) => {
            let json: serde_json::Value = serde_json::from_str(&s)
                .map_err(|e| LinkError::Unsupported(format!("invalid JSON parameter: {e}")))?;
            query.bind(Json(json))
        }
        (Value::Text(s), _) => query.bind(s),
        (Value::Bytes(b), _) => query.bind(b),
        (Value::Date(d), _) => query.bind(d),
        (Value::Time(t), _) => query.bind(t),
        (Value::DateTime(dt), _) => query.bind(dt),
        (Value::DateTimeTz(dt), _) => query.bind(dt),
        (Value::Interval(d), _) => query.bind(d),
        (Value::Json(j), _) => query.bind(Json(j)),
        (Value::List(items), kind) => {
            let item = match kind {
                VariableKind::List(item) => *item,
                _ => VariableKind::Any,
            };
            bind_list(query, items, &item)?
        }
    })
}

/// Nulls are typed after the variable they came from.
fn bind_null<'q>(query: PgQuery<'q>, kind: &VariableKind) -> PgQuery<'q> {
    match kind {
        VariableKind::Bool => query.bind(None::<bool>),
        VariableKind::Int => query.bind(None::<i64>),
        VariableKind::Float => query.bind(None::<f64>),
        VariableKind::Decimal => query.bind(None::<Decimal>),
        VariableKind::Bytes => query.bind(None::<Vec<u8>>),
        VariableKind::Date => query.bind(None::<NaiveDate>),
        VariableKind::Time => query.bind(None::<NaiveTime>),
        VariableKind::DateTime => query.bind(None::<NaiveDateTime>),
        VariableKind::DateTimeTz => query.bind(None::<DateTime<Utc>>),
        VariableKind::Interval => query.bind(None::<Duration>),
        VariableKind::Json => query.bind(None::<Json<serde_json::Value>>),
        VariableKind::List(_) => query.bind(None::<Vec<String>>),
        VariableKind::Any | VariableKind::Text => query.bind(None::<String>),
    }
}

/// One-dimensional arrays only; nested lists are rejected.
fn bind_list<'q>(
    query: PgQuery<'q>,
    items: Vec<Value>,
    item: &VariableKind,
) -> Result<PgQuery<'q>, LinkError> {
    fn collect<T>(
        items: Vec<Value>,
        extract: impl Fn(Value) -> Option<T>,
    ) -> Result<Vec<Option<T>>, LinkError> {
        items
            .into_iter()
            .map(|value| match value {
                Value::Null => Ok(None),
                other => {
                    let description = other.to_string();
                    extract(other).map(Some).ok_or_else(|| {
                        LinkError::Unsupported(format!("cannot bind '{description}' in an array"))
                    })
                }
            })
            .collect()
    }

    Ok(match item {
        VariableKind::Int => query.bind(collect(items, |v| match v {
            Value::Int(i) => Some(i),
            _ => None,
        })?),
        VariableKind::Float => query.bind(collect(items, |v| match v {
            Value::Float(f) => Some(f),
            Value::Int(i) => Some(i as f64),
            _ => None,
        })?),
        VariableKind::Bool => query.bind(collect(items, |v| match v {
            Value::Bool(b) => Some(b),
            _ => None,
        })?),
        VariableKind::Decimal => query.bind(collect(items, |v| match v {
            Value::Decimal(d) => Some(d),
            _ => None,
        })?),
        _ => query.bind(collect(items, |v| match v {
            Value::List(_) => None,
            Value::Text(s) => Some(s),
            other => Some(other.to_string()),
        })?),
    })
}


fn interval(value: PgInterval) -> Duration {
    Duration::days(i64::from(value.months) * 30 + i64::from(value.days))
        + Duration::microseconds(value.microseconds)
}

fn list<T>(items: Vec<Option<T>>) -> Value
where
    T: Into<Value>,
{
    Value::List(items.into_iter().map(|item| item.map_or(Value::Null, Into::into)).collect())
}

fn decode_row(row: &PgRow) -> Result<Row, LinkError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            if row.try_get_raw(i)?.is_null() {
                return Ok(Value::Null);
            }
            let value = match column.type_info().name() {
                "BOOL" => Value::Bool(row.try_get_unchecked(i)?),
                "INT2" => Value::Int(row.try_get_unchecked::<i16, _>(i)?.into()),
                "INT4" => Value::Int(row.try_get_unchecked::<i32, _>(i)?.into()),
                "INT8" => Value::Int(row.try_get_unchecked::<i64, _>(i)?),
                "FLOAT4" => Value::Float(row.try_get_unchecked::<f32, _>(i)?.into()),
                "FLOAT8" => Value::Float(row.try_get_unchecked::<f64, _>(i)?),
                "NUMERIC" => Value::Decimal(row.try_get_unchecked(i)?),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
                    Value::Text(row.try_get_unchecked(i)?)
                }
                "BYTEA" => Value::Bytes(row.try_get_unchecked(i)?),
                "DATE" => Value::Date(row.try_get_unchecked(i)?),
                "TIME" => Value::Time(row.try_get_unchecked(i)?),
                "TIMESTAMP" => Value::DateTime(row.try_get_unchecked(i)?),
                "TIMESTAMPTZ" => Value::DateTimeTz(row.try_get_unchecked(i)?),
                "INTERVAL" => Value::Interval(interval(row.try_get_unchecked(i)?)),
                "JSON" | "JSONB" => {
                    Value::Json(row.try_get_unchecked::<Json<serde_json::Value>, _>(i)?.0)
                }
                "BOOL[]" => list(row.try_get_unchecked::<Vec<Option<bool>>, _>(i)?),
                "INT2[]" => list(
                    row.try_get_unchecked::<Vec<Option<i16>>, _>(i)?
                        .into_iter()
                        .map(|v| v.map(i64::from))
                        .collect(),
                ),
                "INT4[]" => list(
                    row.try_get_unchecked::<Vec<Option<i32>>, _>(i)?
                        .into_iter()
                        .map(|v| v.map(i64::from))
                        .collect(),
                ),
                "INT8[]" => list(row.try_get_unchecked::<Vec<Option<i64>>, _>(i)?),
                "FLOAT4[]" => list(
                    row.try_get_unchecked::<Vec<Option<f32>>, _>(i)?
                        .into_iter()
                        .map(|v| v.map(f64::from))
                        .collect(),
                ),
                "FLOAT8[]" => list(row.try_get_unchecked::<Vec<Option<f64>>, _>(i)?),
                "NUMERIC[]" => list(row.try_get_unchecked::<Vec<Option<Decimal>>, _>(i)?),
                "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
                    list(row.try_get_unchecked::<Vec<Option<String>>, _>(i)?)
                }
                // Anything else comes through as its raw wire bytes.
                _ => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
            };
            Ok(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn database() -> PostgresDatabase {
        PostgresDatabase::new(
            &ConnectionDescriptor::new("postgres")
                .host("localhost")
                .database("squall")
                .with_option("encoding", "UTF8"),
        )
        .unwrap()
    }

    #[test]
    fn test_disconnection_codes() {
        let database = database();
        let server_error = |code: &str| LinkError::Database {
            code: Some(code.to_string()),
            message: "terminating connection".to_string(),
        };
        for code in ["08000", "08003", "08006", "57P01", "57P02", "57P03"] {
            assert!(database.is_disconnection_error(&server_error(code)), "{code}");
        }
        assert!(!database.is_disconnection_error(&server_error("23505")));
        assert!(!database.is_disconnection_error(&server_error("42P01")));
        assert!(database.is_disconnection_error(&LinkError::Closed));
        assert!(!database.is_disconnection_error(&LinkError::Driver("protocol".into())));
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(database().param_mark(), ParamMark::Numbered);
    }

    #[test]
    fn test_text_arrays_are_parsed_for_list_variables() {
        let database = database();
        let mut variable = Variable::new(VariableKind::List(Box::new(VariableKind::List(
            Box::new(VariableKind::Int),
        ))));
        let value = database
            .prepare_wire_value(&variable, Value::Text("{{1,2},{3,NULL}}".into()))
            .unwrap();
        variable.set(value, true).unwrap();
        assert_eq!(
            variable.get(false),
            Some(Value::List(vec![
                Value::List(vec![Value::Int(1), Value::Int(2)]),
                Value::List(vec![Value::Int(3), Value::Null]),
            ]))
        );

        let text = Variable::new(VariableKind::Text);
        assert_eq!(
            database.prepare_wire_value(&text, Value::Text("{a}".into())).unwrap(),
            Value::Text("{a}".into())
        );
    }

    #[test]
    fn test_interval_conversion() {
        let value = PgInterval {
            months: 1,
            days: 2,
            microseconds: 3_000_000,
        };
        assert_eq!(interval(value), Duration::days(32) + Duration::seconds(3));
    }
}
