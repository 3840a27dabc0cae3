//! Backend adapter contract.
//!
//! A backend is described by two traits:
//!
//! - [`Database`]: the adapter. It owns the dialect compiler, the
//!   disconnection predicate, the wire converters and the result hooks, and it
//!   opens physical links.
//! - [`RawLink`]: one physical link. It runs SQL text with positional
//!   parameters and buffers the rows.
//!
//! [`Connection`] drives both and never looks at backend specifics directly.

pub mod connection;
pub mod converters;
pub mod descriptor;
pub mod result;

pub use connection::{Connection, ConnectionConfig, ConnectionState, RawStatement, Statement};
pub use converters::WireConverters;
pub use descriptor::ConnectionDescriptor;
pub use result::QueryResult;

use crate::compiler::{Compiler, ParamMark};
use crate::error::{SquallError, SquallResult};
use crate::expr::{Column, Expr};
use crate::value::{Row, Value};
use crate::variables::{Variable, VariableKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a physical link, before classification.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The server rejected the statement.
    #[error("{message}")]
    Database {
        code: Option<String>,
        message: String,
    },

    #[error("I/O failure: {0}")]
    Io(String),

    /// The link was already shut down.
    #[error("link is closed")]
    Closed,

    #[error("driver error: {0}")]
    Driver(String),

    /// A value could not be bound or decoded.
    #[error("unsupported value: {0}")]
    Unsupported(String),
}

impl LinkError {
    /// Convert into the public error, once the disconnection check has been made.
    pub(crate) fn into_operational(self) -> SquallError {
        match self {
            LinkError::Database { code, message } => SquallError::Operational { code, message },
            LinkError::Unsupported(message) => SquallError::TypeMismatch(message),
            other => SquallError::Operational {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

/// Name and backend type of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

/// Everything a link returns for one statement.
#[derive(Debug, Default)]
pub struct RawCursor {
    pub columns: Vec<ColumnInfo>,
    pub rows: VecDeque<Row>,
    pub rows_affected: u64,
    /// Identity generated by the statement, when the backend reports one.
    pub last_insert_id: Option<i64>,
}

/// A bound parameter together with the kind of the variable it came from.
///
/// Backends with typed parameters need the kind to bind a null.
#[derive(Debug, Clone, PartialEq)]
pub struct WireParam {
    pub value: Value,
    pub kind: VariableKind,
}

/// One physical connection to a backend.
#[async_trait]
pub trait RawLink: Send {
    async fn begin(&mut self) -> Result<(), LinkError>;

    /// Run `sql` (already in the backend's placeholder style) and buffer its rows.
    async fn execute(&mut self, sql: &str, params: Vec<WireParam>) -> Result<RawCursor, LinkError>;

    async fn commit(&mut self) -> Result<(), LinkError>;

    async fn rollback(&mut self) -> Result<(), LinkError>;

    async fn close(self: Box<Self>) -> Result<(), LinkError>;
}

/// A backend adapter.
///
/// Every hook except `name`, `compiler` and `connect` has a default that
/// suits most backends.
#[async_trait]
pub trait Database: Send + Sync + std::fmt::Debug {
    /// Scheme name, e.g. `sqlite`.
    fn name(&self) -> &str;

    /// The dialect registry statements are compiled with.
    fn compiler(&self) -> Arc<Compiler>;

    fn param_mark(&self) -> ParamMark {
        ParamMark::Question
    }

    /// Open a new physical link.
    async fn connect(&self) -> Result<Box<dyn RawLink>, LinkError>;

    /// True when `error` means the link is gone rather than the statement failed.
    fn is_disconnection_error(&self, error: &LinkError) -> bool {
        matches!(error, LinkError::Io(_) | LinkError::Closed)
    }

    /// Converter table used by connections that do not supply their own.
    fn default_converters(&self) -> WireConverters {
        WireConverters::default()
    }

    /// Post-process a row before it reaches the variable layer.
    fn from_wire_row(&self, _columns: &[ColumnInfo], row: Row) -> SquallResult<Row> {
        Ok(row)
    }

    /// Adjust a wire value before `variable` parses it.
    fn prepare_wire_value(&self, _variable: &Variable, value: Value) -> SquallResult<Value> {
        Ok(value)
    }

    /// Fill undefined primary-key variables after an INSERT.
    ///
    /// The default assigns the reported identity to the first undefined
    /// variable in declared order. Without a reported identity the variables
    /// stay undefined.
    fn recover_insert_identity(&self, result: &mut QueryResult<'_>) -> SquallResult<()> {
        let Some(id) = result.last_insert_id() else {
            return Ok(());
        };
        if let Some(variable) = result
            .primary_variables_mut()
            .iter_mut()
            .find(|v| !v.is_defined())
        {
            variable.set(Value::Int(id), true)?;
        }
        Ok(())
    }

    /// Build a condition that selects the row an INSERT just created.
    ///
    /// Defined primary-key variables are matched as given; the first
    /// undefined one is matched against `last_insert_id`.
    fn insert_identity(
        &self,
        last_insert_id: Option<i64>,
        primary_columns: &[Column],
        primary_variables: &[Variable],
    ) -> SquallResult<Expr> {
        let mut conditions = Vec::with_capacity(primary_columns.len());
        let mut id = last_insert_id;
        for (column, variable) in primary_columns.iter().zip(primary_variables) {
            if variable.is_defined() {
                conditions.push(Expr::from(column.clone()).eq(variable.clone()));
            } else if let Some(id) = id.take() {
                conditions.push(Expr::from(column.clone()).eq(id));
            }
        }
        if conditions.is_empty() {
            return Err(SquallError::MissingIdentity(
                "no primary key value is known for the inserted row".to_string(),
            ));
        }
        Ok(Expr::all(conditions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::base;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl Database for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        fn compiler(&self) -> Arc<Compiler> {
            base()
        }

        async fn connect(&self) -> Result<Box<dyn RawLink>, LinkError> {
            Err(LinkError::Io("no route to host".into()))
        }
    }

    fn primary_key() -> (Vec<Column>, Vec<Variable>) {
        (
            vec![Column::qualified("test", "a"), Column::qualified("test", "b")],
            vec![
                Variable::with_value(VariableKind::Int, 7).unwrap(),
                Variable::new(VariableKind::Int),
            ],
        )
    }

    #[test]
    fn test_default_disconnection_predicate() {
        assert!(Offline.is_disconnection_error(&LinkError::Closed));
        assert!(Offline.is_disconnection_error(&LinkError::Io("reset".into())));
        assert!(!Offline.is_disconnection_error(&LinkError::Database {
            code: Some("23505".into()),
            message: "duplicate key".into(),
        }));
    }

    #[test]
    fn test_insert_identity_uses_defined_and_generated_values() {
        let (columns, variables) = primary_key();
        let condition = Offline.insert_identity(Some(42), &columns, &variables).unwrap();
        let select = crate::expr::Select::new(vec![Expr::raw("1")]).where_(condition);
        let compiled = base().compile(&select.into()).unwrap();
        assert_eq!(compiled.sql, "SELECT 1 FROM test WHERE test.a = ? AND test.b = ?");
        assert_eq!(compiled.params[0].get(false), Some(Value::Int(7)));
        assert_eq!(compiled.params[1].get(false), Some(Value::Int(42)));
    }

    #[test]
    fn test_insert_identity_without_anything_known() {
        let columns = vec![Column::qualified("test", "id")];
        let variables = vec![Variable::new(VariableKind::Int)];
        assert!(matches!(
            Offline.insert_identity(None, &columns, &variables),
            Err(SquallError::MissingIdentity(_))
        ));
    }

    #[test]
    fn test_link_errors_become_operational() {
        let err = LinkError::Database {
            code: Some("23505".into()),
            message: "duplicate key".into(),
        }
        .into_operational();
        assert_eq!(err.to_string(), "Operational error [23505]: duplicate key");
        assert!(matches!(
            LinkError::Unsupported("list".into()).into_operational(),
            SquallError::TypeMismatch(_)
        ));
    }
}
