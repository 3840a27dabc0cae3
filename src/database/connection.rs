//! Connection and transaction management.
//!
//! A [`Connection`] owns one physical link. It compiles statements with the
//! adapter's dialect, marshals parameters, tracks the transaction and turns
//! link failures into either a [`SquallError::Disconnection`] (the link is
//! dropped and re-opened lazily) or an ordinary operational error.
//!
//! State machine:
//!
//! ```text
//! Open --execute--> InTransaction --commit/rollback--> Open
//! any --link lost--> Disconnected --execute/rollback--> Open (reconnect)
//! any --close--> Closed
//! ```
//!
//! A link lost inside a transaction blocks `execute` until `rollback` has
//! acknowledged the loss, and `commit` after a loss always fails, since the
//! fate of the transaction is unknown.

use super::result::QueryResult;
use super::{Database, LinkError, RawLink, WireConverters, WireParam};
use crate::compiler::{convert_marks, count_marks};
use crate::error::{SquallError, SquallResult};
use crate::expr::{Column, Delete, Expr, Insert, Select, Update};
use crate::value::Value;
use crate::variables::{Param, Variable};
use std::borrow::Cow;
use std::sync::Arc;

/// Per-connection settings, fixed when the connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Run each statement on its own instead of opening a transaction.
    pub autocommit: bool,
    pub converters: WireConverters,
}

impl ConnectionConfig {
    /// Transactional settings with the adapter's converter table.
    pub fn new(database: &dyn Database) -> Self {
        Self {
            autocommit: false,
            converters: database.default_converters(),
        }
    }

    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn converters(mut self, converters: WireConverters) -> Self {
        self.converters = converters;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    InTransaction,
    Disconnected,
    Closed,
}

/// SQL text with positional `?` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement<'a> {
    sql: Cow<'a, str>,
    params: Vec<Param>,
}

impl<'a> RawStatement<'a> {
    pub fn new(sql: impl Into<Cow<'a, str>>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(Param::Value(value.into()));
        self
    }

    /// Bind a variable; its outbound conversion runs at execute time.
    pub fn bind_variable(mut self, variable: Variable) -> Self {
        self.params.push(Param::Variable(variable));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Anything a connection can execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement<'a> {
    Expr(Cow<'a, Expr>),
    Raw(RawStatement<'a>),
}

impl<'a> Statement<'a> {
    pub fn raw(sql: impl Into<Cow<'a, str>>) -> RawStatement<'a> {
        RawStatement::new(sql)
    }
}

impl<'a> From<&'a Expr> for Statement<'a> {
    fn from(expr: &'a Expr) -> Self {
        Statement::Expr(Cow::Borrowed(expr))
    }
}

impl From<Expr> for Statement<'_> {
    fn from(expr: Expr) -> Self {
        Statement::Expr(Cow::Owned(expr))
    }
}

impl<'a> From<RawStatement<'a>> for Statement<'a> {
    fn from(raw: RawStatement<'a>) -> Self {
        Statement::Raw(raw)
    }
}

impl<'a> From<&'a str> for Statement<'a> {
    fn from(sql: &'a str) -> Self {
        Statement::Raw(RawStatement::new(sql))
    }
}

impl From<String> for Statement<'_> {
    fn from(sql: String) -> Self {
        Statement::Raw(RawStatement::new(sql))
    }
}

macro_rules! statement_from_node {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Statement<'_> {
                fn from(node: $ty) -> Self {
                    Statement::Expr(Cow::Owned(node.into()))
                }
            }
        )*
    };
}

statement_from_node!(Select, Insert, Update, Delete);

/// A statement ready for the link.
struct Prepared {
    sql: String,
    params: Vec<Variable>,
    primary_columns: Vec<Column>,
    primary_variables: Vec<Variable>,
    recover_identity: bool,
}

/// One logical session with a backend.
pub struct Connection {
    database: Arc<dyn Database>,
    config: ConnectionConfig,
    link: Option<Box<dyn RawLink>>,
    state: ConnectionState,
    /// A transaction died with the link and has not been rolled back yet.
    lost_transaction: bool,
}

impl Connection {
    /// Connect with the adapter's default settings.
    pub async fn open(database: Arc<dyn Database>) -> SquallResult<Self> {
        let config = ConnectionConfig::new(database.as_ref());
        Self::open_with(database, config).await
    }

    pub async fn open_with(database: Arc<dyn Database>, config: ConnectionConfig) -> SquallResult<Self> {
        let mut connection = Self {
            database,
            config,
            link: None,
            state: ConnectionState::Disconnected,
            lost_transaction: false,
        };
        connection.connect_link().await?;
        tracing::debug!(database = connection.database.name(), "connected");
        Ok(connection)
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run a statement and return its result.
    ///
    /// INSERTs with undefined primary-key variables have their identity
    /// recovered before this returns; see [`QueryResult::primary_variables`].
    pub async fn execute<'a>(
        &mut self,
        statement: impl Into<Statement<'a>>,
    ) -> SquallResult<QueryResult<'_>> {
        let prepared = self.prepare(statement.into())?;
        self.ensure_link().await?;
        self.ensure_transaction().await?;

        let sql = convert_marks(&prepared.sql, self.database.param_mark());
        let params = prepared
            .params
            .iter()
            .map(|variable| self.wire_param(variable))
            .collect::<SquallResult<Vec<_>>>()?;
        tracing::debug!(
            database = self.database.name(),
            sql = %sql,
            params = params.len(),
            "executing statement"
        );

        let outcome = match self.link.as_mut() {
            Some(link) => link.execute(&sql, params).await,
            None => Err(LinkError::Closed),
        };
        let cursor = outcome.map_err(|e| self.fail(e))?;

        let mut result = QueryResult::new(
            Arc::clone(&self.database),
            cursor,
            prepared.primary_columns,
            prepared.primary_variables,
        );
        if prepared.recover_identity {
            let database = Arc::clone(&self.database);
            database.recover_insert_identity(&mut result)?;
        }
        Ok(result)
    }

    /// Run a statement and discard its result.
    pub async fn execute_no_result<'a>(&mut self, statement: impl Into<Statement<'a>>) -> SquallResult<()> {
        self.execute(statement).await.map(drop)
    }

    pub async fn commit(&mut self) -> SquallResult<()> {
        match self.state {
            ConnectionState::Closed => Err(SquallError::Closed),
            ConnectionState::Disconnected => Err(SquallError::Disconnection(
                "cannot commit: the connection was lost and the transaction outcome is unknown"
                    .to_string(),
            )),
            ConnectionState::Open => Ok(()),
            ConnectionState::InTransaction => {
                let outcome = match self.link.as_mut() {
                    Some(link) => link.commit().await,
                    None => Err(LinkError::Closed),
                };
                outcome.map_err(|e| self.fail(e))?;
                self.state = ConnectionState::Open;
                tracing::debug!(database = self.database.name(), "committed");
                Ok(())
            }
        }
    }

    /// Roll back the open transaction.
    ///
    /// After a disconnection this acknowledges the lost transaction and tries
    /// to reconnect. A failed reconnect is left for the next `execute`.
    pub async fn rollback(&mut self) -> SquallResult<()> {
        match self.state {
            ConnectionState::Closed => Err(SquallError::Closed),
            ConnectionState::Open => Ok(()),
            ConnectionState::Disconnected => {
                self.lost_transaction = false;
                if let Err(e) = self.reconnect().await {
                    tracing::warn!(database = self.database.name(), "reconnect after rollback failed: {}", e);
                }
                Ok(())
            }
            ConnectionState::InTransaction => {
                let outcome = match self.link.as_mut() {
                    Some(link) => link.rollback().await,
                    None => Err(LinkError::Closed),
                };
                match outcome {
                    Ok(()) => {
                        self.state = ConnectionState::Open;
                        tracing::debug!(database = self.database.name(), "rolled back");
                        Ok(())
                    }
                    Err(e) if self.database.is_disconnection_error(&e) => {
                        // The server discards the transaction with the link.
                        self.drop_link();
                        tracing::warn!(
                            database = self.database.name(),
                            "connection lost during rollback: {}",
                            e
                        );
                        Ok(())
                    }
                    Err(e) => Err(e.into_operational()),
                }
            }
        }
    }

    /// Close the link. Every later operation fails with `Closed`.
    pub async fn close(&mut self) -> SquallResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.lost_transaction = false;
        if let Some(link) = self.link.take() {
            if let Err(e) = link.close().await {
                tracing::debug!(database = self.database.name(), "error while closing link: {}", e);
            }
        }
        Ok(())
    }

    fn prepare(&self, statement: Statement<'_>) -> SquallResult<Prepared> {
        match statement {
            Statement::Expr(expr) => {
                let compiled = self.database.compiler().compile(&expr)?;
                let (primary_columns, primary_variables) = match expr.as_ref() {
                    Expr::Insert(insert) => {
                        (insert.primary_columns.clone(), insert.primary_variables.clone())
                    }
                    _ => (Vec::new(), Vec::new()),
                };
                let recover_identity = primary_variables.iter().any(|v| !v.is_defined());
                Ok(Prepared {
                    sql: compiled.sql,
                    params: compiled.params,
                    primary_columns,
                    primary_variables,
                    recover_identity,
                })
            }
            Statement::Raw(raw) => {
                let marks = count_marks(&raw.sql);
                if marks != raw.params.len() {
                    return Err(SquallError::compile(format!(
                        "statement has {marks} placeholders but {} parameters: {}",
                        raw.params.len(),
                        raw.sql
                    )));
                }
                let params = raw
                    .params
                    .into_iter()
                    .map(|param| match param {
                        Param::Value(value) => Ok(Variable::for_value(value)),
                        Param::Variable(variable) if variable.is_defined() => Ok(variable),
                        Param::Variable(variable) => Err(SquallError::compile(format!(
                            "undefined {:?} variable bound to a statement",
                            variable.kind()
                        ))),
                    })
                    .collect::<SquallResult<Vec<_>>>()?;
                Ok(Prepared {
                    sql: raw.sql.into_owned(),
                    params,
                    primary_columns: Vec::new(),
                    primary_variables: Vec::new(),
                    recover_identity: false,
                })
            }
        }
    }

    fn wire_param(&self, variable: &Variable) -> SquallResult<WireParam> {
        let value = variable.get(true).ok_or_else(|| {
            SquallError::compile(format!("undefined {:?} variable bound to a statement", variable.kind()))
        })?;
        Ok(WireParam {
            value: self.config.converters.apply(value),
            kind: variable.kind().clone(),
        })
    }

    async fn ensure_link(&mut self) -> SquallResult<()> {
        match self.state {
            ConnectionState::Closed => Err(SquallError::Closed),
            ConnectionState::Disconnected if self.lost_transaction => Err(SquallError::Disconnection(
                "the connection was lost during a transaction; roll back before continuing"
                    .to_string(),
            )),
            ConnectionState::Disconnected => self.reconnect().await,
            ConnectionState::Open | ConnectionState::InTransaction => Ok(()),
        }
    }

    async fn ensure_transaction(&mut self) -> SquallResult<()> {
        if self.config.autocommit || self.state != ConnectionState::Open {
            return Ok(());
        }
        let outcome = match self.link.as_mut() {
            Some(link) => link.begin().await,
            None => Err(LinkError::Closed),
        };
        outcome.map_err(|e| self.fail(e))?;
        self.state = ConnectionState::InTransaction;
        Ok(())
    }

    async fn reconnect(&mut self) -> SquallResult<()> {
        self.connect_link().await?;
        tracing::info!(database = self.database.name(), "reconnected");
        Ok(())
    }

    async fn connect_link(&mut self) -> SquallResult<()> {
        match self.database.connect().await {
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Open;
                Ok(())
            }
            Err(e) if self.database.is_disconnection_error(&e) => {
                Err(SquallError::Disconnection(e.to_string()))
            }
            Err(e) => Err(e.into_operational()),
        }
    }

    /// Classify a link failure, dropping the link when it is gone.
    fn fail(&mut self, error: LinkError) -> SquallError {
        if !self.database.is_disconnection_error(&error) {
            return error.into_operational();
        }
        if self.state == ConnectionState::InTransaction {
            self.lost_transaction = true;
        }
        self.drop_link();
        tracing::warn!(
            database = self.database.name(),
            lost_transaction = self.lost_transaction,
            "connection lost: {}",
            error
        );
        SquallError::Disconnection(error.to_string())
    }

    fn drop_link(&mut self) {
        self.link = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.database.name())
            .field("config", &self.config)
            .field("state", &self.state)
            .field("lost_transaction", &self.lost_transaction)
            .finish()
    }
}
