//! Statement results.

use super::{ColumnInfo, Connection, Database, RawCursor};
use crate::error::{SquallError, SquallResult};
use crate::expr::{Column, Expr};
use crate::value::{Row, Value};
use crate::variables::Variable;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

/// The outcome of one statement.
///
/// A `QueryResult` mutably borrows the [`Connection`] that produced it, so the
/// connection cannot run another statement, commit or roll back while the
/// result is alive.
///
/// Rows come out in order, once each: `get_one`, `get_unique`, `get_all` and
/// iteration all consume from the same forward-only cursor. Each row passes
/// through the backend's row hook on the way out.
pub struct QueryResult<'c> {
    database: Arc<dyn Database>,
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Row>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
    primary_columns: Vec<Column>,
    primary_variables: Vec<Variable>,
    _connection: PhantomData<&'c mut Connection>,
}

impl<'c> QueryResult<'c> {
    pub(crate) fn new(
        database: Arc<dyn Database>,
        cursor: RawCursor,
        primary_columns: Vec<Column>,
        primary_variables: Vec<Variable>,
    ) -> Self {
        Self {
            database,
            columns: cursor.columns,
            rows: cursor.rows,
            rows_affected: cursor.rows_affected,
            last_insert_id: cursor.last_insert_id,
            primary_columns,
            primary_variables,
            _connection: PhantomData,
        }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Identity the backend generated for this statement, if any.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Primary-key columns of the INSERT that produced this result.
    pub fn primary_columns(&self) -> &[Column] {
        &self.primary_columns
    }

    /// Primary-key variables of the INSERT, with recovered identities filled in.
    pub fn primary_variables(&self) -> &[Variable] {
        &self.primary_variables
    }

    pub fn primary_variables_mut(&mut self) -> &mut [Variable] {
        &mut self.primary_variables
    }

    /// First remaining row, or `None` when there is none.
    pub fn get_one(&mut self) -> SquallResult<Option<Row>> {
        self.next().transpose()
    }

    /// The only remaining row; fails with `NotOne` when there are several.
    pub fn get_unique(&mut self) -> SquallResult<Option<Row>> {
        let row = self.get_one()?;
        if row.is_some() && !self.rows.is_empty() {
            return Err(SquallError::NotOne);
        }
        Ok(row)
    }

    /// Every remaining row.
    pub fn get_all(&mut self) -> SquallResult<Vec<Row>> {
        self.by_ref().collect()
    }

    /// Store a wire value in `variable`, through the backend's value hook.
    pub fn set_variable(&self, variable: &mut Variable, value: Value) -> SquallResult<()> {
        let value = self.database.prepare_wire_value(variable, value)?;
        variable.set(value, true)
    }

    /// Condition selecting the row an INSERT created, from its primary key.
    pub fn get_insert_identity(
        &self,
        primary_columns: &[Column],
        primary_variables: &[Variable],
    ) -> SquallResult<Expr> {
        self.database
            .insert_identity(self.last_insert_id, primary_columns, primary_variables)
    }
}

impl Iterator for QueryResult<'_> {
    type Item = SquallResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.pop_front() {
            Some(row) => Some(self.database.from_wire_row(&self.columns, row)),
            None => {
                if self.rows.capacity() > 0 {
                    self.rows = VecDeque::new();
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

impl std::fmt::Debug for QueryResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("database", &self.database.name())
            .field("columns", &self.columns)
            .field("pending_rows", &self.rows.len())
            .field("rows_affected", &self.rows_affected)
            .field("last_insert_id", &self.last_insert_id)
            .finish()
    }
}
