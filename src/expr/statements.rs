//! Statement and clause nodes.

use super::{Column, Expr, Kind};
use crate::variables::Variable;

/// `expr AS name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub expr: Expr,
    /// `None` asks the compiler for a generated `_N` name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Natural,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Natural => "NATURAL JOIN",
        }
    }

    pub(crate) fn kind(self) -> Kind {
        match self {
            JoinKind::Inner => Kind::Join,
            JoinKind::Left => Kind::LeftJoin,
            JoinKind::Right => Kind::RightJoin,
            JoinKind::Natural => Kind::NaturalJoin,
        }
    }
}

/// `[left] JOIN right [ON on]`.
///
/// Without a left side the join continues the preceding table in a FROM list.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub left: Option<Expr>,
    pub right: Expr,
    pub on: Option<Expr>,
}

impl Join {
    pub fn new(kind: JoinKind, right: impl Into<Expr>) -> Self {
        Self {
            kind,
            left: None,
            right: right.into(),
            on: None,
        }
    }

    pub fn left_side(mut self, left: impl Into<Expr>) -> Self {
        self.left = Some(left.into());
        self
    }

    pub fn on(mut self, on: impl Into<Expr>) -> Self {
        self.on = Some(on.into());
        self
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub columns: Vec<Expr>,
    /// Empty means "derive FROM from the tables the columns reference".
    pub tables: Vec<Expr>,
    pub where_: Option<Expr>,
    pub distinct: bool,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<Expr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn new(columns: Vec<Expr>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn from(mut self, table: impl Into<Expr>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.where_ = Some(condition.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn group_by(mut self, expr: impl Into<Expr>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn having(mut self, condition: impl Into<Expr>) -> Self {
        self.having = Some(condition.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<Expr>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An INSERT statement.
///
/// Assignments whose value is an `UNDEFINED` variable are omitted when the
/// column is part of the primary key or has a server default; any other
/// undefined assignment fails compilation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Insert {
    pub values: Vec<(Column, Expr)>,
    /// Falls back to the first column's table.
    pub table: Option<Expr>,
    pub primary_columns: Vec<Column>,
    pub primary_variables: Vec<Variable>,
}

impl Insert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(Expr::Table(table.into()));
        self
    }

    pub fn value(mut self, column: Column, value: impl Into<Expr>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    /// Declare the primary key and the variables that receive its values.
    pub fn primary_key(mut self, columns: Vec<Column>, variables: Vec<Variable>) -> Self {
        self.primary_columns = columns;
        self.primary_variables = variables;
        self
    }

    pub(crate) fn is_primary(&self, column: &Column) -> bool {
        self.primary_columns.iter().any(|c| c.name == column.name)
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Update {
    pub set: Vec<(Column, Expr)>,
    pub where_: Option<Expr>,
    /// Falls back to the first assigned column's table.
    pub table: Option<Expr>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(Expr::Table(table.into()));
        self
    }

    pub fn set(mut self, column: Column, value: impl Into<Expr>) -> Self {
        self.set.push((column, value.into()));
        self
    }

    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.where_ = Some(condition.into());
        self
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delete {
    pub where_: Option<Expr>,
    /// Falls back to the tables referenced by the WHERE clause.
    pub table: Option<Expr>,
}

impl Delete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(Expr::Table(table.into()));
        self
    }

    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.where_ = Some(condition.into());
        self
    }
}

macro_rules! statement_into_expr {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Expr {
                fn from(s: $ty) -> Self {
                    Expr::$ty(Box::new(s))
                }
            }
        )*
    };
}

statement_into_expr!(Select, Insert, Update, Delete, Join, Alias);
