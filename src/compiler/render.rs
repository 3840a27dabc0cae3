//! Standard renderers registered on the base compiler.
//!
//! Statement renderers are also exposed as plain functions taking the typed
//! node, so dialect overrides can adjust a node and delegate back here.

use super::{CompileState, Compiler, Context};
use crate::error::{SquallError, SquallResult};
use crate::expr::precedence::{CLAUSE, JOIN, STATEMENT};
use crate::expr::{quote_identifier, BinaryOp, Column, Delete, Expr, Insert, Kind, Select, Update};
use crate::value::Value;
use crate::variables::Variable;

/// Install the standard renderers on `compiler`.
pub fn register(compiler: &mut Compiler) {
    compiler
        .when(Kind::Literal, render_literal)
        .when(Kind::Param, render_param)
        .when(Kind::Column, render_column)
        .when(Kind::Raw, render_raw)
        .when(Kind::Token, render_token)
        .when(Kind::Func, render_func)
        .when(Kind::Not, render_not)
        .when(Kind::In, render_in)
        .when(Kind::BinaryOper, render_binary)
        .when(Kind::CompoundOper, render_compound)
        .when(Kind::SuffixExpr, render_suffix)
        .when(Kind::Alias, render_alias)
        .when(Kind::JoinExpr, render_join)
        .when(Kind::Select, render_select)
        .when(Kind::Insert, render_insert)
        .when(Kind::Update, render_update)
        .when(Kind::Delete, render_delete);
}

fn unexpected(expr: &Expr) -> SquallError {
    SquallError::compile(format!("renderer received an unexpected {:?} node", expr.kind()))
}

pub fn render_literal(_: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    match expr {
        Expr::Literal(Value::Null) => Ok("NULL".to_string()),
        Expr::Literal(value) => Ok(state.add_param(Variable::for_value(value.clone())).to_string()),
        _ => Err(unexpected(expr)),
    }
}

pub fn render_param(_: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    match expr {
        Expr::Param(variable) if !variable.is_defined() => Err(SquallError::compile(format!(
            "undefined {:?} variable used in a statement",
            variable.kind()
        ))),
        Expr::Param(variable) => Ok(state.add_param(variable.clone()).to_string()),
        _ => Err(unexpected(expr)),
    }
}

pub fn render_column(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Column(column) = expr else {
        return Err(unexpected(expr));
    };
    if column.name.is_empty() {
        return Err(SquallError::compile("column with an empty name"));
    }
    let name = compiler.render_token(&column.name, state)?;
    match &column.table {
        Some(table) if state.context != Context::ColumnName => {
            state.note_table(table);
            let table = compiler.render(&Expr::Table(table.clone()), state)?;
            Ok(format!("{table}.{name}"))
        }
        _ => Ok(name),
    }
}

pub fn render_raw(_: &Compiler, expr: &Expr, _: &mut CompileState) -> SquallResult<String> {
    match expr {
        Expr::Raw(sql) => Ok(sql.clone()),
        _ => Err(unexpected(expr)),
    }
}

/// Emit an identifier, double-quoting it when unsafe or reserved.
pub fn render_token(compiler: &Compiler, expr: &Expr, _: &mut CompileState) -> SquallResult<String> {
    let (Expr::Token(name) | Expr::Table(name)) = expr else {
        return Err(unexpected(expr));
    };
    if name.is_empty() {
        return Err(SquallError::compile("empty identifier"));
    }
    if compiler.is_safe_token(name) {
        Ok(name.clone())
    } else {
        Ok(quote_identifier(name, '"'))
    }
}

pub fn render_func(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Func { name, args } = expr else {
        return Err(unexpected(expr));
    };
    let args = compiler.render_list(args, state, ", ", STATEMENT)?;
    Ok(format!("{name}({args})"))
}

pub fn render_not(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Not(inner) = expr else {
        return Err(unexpected(expr));
    };
    Ok(format!("NOT {}", compiler.render(inner, state)?))
}

pub fn render_in(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::In { expr: left, values } = expr else {
        return Err(unexpected(expr));
    };
    if values.is_empty() {
        return Ok("1 = 0".to_string());
    }
    let left = compiler.render(left, state)?;
    let values = compiler.render_list(values, state, ", ", STATEMENT)?;
    Ok(format!("{left} IN ({values})"))
}

pub fn render_binary(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Binary { op, left, right } = expr else {
        return Err(unexpected(expr));
    };
    let left_sql = compiler.render(left, state)?;
    match (op, right.as_ref()) {
        (BinaryOp::Eq, Expr::Literal(Value::Null)) => Ok(format!("{left_sql} IS NULL")),
        (BinaryOp::Ne, Expr::Literal(Value::Null)) => Ok(format!("{left_sql} IS NOT NULL")),
        _ => {
            // Right operands of the same precedence keep their grouping: a - (b - c).
            let tighter = state.precedence + 1;
            let right_sql = compiler.render_at(right, state, tighter)?;
            Ok(format!("{left_sql} {} {right_sql}", op.symbol()))
        }
    }
}

pub fn render_compound(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Compound { op, items } = expr else {
        return Err(unexpected(expr));
    };
    if items.is_empty() {
        return Err(SquallError::compile(format!("{} without operands", op.keyword())));
    }
    let precedence = state.precedence;
    compiler.render_list(items, state, &format!(" {} ", op.keyword()), precedence)
}

pub fn render_suffix(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Suffix { op, expr: inner } = expr else {
        return Err(unexpected(expr));
    };
    Ok(format!("{} {}", compiler.render(inner, state)?, op.keyword()))
}

pub fn render_alias(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Alias(alias) = expr else {
        return Err(unexpected(expr));
    };
    let name = match &alias.name {
        Some(name) => name.clone(),
        None => state.next_alias(),
    };
    let inner = compiler.render(&alias.expr, state)?;
    let name = compiler.render_token(&name, state)?;
    Ok(format!("{inner} AS {name}"))
}

pub fn render_join(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Join(join) = expr else {
        return Err(unexpected(expr));
    };
    let mut sql = String::new();
    if let Some(left) = &join.left {
        sql.push_str(&compiler.render_in(left, state, Context::Table, JOIN)?);
        sql.push(' ');
    }
    sql.push_str(join.kind.keyword());
    sql.push(' ');
    sql.push_str(&compiler.render_in(&join.right, state, Context::Table, JOIN + 1)?);
    if let Some(on) = &join.on {
        sql.push_str(" ON ");
        sql.push_str(&compiler.render_in(on, state, Context::Expr, JOIN)?);
    }
    Ok(sql)
}

fn render_tables(compiler: &Compiler, tables: &[Expr], state: &mut CompileState) -> SquallResult<String> {
    let mut sql = String::new();
    for (i, table) in tables.iter().enumerate() {
        let continues_join = matches!(table, Expr::Join(join) if join.left.is_none());
        if i > 0 {
            sql.push_str(if continues_join { " " } else { ", " });
        }
        sql.push_str(&compiler.render_in(table, state, Context::Table, CLAUSE)?);
    }
    Ok(sql)
}

pub fn render_select(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    match expr {
        Expr::Select(node) => select(compiler, node, state),
        _ => Err(unexpected(expr)),
    }
}

/// Render a SELECT.
///
/// With no explicit tables, FROM lists the tables referenced by qualified
/// columns anywhere in the statement.
pub fn select(compiler: &Compiler, select: &Select, state: &mut CompileState) -> SquallResult<String> {
    if select.columns.is_empty() {
        return Err(SquallError::compile("SELECT without columns"));
    }
    let outer_tables = state.push_tables();
    let outer_context = std::mem::replace(&mut state.context, Context::Expr);
    let sql = select_body(compiler, select, state);
    state.context = outer_context;
    let _ = state.pop_tables(outer_tables);
    sql
}

fn select_body(compiler: &Compiler, select: &Select, state: &mut CompileState) -> SquallResult<String> {
    let mut sql = String::from("SELECT ");
    if select.distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&compiler.render_list(&select.columns, state, ", ", CLAUSE)?);
    let from_position = sql.len();
    if !select.tables.is_empty() {
        sql.push_str(" FROM ");
        sql.push_str(&render_tables(compiler, &select.tables, state)?);
    }
    if let Some(where_) = &select.where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&compiler.render_at(where_, state, CLAUSE)?);
    }
    if !select.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&compiler.render_list(&select.group_by, state, ", ", CLAUSE)?);
    }
    if let Some(having) = &select.having {
        sql.push_str(" HAVING ");
        sql.push_str(&compiler.render_at(having, state, CLAUSE)?);
    }
    if !select.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&compiler.render_list(&select.order_by, state, ", ", CLAUSE)?);
    }
    if let Some(limit) = select.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = select.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
    if select.tables.is_empty() && !state.auto_tables().is_empty() {
        // Table names bind no parameters, so splicing them in keeps parameter order intact.
        let tables: Vec<Expr> = state.auto_tables().iter().cloned().map(Expr::Table).collect();
        let from = render_tables(compiler, &tables, state)?;
        sql.insert_str(from_position, &format!(" FROM {from}"));
    }
    Ok(sql)
}

/// The rendered pieces of an INSERT, for dialects that assemble it differently.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertParts {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

pub fn render_insert(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    match expr {
        Expr::Insert(node) => insert(compiler, node, state),
        _ => Err(unexpected(expr)),
    }
}

/// Render an INSERT, using `DEFAULT VALUES` when every column was omitted.
pub fn insert(compiler: &Compiler, insert: &Insert, state: &mut CompileState) -> SquallResult<String> {
    let parts = insert_parts(compiler, insert, state)?;
    if parts.columns.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", parts.table));
    }
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        parts.table,
        parts.columns.join(", "),
        parts.values.join(", ")
    ))
}

/// Render the target table, column list and value list of an INSERT.
///
/// Undefined variables are dropped for primary-key and server-default
/// columns; anywhere else they are an error.
pub fn insert_parts(
    compiler: &Compiler,
    insert: &Insert,
    state: &mut CompileState,
) -> SquallResult<InsertParts> {
    if !insert.primary_variables.is_empty()
        && insert.primary_variables.len() != insert.primary_columns.len()
    {
        return Err(SquallError::compile(format!(
            "{} primary key columns but {} primary variables",
            insert.primary_columns.len(),
            insert.primary_variables.len()
        )));
    }

    let mut assignments = Vec::with_capacity(insert.values.len());
    for (column, value) in &insert.values {
        match value {
            Expr::Param(variable) if !variable.is_defined() => {
                if insert.is_primary(column) || column.server_default {
                    continue;
                }
                return Err(SquallError::compile(format!(
                    "no value supplied for column '{}'",
                    column.name
                )));
            }
            _ => assignments.push((column, value)),
        }
    }

    let table = match &insert.table {
        Some(table) => table.clone(),
        None => insert
            .values
            .iter()
            .map(|(c, _)| c)
            .chain(&insert.primary_columns)
            .find_map(|c| c.table.clone())
            .map(Expr::Table)
            .ok_or_else(|| SquallError::compile("INSERT without a target table"))?,
    };
    let table = compiler.render_in(&table, state, Context::Table, CLAUSE)?;

    let mut columns = Vec::with_capacity(assignments.len());
    let mut values = Vec::with_capacity(assignments.len());
    for (column, value) in assignments {
        let column = Expr::Column(column.clone());
        columns.push(compiler.render_in(&column, state, Context::ColumnName, CLAUSE)?);
        values.push(compiler.render_in(value, state, Context::Expr, CLAUSE)?);
    }
    Ok(InsertParts {
        table,
        columns,
        values,
    })
}

pub fn render_update(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Update(update) = expr else {
        return Err(unexpected(expr));
    };
    self::update(compiler, update, state)
}

/// Render an UPDATE.
pub fn update(compiler: &Compiler, update: &Update, state: &mut CompileState) -> SquallResult<String> {
    if update.set.is_empty() {
        return Err(SquallError::compile("UPDATE without assignments"));
    }
    let table = match &update.table {
        Some(table) => table.clone(),
        None => update
            .set
            .iter()
            .find_map(|(c, _)| c.table.clone())
            .map(Expr::Table)
            .ok_or_else(|| SquallError::compile("UPDATE without a target table"))?,
    };
    let mut sql = format!(
        "UPDATE {} SET ",
        compiler.render_in(&table, state, Context::Table, CLAUSE)?
    );
    let mut sets = Vec::with_capacity(update.set.len());
    for (column, value) in &update.set {
        let column = compiler.render_in(&Expr::Column(column.clone()), state, Context::ColumnName, CLAUSE)?;
        let value = compiler.render_in(value, state, Context::Expr, CLAUSE)?;
        sets.push(format!("{column} = {value}"));
    }
    sql.push_str(&sets.join(", "));
    if let Some(where_) = &update.where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&compiler.render_in(where_, state, Context::Expr, CLAUSE)?);
    }
    Ok(sql)
}

pub fn render_delete(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Delete(delete) = expr else {
        return Err(unexpected(expr));
    };
    self::delete(compiler, delete, state)
}

/// Render a DELETE, taking the target from the WHERE clause when absent.
pub fn delete(compiler: &Compiler, delete: &Delete, state: &mut CompileState) -> SquallResult<String> {
    let outer_tables = state.push_tables();
    let where_ = delete
        .where_
        .as_ref()
        .map(|w| compiler.render_in(w, state, Context::Expr, CLAUSE))
        .transpose();
    let referenced = state.pop_tables(outer_tables);
    let where_ = where_?;

    let table = match &delete.table {
        Some(table) => table.clone(),
        None => match referenced.as_slice() {
            [table] => Expr::Table(table.clone()),
            [] => return Err(SquallError::compile("DELETE without a target table")),
            _ => {
                return Err(SquallError::compile(format!(
                    "DELETE target is ambiguous between {}",
                    referenced.join(", ")
                )));
            }
        },
    };
    let mut sql = format!(
        "DELETE FROM {}",
        compiler.render_in(&table, state, Context::Table, CLAUSE)?
    );
    if let Some(where_) = where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&where_);
    }
    Ok(sql)
}

/// Helper for dialects: the undefined primary-key columns of an INSERT, in declared order.
pub fn undefined_primary_columns(insert: &Insert) -> Vec<&Column> {
    insert
        .primary_columns
        .iter()
        .zip(&insert.primary_variables)
        .filter(|(_, variable)| !variable.is_defined())
        .map(|(column, _)| column)
        .collect()
}
