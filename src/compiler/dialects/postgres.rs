//! PostgreSQL dialect.
//!
//! List variables become `ARRAY[...]` constructors with one parameter per
//! element, and inserts with undefined primary-key variables ask for the
//! generated values back with `RETURNING`.

use crate::compiler::{base, render, CompileState, Compiler, Context};
use crate::error::SquallResult;
use crate::expr::precedence::CLAUSE;
use crate::expr::{Expr, Kind};
use crate::value::Value;
use crate::variables::{Variable, VariableKind};
use std::sync::{Arc, OnceLock};

const RESERVED_WORDS: &[&str] = &[
    "analyse", "analyze", "array", "asymmetric", "current_catalog", "current_role",
    "current_schema", "freeze", "ilike", "isnull", "lateral", "limit", "localtime",
    "localtimestamp", "notnull", "offset", "placing", "returning", "similar", "symmetric",
    "variadic", "verbose", "window",
];

pub fn compiler() -> Arc<Compiler> {
    static POSTGRES: OnceLock<Arc<Compiler>> = OnceLock::new();
    POSTGRES
        .get_or_init(|| {
            let mut compiler = base().derive("postgres");
            compiler
                .when(Kind::Param, render_param)
                .when(Kind::Insert, render_insert)
                .add_reserved_words(RESERVED_WORDS.iter().copied());
            Arc::new(compiler)
        })
        .clone()
}

fn render_param(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Param(variable) = expr else {
        return render::render_param(compiler, expr, state);
    };
    let Some(Value::List(items)) = variable.get(false) else {
        return render::render_param(compiler, expr, state);
    };
    let item_kind = match variable.kind() {
        VariableKind::List(item) => item.as_ref().clone(),
        _ => VariableKind::Any,
    };
    // An empty constructor has no element to infer its type from.
    if items.is_empty() {
        return Ok(format!("ARRAY[]::{}[]", element_type(&item_kind)));
    }
    let marks = items
        .into_iter()
        .map(|item| {
            let mut element = Variable::new(item_kind.clone());
            element.set(item, false)?;
            Ok(state.add_param(element))
        })
        .collect::<SquallResult<Vec<_>>>()?;
    Ok(format!("ARRAY[{}]", marks.join(", ")))
}

/// Element type name for an array of `kind`. Nested lists share the
/// base type, as PostgreSQL arrays of any dimension do.
fn element_type(kind: &VariableKind) -> &'static str {
    match kind {
        VariableKind::Bool => "boolean",
        VariableKind::Int => "bigint",
        VariableKind::Float => "double precision",
        VariableKind::Decimal => "numeric",
        VariableKind::Bytes => "bytea",
        VariableKind::Date => "date",
        VariableKind::Time => "time",
        VariableKind::DateTime => "timestamp",
        VariableKind::DateTimeTz => "timestamptz",
        VariableKind::Interval => "interval",
        VariableKind::Json => "jsonb",
        VariableKind::List(item) => element_type(item),
        VariableKind::Any | VariableKind::Text => "text",
    }
}

fn render_insert(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Insert(insert) = expr else {
        return render::render_insert(compiler, expr, state);
    };
    let mut sql = render::insert(compiler, insert, state)?;
    let returning = render::undefined_primary_columns(insert);
    if !returning.is_empty() {
        let columns = returning
            .into_iter()
            .map(|c| compiler.render_in(&Expr::Column(c.clone()), state, Context::ColumnName, CLAUSE))
            .collect::<SquallResult<Vec<_>>>()?;
        sql.push_str(" RETURNING ");
        sql.push_str(&columns.join(", "));
    }
    Ok(sql)
}
