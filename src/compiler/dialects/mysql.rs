//! MySQL dialect: backtick identifiers, its own reserved words, an explicit
//! LIMIT whenever OFFSET is used, and `() VALUES ()` for empty inserts.

use crate::compiler::{base, render, CompileState, Compiler};
use crate::error::{SquallError, SquallResult};
use crate::expr::{quote_identifier, Expr, Kind};
use std::sync::{Arc, OnceLock};

/// The largest LIMIT MySQL accepts, used when only OFFSET is given.
pub const MAX_LIMIT: u64 = u64::MAX;

const RESERVED_WORDS: &[&str] = &[
    "accessible", "analyze", "before", "bigint", "binary", "blob", "change", "databases",
    "delayed", "distinctrow", "div", "dual", "enclosed", "escaped", "explain", "fulltext",
    "high_priority", "ignore", "index", "infile", "keys", "kill", "limit", "linear", "lines",
    "load", "lock", "long", "longblob", "longtext", "low_priority", "mediumblob", "mediumint",
    "mediumtext", "mod", "optimize", "optionally", "outfile", "purge", "range", "regexp",
    "rename", "replace", "require", "rlike", "schemas", "separator", "show", "spatial",
    "sql_big_result", "sql_calc_found_rows", "sql_small_result", "ssl", "starting",
    "straight_join", "terminated", "tinyblob", "tinyint", "tinytext", "unlock", "unsigned",
    "use", "utc_date", "utc_time", "utc_timestamp", "varbinary", "xor", "zerofill",
];

pub fn compiler() -> Arc<Compiler> {
    static MYSQL: OnceLock<Arc<Compiler>> = OnceLock::new();
    MYSQL
        .get_or_init(|| {
            let mut compiler = base().derive("mysql");
            compiler
                .when(Kind::Token, render_token)
                .when(Kind::Select, render_select)
                .when(Kind::Insert, render_insert)
                .add_reserved_words(RESERVED_WORDS.iter().copied());
            Arc::new(compiler)
        })
        .clone()
}

fn render_token(compiler: &Compiler, expr: &Expr, _: &mut CompileState) -> SquallResult<String> {
    let (Expr::Token(name) | Expr::Table(name)) = expr else {
        return Err(SquallError::compile(format!("{:?} is not a token", expr.kind())));
    };
    if name.is_empty() {
        return Err(SquallError::compile("empty identifier"));
    }
    if compiler.is_safe_token(name) {
        Ok(name.clone())
    } else {
        Ok(quote_identifier(name, '`'))
    }
}

fn render_select(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    match expr {
        Expr::Select(select) if select.offset.is_some() && select.limit.is_none() => {
            let select = select.as_ref().clone().limit(MAX_LIMIT);
            render::select(compiler, &select, state)
        }
        _ => render::render_select(compiler, expr, state),
    }
}

fn render_insert(compiler: &Compiler, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
    let Expr::Insert(insert) = expr else {
        return render::render_insert(compiler, expr, state);
    };
    let parts = render::insert_parts(compiler, insert, state)?;
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        parts.table,
        parts.columns.join(", "),
        parts.values.join(", ")
    ))
}
