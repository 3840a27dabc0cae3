//! SQLite dialect.

use crate::compiler::{base, render, CompileState, Compiler};
use crate::error::SquallResult;
use crate::expr::{Expr, Kind};
use std::sync::{Arc, OnceLock};

/// LIMIT injected when only OFFSET is given; SQLite limits are signed 64-bit.
pub const MAX_LIMIT: u64 = i64::MAX as u64;

const RESERVED_WORDS: &[&str] = &[
    "abort", "analyze", "attach", "autoincrement", "conflict", "database", "detach",
    "exclusive", "explain", "fail", "glob", "ignore", "index", "indexed", "instead", "isnull",
    "limit", "notnull", "offset", "plan", "pragma", "query", "raise", "regexp", "reindex",
    "release", "rename", "replace", "row", "savepoint", "temp", "trigger", "vacuum", "virtual",
];

pub fn compiler() -> Arc<Compiler> {
    static SQLITE: OnceLock<Arc<Compiler>> = OnceLock::new();
    SQLITE
        .get_or_init(|| {
            let mut compiler = base().derive("sqlite");
            compiler
                .when(Kind::Select, render_select)
                .add_reserved_words(RESERVED_WORDS.iter().copied());
            Arc::new(compiler)
        })
        .clone()
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
