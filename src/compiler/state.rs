//! Per-render compile state.

use crate::variables::Variable;

/// Where an identifier is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// Ordinary expression position: columns render fully qualified.
    Expr,
    /// FROM list or statement target.
    Table,
    /// INSERT column list or UPDATE SET target: columns render bare.
    ColumnName,
}

/// Mutable state for a single compile call.
///
/// Created by [`Compiler::compile`](super::Compiler::compile) and dropped when
/// it returns, so parameter lists never leak between renders.
#[derive(Debug)]
pub struct CompileState {
    params: Vec<Variable>,
    /// Precedence of the enclosing node; children binding looser get parentheses.
    pub precedence: u16,
    pub context: Context,
    auto_tables: Vec<String>,
    aliases: usize,
}

impl Default for CompileState {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileState {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            precedence: crate::expr::precedence::STATEMENT,
            context: Context::Expr,
            auto_tables: Vec::new(),
            aliases: 0,
        }
    }

    /// Bind a parameter and return its placeholder.
    pub fn add_param(&mut self, variable: Variable) -> &'static str {
        self.params.push(variable);
        "?"
    }

    pub fn params(&self) -> &[Variable] {
        &self.params
    }

    pub(crate) fn into_params(self) -> Vec<Variable> {
        self.params
    }

    /// Remember a table referenced by a qualified column.
    pub fn note_table(&mut self, table: &str) {
        if !self.auto_tables.iter().any(|t| t == table) {
            self.auto_tables.push(table.to_string());
        }
    }

    /// Tables collected in the current auto-table scope, in first-seen order.
    pub fn auto_tables(&self) -> &[String] {
        &self.auto_tables
    }

    /// Start a fresh auto-table scope, returning the enclosing one.
    pub fn push_tables(&mut self) -> Vec<String> {
        std::mem::take(&mut self.auto_tables)
    }

    /// End the current auto-table scope, returning the tables it collected.
    pub fn pop_tables(&mut self, outer: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.auto_tables, outer)
    }

    /// Next generated alias name: `_1`, `_2`, ...
    pub fn next_alias(&mut self) -> String {
        self.aliases += 1;
        format!("_{}", self.aliases)
    }
}
