//! Compiler dispatch engine.
//!
//! A [`Compiler`] maps expression [`Kind`]s to render functions. Dialects are
//! child registries created with [`Compiler::derive`]: the child answers for
//! the kinds it overrides and defers everything else to its parent.
//!
//! Lookup for a node walks the node's kind lineage (`Table` → `Token` →
//! `Expr`) in the current registry first, then repeats the walk in the
//! parent, so a child override of a generic kind shadows the parent's more
//! specific renderers too.
//!
//! ```
//! use squall::compiler::base;
//! use squall::expr::{Column, Expr, Kind, Select};
//!
//! let mut child = base().derive("shouting");
//! child.when(Kind::Token, |_, expr, _| match expr {
//!     Expr::Token(name) | Expr::Table(name) => Ok(name.to_uppercase()),
//!     _ => unreachable!(),
//! });
//! let child = std::sync::Arc::new(child);
//!
//! let select = Select::new(vec![Column::qualified("test", "title").into()]);
//! let compiled = child.compile(&select.into()).unwrap();
//! assert_eq!(compiled.sql, "SELECT TEST.TITLE FROM TEST");
//! ```

pub mod dialects;
pub mod placeholders;
pub mod render;
pub mod state;


pub use placeholders::{convert_marks, count_marks, ParamMark};
pub use state::{CompileState, Context};

use crate::error::{SquallError, SquallResult};
use crate::expr::{Expr, Kind, SQL_RESERVED_WORDS};
use crate::variables::Variable;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// A render function: produces the SQL fragment for one node.
pub type Renderer = fn(&Compiler, &Expr, &mut CompileState) -> SquallResult<String>;

/// Rendered statement text plus its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Variable>,
}

/// A registry of renderers, optionally chained to a parent registry.
#[derive(Debug)]
pub struct Compiler {
    name: String,
    renderers: HashMap<Kind, Renderer>,
    reserved: HashSet<String>,
    unreserved: HashSet<String>,
    parent: Option<Arc<Compiler>>,
}

impl Compiler {
    /// An empty root registry with no renderers and no reserved words.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            renderers: HashMap::new(),
            reserved: HashSet::new(),
            unreserved: HashSet::new(),
            parent: None,
        }
    }

    /// Create a child that inherits every renderer and reserved word.
    ///
    /// The parent is shared, never modified: configure the child, then wrap
    /// it in an `Arc` to freeze it.
    pub fn derive(self: &Arc<Self>, name: impl Into<String>) -> Compiler {
        Compiler {
            parent: Some(Arc::clone(self)),
            ..Compiler::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Compiler>> {
        self.parent.as_ref()
    }

    /// Register (or shadow) the renderer for `kind`.
    pub fn when(&mut self, kind: Kind, renderer: Renderer) -> &mut Self {
        self.renderers.insert(kind, renderer);
        self
    }

    pub fn add_reserved_words<'a>(&mut self, words: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for word in words {
            let word = word.to_ascii_lowercase();
            self.unreserved.remove(&word);
            self.reserved.insert(word);
        }
        self
    }

    pub fn remove_reserved_words<'a>(
        &mut self,
        words: impl IntoIterator<Item = &'a str>,
    ) -> &mut Self {
        for word in words {
            let word = word.to_ascii_lowercase();
            self.reserved.remove(&word);
            self.unreserved.insert(word);
        }
        self
    }

    /// Reserved-word check for this dialect, case-insensitive.
    pub fn is_reserved_word(&self, word: &str) -> bool {
        let word = word.to_ascii_lowercase();
        let mut current = Some(self);
        while let Some(compiler) = current {
            if compiler.unreserved.contains(&word) {
                return false;
            }
            if compiler.reserved.contains(&word) {
                return true;
            }
            current = compiler.parent.as_deref();
        }
        false
    }

    /// True when `token` may be emitted without quoting in this dialect.
    pub fn is_safe_token(&self, token: &str) -> bool {
        crate::expr::is_safe_token(token) && !self.is_reserved_word(token)
    }

    /// Find the renderer for `kind`, walking the kind lineage and then the parent chain.
    pub fn resolve(&self, kind: Kind) -> Option<Renderer> {
        let mut current = Some(self);
        while let Some(compiler) = current {
            if let Some(renderer) = kind.lineage().find_map(|k| compiler.renderers.get(&k)) {
                return Some(*renderer);
            }
            current = compiler.parent.as_deref();
        }
        None
    }

    /// Render `expr` into SQL text and parameters.
    pub fn compile(&self, expr: &Expr) -> SquallResult<Compiled> {
        let mut state = CompileState::new();
        let sql = self.render(expr, &mut state)?;
        let marks = count_marks(&sql);
        if marks != state.params().len() {
            return Err(SquallError::compile(format!(
                "statement has {marks} placeholders but {} parameters: {sql}",
                state.params().len()
            )));
        }
        tracing::trace!(compiler = %self.name, %sql, params = marks, "compiled expression");
        Ok(Compiled {
            sql,
            params: state.into_params(),
        })
    }

    /// Render one node inside an ongoing compile.
    ///
    /// The node is parenthesised when it binds looser than the enclosing
    /// precedence; its children see the node's own precedence.
    pub fn render(&self, expr: &Expr, state: &mut CompileState) -> SquallResult<String> {
        let kind = expr.kind();
        let renderer = self.resolve(kind).ok_or_else(|| {
            SquallError::compile(format!(
                "no renderer registered for {kind:?} in compiler '{}'",
                self.name
            ))
        })?;
        let outer = state.precedence;
        let inner = expr.precedence();
        state.precedence = inner;
        let sql = renderer(self, expr, state);
        state.precedence = outer;
        let sql = sql?;
        Ok(if inner < outer { format!("({sql})") } else { sql })
    }

    /// Render `expr` as if enclosed by a node of the given precedence.
    pub fn render_at(
        &self,
        expr: &Expr,
        state: &mut CompileState,
        precedence: u16,
    ) -> SquallResult<String> {
        let outer = std::mem::replace(&mut state.precedence, precedence);
        let sql = self.render(expr, state);
        state.precedence = outer;
        sql
    }

    /// Render `expr` within `context` (qualified vs. bare column names).
    pub fn render_in(
        &self,
        expr: &Expr,
        state: &mut CompileState,
        context: Context,
        precedence: u16,
    ) -> SquallResult<String> {
        let outer = std::mem::replace(&mut state.context, context);
        let sql = self.render_at(expr, state, precedence);
        state.context = outer;
        sql
    }

    /// Render each item and join them with `separator`.
    pub fn render_list(
        &self,
        items: &[Expr],
        state: &mut CompileState,
        separator: &str,
        precedence: u16,
    ) -> SquallResult<String> {
        let parts = items
            .iter()
            .map(|item| self.render_at(item, state, precedence))
            .collect::<SquallResult<Vec<_>>>()?;
        Ok(parts.join(separator))
    }

    /// Render a bare identifier through this registry's token renderer.
    pub fn render_token(&self, name: &str, state: &mut CompileState) -> SquallResult<String> {
        self.render(&Expr::Token(name.to_string()), state)
    }
}

/// The shared root registry with the standard renderers and reserved words.
pub fn base() -> Arc<Compiler> {
    static BASE: OnceLock<Arc<Compiler>> = OnceLock::new();
    BASE.get_or_init(|| {
        let mut compiler = Compiler::new("base");
        render::register(&mut compiler);
        compiler.add_reserved_words(SQL_RESERVED_WORDS.iter().copied());
        Arc::new(compiler)
    })
    .clone()
}
