//! # squall
//!
//! Build SQL as expression trees, compile them per dialect, and run them
//! through connections that survive a lost server.
//!
//! ## Quick Example
//!
//! ```
//! use squall::prelude::*;
//!
//! let query = Select::new(vec![Column::qualified("test", "title").into()])
//!     .where_(Expr::from(Column::qualified("test", "id")).eq(10))
//!     .limit(5);
//!
//! let compiled = squall::compiler::base().compile(&query.into()).unwrap();
//! assert_eq!(compiled.sql, "SELECT test.title FROM test WHERE test.id = ? LIMIT 5");
//! assert_eq!(compiled.params.len(), 1);
//! ```
//!
//! ## Layers
//!
//! | Module        | Role                                                   |
//! |---------------|--------------------------------------------------------|
//! | [`expr`]      | Expression tree and statement builders                 |
//! | [`variables`] | Typed value holders and their wire conversions         |
//! | [`compiler`]  | Kind-dispatched renderers, one registry per dialect    |
//! | [`database`]  | Connections, transactions, results, backend hooks      |
//! | [`backends`]  | sqlx-backed SQLite, MySQL and PostgreSQL adapters      |

pub mod backends;
pub mod compiler;
pub mod config;
pub mod database;
pub mod error;
pub mod expr;
pub mod value;
pub mod variables;

pub use backends::create_database;

pub mod prelude {
    pub use crate::backends::create_database;
    pub use crate::compiler::{Compiled, Compiler};
    pub use crate::config::SquallConfig;
    pub use crate::database::{
        Connection, ConnectionConfig, ConnectionDescriptor, Database, QueryResult, Statement,
    };
    pub use crate::error::*;
    pub use crate::expr::{Column, Delete, Expr, Insert, Join, JoinKind, Select, Update};
    pub use crate::value::{Row, Value};
    pub use crate::variables::{Variable, VariableKind};
}
