//! Per-backend compiler registries derived from [`base`](super::base).
//!
//! Each dialect overrides only the kinds where its backend diverges.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use super::Compiler;
use crate::error::{SquallError, SquallResult};
use std::sync::Arc;

/// Look up a dialect registry by backend scheme.
pub fn by_name(name: &str) -> SquallResult<Arc<Compiler>> {
    match name {
        "sqlite" => Ok(sqlite::compiler()),
        "mysql" => Ok(mysql::compiler()),
        "postgres" | "postgresql" => Ok(postgres::compiler()),
        "base" => Ok(super::base()),
        other => Err(SquallError::DatabaseModule(format!(
            "no SQL dialect named '{other}'"
        ))),
    }
}
