//! Named database descriptors loaded from a TOML file.
//!
//! ```toml
//! [databases.local]
//! scheme = "sqlite"
//! database = "app.db"
//!
//! [databases.orders]
//! scheme = "postgres"
//! host = "db.internal"
//! username = "app"
//! database = "orders"
//! ```
//!
//! Lookup order: an explicit path, then `squall.toml` in the working
//! directory, then `<config dir>/squall/config.toml`.

use crate::database::ConnectionDescriptor;
use crate::error::{SquallError, SquallResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "squall.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquallConfig {
    #[serde(default)]
    pub databases: BTreeMap<String, ConnectionDescriptor>,
}

impl SquallConfig {
    pub fn parse(content: &str) -> SquallResult<Self> {
        toml::from_str(content).map_err(|e| SquallError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SquallResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| SquallError::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), databases = config.databases.len(), "loaded config");
        Ok(config)
    }

    /// Load from `explicit`, or from the first default location that exists.
    ///
    /// With no explicit path and no file found, the config is empty.
    pub fn discover(explicit: Option<&Path>) -> SquallResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn database(&self, name: &str) -> SquallResult<&ConnectionDescriptor> {
        self.databases.get(name).ok_or_else(|| {
            SquallError::Config(format!("no database named '{name}' in the configuration"))
        })
    }
}

/// Candidate config files, most specific first.
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("squall").join("config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_databases() {
        let config = SquallConfig::parse(
            r#"
            [databases.local]
            scheme = "sqlite"
            database = "app.db"

            [databases.orders]
            scheme = "postgres"
            host = "db.internal"
            port = 5433

            [databases.orders.options]
            encoding = "UTF8"
            "#,
        )
        .unwrap();

        assert_eq!(config.databases.len(), 2);
        assert_eq!(
            config.database("local").unwrap(),
            &ConnectionDescriptor::new("sqlite").database("app.db")
        );
        let orders = config.database("orders").unwrap();
        assert_eq!(orders.port, Some(5433));
        assert_eq!(orders.option("encoding"), Some("UTF8"));
    }

    #[test]
    fn test_unknown_database_and_bad_toml() {
        let config = SquallConfig::default();
        assert!(matches!(config.database("nope"), Err(SquallError::Config(_))));
        assert!(matches!(
            SquallConfig::parse("[databases.x]\nport = \"not a port\""),
            Err(SquallError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let missing = std::env::temp_dir().join("squall-config-that-does-not-exist.toml");
        assert!(matches!(SquallConfig::load(&missing), Err(SquallError::Io(_))));
        assert!(matches!(
            SquallConfig::discover(Some(missing.as_path())),
            Err(SquallError::Io(_))
        ));
    }

    #[test]
    fn test_default_paths_start_local() {
        assert_eq!(default_paths()[0], PathBuf::from(LOCAL_CONFIG));
    }
}
