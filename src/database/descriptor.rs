//! Parsed connection descriptor.

use crate::error::{SquallError, SquallResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where and how to connect: scheme, endpoint, credentials and an open map of
/// backend-specific options.
///
/// ```
/// use squall::database::ConnectionDescriptor;
///
/// let descriptor: ConnectionDescriptor = toml::from_str(
///     r#"
///     scheme = "mysql"
///     host = "db.internal"
///     username = "app"
///     database = "orders"
///
///     [options]
///     charset = "latin1"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(descriptor.option("charset"), Some("latin1"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl ConnectionDescriptor {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            ..Self::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Parse an option, failing with a configuration error when it is malformed.
    pub fn parse_option<T: FromStr>(&self, key: &str) -> SquallResult<Option<T>> {
        self.option(key)
            .map(|raw| {
                raw.parse().map_err(|_| {
                    SquallError::Config(format!("invalid value '{raw}' for option '{key}'"))
                })
            })
            .transpose()
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_option() {
        let descriptor = ConnectionDescriptor::new("sqlite").with_option("timeout", "2.5");
        assert_eq!(descriptor.parse_option::<f64>("timeout").unwrap(), Some(2.5));
        assert_eq!(descriptor.parse_option::<f64>("missing").unwrap(), None);

        let broken = descriptor.with_option("timeout", "soon");
        assert!(matches!(
            broken.parse_option::<f64>("timeout"),
            Err(SquallError::Config(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let descriptor = ConnectionDescriptor::new("postgres").password("hunter2");
        let shown = format!("{descriptor:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("***"));
    }
}
