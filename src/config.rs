use clap::ValueEnum;
use serde::Deserialize;

use crate::driver::ConnectTarget;
use crate::error::SimpleDbError;
use crate::types::DatabaseType;

/// Session timezone appended to every connection target unless overridden.
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

const ENV_PREFIX: &str = "SIMPLE_DB_";

/// Construction parameters for a [`crate::SimpleDb`].
///
/// Deserializes from any serde format; `timezone` and `dev_mode` are optional:
/// ```rust
/// # #[cfg(feature = "sqlite")] {
/// use simple_db::prelude::*;
///
/// let cfg: DbConfig = serde_json::from_str(
///     r#"{"backend":"sqlite","host":":memory:","user":"","password":"","db_name":"app"}"#,
/// ).unwrap();
/// assert_eq!(cfg.timezone, "Asia/Seoul");
/// # }
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    pub backend: DatabaseType,
    pub host: String,
    pub user: String,
    pub password: String,
    pub db_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("backend", &self.backend)
            .field("target", &self.target())
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

impl DbConfig {
    #[must_use]
    pub fn new(
        backend: DatabaseType,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            host: host.into(),
            user: user.into(),
            password: password.into(),
            db_name: db_name.into(),
            timezone: default_timezone(),
            dev_mode: false,
        }
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    #[must_use]
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// The driver-facing view of this configuration.
    #[must_use]
    pub fn target(&self) -> ConnectTarget {
        ConnectTarget {
            host: self.host.clone(),
            db_name: self.db_name.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timezone: self.timezone.clone(),
        }
    }

    /// Load from `SIMPLE_DB_*` environment variables.
    ///
    /// `SIMPLE_DB_BACKEND`, `SIMPLE_DB_HOST` and `SIMPLE_DB_NAME` are required.
    /// `SIMPLE_DB_USER` and `SIMPLE_DB_PASSWORD` default to empty,
    /// `SIMPLE_DB_TIMEZONE` to [`DEFAULT_TIMEZONE`], `SIMPLE_DB_DEV_MODE` to off.
    ///
    /// # Errors
    /// Returns `SimpleDbError::ConfigError` for missing keys or unparsable values.
    pub fn from_env() -> Result<Self, SimpleDbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] with a custom key lookup.
    ///
    /// # Errors
    /// Returns `SimpleDbError::ConfigError` for missing keys or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SimpleDbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let required = |name: &str| {
            get(name).ok_or_else(|| {
                SimpleDbError::ConfigError(format!("{ENV_PREFIX}{name} is required"))
            })
        };

        let backend_name = required("BACKEND")?;
        let backend = DatabaseType::from_str(&backend_name, true).map_err(|e| {
            SimpleDbError::ConfigError(format!("unknown backend `{backend_name}`: {e}"))
        })?;
        let dev_mode = match get("DEV_MODE") {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                SimpleDbError::ConfigError(format!("{ENV_PREFIX}DEV_MODE: invalid flag `{raw}`"))
            })?,
        };

        Ok(Self {
            backend,
            host: required("HOST")?,
            user: get("USER").unwrap_or_default(),
            password: get("PASSWORD").unwrap_or_default(),
            db_name: required("NAME")?,
            timezone: get("TIMEZONE").unwrap_or_else(default_timezone),
            dev_mode,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
