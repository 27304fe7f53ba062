use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

pub const ENV_HOST: &str = "SQL_DB_HOST";
pub const ENV_PORT: &str = "SQL_DB_PORT";
pub const ENV_NAME: &str = "SQL_DB_NAME";
pub const ENV_USER: &str = "SQL_DB_USER";
pub const ENV_PASSWORD: &str = "SQL_DB_PASSWORD";
pub const ENV_DRIVER: &str = "SQL_DB_DRIVER";
pub const ENV_ECHO: &str = "SQL_DB_ECHO";

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DRIVER: &str = "postgresql+asyncpg";

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

/// Session policy an external session factory should apply.
///
/// Sessions handed to a unit of work never flush or commit on their own and
/// keep loaded entities readable after commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    pub autocommit: bool,
    pub autoflush: bool,
    pub expire_on_commit: bool,
}

/// Connection parameters for a relational session factory.
///
/// The password is never printed by `Debug` and is not serialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFactoryConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Async driver identifier, used as the URL scheme.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Log every statement.
    #[serde(default)]
    pub echo: bool,
    #[serde(default)]
    pub options: SessionOptions,
}

impl SessionFactoryConfig {
    /// Create a configuration with the default port and driver.
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            driver: default_driver(),
            echo: false,
            options: SessionOptions::default(),
        }
    }

    /// Read the `SQL_DB_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// Host, database name, user and password are required; port, driver and
    /// echo fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| lookup(name).ok_or_else(|| ConfigError::missing(name));

        let host = required(ENV_HOST)?;
        let database = required(ENV_NAME)?;
        let user = required(ENV_USER)?;
        let password = required(ENV_PASSWORD)?;

        let port = match lookup(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::invalid(ENV_PORT, raw))?,
            None => DEFAULT_PORT,
        };
        let echo = match lookup(ENV_ECHO) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::invalid(ENV_ECHO, raw))?,
            None => false,
        };

        Ok(Self {
            port,
            driver: lookup(ENV_DRIVER).unwrap_or_else(default_driver),
            echo,
            ..Self::new(host, database, user, password)
        })
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the driver identifier.
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Set echo flag.
    pub fn echo(mut self, value: bool) -> Self {
        self.echo = value;
        self
    }

    /// Set the session policy.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// `{driver}://{user}:{password}@{host}:{port}/{database}`
    pub fn connection_url(&self) -> String {
        self.url_with_password(&self.password)
    }

    /// The connection URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        self.url_with_password("***")
    }

    fn url_with_password(&self, password: &str) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}",
            self.driver, self.user, password, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for SessionFactoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("driver", &self.driver)
            .field("echo", &self.echo)
            .field("options", &self.options)
            .finish()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
