//! Configuration for relational session factories.
//!
//! Connection parameters come from `SQL_DB_*` environment variables, or any
//! other lookup, and fail fast when a required one is missing:
//!
//! | Variable          | Required | Default              |
//! |-------------------|----------|----------------------|
//! | `SQL_DB_HOST`     | yes      |                      |
//! | `SQL_DB_PORT`     | no       | `5432`               |
//! | `SQL_DB_NAME`     | yes      |                      |
//! | `SQL_DB_USER`     | yes      |                      |
//! | `SQL_DB_PASSWORD` | yes      |                      |
//! | `SQL_DB_DRIVER`   | no       | `postgresql+asyncpg` |
//! | `SQL_DB_ECHO`     | no       | `false`              |

mod error;
mod session_factory;

pub use error::{ConfigError, ConfigResult};
pub use session_factory::{
    SessionFactoryConfig, SessionOptions, DEFAULT_DRIVER, DEFAULT_PORT, ENV_DRIVER, ENV_ECHO,
    ENV_HOST, ENV_NAME, ENV_PASSWORD, ENV_PORT, ENV_USER,
};
