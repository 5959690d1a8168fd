// SPDX-License-Identifier: MIT

//! Ambient configuration (§6). Consumed by the application shell via
//! `clap`; the library itself only ever sees an already-built [`Config`] or
//! [`StoreConfig`] — loading profile files / `.env` is the shell's job.

use clap::Args;

/// Top-level configuration recognized by `jobstream`, each field
/// overridable by environment variable per §6's table.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Backing store host.
    #[arg(long, default_value = "127.0.0.1", env = "STORE_HOST")]
    pub store_host: String,

    /// Backing store port.
    #[arg(long, default_value_t = 6379, env = "STORE_PORT")]
    pub store_port: u16,

    /// Logical namespace index.
    #[arg(long, default_value_t = 0, env = "STORE_DB")]
    pub store_db: i64,

    /// Auth username, if the store requires one.
    #[arg(long, env = "STORE_USER")]
    pub store_user: Option<String>,

    /// Auth password, if the store requires one.
    #[arg(long, env = "STORE_PASSWORD")]
    pub store_password: Option<String>,

    /// Log file path (consumed by the shell's file sink, not the library).
    #[arg(long, default_value = "app.log", env = "LOG_FILE")]
    pub log_file: String,

    /// Overall log level floor.
    #[arg(long, default_value = "debug", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Console sink level.
    #[arg(long, default_value = "debug", env = "LOG_LEVEL_CONSOLE")]
    pub log_level_console: String,

    /// File sink level.
    #[arg(long, default_value = "info", env = "LOG_LEVEL_FILE")]
    pub log_level_file: String,
}

impl Config {
    /// The `StoreConfig` this configuration describes.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            host: self.store_host.clone(),
            port: self.store_port,
            db: self.store_db,
            user: self.store_user.clone(),
            password: self.store_password.clone(),
        }
    }
}

/// The subset of [`Config`] that identifies a distinct store connection.
/// [`crate::SharedStore::connect`] compares two of these field-by-field to
/// decide whether a reconnect is needed (§4.2).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl StoreConfig {
    pub fn redis_url(&self) -> String {
        match (&self.user, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() => {
                format!("redis://{u}:{p}@{}:{}/{}", self.host, self.port, self.db)
            }
            (None, Some(p)) | (Some(_), Some(p)) => {
                format!("redis://:{p}@{}:{}/{}", self.host, self.port, self.db)
            }
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    fn normalized(opt: &Option<String>) -> Option<&str> {
        opt.as_deref().filter(|s| !s.is_empty())
    }
}

impl PartialEq for StoreConfig {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.db == other.db
            && Self::normalized(&self.user) == Self::normalized(&other.user)
            && Self::normalized(&self.password) == Self::normalized(&other.password)
    }
}

impl Eq for StoreConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_and_empty_credentials_are_equivalent() {
        let a = StoreConfig { host: "h".into(), port: 1, db: 0, user: None, password: None };
        let b = StoreConfig {
            host: "h".into(),
            port: 1,
            db: 0,
            user: Some(String::new()),
            password: Some(String::new()),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn different_host_is_not_equal() {
        let a = StoreConfig { host: "h1".into(), port: 1, db: 0, user: None, password: None };
        let b = StoreConfig { host: "h2".into(), port: 1, db: 0, user: None, password: None };
        assert_ne!(a, b);
    }
}
