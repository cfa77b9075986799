use serde::Deserialize;

use std::{convert::TryFrom, fmt, result, str::FromStr};

use crate::{err_at, Error, Result};

/// Concurrency control used by an [Index][crate::rbt::Index].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Strategy {
    /// Every operation, read or write, holds one exclusive lock.
    Global,
    /// Readers share a global latch, writers hold it exclusively.
    ReadWrite,
    /// Readers latch nodes hand-over-hand, writers are serialized by a
    /// writer permit and latch only the nodes they mutate.
    Coupled,
}

impl Default for Strategy {
    fn default() -> Strategy {
        Strategy::Global
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Strategy::Global => write!(f, "global"),
            Strategy::ReadWrite => write!(f, "rw"),
            Strategy::Coupled => write!(f, "coupled"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Strategy> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Strategy::Global),
            "rw" => Ok(Strategy::ReadWrite),
            "coupled" => Ok(Strategy::Coupled),
            _ => err_at!(InvalidInput, msg: "invalid strategy {:?}", s),
        }
    }
}

/// Configuration for [Index][crate::rbt::Index].
#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the index, used in logs and stats.
    ///
    /// Default: "rbt"
    pub name: String,
    /// Concurrency control.
    ///
    /// Default: [Strategy::Global]
    pub strategy: Strategy,
    /// Waiting threads spin when true, yield to the OS otherwise. Applies
    /// to every latch in the index.
    ///
    /// Default: false
    pub spin: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            name: "rbt".to_string(),
            strategy: Strategy::default(),
            spin: false,
        }
    }
}

impl Config {
    /// Create a new configuration value, use the `set_*` methods to add more
    /// configuration.
    pub fn new(name: &str) -> Config {
        Config {
            name: name.to_string(),
            ..Config::default()
        }
    }

    pub fn set_strategy(&mut self, strategy: Strategy) -> &mut Self {
        self.strategy = strategy;
        self
    }

    pub fn set_spin(&mut self, spin: bool) -> &mut Self {
        self.spin = spin;
        self
    }

    /// Parse configuration from toml text, missing keys take their default.
    ///
    /// ```toml
    /// name = "sessions"
    /// strategy = "coupled"
    /// spin = false
    /// ```
    pub fn from_toml(text: &str) -> Result<Config> {
        let cfg: TomlConfig = err_at!(InvalidInput, toml::from_str(text))?;
        Config::try_from(cfg)
    }
}

#[derive(Clone, Deserialize)]
pub struct TomlConfig {
    name: Option<String>,
    strategy: Option<String>,
    spin: Option<bool>,
}

impl TryFrom<TomlConfig> for Config {
    type Error = Error;

    fn try_from(cfg: TomlConfig) -> Result<Config> {
        let def = Config::default();
        let strategy = match cfg.strategy {
            Some(s) => s.parse()?,
            None => def.strategy,
        };
        Ok(Config {
            name: cfg.name.unwrap_or(def.name),
            strategy,
            spin: cfg.spin.unwrap_or(def.spin),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
