//! Server configuration.
//!
//! Read from a TOML file, from the environment, or both (environment wins):
//!
//! ```toml
//! addr = "127.0.0.1:8080"
//! environment = "development"
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `ROUTEBIND_ADDR` | `addr` |
//! | `APP_ENV` | `environment` |

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

const ADDR_VAR: &str = "ROUTEBIND_ADDR";
const ENV_VAR: &str = "APP_ENV";

/// Deployment environment. Decides how much a `500` reveals.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Fault responses carry the panic message.
    Development,
    /// Fault responses carry a generic message only.
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production"  => Ok(Self::Production),
            other => Err(ConfigError::InvalidValue { key: ENV_VAR, value: other.to_owned() }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production  => "production",
        })
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            environment: Environment::Production,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a TOML file, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)?.with_env_overrides()
    }

    /// Defaults, then environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(addr) = lookup(ADDR_VAR).filter(|v| !v.is_empty()) {
            self.addr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: ADDR_VAR, value: addr })?;
        }
        if let Some(env) = lookup(ENV_VAR).filter(|v| !v.is_empty()) {
            self.environment = env.parse()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn parses_toml() {
        let config = ServerConfig::from_toml_str(
            r#"
            addr = "127.0.0.1:8080"
            environment = "development"
            "#,
        )
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(ServerConfig::from_toml_str("port = 1"), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn overrides_win() {
        let vars = HashMap::from([(ADDR_VAR, "10.0.0.1:9000"), (ENV_VAR, "development")]);
        let config = ServerConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| (*v).to_owned()))
            .unwrap();
        assert_eq!(config.addr, "10.0.0.1:9000".parse().unwrap());
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let config = ServerConfig::default().with_overrides(|_| Some(String::new())).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn config_errors_convert_into_crate_error() {
        fn load() -> Result<ServerConfig, crate::Error> {
            Ok(ServerConfig::from_toml_str("addr = 1")?)
        }
        assert!(matches!(load(), Err(crate::Error::Config(ConfigError::Toml(_)))));
    }

    #[test]
    fn invalid_overrides_fail() {
        let err = ServerConfig::default()
            .with_overrides(|k| (k == ENV_VAR).then(|| "staging".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_VAR, .. }));

        let err = ServerConfig::default()
            .with_overrides(|k| (k == ADDR_VAR).then(|| "nowhere".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ADDR_VAR, .. }));
    }
}
