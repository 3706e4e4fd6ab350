//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT`: address to bind (default `127.0.0.1:3000`)
//! - `CORS_ORIGIN`: allowed browser origin (default `http://localhost:3000`)
//! - `CLIENT_IDLE_TIMEOUT_SECS`: idle browser tabs are forgotten after this (default 12h)
//! - `AUTH_BACKEND`: `cognito` (default) or `memory`
//! - `USER_POOL_REGION`, `USER_POOL_ID`, `CLIENT_ID`: Cognito pool (required for `cognito`)
//! - `CLIENT_SECRET`: app client secret, when the client has one
//! - `COGNITO_AUTO_CONFIRM`: confirm new accounts with the admin API (default false)
//! - `STORE_BACKEND`: `sqlite` (default) or `memory`
//! - `DATABASE_URL`: SQLite url (default `sqlite://todo.db`)
//! - `PROVISION_INDEXES`: create composite indexes at startup (default true)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthBackendConfig,
    pub store: StoreBackendConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub cors_origin: String,
    pub client_idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum AuthBackendConfig {
    Cognito(CognitoConfig),
    Memory,
}

#[derive(Clone)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auto_confirm: bool,
}

impl std::fmt::Debug for CognitoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoConfig")
            .field("region", &self.region)
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("auto_confirm", &self.auto_confirm)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum StoreBackendConfig {
    Sqlite { url: String, provision_indexes: bool },
    Memory { provision_indexes: bool },
}

impl StoreBackendConfig {
    pub fn provision_indexes(&self) -> bool {
        match self {
            StoreBackendConfig::Sqlite {
                provision_indexes, ..
            }
            | StoreBackendConfig::Memory { provision_indexes } => *provision_indexes,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let host: IpAddr = vars.parse_or("HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = vars.parse_or("PORT", 3000)?;
        let server = ServerConfig {
            addr: SocketAddr::new(host, port),
            cors_origin: vars
                .get("CORS_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            client_idle_timeout: Duration::from_secs(
                vars.parse_or("CLIENT_IDLE_TIMEOUT_SECS", 12 * 60 * 60)?,
            ),
        };

        let auth = match vars.get("AUTH_BACKEND").as_deref() {
            None | Some("cognito") => AuthBackendConfig::Cognito(CognitoConfig {
                region: vars.require("USER_POOL_REGION")?,
                user_pool_id: vars.require("USER_POOL_ID")?,
                client_id: vars.require("CLIENT_ID")?,
                client_secret: vars.get("CLIENT_SECRET"),
                auto_confirm: vars.parse_or("COGNITO_AUTO_CONFIRM", false)?,
            }),
            Some("memory") => AuthBackendConfig::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "AUTH_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let provision_indexes = vars.parse_or("PROVISION_INDEXES", true)?;
        let store = match vars.get("STORE_BACKEND").as_deref() {
            None | Some("sqlite") => StoreBackendConfig::Sqlite {
                url: vars
                    .get("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://todo.db".to_string()),
                provision_indexes,
            },
            Some("memory") => StoreBackendConfig::Memory { provision_indexes },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            server,
            auth,
            store,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }
}
