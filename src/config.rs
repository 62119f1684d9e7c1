use sqlx::postgres::PgConnectOptions;
use std::net::SocketAddr;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/webhook_db";
const DEFAULT_DATABASE_NAME: &str = "webhook_db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value `{value}`")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres(DatabaseTarget),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Url(String),
    Credentials {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

impl DatabaseTarget {
    /// Builds driver options. A URL that fails to parse is returned as an
    /// error so the caller can start disconnected instead of crashing.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match self {
            Self::Url(url) => url.parse(),
            Self::Credentials {
                host,
                port,
                user,
                password,
                database,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(database)),
        }
    }

    /// Target description safe for logs.
    pub fn redacted(&self) -> String {
        match self {
            Self::Url(url) => match url.rsplit_once('@') {
                Some((_, rest)) => format!("postgres://***@{rest}"),
                None => url.clone(),
            },
            Self::Credentials {
                host,
                port,
                database,
                ..
            } => format!("{host}:{port}/{database}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let store = match get("EVENT_STORE").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres(database_target(&get)?),
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "EVENT_STORE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self { bind_addr, store })
    }
}

fn database_target(get: &impl Fn(&str) -> Option<String>) -> Result<DatabaseTarget, ConfigError> {
    if let (Some(user), Some(password), Some(host)) =
        (get("DB_USER"), get("DB_PASSWORD"), get("DB_HOST"))
    {
        let port = match get("DB_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "DB_PORT",
                value: raw,
            })?,
            None => 5432,
        };
        return Ok(DatabaseTarget::Credentials {
            host,
            port,
            user,
            password,
            database: get("DB_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
        });
    }

    Ok(DatabaseTarget::Url(
        get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
    ))
}
