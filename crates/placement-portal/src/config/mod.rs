use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::placement::identity::{AdminAccount, AdminTier};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub admins: AdminConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database_path = non_empty_var("APP_DATABASE_PATH").map(PathBuf::from);
        let upload_dir = non_empty_var("APP_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let admins = AdminConfig {
            tier1: admin_account(
                AdminTier::Tier1,
                "APP_TIER1_ADMIN_USER",
                "APP_TIER1_ADMIN_SECRET",
            )?,
            tier2: admin_account(
                AdminTier::Tier2,
                "APP_TIER2_ADMIN_USER",
                "APP_TIER2_ADMIN_SECRET",
            )?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            storage: StorageConfig {
                database_path,
                upload_dir,
            },
            admins,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn admin_account(
    tier: AdminTier,
    user_key: &str,
    secret_key: &str,
) -> Result<Option<AdminAccount>, ConfigError> {
    match (non_empty_var(user_key), non_empty_var(secret_key)) {
        (Some(username), Some(secret)) => Ok(Some(AdminAccount {
            tier,
            username,
            secret,
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::IncompleteAdminAccount { tier }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Where records and uploaded documents live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite database file; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
}

/// Administrator accounts for the two approval tiers.
#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    pub tier1: Option<AdminAccount>,
    pub tier2: Option<AdminAccount>,
}

impl AdminConfig {
    pub fn accounts(&self) -> Vec<AdminAccount> {
        self.tier1.iter().chain(self.tier2.iter()).cloned().collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{tier} admin account needs both a user and a secret")]
    IncompleteAdminAccount { tier: AdminTier },
}
