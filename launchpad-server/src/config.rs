//! Command-line and environment configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use launchpad_license::AdmissionMode;
use launchpad_store::{MySqlConfig, RetryPolicy};

/// Which store the server runs against.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Mysql,
    Sqlite,
    /// Process-local; every license is lost on exit.
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "launchpad-server")]
#[command(about = "License key issuance and machine activation service")]
#[command(version)]
pub struct Args {
    /// HTTP port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Store backend
    #[arg(long, env = "DB_BACKEND", value_enum, default_value_t = Backend::Mysql)]
    pub db_backend: Backend,

    /// MySQL host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// MySQL port
    #[arg(long, env = "DB_PORT", default_value_t = 3306)]
    pub db_port: u16,

    /// MySQL user
    #[arg(long, env = "DB_USER", default_value = "launchpad_user")]
    pub db_user: String,

    /// MySQL password
    #[arg(long, env = "DB_PASSWORD", default_value = "launchpad_password", hide_env_values = true)]
    pub db_password: String,

    /// MySQL database name
    #[arg(long, env = "DB_NAME", default_value = "launchpad_db")]
    pub db_name: String,

    /// Maximum pooled MySQL connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "launchpad.db")]
    pub db_path: PathBuf,

    /// Create missing MySQL tables on startup
    #[arg(long, env = "DB_MIGRATE")]
    pub db_migrate: bool,

    /// Attempts at reaching the store before giving up
    #[arg(long, env = "DB_CONNECT_ATTEMPTS", default_value_t = 30)]
    pub db_connect_attempts: u32,

    /// Seconds between store connection attempts
    #[arg(long, env = "DB_CONNECT_DELAY_SECS", default_value_t = 2)]
    pub db_connect_delay_secs: u64,

    /// Admission mode for validation
    #[arg(long, env = "ADMISSION_MODE", value_enum, default_value_t = AdmissionMode::Transactional)]
    pub admission_mode: AdmissionMode,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn mysql_config(&self) -> MySqlConfig {
        MySqlConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
            max_connections: self.db_max_connections,
            ..MySqlConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.db_connect_attempts,
            delay: Duration::from_secs(self.db_connect_delay_secs),
        }
    }

    pub fn admission(&self) -> AdmissionMode {
        self.admission_mode
    }

    /// Address the HTTP listener binds to (all interfaces).
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
