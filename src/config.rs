use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

/// Command line options for the server.
#[derive(Parser, Debug, Default)]
pub struct Cli {
    /// Override bind address (host:port).
    #[arg(long)]
    pub bind: Option<String>,
    /// Override server port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Path to the SQLite database file.
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Runtime configuration for the server resolved from file, env and CLI.
#[derive(Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind: String,
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// Secret used to sign session cookies.
    pub session_secret: Option<String>,
    /// Lifetime of issued sessions in hours.
    pub session_expire_hours: i64,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("database_path", &self.database_path)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<redacted>"))
            .field("session_expire_hours", &self.session_expire_hours)
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    session: FileSession,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize)]
struct FileServer {
    #[serde(default = "default_port")]
    port: u16,
}

#[derive(Deserialize)]
struct FileDatabase {
    #[serde(default = "default_database")]
    path: PathBuf,
}

#[derive(Deserialize)]
struct FileSession {
    #[serde(default)]
    secret: Option<String>,
    #[serde(default = "default_expire_hours")]
    expire_hours: i64,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_port() -> u16 {
    8787
}

fn default_database() -> PathBuf {
    PathBuf::from("warbler.db")
}

fn default_expire_hours() -> i64 {
    24 * 14
}

fn default_logging() -> bool {
    true
}

impl Default for FileServer {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for FileDatabase {
    fn default() -> Self {
        Self {
            path: default_database(),
        }
    }
}

impl Default for FileSession {
    fn default() -> Self {
        Self {
            secret: None,
            expire_hours: default_expire_hours(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        // built-in defaults
        let mut port = default_port();
        let mut database_path = default_database();
        let mut session_secret: Option<String> = None;
        let mut expire_hours = default_expire_hours();
        let mut logging = default_logging();

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("WARBLER_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/warbler.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            port = file_cfg.server.port;
            database_path = file_cfg.database.path;
            session_secret = file_cfg.session.secret;
            expire_hours = file_cfg.session.expire_hours;
            logging = file_cfg.logging.enabled;
        }

        // environment overrides
        if let Ok(p) = std::env::var("WARBLER_PORT") {
            if let Ok(p) = p.parse::<u16>() {
                port = p;
            }
        }
        if let Ok(db) = std::env::var("WARBLER_DB") {
            database_path = PathBuf::from(db);
        }
        if let Ok(secret) = std::env::var("WARBLER_SECRET") {
            session_secret = Some(secret);
        }
        if let Ok(l) = std::env::var("WARBLER_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }

        // CLI overrides
        if let Some(p) = cli.port {
            port = p;
        }
        if let Some(db) = &cli.database {
            database_path = db.clone();
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        // validate port range
        if !(1024..=65535).contains(&port) {
            anyhow::bail!("invalid_port");
        }
        if expire_hours <= 0 {
            anyhow::bail!("invalid_expire_hours");
        }

        // bind address precedence for host override
        let bind = if let Some(b) = &cli.bind {
            b.clone()
        } else if let Ok(b) = std::env::var("BIND") {
            b
        } else {
            format!("127.0.0.1:{}", port)
        };

        Ok(Self {
            bind,
            database_path,
            session_secret,
            session_expire_hours: expire_hours,
            logging_enabled: logging,
        })
    }
}
