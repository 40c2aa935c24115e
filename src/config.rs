use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that overrides the active session encryption secret.
pub const SESSION_SECRET_ENV: &str = "OPNAME_SESSION_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub odoo: OdooConfig,

    pub erp_session: ErpSessionConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/opname.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Minutes of inactivity before a login cookie session expires.
    pub session_idle_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6780,
            cors_allowed_origins: vec![
                "http://localhost:6780".to_string(),
                "http://127.0.0.1:6780".to_string(),
            ],
            session_idle_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdooConfig {
    pub url: String,

    pub database: String,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    /// Maximum number of adjustment lines per posted inventory document.
    pub max_post_lines: usize,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            database: "odoo".to_string(),
            request_timeout_seconds: 30,
            max_post_lines: 500,
        }
    }
}

/// One named encryption secret. The key actually used by the cipher is the
/// SHA-256 digest of `secret`, so rotation means adding a new entry and
/// pointing `active_key` at it while records encrypted under older keys stay
/// decryptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionKeyConfig {
    pub id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErpSessionConfig {
    /// Hours a cached ERP session stays usable before the maintenance sweep
    /// retires it.
    pub expiration_hours: i64,

    /// Key id used to encrypt new session records.
    pub active_key: String,

    pub keys: Vec<SessionKeyConfig>,
}

impl Default for ErpSessionConfig {
    fn default() -> Self {
        Self {
            expiration_hours: 8,
            active_key: "v1".to_string(),
            keys: vec![SessionKeyConfig {
                id: "v1".to_string(),
                secret: "change-me".to_string(),
            }],
        }
    }
}

impl ErpSessionConfig {
    /// Apply the environment override to the active key's secret, if set.
    pub fn apply_env_override(&mut self) {
        if let Ok(secret) = std::env::var(SESSION_SECRET_ENV)
            && !secret.is_empty()
        {
            for key in &mut self.keys {
                if key.id == self.active_key {
                    key.secret = secret;
                    return;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            odoo: OdooConfig::default(),
            erp_session: ErpSessionConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.erp_session.apply_env_override();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.erp_session.apply_env_override();

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("opname").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".opname").join("config.toml"));
        }

        paths
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = PathBuf::from("config.toml");
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.odoo.url).context("Invalid Odoo URL")?;

        if self.odoo.database.is_empty() {
            anyhow::bail!("Odoo database name cannot be empty");
        }

        if self.odoo.max_post_lines == 0 {
            anyhow::bail!("odoo.max_post_lines must be positive");
        }

        if self.erp_session.expiration_hours <= 0 {
            anyhow::bail!("erp_session.expiration_hours must be positive");
        }

        if self.erp_session.keys.is_empty() {
            anyhow::bail!("at least one erp_session key must be configured");
        }

        if !self
            .erp_session
            .keys
            .iter()
            .any(|k| k.id == self.erp_session.active_key)
        {
            anyhow::bail!(
                "erp_session.active_key '{}' does not match any configured key",
                self.erp_session.active_key
            );
        }

        Ok(())
    }
}
