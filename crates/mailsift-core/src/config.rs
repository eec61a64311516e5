//! MailSift configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MailSiftError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSiftConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

fn default_database_path() -> String { "~/.mailsift/mailsift.db".into() }

impl Default for MailSiftConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            gateway: GatewayConfig::default(),
            smtp: SmtpConfig::default(),
            security: SecurityConfig::default(),
            scheduler: SchedulerConfig::default(),
            digest: DigestConfig::default(),
        }
    }
}

impl MailSiftConfig {
    /// Load config from the default path (~/.mailsift/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailSiftError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MailSiftError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.security.encryption_key.is_empty() {
            return Err(MailSiftError::Config("security.encryption_key must be set".into()));
        }
        if self.smtp.port == 0 {
            return Err(MailSiftError::Config("smtp.port must be non-zero".into()));
        }
        if self.scheduler.max_concurrent_syncs == 0 {
            return Err(MailSiftError::Config(
                "scheduler.max_concurrent_syncs must be at least 1".into(),
            ));
        }
        if self.scheduler.tick_unit_secs == 0 {
            return Err(MailSiftError::Config("scheduler.tick_unit_secs must be non-zero".into()));
        }
        Ok(())
    }

    /// Database path with `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.database_path)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the MailSift home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mailsift")
    }
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Shared token expected in `X-Api-Token`. `None` disables the check.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_port() -> u16 { 8080 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_token: None,
        }
    }
}

/// Outbound mail settings for digest delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 { 587 }
fn default_from_name() -> String { "MailSift".into() }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_name: default_from_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Secret used to derive the mailbox password encryption key.
    #[serde(default)]
    pub encryption_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds per interval unit. Intervals are minutes in production.
    #[serde(default = "default_tick_unit")]
    pub tick_unit_secs: u64,
    /// Maximum pipeline runs in flight per tick.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_syncs: usize,
}

fn default_tick_unit() -> u64 { 60 }
fn default_max_concurrent() -> usize { 8 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_unit_secs: default_tick_unit(),
            max_concurrent_syncs: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_canvas")]
    pub width: u32,
    #[serde(default = "default_canvas")]
    pub height: u32,
}

fn default_output_dir() -> String { "~/.mailsift/clouds".into() }
fn default_max_keywords() -> usize { 60 }
fn default_canvas() -> u32 { 1024 }

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_keywords: default_max_keywords(),
            width: default_canvas(),
            height: default_canvas(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MailSiftConfig::default();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.scheduler.tick_unit_secs, 60);
        assert_eq!(config.scheduler.max_concurrent_syncs, 8);
        assert!(config.gateway.api_token.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            database_path = "/tmp/ms.db"

            [smtp]
            host = "smtp.example.com"
            port = 465
            username = "digest@example.com"
            password = "pw"

            [security]
            encryption_key = "0123456789abcdef"

            [scheduler]
            max_concurrent_syncs = 2
        "#;

        let config: MailSiftConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database_path, "/tmp/ms.db");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.smtp.from_name, "MailSift");
        assert_eq!(config.scheduler.max_concurrent_syncs, 2);
        assert_eq!(config.scheduler.tick_unit_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_key() {
        let config: MailSiftConfig = toml::from_str("").unwrap();
        assert!(matches!(config.validate(), Err(MailSiftError::Config(_))));
    }

    #[test]
    fn test_home_dir() {
        let home = MailSiftConfig::home_dir();
        assert!(home.to_string_lossy().contains("mailsift"));
    }
}
