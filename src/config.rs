// Configuration File Support
//
// This module provides configuration file parsing for the ScanHub service.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory:
// ~/.config/scanhub/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// File upload configuration
    pub uploads: UploadConfig,

    /// External handler execution configuration
    pub execution: ExecutionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind on
    pub bind_addr: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// File upload configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory where uploaded files are staged
    pub dir: PathBuf,

    /// Upload size ceiling in megabytes
    pub max_upload_mb: u64,

    /// Allow-listed file extensions (lowercase, without the dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_upload_mb: 128,
            allowed_extensions: vec![
                "png".to_string(),
                "jpg".to_string(),
                "jpeg".to_string(),
                "gif".to_string(),
                "mp4".to_string(),
                "avi".to_string(),
                "mov".to_string(),
                "webm".to_string(),
                "tiff".to_string(),
            ],
        }
    }
}

impl UploadConfig {
    /// Upload size ceiling in bytes, for the HTTP body limit
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize) * 1024 * 1024
    }
}

/// External handler execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Root directory containing one subdirectory per external tool
    pub backend_root: PathBuf,

    /// Interpreter used to run external tool scripts
    pub interpreter: String,

    /// Wall-clock timeout per external handler invocation, in seconds
    pub timeout_secs: u64,

    /// Ceiling on captured stdout/stderr, in bytes
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            backend_root: PathBuf::from("backend"),
            interpreter: "python3".to_string(),
            timeout_secs: 120,
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        // Apply environment variable overrides
        let config = config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/scanhub/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "scanhub", "ScanHub") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("scanhub")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides (SCANHUB_* variables)
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SCANHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SCANHUB_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(port) = std::env::var("SCANHUB_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(dir) = std::env::var("SCANHUB_UPLOAD_DIR") {
            self.uploads.dir = PathBuf::from(dir);
        }
        if let Ok(size) = std::env::var("SCANHUB_MAX_UPLOAD_MB") {
            if let Ok(size) = size.parse() {
                self.uploads.max_upload_mb = size;
            }
        }
        if let Ok(root) = std::env::var("SCANHUB_BACKEND_ROOT") {
            self.execution.backend_root = PathBuf::from(root);
        }
        if let Ok(interpreter) = std::env::var("SCANHUB_INTERPRETER") {
            self.execution.interpreter = interpreter;
        }
        if let Ok(secs) = std::env::var("SCANHUB_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.execution.timeout_secs = secs;
            }
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', expected one of {:?}",
                self.logging.level,
                valid_levels
            );
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}', expected one of {:?}",
                self.logging.format,
                valid_formats
            );
        }

        if self.uploads.max_upload_mb == 0 {
            anyhow::bail!("uploads.max_upload_mb must be greater than zero");
        }

        if self.uploads.allowed_extensions.is_empty() {
            anyhow::bail!("uploads.allowed_extensions must not be empty");
        }

        if self.execution.timeout_secs == 0 {
            anyhow::bail!("execution.timeout_secs must be greater than zero");
        }

        if self.execution.interpreter.trim().is_empty() {
            anyhow::bail!("execution.interpreter must not be empty");
        }

        Ok(())
    }
}
