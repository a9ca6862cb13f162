//! Global configuration parsing and validation.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// External interpreter invoked once per execution.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InterpreterConfig {
    /// Interpreter binary (e.g., `python3`).
    #[serde(default = "default_program")]
    pub program: String,
    /// Extra arguments passed before the script path.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
        }
    }
}

fn default_program() -> String {
    "python3".into()
}

/// Execution deadline and session retention settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Wall-clock limit for a single execution.
    #[serde(default = "default_execution_ms")]
    pub execution_ms: u64,
    /// Idle period after which a session is reclaimed.
    #[serde(default = "default_session_idle_seconds")]
    pub session_idle_seconds: u64,
    /// Cadence of the idle-reclamation sweep.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            execution_ms: default_execution_ms(),
            session_idle_seconds: default_session_idle_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

fn default_execution_ms() -> u64 {
    2000
}

fn default_session_idle_seconds() -> u64 {
    300
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    8080
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Address the HTTP boundary binds to.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// HTTP port; `0` lets the OS pick one.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Directory under which per-session storage areas are created.
    /// Defaults to `<tmp>/python-sessions`.
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    /// Interpreter invocation settings.
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    /// Deadline and retention settings.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            storage_root: None,
            interpreter: InterpreterConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address for the HTTP listener.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `http_host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .http_host
            .parse()
            .map_err(|err| AppError::Config(format!("http_host invalid: {err}")))?;
        Ok(SocketAddr::new(ip, self.http_port))
    }

    /// Resolved directory holding per-session storage areas.
    #[must_use]
    pub fn storage_root(&self) -> PathBuf {
        self.storage_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("python-sessions"))
    }

    /// Per-call execution deadline.
    #[must_use]
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.execution_ms)
    }

    /// Idle retention window before a session is reclaimed.
    #[must_use]
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.timeouts.session_idle_seconds)
    }

    /// Interval between idle-reclamation sweeps.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.timeouts.sweep_interval_seconds)
    }

    /// Check invariants the rest of the server relies on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.execution_ms == 0 {
            return Err(AppError::Config(
                "timeouts.execution_ms must be greater than zero".into(),
            ));
        }

        if self.timeouts.session_idle_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.session_idle_seconds must be greater than zero".into(),
            ));
        }

        if self.timeouts.sweep_interval_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.sweep_interval_seconds must be greater than zero".into(),
            ));
        }

        if self.interpreter.program.trim().is_empty() {
            return Err(AppError::Config(
                "interpreter.program must not be empty".into(),
            ));
        }

        self.bind_addr()?;
        Ok(())
    }
}
