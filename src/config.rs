use crate::engine::StopSignal;
use crate::error::ConfigError;
use crate::mining::{MinerConnectionConfig, TrimmingMode};
use crate::scrollback::DEFAULT_MAX_LINES;
use crate::session::{DEFAULT_EVENT_CAPACITY, DEFAULT_PROCESS_NAME};
use crate::settings::DEFAULT_SETTINGS_FILE_NAME;
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "cuckatoo-panel.toml")]
    pub config: String,

    /// Stratum server address (overrides the saved setting)
    #[arg(short = 'a', long)]
    pub stratum_server: Option<String>,

    /// Stratum server username (overrides the saved setting)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Stratum server password (overrides the saved setting)
    #[arg(short = 'w', long)]
    pub password: Option<String>,

    /// Trimming type, e.g. "Lean Trimming" or "lean_trimming"
    #[arg(short, long)]
    pub trimming_type: Option<TrimmingMode>,

    /// Log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Do not write settings on exit
    #[arg(long)]
    pub no_save: bool,
}

impl Args {
    /// 命令行参数覆盖已恢复的连接参数
    pub fn apply(&self, restored: MinerConnectionConfig) -> MinerConnectionConfig {
        let mut config = restored;
        if let Some(address) = &self.stratum_server {
            config = config.with_stratum_server_address(address.as_str());
        }
        if let Some(username) = &self.username {
            config = config.with_username(username.as_str());
        }
        if let Some(password) = &self.password {
            config = config.with_password(password.as_str());
        }
        if let Some(mode) = self.trimming_type {
            config = config.with_trimming_mode(mode);
        }
        config
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub session: SessionConfig,
    pub settings: SettingsConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 引擎参数中的进程标识
    pub process_name: String,
    /// 滚动缓冲区最大行数
    pub max_lines: usize,
    /// 事件通道容量
    pub event_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 矿工程序路径
    pub program: PathBuf,
    pub stop_signal: StopSignal,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            max_lines: DEFAULT_MAX_LINES,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SETTINGS_FILE_NAME),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("cuckatoo_reference_miner"),
            stop_signal: StopSignal::Sigint,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string(),
            }
            .into());
        }

        let config_content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ConfigError::ParseError { error: e.to_string() })
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// 配置文件不存在时使用默认配置
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let config_content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, config_content)
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_lines == 0 {
            return Err(ConfigError::ValidationError {
                field: "session.max_lines".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.session.event_capacity == 0 {
            return Err(ConfigError::ValidationError {
                field: "session.event_capacity".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.session.process_name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "session.process_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.settings.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "settings.path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.engine.program.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "engine.program".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "general.log_level".to_string(),
                reason: format!("unknown level '{}'", self.general.log_level),
            });
        }

        Ok(())
    }

    /// 检查配置是否有效
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
