//! 设置持久化
//!
//! 设置文件是一个 UTF-8 JSON 对象，包含四个可选的字符串键：
//! `"Stratum Server"`、`"Username"`、`"Password"`、`"Trimming Type"`。
//! 读取和写入失败都不会中断调用方。

use crate::error::PersistenceError;
use crate::mining::{non_empty, MinerConnectionConfig, TrimmingMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认设置文件名
pub const DEFAULT_SETTINGS_FILE_NAME: &str = "settings";

/// 持久化的设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(rename = "Stratum Server", default, skip_serializing_if = "Option::is_none")]
    pub stratum_server: Option<String>,

    #[serde(rename = "Username", default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(rename = "Password", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(rename = "Trimming Type", default, skip_serializing_if = "Option::is_none")]
    pub trimming_type: Option<String>,
}

impl PersistedSettings {
    /// 解析保存的修剪类型，未知名称返回 `None`
    pub fn trimming_mode(&self) -> Option<TrimmingMode> {
        self.trimming_type
            .as_deref()
            .and_then(|name| name.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&MinerConnectionConfig> for PersistedSettings {
    /// 四个字段全部写入，未设置的字段保存为空字符串
    fn from(config: &MinerConnectionConfig) -> Self {
        Self {
            stratum_server: Some(config.stratum_server_address.clone().unwrap_or_default()),
            username: Some(config.username.clone().unwrap_or_default()),
            password: Some(config.password.clone().unwrap_or_default()),
            trimming_type: Some(config.trimming_mode.display_name().to_string()),
        }
    }
}

impl From<&PersistedSettings> for MinerConnectionConfig {
    fn from(settings: &PersistedSettings) -> Self {
        Self {
            stratum_server_address: settings.stratum_server.clone().and_then(non_empty),
            username: settings.username.clone().and_then(non_empty),
            password: settings.password.clone().and_then(non_empty),
            trimming_mode: settings.trimming_mode().unwrap_or_default(),
        }
    }
}

/// 设置存储
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置
    ///
    /// 文件不存在返回 `Ok(None)`，读取失败或内容损坏返回错误。
    pub fn try_load(&self) -> Result<Option<PersistedSettings>, PersistenceError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    error,
                })
            }
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|error| PersistenceError::Corrupt {
                path: self.path.clone(),
                error,
            })
    }

    /// 读取设置，任何失败都退化为空设置
    pub fn load(&self) -> PersistedSettings {
        match self.try_load() {
            Ok(Some(settings)) => {
                info!(target: "settings", "Restored settings from {}", self.path.display());
                settings
            }
            Ok(None) => {
                debug!(target: "settings", "No prior settings at {}", self.path.display());
                PersistedSettings::default()
            }
            Err(e) => {
                crate::settings_warn!("Ignoring unreadable settings: {}", e);
                PersistedSettings::default()
            }
        }
    }

    /// 写入设置，先写临时文件再替换目标文件
    pub fn try_save(&self, settings: &PersistedSettings) -> Result<(), PersistenceError> {
        let content =
            serde_json::to_vec(settings).map_err(|error| PersistenceError::Serialize { error })?;

        let write_error = |error: std::io::Error| PersistenceError::Write {
            path: self.path.clone(),
            error,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, content).map_err(write_error)?;

        if let Err(error) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_error(error));
        }

        Ok(())
    }

    /// 写入设置，失败只记录日志
    pub fn save(&self, settings: &PersistedSettings) {
        match self.try_save(settings) {
            Ok(()) => debug!(target: "settings", "Saved settings to {}", self.path.display()),
            Err(e) => crate::settings_warn!("Failed to save settings: {}", e),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| DEFAULT_SETTINGS_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_FILE_NAME)
    }
}
