//! 修剪模式与矿池连接参数

pub mod arguments;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use arguments::{build_arguments, masked_arguments};

/// 修剪算法类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrimmingMode {
    #[default]
    MeanTrimming,
    SleanThenMeanTrimming,
    SleanTrimming,
    LeanTrimming,
}

impl TrimmingMode {
    /// 按选择列表顺序排列的全部模式
    pub const ALL: [TrimmingMode; 4] = [
        TrimmingMode::MeanTrimming,
        TrimmingMode::SleanThenMeanTrimming,
        TrimmingMode::SleanTrimming,
        TrimmingMode::LeanTrimming,
    ];

    /// 显示名称，同时也是设置文件中保存的值
    pub fn display_name(&self) -> &'static str {
        match self {
            TrimmingMode::MeanTrimming => "Mean Trimming",
            TrimmingMode::SleanThenMeanTrimming => "Slean Then Mean Trimming",
            TrimmingMode::SleanTrimming => "Slean Trimming",
            TrimmingMode::LeanTrimming => "Lean Trimming",
        }
    }

    /// 传给引擎的命令行参数
    pub fn flag(&self) -> &'static str {
        match self {
            TrimmingMode::MeanTrimming => "--mean_trimming",
            TrimmingMode::SleanThenMeanTrimming => "--slean_then_mean_trimming",
            TrimmingMode::SleanTrimming => "--slean_trimming",
            TrimmingMode::LeanTrimming => "--lean_trimming",
        }
    }
}

impl fmt::Display for TrimmingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown trimming type: {0}")]
pub struct ParseTrimmingModeError(pub String);

impl FromStr for TrimmingMode {
    type Err = ParseTrimmingModeError;

    /// 接受显示名称 ("Lean Trimming") 或参数写法 ("--lean_trimming", "lean-trimming")
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .trim_start_matches('-')
            .chars()
            .map(|c| match c {
                '_' | '-' => ' ',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        TrimmingMode::ALL
            .into_iter()
            .find(|mode| mode.display_name().to_ascii_lowercase() == normalized)
            .ok_or_else(|| ParseTrimmingModeError(value.to_string()))
    }
}

/// 矿池连接参数
///
/// 在请求启动时构造一次，交给会话后不再修改。空字符串视为未设置。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerConnectionConfig {
    pub stratum_server_address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub trimming_mode: TrimmingMode,
}

impl MinerConnectionConfig {
    pub fn new(trimming_mode: TrimmingMode) -> Self {
        Self {
            trimming_mode,
            ..Default::default()
        }
    }

    pub fn with_stratum_server_address(mut self, address: impl Into<String>) -> Self {
        self.stratum_server_address = non_empty(address.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = non_empty(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = non_empty(password.into());
        self
    }

    pub fn with_trimming_mode(mut self, trimming_mode: TrimmingMode) -> Self {
        self.trimming_mode = trimming_mode;
        self
    }
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimming_mode_default_is_first() {
        assert_eq!(TrimmingMode::default(), TrimmingMode::ALL[0]);
    }

    #[test]
    fn test_trimming_mode_parse() {
        for mode in TrimmingMode::ALL {
            assert_eq!(mode.display_name().parse::<TrimmingMode>(), Ok(mode));
            assert_eq!(mode.flag().parse::<TrimmingMode>(), Ok(mode));
        }

        assert_eq!("slean-then-mean-trimming".parse::<TrimmingMode>(), Ok(TrimmingMode::SleanThenMeanTrimming));
        assert_eq!(" lean trimming ".parse::<TrimmingMode>(), Ok(TrimmingMode::LeanTrimming));
        assert!("Cuckoo Trimming".parse::<TrimmingMode>().is_err());
        assert!("".parse::<TrimmingMode>().is_err());
    }

    #[test]
    fn test_empty_values_are_absent() {
        let config = MinerConnectionConfig::default()
            .with_stratum_server_address("")
            .with_username("alice")
            .with_password("");

        assert_eq!(config.stratum_server_address, None);
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password, None);
    }
}
