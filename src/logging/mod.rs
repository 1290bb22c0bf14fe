//! 日志系统

pub mod formatter;

use crate::error::PanelError;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: String,
    /// 日志文件路径
    pub file_path: Option<String>,
    /// 是否启用彩色输出
    pub colored: bool,
    /// 是否显示线程ID
    pub show_thread_id: bool,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否启用美化输出
    pub pretty: bool,
    /// 日志轮转配置
    pub rotation: LogRotation,
}

/// 日志轮转配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// 不轮转
    Never,
    /// 每小时轮转
    Hourly,
    /// 每天轮转
    Daily,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            colored: true,
            show_thread_id: false,
            show_target: false,
            pretty: true,
            rotation: LogRotation::Daily,
        }
    }
}

/// 解析日志级别，未知级别按 info 处理
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// 初始化日志系统
///
/// 写文件时返回的 guard 必须保留到程序退出，否则缓冲的日志会丢失。
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, PanelError> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(parse_level(&config.level).into());

    // 控制台输出层，日志走 stderr，stdout 留给矿工输出
    let console_layer = if config.pretty {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.colored)
            .event_format(formatter::PanelFormatter::new(config.colored))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.colored)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_id)
            .boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    // 文件输出层
    let Some(file_path) = config.file_path else {
        registry
            .try_init()
            .map_err(|e| PanelError::System(format!("Failed to initialize logging: {}", e)))?;
        return Ok(None);
    };

    let file_path = Path::new(&file_path);
    let directory = file_path.parent().unwrap_or(Path::new("."));
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("cuckatoo-panel.log");

    let (non_blocking_appender, guard) = match config.rotation {
        LogRotation::Never => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)
                .map_err(|e| PanelError::System(format!("Failed to open log file: {}", e)))?;

            tracing_appender::non_blocking(file)
        }
        LogRotation::Hourly => tracing_appender::non_blocking(rolling::hourly(directory, file_name)),
        LogRotation::Daily => tracing_appender::non_blocking(rolling::daily(directory, file_name)),
    };

    let file_layer = fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .json();

    registry
        .with(file_layer)
        .try_init()
        .map_err(|e| PanelError::System(format!("Failed to initialize logging: {}", e)))?;

    Ok(Some(guard))
}

/// 会话日志宏
#[macro_export]
macro_rules! session_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "session", $($arg)*)
    };
}

#[macro_export]
macro_rules! session_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "session", $($arg)*)
    };
}

#[macro_export]
macro_rules! session_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "session", $($arg)*)
    };
}

/// 引擎日志宏
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "engine", $($arg)*)
    };
}

#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "engine", $($arg)*)
    };
}

#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "engine", $($arg)*)
    };
}

/// 设置日志宏
#[macro_export]
macro_rules! settings_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "settings", $($arg)*)
    };
}
