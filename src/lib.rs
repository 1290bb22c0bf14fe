//! Cuckatoo Panel - Cuckatoo 矿工控制面板核心
//!
//! 收集矿池连接参数和修剪算法选择，通过引擎边界启动/停止外部矿工，
//! 并把矿工输出保存在有界的滚动缓冲区中。
//!
//! ## 组成
//!
//! ### 会话
//! - 启动/停止状态机，同一时间最多一个运行中的引擎
//! - 引擎在专用后台线程上运行
//! - 状态和输出快照通过广播通道发布
//!
//! ### 引擎
//! - 外部矿工进程 ([`engine::ProcessEngine`])
//! - C 函数表驱动的原生库 ([`ffi::NativeEngine`])
//!
//! ### 设置
//! - 四个连接字段以 JSON 保存，启动时恢复

pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod mining;
pub mod panel;
pub mod scrollback;
pub mod session;
pub mod settings;

pub use config::Config;
pub use engine::{EngineOutput, MinerEngine, ProcessEngine};
pub use error::PanelError;
pub use mining::{MinerConnectionConfig, TrimmingMode};
pub use panel::ControlPanel;
pub use scrollback::{ScrollbackBuffer, Snapshot};
pub use session::{MinerSession, SessionEvent, SessionState};
pub use settings::{PersistedSettings, SettingsStore};

/// 程序版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 程序名称
pub const NAME: &str = "cuckatoo-panel";
