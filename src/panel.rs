//! 控制面板 - 组合会话与设置的生命周期

use crate::config::Config;
use crate::engine::MinerEngine;
use crate::error::SessionError;
use crate::mining::MinerConnectionConfig;
use crate::session::{MinerSession, SessionOptions};
use crate::settings::{PersistedSettings, SettingsStore};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// 控制面板
///
/// 持有当前连接参数，启动时恢复、挂起时保存。
#[derive(Debug)]
pub struct ControlPanel {
    store: SettingsStore,
    session: MinerSession,
    settings: Mutex<MinerConnectionConfig>,
}

impl ControlPanel {
    pub fn new(store: SettingsStore, session: MinerSession) -> Self {
        Self {
            store,
            session,
            settings: Mutex::new(MinerConnectionConfig::default()),
        }
    }

    /// 根据主机配置创建控制面板
    pub fn from_config(config: &Config, engine: Arc<dyn MinerEngine>) -> Self {
        let store = SettingsStore::new(config.settings.path.clone());
        let session = MinerSession::new(engine, SessionOptions::from(&config.session));
        Self::new(store, session)
    }

    /// 恢复上次保存的设置，失败时使用默认值
    pub fn initialize(&self) -> MinerConnectionConfig {
        let restored = MinerConnectionConfig::from(&self.store.load());
        info!(
            target: "settings",
            trimming_mode = %restored.trimming_mode,
            has_server = restored.stratum_server_address.is_some(),
            "Settings initialized"
        );

        *self.lock_settings() = restored.clone();
        restored
    }

    /// 以给定参数启动
    ///
    /// 会话接受了请求（包括 prepare 失败）时参数成为当前设置；
    /// 因状态不对被拒绝时保持当前设置不变。
    pub fn start(&self, config: MinerConnectionConfig) -> Result<Uuid, SessionError> {
        let result = self.session.request_start(&config);
        if !matches!(result, Err(SessionError::InvalidState { .. })) {
            *self.lock_settings() = config;
        }
        result
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.session.request_stop()
    }

    /// 更新当前设置，不影响正在运行的引擎
    pub fn update_settings(&self, config: MinerConnectionConfig) {
        debug!(target: "settings", "Settings updated");
        *self.lock_settings() = config;
    }

    /// 保存当前设置，失败只记录日志
    pub fn suspend(&self) {
        let settings = PersistedSettings::from(&*self.lock_settings());
        self.store.save(&settings);
    }

    /// 当前设置
    pub fn settings(&self) -> MinerConnectionConfig {
        self.lock_settings().clone()
    }

    pub fn session(&self) -> &MinerSession {
        &self.session
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    fn lock_settings(&self) -> MutexGuard<'_, MinerConnectionConfig> {
        self.settings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
