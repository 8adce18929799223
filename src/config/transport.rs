/// 传输配置

use super::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认宿主响应脚本名
pub const DEFAULT_RESPONDER_SCRIPT: &str = "WEBVIEWER_BRIDGE_RESPONDER";

/// 默认防抖窗口（毫秒）
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 接收请求信封的宿主脚本名
    pub responder_script: String,

    /// 防抖窗口（毫秒），窗口内的请求合并为一次宿主调用
    pub debounce_ms: u64,
}

impl_default!(TransportConfig {
    responder_script: DEFAULT_RESPONDER_SCRIPT.to_string(),
    debounce_ms: DEFAULT_DEBOUNCE_MS,
});

impl TransportConfig {
    /// 防抖窗口
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.responder_script.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Responder script name must not be empty".to_string(),
            ));
        }
        if self.debounce_ms == 0 || self.debounce_ms > 10_000 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid debounce window: {}ms",
                self.debounce_ms
            )));
        }
        Ok(())
    }
}
