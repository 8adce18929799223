/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和配置验证
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub mod host;
pub mod logging;
pub mod transport;

pub use host::{HostConfig, HostSettings};
pub use logging::{LogLevel, LoggingConfig};
pub use transport::TransportConfig;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接层主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 传输配置
    #[serde(default)]
    pub transport: TransportConfig,

    /// 宿主环境配置
    #[serde(default)]
    pub host: HostConfig,

    /// 查询配置
    #[serde(default)]
    pub query: QueryConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BRIDGE_DEBOUNCE_MS") {
            if let Ok(ms) = val.parse() {
                self.transport.debounce_ms = ms;
            }
        }
        if let Ok(val) = env::var("BRIDGE_RESPONDER_SCRIPT") {
            if !val.trim().is_empty() {
                self.transport.responder_script = val;
            }
        }
        if let Ok(val) = env::var("BRIDGE_TIMEZONE") {
            if !val.trim().is_empty() {
                self.host.timezone = val;
            }
        }
        if let Ok(val) = env::var("BRIDGE_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.transport.validate()?;
        self.host.validate()?;
        self.query.validate()?;
        Ok(())
    }

    /// 解析宿主设置
    pub fn host_settings(&self) -> ConfigResult<HostSettings> {
        HostSettings::from_config(&self.host)
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./bridge.toml
    /// 2. ./bridge.json
    /// 3. <用户配置目录>/webviewer_bridge/bridge.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("bridge.toml") {
            tracing::info!(target: "config", "Loaded config from bridge.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("bridge.json") {
            tracing::info!(target: "config", "Loaded config from bridge.json");
            return config;
        }

        if let Some(dir) = dirs::config_dir() {
            let config_path = dir.join("webviewer_bridge").join("bridge.toml");
            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 查询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 分页读取时每页的记录数
    pub page_size: u32,

    /// 查询未指定 limit 时的默认值
    pub default_limit: u32,
}

impl_default!(QueryConfig {
    page_size: 100,
    default_limit: 100,
});

impl QueryConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "Page size must be positive".to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(ConfigError::ValidationError(
                "Default limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
