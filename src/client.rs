//! 客户端
//!
//! [`Client`] 持有桥接、配置、解析后的宿主设置和元数据缓存，是应用代码
//! 的入口。克隆共享同一份状态。

use crate::bridge::protocol::RequestPayload;
use crate::bridge::{Bridge, Host};
use crate::config::{BridgeConfig, HostSettings};
use crate::core::error::BridgeResult;
use crate::layout::{ApiEnvelope, DatabaseMetadata, Layout, MetadataCache};
use crate::records::Script;
use std::sync::Arc;

#[derive(Debug)]
struct ClientInner {
    bridge: Bridge,
    config: BridgeConfig,
    settings: HostSettings,
    metadata: MetadataCache,
}

/// 桥接客户端
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// 使用给定配置创建客户端
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn new<H>(config: BridgeConfig, host: H) -> BridgeResult<Self>
    where
        H: Host + 'static,
    {
        config.validate()?;
        let bridge = Bridge::new(&config.transport, host)?;
        Self::with_bridge(bridge, config)
    }

    /// 从配置文件/环境变量加载配置后创建客户端
    pub fn connect<H>(host: H) -> BridgeResult<Self>
    where
        H: Host + 'static,
    {
        let mut config = BridgeConfig::load_or_default();
        config.apply_env_overrides();
        Self::new(config, host)
    }

    /// 使用已有桥接创建客户端
    pub fn with_bridge(bridge: Bridge, config: BridgeConfig) -> BridgeResult<Self> {
        let settings = config.host_settings()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                bridge,
                config,
                settings,
                metadata: MetadataCache::new(),
            }),
        })
    }

    /// 设置授权令牌
    pub fn set_key(&self, key: &str) {
        self.inner.bridge.set_key(key);
    }

    pub fn layout(&self, name: impl Into<String>) -> Layout {
        Layout::new(self.clone(), name)
    }

    /// 构造脚本引用
    pub fn script(&self, name: impl Into<String>, parameter: Option<&str>) -> Script {
        let script = Script::new(name);
        match parameter {
            Some(parameter) => script.with_parameter(parameter),
            None => script,
        }
    }

    /// 数据库元数据（不缓存）
    pub async fn database_metadata(&self) -> BridgeResult<DatabaseMetadata> {
        let envelope: ApiEnvelope<DatabaseMetadata> = self
            .inner
            .bridge
            .issue(RequestPayload::GetDbMetadata)
            .wait_as()
            .await?;
        envelope.into_result()
    }

    /// 全部布局名，文件夹被展开
    pub async fn list_layouts(&self) -> BridgeResult<Vec<String>> {
        Ok(self.database_metadata().await?.layout_names())
    }

    /// 清除所有缓存的布局元数据
    pub fn clear_metadata(&self) {
        self.inner.metadata.clear();
    }

    pub fn bridge(&self) -> &Bridge {
        &self.inner.bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn settings(&self) -> &HostSettings {
        &self.inner.settings
    }

    pub(crate) fn metadata_cache(&self) -> &MetadataCache {
        &self.inner.metadata
    }
}
