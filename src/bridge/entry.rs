//! 进程级投递入口
//!
//! 宿主只能调用一个固定名字的全局函数。嵌入方把这两个函数注册到宿主，
//! 启动时调用一次 [`install`]。每个进程只能安装一个桥接，第二次安装返回
//! [`BridgeError::AlreadyInstalled`]。

use super::{Bridge, DeliveryReport};
use crate::core::error::{BridgeError, BridgeResult};
use std::sync::OnceLock;

static INSTALLED: OnceLock<Bridge> = OnceLock::new();

/// 安装进程唯一的桥接
pub fn install(bridge: Bridge) -> BridgeResult<()> {
    INSTALLED
        .set(bridge)
        .map_err(|_| BridgeError::AlreadyInstalled)?;
    tracing::info!(target: "bridge", "Global delivery entry point installed");
    Ok(())
}

/// 已安装的桥接
pub fn installed() -> Option<&'static Bridge> {
    INSTALLED.get()
}

/// 批量投递：`[[id, result], ...]`
///
/// 从不 panic，也不返回错误给宿主。
pub fn data_in(raw: &str) -> DeliveryReport {
    match INSTALLED.get() {
        Some(bridge) => bridge.receive(raw),
        None => {
            tracing::error!(target: "bridge", "Delivery received before a bridge was installed");
            DeliveryReport::default()
        }
    }
}

/// 单条投递：`(id, result)`
pub fn data_in_for(id: &str, raw: &str) -> DeliveryReport {
    match INSTALLED.get() {
        Some(bridge) => bridge.receive_one(id, raw),
        None => {
            tracing::error!(target: "bridge", "Delivery for {} received before a bridge was installed", id);
            DeliveryReport::default()
        }
    }
}
