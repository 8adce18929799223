//! 核心模块
//!
//! 包含桥接层共享的基础设施：
//! - `error` - 错误类型定义
//! - `macros` - 配置样板宏

pub mod error;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{
    describe_code, BridgeError, BridgeResult, HostError, RecordError, RecordResult,
};
