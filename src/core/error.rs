//! 统一错误处理模块
//!
//! 提供桥接层范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **传输层错误** (`BridgeError::Transport`): 宿主调用失败、信封无法编码
//! - **宿主应用错误** (`HostError`): 宿主返回的错误码（记录不存在、脚本错误等）
//! - **记录层错误** (`RecordError`): 本地记录操作的错误（未知字段、未持久化等）
//!
//! 所有宿主错误只在具体操作的结果处抛出，绝不会从全局投递入口抛出。

use crate::config::ConfigError;
use thiserror::Error;

/// 桥接层核心错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response shape: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request abandoned before a result was delivered")]
    Abandoned,

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    #[error("A bridge is already installed for this process")]
    AlreadyInstalled,

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// 宿主错误码（仅 `Host` 变体）
    pub fn host_code(&self) -> Option<i64> {
        match self {
            Self::Host(err) => Some(err.code),
            _ => None,
        }
    }
}

/// 宿主返回的应用错误
///
/// 错误码沿用宿主的数值编码，`message` 在宿主未提供时由本地错误码表补全。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct HostError {
    pub code: i64,
    pub message: String,
}

impl HostError {
    /// 使用宿主提供的消息创建错误
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            Self::from_code(code)
        } else {
            Self { code, message }
        }
    }

    /// 根据错误码创建错误，消息取自本地错误码表
    pub fn from_code(code: i64) -> Self {
        Self {
            code,
            message: describe_code(code).to_string(),
        }
    }

    /// 是否为 "没有匹配的记录"
    pub fn is_no_records_match(&self) -> bool {
        self.code == 401
    }
}

/// 常见宿主错误码说明
pub fn describe_code(code: i64) -> &'static str {
    match code {
        -1 => "Unknown error",
        0 => "No error",
        1 => "User canceled action",
        9 => "Insufficient privileges",
        100 => "File is missing",
        101 => "Record is missing",
        102 => "Field is missing",
        104 => "Script is missing",
        105 => "Layout is missing",
        106 => "Table is missing",
        200 => "Record access is denied",
        212 => "Invalid user account or password",
        301 => "Record is in use by another user",
        306 => "Record modification ID does not match",
        401 => "No records match the request",
        500 => "Date value does not meet validation entry options",
        501 => "Time value does not meet validation entry options",
        502 => "Number value does not meet validation entry options",
        504 => "Value in field is not unique",
        507 => "Value in field failed calculation test of validation entry option",
        509 => "Field requires a valid value",
        802 => "Unable to open file",
        952 => "Invalid data access token",
        953 => "Data access token has expired",
        _ => "Unrecognized host error",
    }
}

/// 记录层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Field not present on this record: {field}")]
    UnknownField { field: String },

    #[error("Portal not present on this record: {portal}")]
    UnknownPortal { portal: String },

    #[error("Portal row {index} out of range for portal {portal}")]
    RowOutOfRange { portal: String, index: usize },

    #[error("Record has not been committed yet")]
    NotPersisted,

    #[error("Portal row was created on the host without an identity; refresh the record before editing it")]
    AwaitingRefresh,
}

/// 桥接层结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;
pub type RecordResult<T> = Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let record_err = RecordError::UnknownField {
            field: "name".to_string(),
        };
        let bridge_err: BridgeError = record_err.into();
        assert!(matches!(bridge_err, BridgeError::Record(_)));
    }

    #[test]
    fn test_host_error_message_fallback() {
        let err = HostError::new(101, "");
        assert_eq!(err.message, "Record is missing");
        assert_eq!(err.to_string(), "[101] Record is missing");

        let err = HostError::new(101, "custom");
        assert_eq!(err.message, "custom");
    }

    #[test]
    fn test_host_code() {
        let err: BridgeError = HostError::from_code(952).into();
        assert_eq!(err.host_code(), Some(952));
        assert_eq!(BridgeError::Abandoned.host_code(), None);
    }
}
