/// 宿主环境配置
///
/// 宿主的数据层只接受固定格式的日期/时间字符串，并按宿主所在时区解释。
/// 客户端可能运行在任意时区，所以查询值必须在本地完成规范化。

use super::{ConfigError, ConfigResult};
use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// 宿主环境配置（可序列化形式）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// 宿主时区（IANA 名称）
    pub timezone: String,

    /// 日期格式
    pub date_format: String,

    /// 时间格式
    pub time_format: String,

    /// 时间戳格式
    pub timestamp_format: String,
}

impl_default!(HostConfig {
    timezone: "UTC".to_string(),
    date_format: "%m/%d/%Y".to_string(),
    time_format: "%H:%M:%S".to_string(),
    timestamp_format: "%m/%d/%Y %H:%M:%S".to_string(),
});

impl HostConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        parse_timezone(&self.timezone)?;
        for (kind, format) in [
            ("date", &self.date_format),
            ("time", &self.time_format),
            ("timestamp", &self.timestamp_format),
        ] {
            validate_format(kind, format)?;
        }
        Ok(())
    }
}

/// 解析后的宿主设置
///
/// 查询构建时使用，时区已解析为 `chrono_tz::Tz`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub timezone: Tz,
    pub date_format: String,
    pub time_format: String,
    pub timestamp_format: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            date_format: "%m/%d/%Y".to_string(),
            time_format: "%H:%M:%S".to_string(),
            timestamp_format: "%m/%d/%Y %H:%M:%S".to_string(),
        }
    }
}

impl HostSettings {
    /// 从配置解析
    pub fn from_config(config: &HostConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            timezone: parse_timezone(&config.timezone)?,
            date_format: config.date_format.clone(),
            time_format: config.time_format.clone(),
            timestamp_format: config.timestamp_format.clone(),
        })
    }
}

fn parse_timezone(name: &str) -> ConfigResult<Tz> {
    name.parse::<Tz>().map_err(|e| {
        ConfigError::ValidationError(format!("Unknown timezone '{}': {}", name, e))
    })
}

fn validate_format(kind: &str, format: &str) -> ConfigResult<()> {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::ValidationError(format!(
            "Invalid {} format: '{}'",
            kind, format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_host_settings() {
        let settings = HostSettings::from_config(&HostConfig::default()).unwrap();
        assert_eq!(settings, HostSettings::default());
    }

    #[test]
    fn test_named_timezone() {
        let config = HostConfig {
            timezone: "America/New_York".to_string(),
            ..Default::default()
        };
        let settings = HostSettings::from_config(&config).unwrap();
        assert_eq!(settings.timezone, chrono_tz::America::New_York);
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let config = HostConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HostSettings::from_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_bad_format_rejected() {
        let config = HostConfig {
            date_format: "%Q".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
