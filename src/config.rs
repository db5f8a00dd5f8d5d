use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::notify::DEFAULT_NOTIFICATION_LIFETIME;
use crate::session::{Result, SessionError, StepPolicy, ValidationPolicy};
use crate::session::validator::{default_allowed_types, DEFAULT_MAX_FILE_SIZE};

// 用于以毫秒序列化 Duration
fn serialize_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// 上传会话配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 单个文件最大字节数
    pub max_file_size: u64,

    /// 允许的 MIME 类型，为空表示不限制
    pub allowed_types: Vec<String>,

    /// 进度到达 100% 时注入失败的概率
    pub failure_probability: f64,

    /// 进度推进间隔
    #[serde(
        rename = "tick_interval_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub tick_interval: Duration,

    /// 通知自动消失时间
    #[serde(
        rename = "notification_lifetime_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub notification_lifetime: Duration,

    /// 进度步进策略
    pub step: StepPolicy,

    /// 随机数种子，None 时使用系统熵
    pub seed: Option<u64>,

    /// 事件广播缓冲大小
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: default_allowed_types(),
            failure_probability: 0.2,
            tick_interval: Duration::from_millis(300),
            notification_lifetime: DEFAULT_NOTIFICATION_LIFETIME,
            step: StepPolicy::default(),
            seed: None,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(SessionError::invalid_config(format!(
                "failure_probability must be within [0, 1], got {}",
                self.failure_probability
            )));
        }

        if self.tick_interval.is_zero() {
            return Err(SessionError::invalid_config("tick_interval_ms must be positive"));
        }

        if self.notification_lifetime.is_zero() {
            return Err(SessionError::invalid_config("notification_lifetime_ms must be positive"));
        }

        match self.step {
            StepPolicy::Fixed { step: 0 } | StepPolicy::Randomized { max_step: 0 } => {
                return Err(SessionError::invalid_config("progress step must be at least 1"));
            }
            _ => {}
        }

        if self.event_capacity == 0 {
            return Err(SessionError::invalid_config("event_capacity must be positive"));
        }

        Ok(())
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_file_size: self.max_file_size,
            allowed_types: self.allowed_types.clone(),
        }
    }
}

/// Load and validate a TOML config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<SessionConfig> {
    let config_str = fs::read_to_string(path)?;
    SessionConfig::from_toml_str(&config_str)
}
