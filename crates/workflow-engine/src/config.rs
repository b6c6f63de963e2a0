//! 引擎配置
//!
//! 支持多格式配置文件加载与环境变量覆盖（`INVSYNC_` 前缀，双下划线
//! 分隔层级，如 `INVSYNC_ENGINE__ACTION_TIMEOUT_MS=3000`）。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 引擎运行参数
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// 单个动作的分发超时（毫秒），超时计为该动作失败
    pub action_timeout_ms: u64,
    /// 限流窗口长度（秒）
    pub rate_limit_window_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            action_timeout_ms: 5000,
            rate_limit_window_secs: 3600,
        }
    }
}

/// 告警 Sink 配置
#[derive(Debug, Clone, Deserialize)]
pub struct AlertSinkSettings {
    pub endpoint: String,
}

impl Default for AlertSinkSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://notification-service:8080".to_string(),
        }
    }
}

/// 邮件 Sink 配置
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSinkSettings {
    pub endpoint: String,
    pub from_address: String,
    pub from_name: String,
}

impl Default for EmailSinkSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://mail-service:8080".to_string(),
            from_address: "noreply@inventorysync.app".to_string(),
            from_name: "InventorySync".to_string(),
        }
    }
}

/// 补货建议 Sink 配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderSinkSettings {
    pub endpoint: String,
}

impl Default for ReorderSinkSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://suggestion-service:8080".to_string(),
        }
    }
}

/// 字段更新 Sink 配置
#[derive(Debug, Clone, Deserialize)]
pub struct FieldUpdateSinkSettings {
    pub endpoint: String,
}

impl Default for FieldUpdateSinkSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://custom-field-service:8080".to_string(),
        }
    }
}

/// 各 Sink 的外部服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SinksConfig {
    #[serde(default)]
    pub alert: AlertSinkSettings,
    #[serde(default)]
    pub email: EmailSinkSettings,
    #[serde(default)]
    pub reorder: ReorderSinkSettings,
    #[serde(default)]
    pub field_update: FieldUpdateSinkSettings,
}

/// 引擎配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub sinks: SinksConfig,
}

impl EngineConfig {
    /// 从 `config/{name}.{toml,yaml,json}` 加载，环境变量覆盖文件值；
    /// 文件不存在时使用缺省值
    pub fn load(name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(&format!("config/{}", name)).required(false))
            .add_source(Environment::with_prefix("INVSYNC").separator("__"))
            .build()?
            .try_deserialize()
    }
}
