//! 站内告警 Sink
//!
//! 向商家后台的通知中心推送告警。当前为模拟实现，生产环境接入
//! 实际的通知服务。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use workflow_core::{ActionType, WorkflowEvent};

use super::{ActionSink, SinkConfig};
use crate::error::{EngineError, Result};

/// 告警参数
#[derive(Debug, Clone, Deserialize)]
struct AlertParams {
    /// 告警正文（必填，通常含占位符渲染后的文案）
    message: String,
    /// 告警标题（可选）
    title: Option<String>,
    /// 严重级别：info / warning / critical，缺省 warning
    #[serde(default = "default_severity")]
    severity: String,
}

fn default_severity() -> String {
    "warning".to_string()
}

/// 站内告警 Sink
pub struct AlertSink {
    config: SinkConfig,
}

impl AlertSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    fn parse_params(parameters: &Value) -> Result<AlertParams> {
        serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Sink(format!("告警参数解析失败: {}", e)))
    }
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new(SinkConfig::default())
    }
}

#[async_trait]
impl ActionSink for AlertSink {
    fn action_type(&self) -> ActionType {
        ActionType::SendAlert
    }

    fn name(&self) -> &'static str {
        "alert"
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<()> {
        let params = Self::parse_params(parameters)?;
        match params.severity.as_str() {
            "info" | "warning" | "critical" => Ok(()),
            other => Err(EngineError::Sink(format!("未知的告警级别: {}", other))),
        }
    }

    async fn invoke(&self, parameters: &Value, event: &WorkflowEvent) -> Result<()> {
        if !self.config.enabled {
            return Err(EngineError::Sink("告警 Sink 已停用".to_string()));
        }

        let params = Self::parse_params(parameters)?;
        let alert_id = Uuid::new_v4().to_string();

        debug!(
            alert_id = %alert_id,
            endpoint = ?self.config.endpoint,
            severity = %params.severity,
            "模拟推送站内告警"
        );

        info!(
            alert_id = %alert_id,
            store_id = event.store_id,
            event_id = %event.event_id,
            title = params.title.as_deref().unwrap_or("库存工作流告警"),
            message = %params.message,
            "站内告警已发送"
        );

        Ok(())
    }
}
