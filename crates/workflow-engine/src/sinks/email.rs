//! 邮件通知 Sink
//!
//! 通过邮件服务向商家发送通知。当前为模拟实现，生产环境接入
//! 真实邮件服务（SendGrid、AWS SES 等）。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use workflow_core::{ActionType, WorkflowEvent};

use super::{ActionSink, SinkConfig};
use crate::error::{EngineError, Result};

/// 邮件参数
#[derive(Debug, Clone, Deserialize)]
struct EmailParams {
    /// 收件地址（必填）
    to: String,
    subject: String,
    #[serde(default)]
    body: String,
}

/// 邮件通知 Sink
pub struct EmailSink {
    config: SinkConfig,
    from_address: String,
    /// 发件人显示名（构建邮件头 From 字段用）
    from_name: String,
}

impl EmailSink {
    pub fn new(config: SinkConfig, from_address: String, from_name: String) -> Self {
        Self {
            config,
            from_address,
            from_name,
        }
    }

    fn parse_params(parameters: &Value) -> Result<EmailParams> {
        serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Sink(format!("邮件参数解析失败: {}", e)))
    }
}

impl Default for EmailSink {
    fn default() -> Self {
        Self::new(
            SinkConfig::default(),
            "noreply@inventorysync.app".to_string(),
            "InventorySync".to_string(),
        )
    }
}

#[async_trait]
impl ActionSink for EmailSink {
    fn action_type(&self) -> ActionType {
        ActionType::SendEmail
    }

    fn name(&self) -> &'static str {
        "email"
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<()> {
        let params = Self::parse_params(parameters)?;
        // 只做最低限度的地址形状检查，完整校验交给邮件服务
        if !params.to.contains('@') {
            return Err(EngineError::Sink(format!("收件地址无效: {}", params.to)));
        }
        if params.subject.trim().is_empty() {
            return Err(EngineError::Sink("邮件主题不能为空".to_string()));
        }
        Ok(())
    }

    async fn invoke(&self, parameters: &Value, event: &WorkflowEvent) -> Result<()> {
        if !self.config.enabled {
            return Err(EngineError::Sink("邮件 Sink 已停用".to_string()));
        }

        let params = Self::parse_params(parameters)?;
        let message_id = Uuid::new_v4().to_string();

        debug!(
            message_id = %message_id,
            endpoint = ?self.config.endpoint,
            from = %format!("{} <{}>", self.from_name, self.from_address),
            "模拟投递邮件"
        );

        info!(
            message_id = %message_id,
            store_id = event.store_id,
            event_id = %event.event_id,
            to = %params.to,
            subject = %params.subject,
            body_len = params.body.len(),
            "邮件已发送"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workflow_core::TriggerEvent;

    fn event() -> WorkflowEvent {
        WorkflowEvent::new(1, TriggerEvent::InventoryLow, json!({}))
    }

    #[tokio::test]
    async fn test_invoke() {
        let sink = EmailSink::default();
        sink.invoke(
            &json!({"to": "ops@example.com", "subject": "低库存", "body": "仅剩 3 件"}),
            &event(),
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let sink = EmailSink::default();
        assert!(sink
            .validate_parameters(&json!({"to": "not-an-address", "subject": "s"}))
            .is_err());
        assert!(sink
            .validate_parameters(&json!({"to": "ops@example.com", "subject": " "}))
            .is_err());
        assert!(sink
            .validate_parameters(&json!({"to": "ops@example.com", "subject": "s"}))
            .is_ok());
    }
}
