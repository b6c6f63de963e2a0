//! 自定义字段更新 Sink
//!
//! 更新商品或变体上的自定义字段值。当前为模拟实现，
//! 生产环境调用字段服务的写接口。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use workflow_core::{ActionType, WorkflowEvent};

use super::{ActionSink, SinkConfig};
use crate::error::{EngineError, Result};

/// 可更新字段的资源类型
const KNOWN_RESOURCES: &[&str] = &["product", "variant", "location"];

/// 字段更新参数
#[derive(Debug, Clone, Deserialize)]
struct FieldUpdateParams {
    /// 目标资源类型，缺省 product
    #[serde(default = "default_resource")]
    resource: String,
    /// 目标资源 ID，通常由占位符渲染
    resource_id: i64,
    /// 字段名（必填）
    field: String,
    /// 写入的值，原样透传
    value: Value,
}

fn default_resource() -> String {
    "product".to_string()
}

/// 字段更新 Sink
pub struct FieldUpdateSink {
    config: SinkConfig,
}

impl FieldUpdateSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    fn parse_params(parameters: &Value) -> Result<FieldUpdateParams> {
        serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Sink(format!("字段更新参数解析失败: {}", e)))
    }
}

impl Default for FieldUpdateSink {
    fn default() -> Self {
        Self::new(SinkConfig::default())
    }
}

#[async_trait]
impl ActionSink for FieldUpdateSink {
    fn action_type(&self) -> ActionType {
        ActionType::UpdateField
    }

    fn name(&self) -> &'static str {
        "field_update"
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<()> {
        let field = parameters
            .get("field")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if field.trim().is_empty() {
            return Err(EngineError::Sink("字段名不能为空".to_string()));
        }

        if let Some(resource) = parameters.get("resource").and_then(Value::as_str) {
            if !KNOWN_RESOURCES.contains(&resource) {
                return Err(EngineError::Sink(format!("未知的资源类型: {}", resource)));
            }
        }

        Ok(())
    }

    async fn invoke(&self, parameters: &Value, event: &WorkflowEvent) -> Result<()> {
        if !self.config.enabled {
            return Err(EngineError::Sink("字段更新 Sink 已停用".to_string()));
        }

        let params = Self::parse_params(parameters)?;
        if !KNOWN_RESOURCES.contains(&params.resource.as_str()) {
            return Err(EngineError::Sink(format!(
                "未知的资源类型: {}",
                params.resource
            )));
        }

        debug!(
            endpoint = ?self.config.endpoint,
            resource = %params.resource,
            "模拟调用字段服务"
        );

        info!(
            store_id = event.store_id,
            event_id = %event.event_id,
            resource = %params.resource,
            resource_id = params.resource_id,
            field = %params.field,
            value = %params.value,
            "自定义字段已更新"
        );

        Ok(())
    }
}
