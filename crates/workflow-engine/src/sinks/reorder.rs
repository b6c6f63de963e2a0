//! 补货建议 Sink
//!
//! 为触发规则的商品生成补货建议记录，供商家在后台确认下单。
//! 当前为模拟实现，生产环境写入建议服务。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use workflow_core::{ActionType, WorkflowEvent};

use super::{ActionSink, SinkConfig};
use crate::error::{EngineError, Result};

/// 补货建议参数
///
/// `product_id` 通常由占位符从事件负载渲染而来，如 `"{{product_id}}"`。
#[derive(Debug, Clone, Deserialize)]
struct ReorderParams {
    product_id: i64,
    variant_id: Option<i64>,
    /// 建议补货数量；缺省时由建议服务按销量估算
    quantity: Option<i64>,
    /// 目标库位（多仓场景）
    location_id: Option<i64>,
}

/// 补货建议 Sink
pub struct ReorderSuggestionSink {
    config: SinkConfig,
}

impl ReorderSuggestionSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    fn parse_params(parameters: &Value) -> Result<ReorderParams> {
        serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Sink(format!("补货建议参数解析失败: {}", e)))
    }
}

impl Default for ReorderSuggestionSink {
    fn default() -> Self {
        Self::new(SinkConfig::default())
    }
}

#[async_trait]
impl ActionSink for ReorderSuggestionSink {
    fn action_type(&self) -> ActionType {
        ActionType::CreateReorderSuggestion
    }

    fn name(&self) -> &'static str {
        "reorder_suggestion"
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<()> {
        // 规则保存时 product_id 多半还是占位符字符串，留到执行期解析；
        // 这里只拦截显式给出的非法数量。
        if let Some(quantity) = parameters.get("quantity").and_then(Value::as_i64) {
            if quantity <= 0 {
                return Err(EngineError::Sink(format!(
                    "补货数量必须为正数, 实际 {}",
                    quantity
                )));
            }
        }
        Ok(())
    }

    async fn invoke(&self, parameters: &Value, event: &WorkflowEvent) -> Result<()> {
        if !self.config.enabled {
            return Err(EngineError::Sink("补货建议 Sink 已停用".to_string()));
        }

        let params = Self::parse_params(parameters)?;
        if params.quantity.is_some_and(|q| q <= 0) {
            return Err(EngineError::Sink("补货数量必须为正数".to_string()));
        }

        let suggestion_id = Uuid::new_v4().to_string();

        debug!(
            suggestion_id = %suggestion_id,
            endpoint = ?self.config.endpoint,
            "模拟写入补货建议"
        );

        info!(
            suggestion_id = %suggestion_id,
            store_id = event.store_id,
            event_id = %event.event_id,
            product_id = params.product_id,
            variant_id = ?params.variant_id,
            quantity = ?params.quantity,
            location_id = ?params.location_id,
            "补货建议已创建"
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
        WorkflowEvent::new(1, TriggerEvent::VariantLowStock, json!({"product_id": 9001}))
    }

    #[tokio::test]
    async fn test_invoke() {
        let sink = ReorderSuggestionSink::default();
        sink.invoke(&json!({"product_id": 9001, "quantity": 20}), &event())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unrendered_product_id_fails_at_invoke() {
        let sink = ReorderSuggestionSink::default();
        // 占位符未解析时 product_id 仍是字符串，执行期报错
        let err = sink
            .invoke(&json!({"product_id": "{{product_id}}"}), &event())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Sink(_)));
    }

    #[test]
    fn test_validate_quantity() {
        let sink = ReorderSuggestionSink::default();
        assert!(sink
            .validate_parameters(&json!({"product_id": "{{product_id}}", "quantity": 20}))
            .is_ok());
        assert!(sink
            .validate_parameters(&json!({"product_id": 1, "quantity": 0}))
            .is_err());
    }
}
