//! 行模型与领域模型的互转
//!
//! `workflow_rules` 表把条件树与动作列表存为 JSONB、触发事件存为文本，
//! 这里负责两个方向的转换。行数据畸形（历史数据或越过应用层写入）
//! 转成存储错误向上报告，不 panic。

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use workflow_core::{Action, ConditionNode, TriggerEvent, WorkflowRule};
use workflow_engine::EngineError;

/// `workflow_rules` 表的一行
#[derive(Debug, Clone, FromRow)]
pub struct WorkflowRuleRow {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub trigger_event: String,
    pub trigger_conditions: Value,
    pub actions: Value,
    pub priority: i32,
    pub max_executions_per_hour: i32,
    pub is_active: bool,
    pub execution_count: i64,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WorkflowRuleRow> for WorkflowRule {
    type Error = EngineError;

    fn try_from(row: WorkflowRuleRow) -> Result<Self, Self::Error> {
        let trigger_event: TriggerEvent =
            serde_json::from_value(Value::String(row.trigger_event.clone())).map_err(|e| {
                EngineError::Store(format!(
                    "规则 {} 的触发事件 {:?} 无法识别: {}",
                    row.id, row.trigger_event, e
                ))
            })?;

        let trigger_conditions: ConditionNode = serde_json::from_value(row.trigger_conditions)
            .map_err(|e| EngineError::Store(format!("规则 {} 的条件树无法解析: {}", row.id, e)))?;

        let actions: Vec<Action> = serde_json::from_value(row.actions)
            .map_err(|e| EngineError::Store(format!("规则 {} 的动作列表无法解析: {}", row.id, e)))?;

        Ok(WorkflowRule {
            id: row.id,
            store_id: row.store_id,
            name: row.name,
            trigger_event,
            trigger_conditions,
            actions,
            priority: row.priority,
            max_executions_per_hour: row.max_executions_per_hour,
            is_active: row.is_active,
            execution_count: row.execution_count,
            last_executed_at: row.last_executed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 条件树序列化为 JSONB 值
pub fn conditions_to_value(conditions: &ConditionNode) -> Result<Value, EngineError> {
    serde_json::to_value(conditions)
        .map_err(|e| EngineError::Store(format!("条件树序列化失败: {}", e)))
}

/// 动作列表序列化为 JSONB 值
pub fn actions_to_value(actions: &[Action]) -> Result<Value, EngineError> {
    serde_json::to_value(actions)
        .map_err(|e| EngineError::Store(format!("动作列表序列化失败: {}", e)))
}
