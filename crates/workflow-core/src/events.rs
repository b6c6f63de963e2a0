//! 触发事件模型
//!
//! 定义工作流可响应的事件类别与统一的事件信封。事件来源（webhook、
//! 定时器、手动触发）及其传输层由宿主服务负责，引擎只消费信封。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 触发事件类型
///
/// 封闭集合，规则的 `trigger_event` 必须取自其中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    // 库存类事件，由库存水位变化触发
    InventoryLow,
    VariantLowStock,

    // 商品类事件
    ProductCreated,
    CustomFieldChange,

    // 调度与人工触发
    DailySchedule,
    Manual,
}

impl TriggerEvent {
    /// 库存类事件直接反映缺货风险，是补货建议规则最常见的触发源
    pub fn is_stock_related(&self) -> bool {
        matches!(self, Self::InventoryLow | Self::VariantLowStock)
    }

    /// 非外部事件驱动（定时任务或用户手动触发）
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::DailySchedule | Self::Manual)
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InventoryLow => "inventory_low",
            Self::VariantLowStock => "variant_low_stock",
            Self::ProductCreated => "product_created",
            Self::CustomFieldChange => "custom_field_change",
            Self::DailySchedule => "daily_schedule",
            Self::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// 工作流事件信封
///
/// 进入引擎的统一格式。`payload` 为事件负载 JSON，条件树的字段路径
/// 在其上解析；`event_id` 用于日志与执行报告的关联。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_id: String,
    pub store_id: i64,
    pub trigger: TriggerEvent,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn new(store_id: i64, trigger: TriggerEvent, payload: Value) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            store_id,
            trigger,
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// 指定事件 ID 创建（webhook 重投递时沿用来源 ID 保持幂等追踪）
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }
}
