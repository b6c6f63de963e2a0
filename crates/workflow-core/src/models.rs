//! 工作流规则领域模型

use crate::events::TriggerEvent;
use crate::operators::{ComparisonOperator, LogicalOperator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 工作流规则定义
///
/// 每条规则归属于一个店铺，由触发事件类型选中，条件树决定是否执行动作列表。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRule {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub trigger_event: TriggerEvent,
    /// 条件树；空的 AND 组等价于"无条件，总是执行"
    #[serde(default)]
    pub trigger_conditions: ConditionNode,
    /// 动作列表，按声明顺序执行，不允许为空
    pub actions: Vec<Action>,
    /// 数值越小越先评估，同触发事件内生效
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// 滚动 60 分钟窗口内的执行上限，0 表示不限
    #[serde(default = "default_max_executions")]
    pub max_executions_per_hour: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// 完整执行（所有动作均已尝试）的累计次数
    #[serde(default)]
    pub execution_count: i64,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_priority() -> i32 {
    100
}

fn default_max_executions() -> i32 {
    60
}

fn default_active() -> bool {
    true
}

impl WorkflowRule {
    /// 创建新规则，id 为 0 表示尚未持久化，由存储层分配
    pub fn new(
        store_id: i64,
        name: impl Into<String>,
        trigger_event: TriggerEvent,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id: 0,
            store_id,
            name: name.into(),
            trigger_event,
            trigger_conditions: ConditionNode::default(),
            actions,
            priority: default_priority(),
            max_executions_per_hour: default_max_executions(),
            is_active: default_active(),
            execution_count: 0,
            last_executed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_conditions(mut self, conditions: ConditionNode) -> Self {
        self.trigger_conditions = conditions;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_executions_per_hour(mut self, ceiling: i32) -> Self {
        self.max_executions_per_hour = ceiling;
        self
    }
}

/// 条件树节点（叶子比较或逻辑组）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionNode {
    Condition(Condition),
    Group(ConditionGroup),
}

impl ConditionNode {
    /// 空的 AND 组，即"总是成立"
    pub fn always() -> Self {
        Self::Group(ConditionGroup::and(Vec::new()))
    }
}

impl Default for ConditionNode {
    fn default() -> Self {
        Self::always()
    }
}

/// 叶子条件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// 事件负载中的点号路径，如 "inventory.current_stock"
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub operator: LogicalOperator,
    pub children: Vec<ConditionNode>,
}

impl ConditionGroup {
    pub fn new(operator: LogicalOperator, children: Vec<ConditionNode>) -> Self {
        Self { operator, children }
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::Or, children)
    }
}

/// 动作类型
///
/// 封闭集合，每种类型在引擎侧注册一个对应的 Sink 实现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendAlert,
    SendEmail,
    CreateReorderSuggestion,
    UpdateField,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SendAlert => "send_alert",
            Self::SendEmail => "send_email",
            Self::CreateReorderSuggestion => "create_reorder_suggestion",
            Self::UpdateField => "update_field",
        };
        write!(f, "{}", s)
    }
}

/// 动作定义
///
/// 参数由对应 Sink 解释，引擎只做占位符替换后透传。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
}

fn empty_parameters() -> Value {
    Value::Object(Map::new())
}

impl Action {
    pub fn new(action_type: ActionType, parameters: Value) -> Self {
        Self {
            action_type,
            parameters,
        }
    }
}

/// 评估上下文，条件字段与参数占位符在此对象上解析
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    data: Value,
}

impl EventContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 获取字段值（支持点号分隔路径与数组索引，如 "line_items.0.sku"）
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;

        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// 单条规则在一次事件处理中的归类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    /// 规则未启用，未评估条件
    SkippedInactive,
    /// 触达小时执行上限，未评估条件
    SkippedRateLimited,
    /// 条件不满足（或条件树畸形，视为不匹配）
    NoMatch,
    /// 条件满足，动作已全部尝试
    Matched,
}

/// 单个动作的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action_type: ActionType,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(action_type: ActionType) -> Self {
        Self {
            action_type,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(action_type: ActionType, error: impl Into<String>) -> Self {
        Self {
            action_type,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// 单条规则的执行报告
///
/// `handle_event` 对每条候选规则返回一条记录，包括被跳过与未匹配的规则，
/// 供上层观测与测试使用。
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub rule_id: i64,
    pub rule_name: String,
    pub outcome: RuleOutcome,
    pub conditions_met: bool,
    pub action_results: Vec<ActionResult>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn skipped_inactive(rule: &WorkflowRule) -> Self {
        Self::bare(rule, RuleOutcome::SkippedInactive)
    }

    pub fn rate_limited(rule: &WorkflowRule) -> Self {
        Self::bare(rule, RuleOutcome::SkippedRateLimited)
    }

    pub fn no_match(rule: &WorkflowRule) -> Self {
        Self::bare(rule, RuleOutcome::NoMatch)
    }

    /// 条件树畸形时的不匹配记录，保留诊断信息
    pub fn no_match_with_error(rule: &WorkflowRule, error: impl Into<String>) -> Self {
        let mut record = Self::bare(rule, RuleOutcome::NoMatch);
        record.error = Some(error.into());
        record
    }

    pub fn matched(rule: &WorkflowRule, action_results: Vec<ActionResult>) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            outcome: RuleOutcome::Matched,
            conditions_met: true,
            action_results,
            error: None,
        }
    }

    fn bare(rule: &WorkflowRule, outcome: RuleOutcome) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            outcome,
            conditions_met: false,
            action_results: Vec::new(),
            error: None,
        }
    }

    /// 规则是否"真正执行了"：条件满足且所有动作均已尝试
    pub fn fired(&self) -> bool {
        self.outcome == RuleOutcome::Matched
    }
}
