//! InventorySync 工作流自动化核心
//!
//! 提供工作流规则的领域模型与纯函数逻辑，支持：
//! - JSON 规则定义和解析（条件树 + 动作列表）
//! - 条件树短路求值
//! - 动作参数的事件负载占位符替换
//! - 规则不变量校验
//!
//! 本 crate 不包含任何 I/O 与异步逻辑，存储与动作分发见 workflow-engine。

pub mod error;
pub mod evaluator;
pub mod events;
pub mod models;
pub mod operators;
pub mod template;
pub mod validator;

pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use events::{TriggerEvent, WorkflowEvent};
pub use models::{
    Action, ActionResult, ActionType, Condition, ConditionGroup, ConditionNode, EventContext,
    ExecutionRecord, RuleOutcome, WorkflowRule,
};
pub use operators::{ComparisonOperator, LogicalOperator};
pub use template::ParameterRenderer;
pub use validator::{validate_rule, ValidationError};
