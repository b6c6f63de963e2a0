//! 规则不变量校验
//!
//! 在规则写入存储前执行，一次返回全部违规项而非首个，便于前端逐项提示。
//! 触发事件与操作符词汇由枚举类型在反序列化阶段约束，这里校验的是
//! 枚举无法表达的形状与边界。

use crate::models::{ConditionNode, WorkflowRule};
use crate::operators::ComparisonOperator;
use serde_json::Value;
use std::fmt;

/// 规则名长度上限
pub const MAX_NAME_LEN: usize = 100;

/// 单项校验违规
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationError {
    /// 违规字段的定位，如 "actions" 或 "trigger_conditions.children[1]"
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 校验规则定义，返回全部违规项；空列表表示通过
pub fn validate_rule(rule: &WorkflowRule) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if rule.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "规则名不能为空"));
    } else if rule.name.chars().count() > MAX_NAME_LEN {
        errors.push(ValidationError::new(
            "name",
            format!("规则名超过 {} 字符上限", MAX_NAME_LEN),
        ));
    }

    if rule.priority < 1 {
        errors.push(ValidationError::new("priority", "priority 必须 >= 1"));
    }

    if rule.max_executions_per_hour < 0 {
        errors.push(ValidationError::new(
            "max_executions_per_hour",
            "执行上限不能为负数（0 表示不限）",
        ));
    }

    if rule.actions.is_empty() {
        errors.push(ValidationError::new("actions", "动作列表不能为空"));
    }

    for (i, action) in rule.actions.iter().enumerate() {
        if !action.parameters.is_object() {
            errors.push(ValidationError::new(
                format!("actions[{}].parameters", i),
                "动作参数必须为 JSON 对象",
            ));
        }
    }

    validate_condition_node(&rule.trigger_conditions, "trigger_conditions", &mut errors);

    errors
}

/// 递归校验条件树的形状
fn validate_condition_node(node: &ConditionNode, path: &str, errors: &mut Vec<ValidationError>) {
    match node {
        ConditionNode::Condition(cond) => {
            if cond.field.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("{}.field", path),
                    "条件字段路径不能为空",
                ));
            }

            match cond.operator {
                ComparisonOperator::Between => {
                    if !is_numeric_pair(&cond.value) {
                        errors.push(ValidationError::new(
                            format!("{}.value", path),
                            "between 的值必须为 [min, max] 双元素数值数组",
                        ));
                    }
                }
                ComparisonOperator::In => {
                    if !cond.value.is_array() {
                        errors.push(ValidationError::new(
                            format!("{}.value", path),
                            "in 的值必须为候选值数组",
                        ));
                    }
                }
                _ => {}
            }
        }
        ConditionNode::Group(group) => {
            for (i, child) in group.children.iter().enumerate() {
                let child_path = format!("{}.children[{}]", path, i);
                validate_condition_node(child, &child_path, errors);
            }
        }
    }
}

fn is_numeric_pair(value: &Value) -> bool {
    match value.as_array() {
        Some(arr) => arr.len() == 2 && arr.iter().all(|v| v.is_number()),
        None => false,
    }
}
