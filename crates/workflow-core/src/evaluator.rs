//! 条件树评估器
//!
//! 对事件负载做递归短路求值。设计约束：良构树永不报错，字段未解析的
//! 叶子按 false 处理；畸形树（between/in 的值形状不对等）返回错误，
//! 由调用方记录诊断并按"不匹配"处理，单条坏规则不影响同触发的其他规则。

use crate::error::{Result, RuleError};
use crate::models::{Condition, ConditionGroup, ConditionNode, EventContext};
use crate::operators::{ComparisonOperator, LogicalOperator};
use serde_json::Value;
use tracing::warn;

/// 条件评估器
pub struct ConditionEvaluator;

/// 节点级评估追踪，试运行与规则调试用
struct Trace {
    enabled: bool,
    lines: Vec<String>,
}

impl Trace {
    fn off() -> Self {
        Self {
            enabled: false,
            lines: Vec::new(),
        }
    }

    fn on() -> Self {
        Self {
            enabled: true,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: impl FnOnce() -> String) {
        if self.enabled {
            self.lines.push(line());
        }
    }
}

impl ConditionEvaluator {
    /// 评估条件树
    ///
    /// 畸形树记录 warn 诊断后返回 false，不向上传播错误。
    pub fn evaluate(tree: &ConditionNode, context: &EventContext) -> bool {
        match Self::try_evaluate(tree, context) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "条件树畸形，按不匹配处理");
                false
            }
        }
    }

    /// 评估条件树，畸形树返回错误供调用方采集诊断
    pub fn try_evaluate(tree: &ConditionNode, context: &EventContext) -> Result<bool> {
        let mut trace = Trace::off();
        Self::eval_node(tree, context, &mut trace, "root")
    }

    /// 带节点级追踪的评估（试运行用）
    ///
    /// 返回匹配结果与每个节点的评估轨迹；畸形树同样按 false 处理，
    /// 诊断信息追加到轨迹末尾。
    pub fn evaluate_with_trace(tree: &ConditionNode, context: &EventContext) -> (bool, Vec<String>) {
        let mut trace = Trace::on();
        match Self::eval_node(tree, context, &mut trace, "root") {
            Ok(matched) => (matched, trace.lines),
            Err(e) => {
                trace.lines.push(format!("评估中止: {}", e));
                (false, trace.lines)
            }
        }
    }

    fn eval_node(
        node: &ConditionNode,
        context: &EventContext,
        trace: &mut Trace,
        path: &str,
    ) -> Result<bool> {
        match node {
            ConditionNode::Condition(cond) => Self::eval_condition(cond, context, trace, path),
            ConditionNode::Group(group) => Self::eval_group(group, context, trace, path),
        }
    }

    fn eval_condition(
        cond: &Condition,
        context: &EventContext,
        trace: &mut Trace,
        path: &str,
    ) -> Result<bool> {
        let matched = match context.get_field(&cond.field) {
            Some(field_value) => Self::apply(cond.operator, field_value, &cond.value)?,
            // 字段未解析的叶子恒为 false
            None => {
                trace.push(|| format!("{}: 字段 {} 未解析 => false", path, cond.field));
                return Ok(false);
            }
        };

        trace.push(|| {
            format!(
                "{}: {} {} {} => {}",
                path,
                cond.field,
                cond.operator,
                cond.value,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            )
        });

        Ok(matched)
    }

    fn eval_group(
        group: &ConditionGroup,
        context: &EventContext,
        trace: &mut Trace,
        path: &str,
    ) -> Result<bool> {
        match group.operator {
            LogicalOperator::And => {
                // AND: 全部满足，遇 false 短路；空组为真（无条件 ⇒ 总是执行）
                for (i, child) in group.children.iter().enumerate() {
                    let child_path = format!("{}.children[{}]", path, i);
                    if !Self::eval_node(child, context, trace, &child_path)? {
                        trace.push(|| format!("{}: AND 短路于子节点 {}", path, i));
                        return Ok(false);
                    }
                }
                trace.push(|| format!("{}: AND 组成立", path));
                Ok(true)
            }
            LogicalOperator::Or => {
                // OR: 任一满足，遇 true 短路；空组为假
                for (i, child) in group.children.iter().enumerate() {
                    let child_path = format!("{}.children[{}]", path, i);
                    if Self::eval_node(child, context, trace, &child_path)? {
                        trace.push(|| format!("{}: OR 短路于子节点 {}", path, i));
                        return Ok(true);
                    }
                }
                trace.push(|| format!("{}: OR 组无匹配", path));
                Ok(false)
            }
        }
    }

    /// 叶子操作符应用
    fn apply(operator: ComparisonOperator, field: &Value, expected: &Value) -> Result<bool> {
        match operator {
            ComparisonOperator::Equals => Ok(Self::eq(field, expected)),
            ComparisonOperator::NotEquals => Ok(!Self::eq(field, expected)),
            ComparisonOperator::GreaterThan => Ok(Self::numeric_cmp(field, expected, |a, b| a > b)),
            ComparisonOperator::LessThan => Ok(Self::numeric_cmp(field, expected, |a, b| a < b)),
            ComparisonOperator::Between => Self::between(field, expected),
            ComparisonOperator::Contains => Self::contains(field, expected),
            ComparisonOperator::In => Self::in_list(field, expected),
        }
    }

    /// 相等比较：数值统一转 f64 避免 100 与 100.0 比较失败，类型不同即不等
    fn eq(field: &Value, expected: &Value) -> bool {
        if let (Some(f1), Some(f2)) = (Self::as_f64(field), Self::as_f64(expected)) {
            return (f1 - f2).abs() < f64::EPSILON;
        }

        field == expected
    }

    /// 数值比较：任一侧非数值直接不匹配
    fn numeric_cmp<F>(field: &Value, expected: &Value, cmp: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        match (Self::as_f64(field), Self::as_f64(expected)) {
            (Some(f), Some(e)) => cmp(f, e),
            _ => false,
        }
    }

    /// 闭区间范围比较，expected 必须为 [min, max] 双元素数值数组
    fn between(field: &Value, expected: &Value) -> Result<bool> {
        let arr = expected.as_array().ok_or_else(|| {
            RuleError::MalformedValue(format!(
                "between 需要 [min, max] 数组, 实际 {}",
                Self::type_name(expected)
            ))
        })?;

        if arr.len() != 2 {
            return Err(RuleError::MalformedValue(format!(
                "between 需要恰好两个边界, 实际 {} 个",
                arr.len()
            )));
        }

        let (min, max) = match (Self::as_f64(&arr[0]), Self::as_f64(&arr[1])) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                return Err(RuleError::MalformedValue(
                    "between 的边界必须为数值".to_string(),
                ));
            }
        };

        Ok(match Self::as_f64(field) {
            Some(f) => f >= min && f <= max,
            None => false,
        })
    }

    /// 包含检查：字符串做子串匹配，数组做成员匹配
    fn contains(field: &Value, expected: &Value) -> Result<bool> {
        match field {
            Value::String(s) => {
                let substr = expected.as_str().ok_or_else(|| RuleError::TypeMismatch {
                    expected: "string".to_string(),
                    actual: Self::type_name(expected).to_string(),
                })?;
                Ok(s.contains(substr))
            }
            Value::Array(arr) => Ok(arr.iter().any(|item| Self::eq(item, expected))),
            _ => Err(RuleError::TypeMismatch {
                expected: "string or array".to_string(),
                actual: Self::type_name(field).to_string(),
            }),
        }
    }

    /// 成员检查，expected 必须为数组
    fn in_list(field: &Value, expected: &Value) -> Result<bool> {
        let arr = expected.as_array().ok_or_else(|| {
            RuleError::MalformedValue(format!(
                "in 需要候选值数组, 实际 {}",
                Self::type_name(expected)
            ))
        })?;

        Ok(arr.iter().any(|item| Self::eq(field, item)))
    }

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
