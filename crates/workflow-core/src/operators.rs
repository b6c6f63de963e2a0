//! 条件操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 比较操作符
///
/// 封闭集合：新增操作符属于设计变更，需要同步扩展评估器与校验器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    // 通用比较
    Equals,
    NotEquals,

    // 数值比较
    GreaterThan,
    LessThan,
    Between,

    // 包含检查
    Contains,
    In,
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Between => "between",
            Self::Contains => "contains",
            Self::In => "in",
        };
        write!(f, "{}", s)
    }
}

/// 逻辑组合操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_operator_wire_names() {
        let op: ComparisonOperator = serde_json::from_str(r#""greater_than""#).unwrap();
        assert_eq!(op, ComparisonOperator::GreaterThan);
        assert_eq!(
            serde_json::to_string(&ComparisonOperator::NotEquals).unwrap(),
            r#""not_equals""#
        );
    }

    #[test]
    fn test_logical_operator_wire_names() {
        let op: LogicalOperator = serde_json::from_str(r#""AND""#).unwrap();
        assert_eq!(op, LogicalOperator::And);
        assert_eq!(serde_json::to_string(&LogicalOperator::Or).unwrap(), r#""OR""#);
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result: std::result::Result<ComparisonOperator, _> =
            serde_json::from_str(r#""regex""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(ComparisonOperator::Between.to_string(), "between");
        assert_eq!(LogicalOperator::And.to_string(), "AND");
    }
}
