//! 工作流核心错误类型

use thiserror::Error;

/// 条件树评估错误
///
/// 只覆盖畸形规则定义这一类：良构树的任何输入都不会产生错误
/// （未解析字段、类型不符的比较统一按不匹配处理）。
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("条件值格式错误: {0}")]
    MalformedValue(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, RuleError>;
