//! 引擎错误类型
//!
//! 区分两类失败：存储失败对当前 `handle_event` 调用是致命的；
//! Sink 失败只落在单个动作的结果里，不向上传播。

use thiserror::Error;
use workflow_core::{ActionType, ValidationError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// 规则存储不可达或不一致，当前调用中止
    #[error("规则存储错误: {0}")]
    Store(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(i64),

    /// 规则定义违反不变量，写入被拒绝；完整违规列表随错误返回
    #[error("规则校验失败: {} 项违规", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("动作类型 {0} 未注册对应的 Sink")]
    SinkNotRegistered(ActionType),

    /// Sink 分发失败（外部服务拒绝、参数无法解析等）
    #[error("动作分发失败: {0}")]
    Sink(String),

    #[error(transparent)]
    Core(#[from] workflow_core::RuleError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
