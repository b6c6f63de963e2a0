//! 动作 Sink 实现
//!
//! 定义动作分发的统一抽象并提供各动作类型的具体实现。
//!
//! ## 内置 Sink
//!
//! - **AlertSink**: 站内告警（商家后台通知中心）
//! - **EmailSink**: 邮件通知
//! - **ReorderSuggestionSink**: 生成补货建议
//! - **FieldUpdateSink**: 更新商品/变体的自定义字段
//!
//! 新动作类型通过实现 [`ActionSink`] 并注册到 [`SinkRegistry`] 接入，
//! 引擎与执行器无需改动。

mod alert;
mod email;
mod field_update;
mod reorder;

pub use alert::AlertSink;
pub use email::EmailSink;
pub use field_update::FieldUpdateSink;
pub use reorder::ReorderSuggestionSink;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use workflow_core::{Action, ActionType, ValidationError, WorkflowEvent};

use crate::config::SinksConfig;
use crate::error::Result;

/// 动作 Sink trait
///
/// 每种动作类型一个实现，是引擎的副作用边界。实现应当无状态、可并发
/// 调用。`invoke` 失败返回 `Err`，由执行器转为该动作的失败结果，
/// 不会中断同规则的后续动作。
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// 此 Sink 处理的动作类型，注册表按它路由
    fn action_type(&self) -> ActionType;

    /// Sink 名称（日志用）
    fn name(&self) -> &'static str;

    /// 规则保存时的参数预校验，拦截 Sink 无法解析的参数
    fn validate_parameters(&self, parameters: &Value) -> Result<()>;

    /// 分发动作
    ///
    /// `parameters` 已完成占位符替换；`event` 为触发本次执行的事件信封。
    async fn invoke(&self, parameters: &Value, event: &WorkflowEvent) -> Result<()>;
}

/// Sink 配置
///
/// 各内置 Sink 共用的外部服务参数。
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub enabled: bool,
    /// 上游服务端点（如有）
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl SinkConfig {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            endpoint: None,
            api_key: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Sink 注册表
///
/// 以动作类型为键集中管理 Sink 实例，Arc 包装支持跨线程共享。
pub struct SinkRegistry {
    sinks: HashMap<ActionType, Arc<dyn ActionSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            sinks: HashMap::new(),
        }
    }

    /// 注册一个 Sink；同类型重复注册时后者覆盖前者
    pub fn register(&mut self, sink: Arc<dyn ActionSink>) -> &mut Self {
        let action_type = sink.action_type();
        debug!(action_type = %action_type, sink = sink.name(), "注册动作 Sink");
        self.sinks.insert(action_type, sink);
        self
    }

    pub fn get(&self, action_type: ActionType) -> Option<Arc<dyn ActionSink>> {
        self.sinks.get(&action_type).cloned()
    }

    pub fn contains(&self, action_type: ActionType) -> bool {
        self.sinks.contains_key(&action_type)
    }

    pub fn registered_types(&self) -> Vec<ActionType> {
        self.sinks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// 动作列表的保存前预校验
    ///
    /// 逐动作交给对应 Sink 的 `validate_parameters`，Sink 无法解析的参数
    /// 在规则保存时被拦截，而不是等到事件触发才失败。返回全部违规项。
    pub fn validate_actions(&self, actions: &[Action]) -> Vec<ValidationError> {
        let mut violations = Vec::new();

        for (i, action) in actions.iter().enumerate() {
            match self.get(action.action_type) {
                Some(sink) => {
                    if let Err(e) = sink.validate_parameters(&action.parameters) {
                        violations.push(ValidationError {
                            field: format!("actions[{}].parameters", i),
                            message: e.to_string(),
                        });
                    }
                }
                None => violations.push(ValidationError {
                    field: format!("actions[{}]", i),
                    message: format!("动作类型 {} 未注册对应的 Sink", action.action_type),
                }),
            }
        }

        violations
    }

    /// 注册全部内置 Sink（默认配置）
    pub fn with_defaults() -> Self {
        Self::with_config(&SinksConfig::default())
    }

    /// 按配置注册全部内置 Sink
    pub fn with_config(config: &SinksConfig) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(AlertSink::new(
            SinkConfig::new(true).with_endpoint(&config.alert.endpoint),
        )));
        registry.register(Arc::new(EmailSink::new(
            SinkConfig::new(true).with_endpoint(&config.email.endpoint),
            config.email.from_address.clone(),
            config.email.from_name.clone(),
        )));
        registry.register(Arc::new(ReorderSuggestionSink::new(
            SinkConfig::new(true).with_endpoint(&config.reorder.endpoint),
        )));
        registry.register(Arc::new(FieldUpdateSink::new(
            SinkConfig::new(true).with_endpoint(&config.field_update.endpoint),
        )));

        info!(
            sink_count = registry.len(),
            types = ?registry.registered_types(),
            "内置动作 Sink 初始化完成"
        );

        registry
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
