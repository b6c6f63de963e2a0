//! 动作执行器
//!
//! 按声明顺序分发规则的动作列表：渲染参数占位符、按动作类型路由到
//! 注册表中的 Sink、套超时。单个动作失败或超时只记入该动作的结果，
//! 其余动作照常执行——各动作是互相独立的副作用，一个失败不应
//! 悄悄吞掉其他动作。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use workflow_core::{Action, ActionResult, EventContext, ParameterRenderer, WorkflowEvent};

use crate::sinks::SinkRegistry;

/// 动作执行器
pub struct ActionExecutor {
    registry: Arc<SinkRegistry>,
    renderer: ParameterRenderer,
    /// 单个动作的分发上限，防止失联的外部服务拖住同触发的其他规则
    action_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(registry: Arc<SinkRegistry>) -> Self {
        Self {
            registry,
            renderer: ParameterRenderer::new(),
            action_timeout: Duration::from_millis(5000),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// 依次执行动作列表，返回与列表等长的逐动作结果
    pub async fn execute(&self, actions: &[Action], event: &WorkflowEvent) -> Vec<ActionResult> {
        let context = EventContext::new(event.payload.clone());
        let mut results = Vec::with_capacity(actions.len());

        for action in actions {
            results.push(self.dispatch(action, &context, event).await);
        }

        results
    }

    async fn dispatch(
        &self,
        action: &Action,
        context: &EventContext,
        event: &WorkflowEvent,
    ) -> ActionResult {
        let Some(sink) = self.registry.get(action.action_type) else {
            warn!(action_type = %action.action_type, "动作类型未注册 Sink");
            return ActionResult::failed(action.action_type, "动作类型未注册 Sink");
        };

        let parameters = self.renderer.render(&action.parameters, context);

        match tokio::time::timeout(self.action_timeout, sink.invoke(&parameters, event)).await {
            Ok(Ok(())) => {
                debug!(action_type = %action.action_type, sink = sink.name(), "动作分发成功");
                ActionResult::ok(action.action_type)
            }
            Ok(Err(e)) => {
                warn!(
                    action_type = %action.action_type,
                    sink = sink.name(),
                    error = %e,
                    "动作分发失败"
                );
                ActionResult::failed(action.action_type, e.to_string())
            }
            Err(_) => {
                warn!(
                    action_type = %action.action_type,
                    sink = sink.name(),
                    timeout_ms = self.action_timeout.as_millis() as u64,
                    "动作分发超时"
                );
                ActionResult::failed(
                    action.action_type,
                    format!("动作超时 ({} ms)", self.action_timeout.as_millis()),
                )
            }
        }
    }
}
