//! 工作流引擎
//!
//! 事件处理管线：选规则 → 排序 → 限流检查 → 条件评估 → 动作执行 →
//! 记账。每条候选规则产出一条 `ExecutionRecord`，单条规则的失败不会
//! 中断同一事件下的其他规则；只有存储读失败会让整次调用失败。

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use workflow_core::{
    validate_rule, ConditionEvaluator, EventContext, ExecutionRecord, ValidationError,
    WorkflowEvent, WorkflowRule,
};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::ActionExecutor;
use crate::sinks::SinkRegistry;
use crate::store::RuleStore;

/// 规则试运行结果
///
/// 纯评估，不触动作、不写计数，同一输入重复调用结果相同。
#[derive(Debug, Clone, Serialize)]
pub struct TestRuleOutcome {
    pub conditions_met: bool,
    /// 逐节点评估轨迹，供规则编辑界面展示
    pub trace: Vec<String>,
}

/// 工作流引擎
pub struct WorkflowEngine {
    store: Arc<dyn RuleStore>,
    registry: Arc<SinkRegistry>,
    executor: ActionExecutor,
    clock: Arc<dyn Clock>,
    /// 滚动限流窗口宽度
    rate_window: Duration,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn RuleStore>, registry: Arc<SinkRegistry>) -> Self {
        Self {
            store,
            registry: registry.clone(),
            executor: ActionExecutor::new(registry),
            clock: Arc::new(SystemClock),
            rate_window: Duration::hours(1),
        }
    }

    /// 按配置构建：动作超时与窗口宽度取自 `EngineConfig`
    pub fn from_config(store: Arc<dyn RuleStore>, config: &EngineConfig) -> Self {
        let registry = Arc::new(SinkRegistry::with_config(&config.sinks));
        let mut engine = Self::new(store, registry);
        engine.executor = engine
            .executor
            .with_timeout(std::time::Duration::from_millis(config.engine.action_timeout_ms));
        engine.rate_window = Duration::seconds(config.engine.rate_limit_window_secs as i64);
        engine
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rate_window(mut self, window: Duration) -> Self {
        self.rate_window = window;
        self
    }

    /// 处理一个事件：对事件店铺、事件触发类型下的所有候选规则依序走完
    /// 管线，返回与候选规则一一对应的执行报告。
    ///
    /// 仅 `list_active_rules` 与 `count_recent_executions` 的失败向上传播；
    /// 动作失败、条件树畸形、记账写失败都只落在对应记录或日志里。
    #[instrument(skip(self, event), fields(event_id = %event.event_id, store_id = event.store_id, trigger = %event.trigger))]
    pub async fn handle_event(&self, event: &WorkflowEvent) -> Result<Vec<ExecutionRecord>> {
        let mut rules = self
            .store
            .list_active_rules(event.store_id, event.trigger)
            .await?;

        // 确定性顺序：priority 升序，同优先级按 id 升序
        rules.sort_by_key(|r| (r.priority, r.id));

        debug!(candidates = rules.len(), "候选规则已选出");

        let context = EventContext::new(event.payload.clone());
        let mut records = Vec::with_capacity(rules.len());

        for rule in &rules {
            records.push(self.process_rule(rule, event, &context).await?);
        }

        let fired = records.iter().filter(|r| r.fired()).count();
        info!(candidates = records.len(), fired, "事件处理完成");

        Ok(records)
    }

    async fn process_rule(
        &self,
        rule: &WorkflowRule,
        event: &WorkflowEvent,
        context: &EventContext,
    ) -> Result<ExecutionRecord> {
        if !rule.is_active {
            return Ok(ExecutionRecord::skipped_inactive(rule));
        }

        // 限流检查先于条件评估：被限流的规则不消耗评估开销，
        // 也不因条件不匹配而"免费"通过
        let now = self.clock.now();
        if rule.max_executions_per_hour > 0 {
            let recent = self
                .store
                .count_recent_executions(rule.id, now - self.rate_window)
                .await?;
            if recent >= rule.max_executions_per_hour as i64 {
                debug!(rule_id = rule.id, recent, ceiling = rule.max_executions_per_hour, "规则触达执行上限");
                return Ok(ExecutionRecord::rate_limited(rule));
            }
        }

        let matched = match ConditionEvaluator::try_evaluate(&rule.trigger_conditions, context) {
            Ok(matched) => matched,
            Err(e) => {
                // 畸形条件树视为不匹配，不中断同事件的其他规则
                warn!(rule_id = rule.id, error = %e, "条件树畸形，按不匹配处理");
                return Ok(ExecutionRecord::no_match_with_error(rule, e.to_string()));
            }
        };

        if !matched {
            return Ok(ExecutionRecord::no_match(rule));
        }

        info!(rule_id = rule.id, rule_name = %rule.name, "规则命中，执行动作");
        let action_results = self.executor.execute(&rule.actions, event).await;

        // 动作已经产生副作用，记账失败只降级为告警，不回退结果
        if let Err(e) = self.store.record_execution(rule.id, now).await {
            warn!(rule_id = rule.id, error = %e, "执行计数写入失败");
        }

        Ok(ExecutionRecord::matched(rule, action_results))
    }

    /// 校验一条规则（草稿或待保存），返回全部违规项
    ///
    /// 在领域不变量之上追加 Sink 参数预校验：动作参数被其 Sink 拒绝的
    /// 规则在保存时拦截，而不是等到事件触发才失败。
    pub fn validate_rule(&self, rule: &WorkflowRule) -> Vec<ValidationError> {
        let mut violations = validate_rule(rule);
        violations.extend(self.registry.validate_actions(&rule.actions));
        violations
    }

    /// 用样例载荷试运行一条规则的条件树
    ///
    /// 不查存储、不执行动作、不写计数，可对未保存的规则草稿调用。
    pub fn test_rule(&self, rule: &WorkflowRule, sample_payload: &Value) -> TestRuleOutcome {
        let context = EventContext::new(sample_payload.clone());
        let (conditions_met, trace) =
            ConditionEvaluator::evaluate_with_trace(&rule.trigger_conditions, &context);
        TestRuleOutcome {
            conditions_met,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::store::MockRuleStore;
    use serde_json::json;
    use workflow_core::{
        Action, ActionType, ComparisonOperator, Condition, ConditionNode, TriggerEvent,
    };

    fn rule(id: i64, priority: i32) -> WorkflowRule {
        let mut rule = WorkflowRule::new(
            1,
            format!("rule-{id}"),
            TriggerEvent::InventoryLow,
            vec![Action::new(ActionType::SendAlert, json!({}))],
        )
        .with_priority(priority);
        rule.id = id;
        rule
    }

    fn event() -> WorkflowEvent {
        WorkflowEvent::new(1, TriggerEvent::InventoryLow, json!({"current_stock": 2}))
    }

    #[tokio::test]
    async fn test_store_read_failure_is_fatal() {
        let mut store = MockRuleStore::new();
        store
            .expect_list_active_rules()
            .returning(|_, _| Err(EngineError::Store("connection refused".into())));

        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(SinkRegistry::new()));
        let result = engine.handle_event(&event()).await;

        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_count_failure_is_fatal() {
        let mut store = MockRuleStore::new();
        store
            .expect_list_active_rules()
            .returning(|_, _| Ok(vec![rule(1, 100).with_max_executions_per_hour(5)]));
        store
            .expect_count_recent_executions()
            .returning(|_, _| Err(EngineError::Store("timeout".into())));

        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(SinkRegistry::new()));
        let result = engine.handle_event(&event()).await;

        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_record_execution_failure_keeps_results() {
        let matching = rule(1, 100)
            .with_conditions(ConditionNode::Condition(Condition::new(
                "current_stock",
                ComparisonOperator::LessThan,
                json!(5),
            )))
            .with_max_executions_per_hour(0);

        let mut store = MockRuleStore::new();
        let rules = vec![matching];
        store
            .expect_list_active_rules()
            .returning(move |_, _| Ok(rules.clone()));
        store
            .expect_record_execution()
            .times(1)
            .returning(|_, _| Err(EngineError::Store("write failed".into())));

        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(SinkRegistry::new()));
        let records = engine.handle_event(&event()).await.unwrap();

        // 记账失败不回退：规则仍报告为命中
        assert_eq!(records.len(), 1);
        assert!(records[0].fired());
    }

    #[tokio::test]
    async fn test_unlimited_ceiling_skips_count_query() {
        let mut store = MockRuleStore::new();
        let rules = vec![rule(1, 100).with_max_executions_per_hour(0)];
        store
            .expect_list_active_rules()
            .returning(move |_, _| Ok(rules.clone()));
        // 上限为 0 时不应查询计数
        store.expect_count_recent_executions().times(0);
        store.expect_record_execution().returning(|_, _| Ok(()));

        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(SinkRegistry::new()));
        let records = engine.handle_event(&event()).await.unwrap();

        assert!(records[0].fired());
    }

    #[tokio::test]
    async fn test_rule_is_pure() {
        // 不配置任何 mock 期望：test_rule 若触碰存储会 panic
        let store = MockRuleStore::new();
        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(SinkRegistry::new()));

        let draft = rule(0, 100).with_conditions(ConditionNode::Condition(Condition::new(
            "current_stock",
            ComparisonOperator::LessThan,
            json!(5),
        )));

        let first = engine.test_rule(&draft, &json!({"current_stock": 2}));
        let second = engine.test_rule(&draft, &json!({"current_stock": 2}));

        assert!(first.conditions_met);
        assert_eq!(first.conditions_met, second.conditions_met);
        assert!(!first.trace.is_empty());
    }

    #[test]
    fn test_validate_rule_appends_sink_violations() {
        let engine = WorkflowEngine::new(
            Arc::new(MockRuleStore::new()),
            Arc::new(SinkRegistry::with_defaults()),
        );

        // 领域违规（priority < 1）+ Sink 参数违规（告警缺 message）
        let mut draft = rule(0, 100);
        draft.priority = 0;
        draft.actions = vec![Action::new(ActionType::SendAlert, json!({"severity": "info"}))];

        let violations = engine.validate_rule(&draft);
        assert!(violations.iter().any(|v| v.field == "priority"));
        assert!(violations.iter().any(|v| v.field == "actions[0].parameters"));

        // 合规规则无违规
        let ok = WorkflowRule::new(
            1,
            "ok",
            TriggerEvent::InventoryLow,
            vec![Action::new(ActionType::SendAlert, json!({"message": "库存告警"}))],
        );
        assert!(engine.validate_rule(&ok).is_empty());
    }

    #[tokio::test]
    async fn test_actions_dispatched_only_for_matching_rules() {
        let matching = rule(1, 100)
            .with_conditions(ConditionNode::Condition(Condition::new(
                "current_stock",
                ComparisonOperator::LessThan,
                json!(5),
            )))
            .with_max_executions_per_hour(0);
        let not_matching = rule(2, 200)
            .with_conditions(ConditionNode::Condition(Condition::new(
                "current_stock",
                ComparisonOperator::GreaterThan,
                json!(100),
            )))
            .with_max_executions_per_hour(0);

        let mut store = MockRuleStore::new();
        let rules = vec![not_matching, matching];
        store
            .expect_list_active_rules()
            .returning(move |_, _| Ok(rules.clone()));
        store
            .expect_record_execution()
            .times(1)
            .returning(|_, _| Ok(()));

        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(SinkRegistry::new()));
        let records = engine.handle_event(&event()).await.unwrap();

        // 排序后 id=1 (priority 100) 在前
        assert_eq!(records[0].rule_id, 1);
        assert!(records[0].fired());
        assert_eq!(records[1].rule_id, 2);
        assert!(!records[1].fired());
    }
}
