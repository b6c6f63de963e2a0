//! 规则存储接口与内存实现
//!
//! `RuleStore` 是引擎的持久化边界：规则 CRUD 加滚动窗口执行计数。
//! 窗口计数方法接收显式时间戳（`since` / `at`），存储实现不持有时间源。
//!
//! `MemoryRuleStore` 基于 DashMap，用于测试与单进程部署；
//! PostgreSQL 实现见 workflow-store-postgres。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, instrument};
use workflow_core::{validate_rule, TriggerEvent, WorkflowRule};

use crate::error::{EngineError, Result};

/// 规则存储接口
///
/// 执行计数的更新必须在存储层原子完成（行级自增或 per-entry 锁），
/// 引擎可能被宿主服务并发调用。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// 选出指定店铺、指定触发事件下的全部启用规则；返回顺序不做保证
    async fn list_active_rules(
        &self,
        store_id: i64,
        trigger: TriggerEvent,
    ) -> Result<Vec<WorkflowRule>>;

    async fn list_rules(&self, store_id: i64) -> Result<Vec<WorkflowRule>>;

    async fn get_rule(&self, rule_id: i64) -> Result<Option<WorkflowRule>>;

    /// 校验并写入新规则，返回分配了 id 的规则
    async fn create_rule(&self, rule: WorkflowRule) -> Result<WorkflowRule>;

    /// 校验并覆盖规则定义；执行统计保留存储中的值
    async fn update_rule(&self, rule: WorkflowRule) -> Result<WorkflowRule>;

    /// 逻辑删除：规则从后续选取中消失，已返回的执行报告不受影响
    async fn delete_rule(&self, rule_id: i64) -> Result<()>;

    /// `since` 起该规则的执行次数（滚动窗口限流用）
    async fn count_recent_executions(&self, rule_id: i64, since: DateTime<Utc>) -> Result<i64>;

    /// 记录一次完整执行：`execution_count` 自增、`last_executed_at` 置为
    /// `at`、窗口日志追加一条
    async fn record_execution(&self, rule_id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// 窗口日志保留时长，超过即修剪（限流窗口最长一小时，留足余量）
const EXECUTION_LOG_RETENTION_HOURS: i64 = 24;

/// 内存规则存储
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: DashMap<i64, WorkflowRule>,
    executions: DashMap<i64, Vec<DateTime<Utc>>>,
    next_id: AtomicI64,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
            executions: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn ensure_valid(rule: &WorkflowRule) -> Result<()> {
        let violations = validate_rule(rule);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(violations))
        }
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active_rules(
        &self,
        store_id: i64,
        trigger: TriggerEvent,
    ) -> Result<Vec<WorkflowRule>> {
        // DashMap 迭代顺序无保证，排序由引擎负责
        Ok(self
            .rules
            .iter()
            .filter(|r| {
                r.store_id == store_id && r.trigger_event == trigger && r.is_active
            })
            .map(|r| r.value().clone())
            .collect())
    }

    async fn list_rules(&self, store_id: i64) -> Result<Vec<WorkflowRule>> {
        Ok(self
            .rules
            .iter()
            .filter(|r| r.store_id == store_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn get_rule(&self, rule_id: i64) -> Result<Option<WorkflowRule>> {
        Ok(self.rules.get(&rule_id).map(|r| r.value().clone()))
    }

    #[instrument(skip(self, rule), fields(store_id = rule.store_id, rule_name = %rule.name))]
    async fn create_rule(&self, mut rule: WorkflowRule) -> Result<WorkflowRule> {
        Self::ensure_valid(&rule)?;

        rule.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rule.execution_count = 0;
        rule.last_executed_at = None;
        rule.created_at = Utc::now();
        rule.updated_at = rule.created_at;

        self.rules.insert(rule.id, rule.clone());
        info!(rule_id = rule.id, "规则已创建");
        Ok(rule)
    }

    async fn update_rule(&self, mut rule: WorkflowRule) -> Result<WorkflowRule> {
        Self::ensure_valid(&rule)?;

        let mut existing = self
            .rules
            .get_mut(&rule.id)
            .ok_or(EngineError::RuleNotFound(rule.id))?;

        // 执行统计归存储管，更新操作不得覆盖
        rule.execution_count = existing.execution_count;
        rule.last_executed_at = existing.last_executed_at;
        rule.created_at = existing.created_at;
        rule.updated_at = Utc::now();

        *existing = rule.clone();
        debug!(rule_id = rule.id, "规则已更新");
        Ok(rule)
    }

    async fn delete_rule(&self, rule_id: i64) -> Result<()> {
        if self.rules.remove(&rule_id).is_none() {
            return Err(EngineError::RuleNotFound(rule_id));
        }
        self.executions.remove(&rule_id);
        info!(rule_id, "规则已删除");
        Ok(())
    }

    async fn count_recent_executions(&self, rule_id: i64, since: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .executions
            .get(&rule_id)
            .map(|log| log.iter().filter(|t| **t >= since).count() as i64)
            .unwrap_or(0))
    }

    async fn record_execution(&self, rule_id: i64, at: DateTime<Utc>) -> Result<()> {
        {
            let mut rule = self
                .rules
                .get_mut(&rule_id)
                .ok_or(EngineError::RuleNotFound(rule_id))?;
            rule.execution_count += 1;
            rule.last_executed_at = Some(at);
        }

        let cutoff = at - Duration::hours(EXECUTION_LOG_RETENTION_HOURS);
        let mut log = self.executions.entry(rule_id).or_default();
        log.retain(|t| *t >= cutoff);
        log.push(at);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workflow_core::{Action, ActionType};

    fn sample_rule(store_id: i64, name: &str) -> WorkflowRule {
        WorkflowRule::new(
            store_id,
            name,
            TriggerEvent::InventoryLow,
            vec![Action::new(ActionType::SendAlert, json!({"message": "低库存"}))],
        )
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_resets_stats() {
        let store = MemoryRuleStore::new();

        let mut rule = sample_rule(1, "a");
        rule.execution_count = 99;
        let created = store.create_rule(rule).await.unwrap();

        assert!(created.id >= 1);
        assert_eq!(created.execution_count, 0);
        assert!(created.last_executed_at.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_rule() {
        let store = MemoryRuleStore::new();
        let mut rule = sample_rule(1, "a");
        rule.actions.clear();

        let err = store.create_rule(rule).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref v) if !v.is_empty()));
    }

    #[tokio::test]
    async fn test_list_active_filters_store_trigger_and_flag() {
        let store = MemoryRuleStore::new();
        store.create_rule(sample_rule(1, "a")).await.unwrap();
        store.create_rule(sample_rule(2, "other-store")).await.unwrap();

        let mut inactive = sample_rule(1, "off");
        inactive.is_active = false;
        store.create_rule(inactive).await.unwrap();

        let mut other_trigger = sample_rule(1, "created");
        other_trigger.trigger_event = TriggerEvent::ProductCreated;
        store.create_rule(other_trigger).await.unwrap();

        let active = store
            .list_active_rules(1, TriggerEvent::InventoryLow)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "a");
    }

    #[tokio::test]
    async fn test_update_preserves_execution_stats() {
        let store = MemoryRuleStore::new();
        let created = store.create_rule(sample_rule(1, "a")).await.unwrap();

        let at = Utc::now();
        store.record_execution(created.id, at).await.unwrap();

        let mut changed = created.clone();
        changed.name = "renamed".to_string();
        changed.execution_count = 0;
        let updated = store.update_rule(changed).await.unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.execution_count, 1);
        assert_eq!(updated.last_executed_at, Some(at));
    }

    #[tokio::test]
    async fn test_update_missing_rule() {
        let store = MemoryRuleStore::new();
        let mut rule = sample_rule(1, "a");
        rule.id = 404;

        let err = store.update_rule(rule).await.unwrap_err();
        assert!(matches!(err, EngineError::RuleNotFound(404)));
    }

    #[tokio::test]
    async fn test_delete_removes_from_selection() {
        let store = MemoryRuleStore::new();
        let created = store.create_rule(sample_rule(1, "a")).await.unwrap();

        store.delete_rule(created.id).await.unwrap();

        assert!(store.get_rule(created.id).await.unwrap().is_none());
        assert!(store
            .list_active_rules(1, TriggerEvent::InventoryLow)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_window_counting() {
        let store = MemoryRuleStore::new();
        let created = store.create_rule(sample_rule(1, "a")).await.unwrap();

        let base = Utc::now();
        store.record_execution(created.id, base).await.unwrap();
        store
            .record_execution(created.id, base + Duration::minutes(10))
            .await
            .unwrap();
        store
            .record_execution(created.id, base + Duration::minutes(90))
            .await
            .unwrap();

        // 从 base+30min 往后只剩一条
        let count = store
            .count_recent_executions(created.id, base + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let count = store
            .count_recent_executions(created.id, base - Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(count, 3);

        let rule = store.get_rule(created.id).await.unwrap().unwrap();
        assert_eq!(rule.execution_count, 3);
        assert_eq!(rule.last_executed_at, Some(base + Duration::minutes(90)));
    }

    #[tokio::test]
    async fn test_concurrent_record_execution_loses_nothing() {
        use std::sync::Arc;

        let store = Arc::new(MemoryRuleStore::new());
        let created = store.create_rule(sample_rule(1, "a")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let rule_id = created.id;
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    store.record_execution(rule_id, Utc::now()).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let rule = store.get_rule(created.id).await.unwrap().unwrap();
        assert_eq!(rule.execution_count, 200);
    }
}
