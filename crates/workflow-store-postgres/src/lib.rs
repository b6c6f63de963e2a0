//! PostgreSQL 规则存储
//!
//! [`workflow_engine::RuleStore`] 的生产实现。规则定义存 `workflow_rules`
//! 表（条件树与动作为 JSONB），执行日志存 `workflow_rule_executions` 表
//! 供滚动窗口计数。删除是逻辑删除（`deleted_at`），执行计数的自增在
//! SQL 里原子完成。
//!
//! 表结构见 `migrations/`，启动时可通过 [`MIGRATOR`] 应用。

pub mod row;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use workflow_core::{validate_rule, TriggerEvent, WorkflowRule};
use workflow_engine::{EngineError, Result, RuleStore};

use crate::row::{actions_to_value, conditions_to_value, WorkflowRuleRow};

/// 内嵌的库结构迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const RULE_COLUMNS: &str = "id, store_id, name, trigger_event, trigger_conditions, actions, \
     priority, max_executions_per_hour, is_active, execution_count, \
     last_executed_at, created_at, updated_at";

/// PostgreSQL 规则存储
pub struct PostgresRuleStore {
    pool: PgPool,
}

impl PostgresRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 应用库结构迁移
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::Store(format!("迁移失败: {}", e)))?;
        info!("库结构迁移完成");
        Ok(())
    }

    fn ensure_valid(rule: &WorkflowRule) -> Result<()> {
        let violations = validate_rule(rule);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(violations))
        }
    }

    fn db_err(e: sqlx::Error) -> EngineError {
        EngineError::Store(e.to_string())
    }
}

#[async_trait]
impl RuleStore for PostgresRuleStore {
    async fn list_active_rules(
        &self,
        store_id: i64,
        trigger: TriggerEvent,
    ) -> Result<Vec<WorkflowRule>> {
        let rows = sqlx::query_as::<_, WorkflowRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM workflow_rules
            WHERE store_id = $1 AND trigger_event = $2
              AND is_active AND deleted_at IS NULL
            ORDER BY priority ASC, id ASC
            "#,
        ))
        .bind(store_id)
        .bind(trigger.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_err)?;

        rows.into_iter().map(WorkflowRule::try_from).collect()
    }

    async fn list_rules(&self, store_id: i64) -> Result<Vec<WorkflowRule>> {
        let rows = sqlx::query_as::<_, WorkflowRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM workflow_rules
            WHERE store_id = $1 AND deleted_at IS NULL
            ORDER BY priority ASC, id ASC
            "#,
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_err)?;

        rows.into_iter().map(WorkflowRule::try_from).collect()
    }

    async fn get_rule(&self, rule_id: i64) -> Result<Option<WorkflowRule>> {
        let row = sqlx::query_as::<_, WorkflowRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM workflow_rules
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        ))
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?;

        row.map(WorkflowRule::try_from).transpose()
    }

    #[instrument(skip(self, rule), fields(store_id = rule.store_id, rule_name = %rule.name))]
    async fn create_rule(&self, rule: WorkflowRule) -> Result<WorkflowRule> {
        Self::ensure_valid(&rule)?;

        let row = sqlx::query_as::<_, WorkflowRuleRow>(&format!(
            r#"
            INSERT INTO workflow_rules
                (store_id, name, trigger_event, trigger_conditions, actions,
                 priority, max_executions_per_hour, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RULE_COLUMNS}
            "#,
        ))
        .bind(rule.store_id)
        .bind(&rule.name)
        .bind(rule.trigger_event.to_string())
        .bind(conditions_to_value(&rule.trigger_conditions)?)
        .bind(actions_to_value(&rule.actions)?)
        .bind(rule.priority)
        .bind(rule.max_executions_per_hour)
        .bind(rule.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::db_err)?;

        let created = WorkflowRule::try_from(row)?;
        info!(rule_id = created.id, "规则已创建");
        Ok(created)
    }

    async fn update_rule(&self, rule: WorkflowRule) -> Result<WorkflowRule> {
        Self::ensure_valid(&rule)?;

        // 执行统计归存储管，更新语句不触碰 execution_count / last_executed_at
        let row = sqlx::query_as::<_, WorkflowRuleRow>(&format!(
            r#"
            UPDATE workflow_rules
            SET name = $2,
                trigger_event = $3,
                trigger_conditions = $4,
                actions = $5,
                priority = $6,
                max_executions_per_hour = $7,
                is_active = $8,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {RULE_COLUMNS}
            "#,
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(rule.trigger_event.to_string())
        .bind(conditions_to_value(&rule.trigger_conditions)?)
        .bind(actions_to_value(&rule.actions)?)
        .bind(rule.priority)
        .bind(rule.max_executions_per_hour)
        .bind(rule.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?
        .ok_or(EngineError::RuleNotFound(rule.id))?;

        debug!(rule_id = rule.id, "规则已更新");
        WorkflowRule::try_from(row)
    }

    async fn delete_rule(&self, rule_id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_rules
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(rule_id)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::RuleNotFound(rule_id));
        }
        info!(rule_id, "规则已删除");
        Ok(())
    }

    async fn count_recent_executions(&self, rule_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM workflow_rule_executions
            WHERE rule_id = $1 AND executed_at >= $2
            "#,
        )
        .bind(rule_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::db_err)?;

        Ok(count)
    }

    async fn record_execution(&self, rule_id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Self::db_err)?;

        // 计数自增在 SQL 里原子完成，并发记账不丢次数
        let result = sqlx::query(
            r#"
            UPDATE workflow_rules
            SET execution_count = execution_count + 1, last_executed_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(rule_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::RuleNotFound(rule_id));
        }

        sqlx::query(
            r#"
            INSERT INTO workflow_rule_executions (rule_id, executed_at)
            VALUES ($1, $2)
            "#,
        )
        .bind(rule_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        tx.commit().await.map_err(Self::db_err)?;
        Ok(())
    }
}
