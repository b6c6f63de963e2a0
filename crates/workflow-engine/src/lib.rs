//! InventorySync 工作流引擎
//!
//! 编排层：接收事件信封，从规则存储选出候选规则，按优先级评估条件、
//! 执行动作并记录执行统计。核心语义见 workflow-core；PostgreSQL 存储
//! 实现见 workflow-store-postgres。
//!
//! 协作方以 trait 注入：
//! - [`store::RuleStore`] — 规则持久化与滚动窗口执行计数
//! - [`sinks::ActionSink`] — 按动作类型注册的副作用出口
//! - [`clock::Clock`] — 时间源，测试时可固定

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod sinks;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{TestRuleOutcome, WorkflowEngine};
pub use error::{EngineError, Result};
pub use executor::ActionExecutor;
pub use sinks::{ActionSink, SinkRegistry};
pub use store::{MemoryRuleStore, RuleStore};
