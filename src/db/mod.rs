mod compaction;
mod config;
mod core;
pub(crate) mod group_commit;
mod health;
mod metrics;
mod transaction;

#[cfg(test)]
mod tests;

pub use compaction::{CompactionConfig, CompactionState};
pub use config::{Config, SyncMode};
pub use core::{GraphDB, HeaderState, IntegrityOptions, IntegrityReport};
pub use group_commit::TxId;
pub use health::{Check, HealthCheck, HealthStatus};
pub use metrics::PerformanceMetrics;
pub use transaction::{Transaction, TxState};
