mod compaction;
mod config;
mod core;
pub(crate) mod gc;
pub(crate) mod group_commit;
mod health;
mod metrics;
pub(crate) mod mvcc_transaction;
pub mod query;
pub(crate) mod timestamp_oracle;
mod transaction;


pub use compaction::{CompactionConfig, CompactionState};
pub use config::{Config, SyncMode};
pub use core::{GraphDB, HeaderState, IntegrityOptions, IntegrityReport};
pub use group_commit::TxId;
pub use health::{Check, HealthCheck, HealthStatus};
pub use metrics::PerformanceMetrics;
pub use transaction::{Transaction, TxState};
