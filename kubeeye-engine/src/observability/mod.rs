//! Observability helpers
//!
//! - Events: latest event lookups used by the analyzers
//! - Logs: container log tails
//! - Metrics: metrics.k8s.io sample parsing and per-workload usage sums

pub mod events;
pub mod logs;
pub mod metrics;
