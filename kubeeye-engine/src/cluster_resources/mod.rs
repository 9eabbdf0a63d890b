//! Analyzers for cluster-scoped kinds

pub mod nodes;
pub mod webhooks;
