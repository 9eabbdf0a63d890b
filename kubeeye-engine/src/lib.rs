//! kubeeye analysis engine
//!
//! Inspects a live cluster and explains why objects are unhealthy. Each
//! supported kind has an analyzer that lists objects, follows the objects
//! they depend on, applies a fixed rule set and attributes findings to the
//! top-level owning controller.

pub mod api;
pub mod client;
pub mod cluster_resources;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod logging;
pub mod networking;
pub mod observability;
pub mod ownership;
pub mod reasons;
pub mod report;
pub mod resources;
pub mod schedule;
pub mod selectors;
pub mod types;
pub mod workloads;

pub use client::K8sClient;
pub use config::KubeEyeConfig;
pub use engine::HealthEngine;
pub use error::{K8sError, K8sResult};
pub use types::AnalysisScope;
