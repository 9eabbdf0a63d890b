//! Workload analyzers
//!
//! Pods, Deployments, StatefulSets and CronJobs.

pub mod cronjobs;
pub mod deployments;
pub mod pods;
pub mod statefulsets;
