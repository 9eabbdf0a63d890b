//! Networking analyzers

pub mod ingress;
pub mod network_policies;
pub mod services;
