//! Engine-side types
//!
//! Query parameters, discovery snapshots and metrics samples exchanged with
//! the cluster seams in [`crate::api`].

use serde::{Deserialize, Serialize};

/// Label and field selectors for a list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to objects matching a label selector; empty input is ignored
    pub fn labels(mut self, selector: &str) -> Self {
        if !selector.is_empty() {
            self.label_selector = Some(selector.to_string());
        }
        self
    }

    /// Append a field selector term, joined with commas
    pub fn fields(mut self, selector: &str) -> Self {
        if selector.is_empty() {
            return self;
        }
        self.field_selector = Some(match self.field_selector.take() {
            Some(existing) => format!("{},{}", existing, selector),
            None => selector.to_string(),
        });
        self
    }

    pub fn to_list_params(&self) -> kube::api::ListParams {
        let mut params = kube::api::ListParams::default();
        if let Some(labels) = &self.label_selector {
            params = params.labels(labels);
        }
        if let Some(fields) = &self.field_selector {
            params = params.fields(fields);
        }
        params
    }
}

/// Which objects an analyzer inspects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisScope {
    /// `None` means all namespaces; ignored for cluster-scoped kinds
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub label_selector: Option<String>,
}

impl AnalysisScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn namespace_ref(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// List query for the primary objects of an analyzer
    pub fn list_query(&self) -> ListQuery {
        let mut query = ListQuery::new();
        if let Some(labels) = &self.label_selector {
            query = query.labels(labels);
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            query = query.fields(&format!("metadata.name={}", name));
        }
        query
    }
}

/// An API group as advertised by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGroupInfo {
    /// Empty for the core group
    pub name: String,
    pub versions: Vec<String>,
    pub preferred_version: Option<String>,
}

impl ApiGroupInfo {
    pub fn group_version(&self, version: &str) -> String {
        if self.name.is_empty() {
            version.to_string()
        } else {
            format!("{}/{}", self.name, version)
        }
    }
}

/// A resource served under one group/version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResourceInfo {
    /// Plural resource name, e.g. `deployments` or `pods/log`
    pub name: String,
    pub singular_name: String,
    pub kind: String,
    pub namespaced: bool,
    #[serde(default)]
    pub short_names: Vec<String>,
}

impl ApiResourceInfo {
    pub fn is_subresource(&self) -> bool {
        self.name.contains('/')
    }
}

/// Usage sample for a single pod from metrics.k8s.io
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMetrics {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerMetrics>,
    pub timestamp: String,
}

/// Usage sample for a single container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    /// Raw quantity such as `250m` or `1`
    pub cpu_usage: String,
    /// Raw quantity such as `128Mi`
    pub memory_usage: String,
}

/// Lines returned from the end of a container log unless told otherwise
pub const DEFAULT_LOG_TAIL_LINES: i64 = 200;

/// Options for a pod log fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodLogQuery {
    /// Required when the pod runs more than one container
    pub container: Option<String>,
    /// `None` returns the whole log
    pub tail_lines: Option<i64>,
    /// Logs of the previous, terminated instance
    pub previous: bool,
}

impl Default for PodLogQuery {
    fn default() -> Self {
        Self {
            container: None,
            tail_lines: Some(DEFAULT_LOG_TAIL_LINES),
            previous: false,
        }
    }
}

impl PodLogQuery {
    pub fn to_log_params(&self) -> kube::api::LogParams {
        kube::api::LogParams {
            container: self.container.clone(),
            tail_lines: self.tail_lines,
            previous: self.previous,
            ..Default::default()
        }
    }
}
