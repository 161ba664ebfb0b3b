//! Operator configuration
//!
//! Loaded from a mounted YAML file with environment fallbacks, mirroring how
//! the rest of the platform's controllers are configured. Every field has a
//! default so a missing file degrades to a usable configuration as long as
//! the GoAlert endpoint is supplied via `GOALERT_ENDPOINT`.

use serde::{Deserialize, Serialize};

/// Environment variable carrying the GoAlert API endpoint.
pub const GOALERT_ENDPOINT_ENV_VAR: &str = "GOALERT_ENDPOINT";

/// Main operator configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OperatorConfig {
    /// GoAlert backend configuration
    #[serde(default)]
    pub goalert: GoalertConfig,

    /// HTTP surface configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Which managed-cluster kinds the operator watches
    #[serde(default)]
    pub watch: WatchConfig,
}

/// GoAlert backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoalertConfig {
    /// Base URL of the GoAlert API; falls back to `GOALERT_ENDPOINT`
    #[serde(default)]
    pub endpoint: String,

    /// Per-request timeout for GoAlert calls
    #[serde(default = "default_request_timeout", rename = "requestTimeoutSeconds")]
    pub request_timeout_seconds: u64,

    /// What to do with the reconcile pass when authentication fails
    #[serde(default, rename = "authFailurePolicy")]
    pub auth_failure_policy: AuthFailurePolicy,
}

/// Behavior of a reconcile pass whose GoAlert login failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFailurePolicy {
    /// Fail the pass; the framework retries with backoff.
    #[default]
    Abort,
    /// Continue without a session; every GoAlert call fails per-operation and
    /// the per-operation policy applies.
    Degrade,
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Bind address for the health/metrics server
    #[serde(default = "default_bind_addr", rename = "bindAddr")]
    pub bind_addr: String,
}

/// Watch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Watch Hive `ClusterDeployment` resources
    #[serde(default = "default_true", rename = "clusterDeployments")]
    pub cluster_deployments: bool,

    /// Watch HyperShift `HostedCluster` resources
    #[serde(default, rename = "hostedClusters")]
    pub hosted_clusters: bool,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GoalertConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            request_timeout_seconds: default_request_timeout(),
            auth_failure_policy: AuthFailurePolicy::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            cluster_deployments: true,
            hosted_clusters: false,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from a mounted YAML file, then apply environment
    /// fallbacks.
    pub fn from_mounted_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&raw)?;
        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Fill unset fields from the environment.
    pub fn apply_env_fallbacks(&mut self) {
        if self.goalert.endpoint.is_empty() {
            if let Ok(endpoint) = std::env::var(GOALERT_ENDPOINT_ENV_VAR) {
                self.goalert.endpoint = endpoint;
            }
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.goalert.endpoint.is_empty() {
            anyhow::bail!(
                "GoAlert endpoint is not configured; set goalert.endpoint or {GOALERT_ENDPOINT_ENV_VAR}"
            );
        }
        if self.goalert.request_timeout_seconds == 0 {
            anyhow::bail!("goalert.requestTimeoutSeconds must be greater than zero");
        }
        if !self.watch.cluster_deployments && !self.watch.hosted_clusters {
            anyhow::bail!("at least one managed-cluster kind must be watched");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_once_endpoint_is_set() {
        let mut config = OperatorConfig::default();
        assert!(config.validate().is_err());

        config.goalert.endpoint = "https://goalert.example.com".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.goalert.request_timeout_seconds, 30);
        assert_eq!(config.goalert.auth_failure_policy, AuthFailurePolicy::Abort);
        assert!(config.watch.cluster_deployments);
        assert!(!config.watch.hosted_clusters);
    }

    #[test]
    fn yaml_overrides_are_respected() {
        let raw = r#"
goalert:
  endpoint: https://goalert.internal
  requestTimeoutSeconds: 10
  authFailurePolicy: degrade
watch:
  hostedClusters: true
"#;
        let config: OperatorConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.goalert.endpoint, "https://goalert.internal");
        assert_eq!(config.goalert.request_timeout_seconds, 10);
        assert_eq!(
            config.goalert.auth_failure_policy,
            AuthFailurePolicy::Degrade
        );
        assert!(config.watch.hosted_clusters);
        assert!(config.watch.cluster_deployments);
    }

    #[test]
    fn watching_nothing_is_invalid() {
        let mut config = OperatorConfig::default();
        config.goalert.endpoint = "https://goalert.example.com".to_string();
        config.watch.cluster_deployments = false;
        assert!(config.validate().is_err());
    }
}
