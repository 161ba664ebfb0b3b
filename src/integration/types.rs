//! Shared types for the `GoalertIntegration` controller

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;

use crate::config::OperatorConfig;
use crate::goalert::{GoAlert, GoAlertError, Session};
use crate::metrics::MetricsSink;

/// Name of the controller, used in logs and metric labels.
pub const CONTROLLER_NAME: &str = "goalertintegration";

/// Key of the GoAlert username in the referenced credentials secret.
pub const USERNAME_SECRET_KEY: &str = "USERNAME";
/// Key of the GoAlert password in the referenced credentials secret.
pub const PASSWORD_SECRET_KEY: &str = "PASSWORD";

/// Credential Secret key holding the high-severity integration URL.
pub const HIGH_URL_SECRET_KEY: &str = "GOALERT_URL_HIGH";
/// Credential Secret key holding the low-severity integration URL.
pub const LOW_URL_SECRET_KEY: &str = "GOALERT_URL_LOW";
/// Credential Secret key holding the heartbeat URL.
pub const HEARTBEAT_SECRET_KEY: &str = "GOALERT_HEARTBEAT";

/// State Record key for the high-severity service id.
pub const HIGH_SERVICE_ID_KEY: &str = "HIGH_SERVICE_ID";
/// State Record key for the low-severity service id.
pub const LOW_SERVICE_ID_KEY: &str = "LOW_SERVICE_ID";
/// State Record key for the heartbeat monitor id.
pub const HEARTBEAT_MONITOR_ID_KEY: &str = "HEARTBEATMONITOR_ID";

/// Prefix of the per-integration finalizer placed on managed clusters.
pub const FINALIZER_PREFIX: &str = "goalert.managed.io/goalert-";
/// Suffix of the per-cluster State Record ConfigMap.
pub const CONFIG_MAP_SUFFIX: &str = "-goalert-config";
/// Name of the Credential Secret and its propagation SyncSet.
pub const SECRET_NAME: &str = "goalert-secret";
/// Prefix applied to a namespace-keyed cluster's identifier.
pub const CLUSTER_ID_PREFIX: &str = "fedramp-";
/// Integration key type registered for the alert source.
pub const INTEGRATION_KEY_TYPE: &str = "prometheusAlertmanager";
/// Timeout window of provisioned heartbeat monitors, in minutes.
pub const HEARTBEAT_TIMEOUT_MINUTES: u32 = 15;

/// Name of a secondary resource (State Record) generated for a cluster.
pub fn generated_name(service_prefix: &str, cluster_name: &str, suffix: &str) -> String {
    format!("{service_prefix}-{cluster_name}{suffix}")
}

/// Finalizer for one integration instance. More than one integration can own
/// resources for the same cluster; the integration name distinguishes them.
pub fn finalizer_name(integration_name: &str) -> String {
    format!("{FINALIZER_PREFIX}{integration_name}")
}

/// Errors surfaced by the controller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("GoAlert error: {0}")]
    GoAlertError(#[from] GoAlertError),

    #[error("invalid cluster selector: {0}")]
    SelectorError(String),

    #[error("authentication to GoAlert failed: {0}")]
    AuthError(String),

    #[error("missing key {key} in secret {namespace}/{name}")]
    SecretDataError {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("object has no name")]
    MissingObjectKey,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Builds a [`GoAlert`] client for the session of the current pass. Injected
/// so reconciler tests can substitute a mock.
pub type GoAlertFactory = Arc<dyn Fn(Option<Session>) -> Arc<dyn GoAlert> + Send + Sync>;

/// Shared state handed to every reconcile invocation.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub config: Arc<OperatorConfig>,
    pub metrics: Arc<dyn MetricsSink>,
    pub goalert: GoAlertFactory,
}

/// Read one key out of a named secret as UTF-8.
pub async fn load_secret_data(
    client: &Client,
    name: &str,
    namespace: &str,
    key: &str,
) -> Result<String> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets.get(name).await?;

    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key).cloned())
        })
        .ok_or_else(|| Error::SecretDataError {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_joins_prefix_cluster_and_suffix() {
        assert_eq!(
            generated_name("osd", "foo", CONFIG_MAP_SUFFIX),
            "osd-foo-goalert-config"
        );
    }

    #[test]
    fn finalizer_is_scoped_to_the_integration() {
        assert_eq!(
            finalizer_name("prod-alerts"),
            "goalert.managed.io/goalert-prod-alerts"
        );
    }
}
