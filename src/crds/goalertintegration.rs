//! `GoalertIntegration` Custom Resource Definition

use k8s_openapi::api::core::v1::SecretReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which cluster-lifecycle resource kind this integration selects over.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    /// Namespace-keyed `ClusterDeployment` resources.
    Hive,
    /// `HostedCluster` resources keyed by their own cluster identifier.
    Hypershift,
}

/// `GoalertIntegration` CRD binding a cluster selector to GoAlert escalation policies
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "goalert.managed.io",
    version = "v1alpha1",
    kind = "GoalertIntegration"
)]
#[kube(namespaced)]
#[kube(printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.clusterType"}"#)]
#[kube(printcolumn = r#"{"name":"Prefix","type":"string","jsonPath":".spec.servicePrefix"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct GoalertIntegrationSpec {
    /// Kind of cluster resource this integration manages
    #[serde(rename = "clusterType")]
    pub cluster_type: ClusterType,

    /// Label selector used to find which cluster resources receive a
    /// GoAlert integration based on this configuration
    #[serde(rename = "clusterDeploymentSelector")]
    pub cluster_deployment_selector: LabelSelector,

    /// Name and namespace in the target cluster where the secret is synced
    #[serde(rename = "targetSecretRef")]
    pub target_secret_ref: SecretReference,

    /// ID of a High escalation policy in GoAlert
    #[serde(rename = "highEscalationPolicy")]
    pub high_escalation_policy: String,

    /// ID of a Low escalation policy in GoAlert
    #[serde(rename = "lowEscalationPolicy")]
    pub low_escalation_policy: String,

    /// Prefix to set on the GoAlert service name
    #[serde(rename = "servicePrefix")]
    pub service_prefix: String,

    /// Reference to the secret containing GoAlert credentials
    #[serde(rename = "goalertCredsSecretRef")]
    pub goalert_creds_secret_ref: SecretReference,
}
