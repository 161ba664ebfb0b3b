//! Partial schema for Hive's `ClusterDeployment` resource
//!
//! Only the fields this operator reads are modeled; unknown fields are
//! ignored on deserialization so the full Hive schema is not required.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `ClusterDeployment` describes a provisioned cluster record keyed by its namespace
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "hive.openshift.io", version = "v1", kind = "ClusterDeployment")]
#[kube(namespaced)]
pub struct ClusterDeploymentSpec {
    /// Friendly name of the cluster, used as the GoAlert service description
    #[serde(rename = "clusterName")]
    pub cluster_name: String,

    /// Base DNS domain of the cluster
    #[serde(default, rename = "baseDomain", skip_serializing_if = "Option::is_none")]
    pub base_domain: Option<String>,

    /// Whether provisioning of this cluster has completed
    #[serde(default)]
    pub installed: bool,
}
