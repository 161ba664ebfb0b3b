//! Partial schema for HyperShift's `HostedCluster` resource

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `HostedCluster` describes a control-plane-hosted cluster keyed by its own identifier
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "hypershift.openshift.io",
    version = "v1beta1",
    kind = "HostedCluster"
)]
#[kube(namespaced)]
pub struct HostedClusterSpec {
    /// Unique identifier of the hosted cluster, used verbatim as the
    /// GoAlert service identifier
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,

    /// Infrastructure identifier assigned at provisioning time
    #[serde(default, rename = "infraID", skip_serializing_if = "Option::is_none")]
    pub infra_id: Option<String>,
}
