//! Partial schema for Hive's `SyncSet` resource
//!
//! A `SyncSet` instructs the fleet-management plane to copy resources into a
//! target cluster. This operator only ever creates secret mappings, so only
//! that slice of the schema is modeled.

use k8s_openapi::api::core::v1::LocalObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source or target of a secret mapping
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct SyncSetSecretReference {
    /// Name of the secret
    pub name: String,

    /// Namespace of the secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Instruction to copy one secret from the control plane into the target cluster
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct SecretMapping {
    /// Secret to copy from
    #[serde(rename = "sourceRef")]
    pub source_ref: SyncSetSecretReference,

    /// Location the secret is written to in the target cluster
    #[serde(rename = "targetRef")]
    pub target_ref: SyncSetSecretReference,
}

/// `SyncSet` propagates resources to the clusters it references
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "hive.openshift.io", version = "v1", kind = "SyncSet")]
#[kube(namespaced)]
pub struct SyncSetSpec {
    /// Clusters this `SyncSet` applies to
    #[serde(rename = "clusterDeploymentRefs")]
    pub cluster_deployment_refs: Vec<LocalObjectReference>,

    /// Apply mode; `Sync` keeps the target in step with the source
    #[serde(
        default,
        rename = "resourceApplyMode",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_apply_mode: Option<String>,

    /// Secrets copied into the target cluster
    #[serde(default, rename = "secretMappings", skip_serializing_if = "Vec::is_empty")]
    pub secret_mappings: Vec<SecretMapping>,
}
