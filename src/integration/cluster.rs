//! Capability surface over the two managed-cluster variants
//!
//! The scope resolver and lifecycle reconciler only ever see
//! [`ManagedCluster`]; everything variant-specific (identifier derivation,
//! typed API access for finalizer patches) lives here.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::debug;

use crate::crds::{ClusterDeployment, HostedCluster};

use super::types::{Result, CLUSTER_ID_PREFIX};

/// One managed cluster, behind the capability surface the reconciler needs.
#[derive(Clone, Debug)]
pub enum ManagedCluster {
    /// Namespace-keyed cluster record.
    Hive(ClusterDeployment),
    /// Cluster record keyed by its own identifier field.
    Hosted(HostedCluster),
}

impl ManagedCluster {
    pub fn name(&self) -> String {
        match self {
            Self::Hive(cd) => cd.name_any(),
            Self::Hosted(hc) => hc.name_any(),
        }
    }

    pub fn namespace(&self) -> String {
        match self {
            Self::Hive(cd) => cd.namespace().unwrap_or_default(),
            Self::Hosted(hc) => hc.namespace().unwrap_or_default(),
        }
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Hive(cd) => cd.labels(),
            Self::Hosted(hc) => hc.labels(),
        }
    }

    pub fn is_deleting(&self) -> bool {
        match self {
            Self::Hive(cd) => cd.meta().deletion_timestamp.is_some(),
            Self::Hosted(hc) => hc.meta().deletion_timestamp.is_some(),
        }
    }

    pub fn finalizers(&self) -> &[String] {
        match self {
            Self::Hive(cd) => cd.finalizers(),
            Self::Hosted(hc) => hc.finalizers(),
        }
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Identifier under which GoAlert resources are named.
    ///
    /// Namespace-keyed clusters use a fixed prefix plus the last
    /// hyphen-delimited segment of the namespace; identifier-keyed clusters
    /// use their identifier field verbatim.
    pub fn identifier(&self) -> String {
        match self {
            Self::Hive(cd) => {
                let namespace = cd.namespace().unwrap_or_default();
                let uid = namespace.rsplit('-').next().unwrap_or(&namespace);
                format!("{CLUSTER_ID_PREFIX}{uid}")
            }
            Self::Hosted(hc) => hc.spec.cluster_id.clone(),
        }
    }

    /// Human-readable cluster name used as the GoAlert service description.
    pub fn display_name(&self) -> String {
        match self {
            Self::Hive(cd) => cd.spec.cluster_name.clone(),
            Self::Hosted(hc) => hc.name_any(),
        }
    }

    pub fn same_object(&self, other: &ManagedCluster) -> bool {
        self.name() == other.name() && self.namespace() == other.namespace()
    }

    /// Owner reference so dependent objects are garbage collected with the
    /// cluster once its finalizers clear. `None` until the server assigned a
    /// uid.
    pub fn owner_reference(&self) -> Option<OwnerReference> {
        let (api_version, kind, meta) = match self {
            Self::Hive(cd) => ("hive.openshift.io/v1", "ClusterDeployment", cd.meta()),
            Self::Hosted(hc) => (
                "hypershift.openshift.io/v1beta1",
                "HostedCluster",
                hc.meta(),
            ),
        };

        Some(OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: meta.name.clone()?,
            uid: meta.uid.clone()?,
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }

    /// Attach a finalizer. No-op when already present.
    pub async fn add_finalizer(&self, client: &Client, finalizer: &str) -> Result<()> {
        if self.has_finalizer(finalizer) {
            return Ok(());
        }
        let mut finalizers: Vec<String> = self.finalizers().to_vec();
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(client, finalizers).await
    }

    /// Remove a finalizer. No-op when absent.
    pub async fn remove_finalizer(&self, client: &Client, finalizer: &str) -> Result<()> {
        if !self.has_finalizer(finalizer) {
            return Ok(());
        }
        let finalizers: Vec<String> = self
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != finalizer)
            .cloned()
            .collect();
        self.patch_finalizers(client, finalizers).await
    }

    /// Merge-patch the finalizer list. The observed resourceVersion is
    /// included so concurrent integrations patching the same cluster conflict
    /// instead of clobbering each other.
    async fn patch_finalizers(&self, client: &Client, finalizers: Vec<String>) -> Result<()> {
        let resource_version = match self {
            Self::Hive(cd) => cd.meta().resource_version.clone(),
            Self::Hosted(hc) => hc.meta().resource_version.clone(),
        };

        let patch = json!({
            "metadata": {
                "resourceVersion": resource_version,
                "finalizers": finalizers,
            }
        });

        debug!(
            cluster = %self.name(),
            namespace = %self.namespace(),
            "patching cluster finalizers"
        );

        let params = PatchParams::default();
        match self {
            Self::Hive(cd) => {
                let api: Api<ClusterDeployment> =
                    Api::namespaced(client.clone(), &self.namespace());
                api.patch(&cd.name_any(), &params, &Patch::Merge(&patch))
                    .await?;
            }
            Self::Hosted(hc) => {
                let api: Api<HostedCluster> = Api::namespaced(client.clone(), &self.namespace());
                api.patch(&hc.name_any(), &params, &Patch::Merge(&patch))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::crds::{ClusterDeploymentSpec, HostedClusterSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    pub fn hive_cluster(
        name: &str,
        namespace: &str,
        labels: &[(&str, &str)],
        finalizers: &[&str],
        deleting: bool,
    ) -> ManagedCluster {
        ManagedCluster::Hive(ClusterDeployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: Some("11112222-3333-4444-5555-666677778888".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                finalizers: Some(finalizers.iter().map(|f| (*f).to_string()).collect()),
                deletion_timestamp: deleting
                    .then(|| Time(chrono::Utc::now())),
                ..Default::default()
            },
            spec: ClusterDeploymentSpec {
                cluster_name: name.to_string(),
                base_domain: None,
                installed: true,
            },
        })
    }

    pub fn hosted_cluster(name: &str, namespace: &str, cluster_id: &str) -> ManagedCluster {
        ManagedCluster::Hosted(HostedCluster {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: HostedClusterSpec {
                cluster_id: cluster_id.to_string(),
                infra_id: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{hive_cluster, hosted_cluster};
    use super::*;

    #[test]
    fn hive_identifier_uses_last_namespace_segment() {
        let cluster = hive_cluster("foo", "uhc-production-abc123", &[], &[], false);
        assert_eq!(cluster.identifier(), "fedramp-abc123");
    }

    #[test]
    fn hive_identifier_with_plain_namespace() {
        let cluster = hive_cluster("foo", "production", &[], &[], false);
        assert_eq!(cluster.identifier(), "fedramp-production");
    }

    #[test]
    fn hosted_identifier_is_the_cluster_id_verbatim() {
        let cluster = hosted_cluster("bar", "clusters", "0a1b2c3d");
        assert_eq!(cluster.identifier(), "0a1b2c3d");
        assert_eq!(cluster.display_name(), "bar");
    }

    #[test]
    fn finalizer_membership() {
        let cluster = hive_cluster(
            "foo",
            "uhc-x-1",
            &[],
            &["goalert.managed.io/goalert-prod"],
            false,
        );
        assert!(cluster.has_finalizer("goalert.managed.io/goalert-prod"));
        assert!(!cluster.has_finalizer("goalert.managed.io/goalert-stage"));
    }

    #[test]
    fn owner_reference_points_at_the_cluster() {
        let cluster = hive_cluster("foo", "uhc-x-1", &[], &[], false);
        let oref = cluster.owner_reference().unwrap();
        assert_eq!(oref.kind, "ClusterDeployment");
        assert_eq!(oref.name, "foo");
        assert_eq!(oref.controller, Some(true));
    }

    #[test]
    fn hosted_without_uid_has_no_owner_reference() {
        let cluster = hosted_cluster("bar", "clusters", "id");
        assert!(cluster.owner_reference().is_none());
    }

    #[test]
    fn same_object_compares_name_and_namespace() {
        let a = hive_cluster("foo", "ns-1", &[], &[], false);
        let b = hive_cluster("foo", "ns-1", &[("env", "prod")], &[], false);
        let c = hive_cluster("foo", "ns-2", &[], &[], false);
        assert!(a.same_object(&b));
        assert!(!a.same_object(&c));
    }
}
