//! Builders for the per-cluster artifacts
//!
//! State Record ConfigMap, Credential Secret, and propagation SyncSet. All
//! three are owned by the managed cluster they describe so cluster deletion
//! cascades to them once the finalizer is removed.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, LocalObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::crds::{
    GoalertIntegration, SecretMapping, SyncSet, SyncSetSecretReference, SyncSetSpec,
};

use super::cluster::ManagedCluster;
use super::types::{
    HEARTBEAT_MONITOR_ID_KEY, HEARTBEAT_SECRET_KEY, HIGH_SERVICE_ID_KEY, HIGH_URL_SECRET_KEY,
    LOW_SERVICE_ID_KEY, LOW_URL_SECRET_KEY, SECRET_NAME,
};

fn owned_metadata(name: &str, cluster: &ManagedCluster) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(cluster.namespace()),
        owner_references: cluster.owner_reference().map(|oref| vec![oref]),
        ..Default::default()
    }
}

/// State Record holding the external identifiers produced by provisioning.
pub fn state_configmap(
    cluster: &ManagedCluster,
    name: &str,
    high_service_id: &str,
    low_service_id: &str,
    heartbeat_monitor_id: &str,
) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(HIGH_SERVICE_ID_KEY.to_string(), high_service_id.to_string());
    data.insert(LOW_SERVICE_ID_KEY.to_string(), low_service_id.to_string());
    data.insert(
        HEARTBEAT_MONITOR_ID_KEY.to_string(),
        heartbeat_monitor_id.to_string(),
    );

    ConfigMap {
        metadata: owned_metadata(name, cluster),
        data: Some(data),
        ..Default::default()
    }
}

/// Credential Secret delivered to the target cluster.
pub fn credential_secret(
    cluster: &ManagedCluster,
    high_integration_key: &str,
    low_integration_key: &str,
    heartbeat_key: &str,
) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        HIGH_URL_SECRET_KEY.to_string(),
        high_integration_key.to_string(),
    );
    data.insert(
        LOW_URL_SECRET_KEY.to_string(),
        low_integration_key.to_string(),
    );
    data.insert(HEARTBEAT_SECRET_KEY.to_string(), heartbeat_key.to_string());

    Secret {
        metadata: owned_metadata(SECRET_NAME, cluster),
        type_: Some("Opaque".to_string()),
        string_data: Some(data),
        ..Default::default()
    }
}

/// SyncSet instructing the fleet-management plane to copy the Credential
/// Secret into the target cluster.
pub fn propagation_syncset(cluster: &ManagedCluster, gi: &GoalertIntegration) -> SyncSet {
    SyncSet {
        metadata: owned_metadata(SECRET_NAME, cluster),
        spec: SyncSetSpec {
            cluster_deployment_refs: vec![LocalObjectReference {
                name: Some(cluster.name()),
            }],
            resource_apply_mode: Some("Sync".to_string()),
            secret_mappings: vec![SecretMapping {
                source_ref: SyncSetSecretReference {
                    name: SECRET_NAME.to_string(),
                    namespace: Some(cluster.namespace()),
                },
                target_ref: SyncSetSecretReference {
                    name: gi.spec.target_secret_ref.name.clone().unwrap_or_default(),
                    namespace: gi.spec.target_secret_ref.namespace.clone(),
                },
            }],
        },
    }
}

/// Whether an existing Credential Secret's stored keys differ from the
/// freshly computed values. The backend offers no partial update here, so a
/// difference means delete-and-recreate.
pub fn secret_needs_replacement(
    existing: &Secret,
    high_integration_key: &str,
    low_integration_key: &str,
    heartbeat_key: &str,
) -> bool {
    let stored = |key: &str| -> String {
        existing
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
            .or_else(|| {
                existing
                    .string_data
                    .as_ref()
                    .and_then(|data| data.get(key).cloned())
            })
            .unwrap_or_default()
    };

    stored(HIGH_URL_SECRET_KEY) != high_integration_key
        || stored(LOW_URL_SECRET_KEY) != low_integration_key
        || stored(HEARTBEAT_SECRET_KEY) != heartbeat_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{ClusterType, GoalertIntegrationSpec};
    use crate::integration::cluster::test_support::hive_cluster;
    use k8s_openapi::api::core::v1::SecretReference;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
    use k8s_openapi::ByteString;

    fn integration() -> GoalertIntegration {
        GoalertIntegration {
            metadata: ObjectMeta {
                name: Some("prod-alerts".to_string()),
                namespace: Some("operators".to_string()),
                ..Default::default()
            },
            spec: GoalertIntegrationSpec {
                cluster_type: ClusterType::Hive,
                cluster_deployment_selector: LabelSelector::default(),
                target_secret_ref: SecretReference {
                    name: Some("goalert-secret".to_string()),
                    namespace: Some("openshift-monitoring".to_string()),
                },
                high_escalation_policy: "hp1".to_string(),
                low_escalation_policy: "lp1".to_string(),
                service_prefix: "osd".to_string(),
                goalert_creds_secret_ref: SecretReference {
                    name: Some("goalert-creds".to_string()),
                    namespace: Some("operators".to_string()),
                },
            },
        }
    }

    #[test]
    fn state_configmap_carries_the_three_ids() {
        let cluster = hive_cluster("foo", "uhc-x-1", &[], &[], false);
        let cm = state_configmap(&cluster, "osd-foo-goalert-config", "h1", "l1", "m1");

        assert_eq!(cm.metadata.name.as_deref(), Some("osd-foo-goalert-config"));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("uhc-x-1"));
        let data = cm.data.unwrap();
        assert_eq!(data.get(HIGH_SERVICE_ID_KEY).map(String::as_str), Some("h1"));
        assert_eq!(data.get(LOW_SERVICE_ID_KEY).map(String::as_str), Some("l1"));
        assert_eq!(
            data.get(HEARTBEAT_MONITOR_ID_KEY).map(String::as_str),
            Some("m1")
        );
        assert!(cm.metadata.owner_references.is_some());
    }

    #[test]
    fn credential_secret_holds_all_three_keys() {
        let cluster = hive_cluster("foo", "uhc-x-1", &[], &[], false);
        let secret = credential_secret(&cluster, "high-key", "low-key", "hb-key");

        assert_eq!(secret.metadata.name.as_deref(), Some(SECRET_NAME));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        let data = secret.string_data.unwrap();
        assert_eq!(data.get(HIGH_URL_SECRET_KEY).map(String::as_str), Some("high-key"));
        assert_eq!(data.get(LOW_URL_SECRET_KEY).map(String::as_str), Some("low-key"));
        assert_eq!(data.get(HEARTBEAT_SECRET_KEY).map(String::as_str), Some("hb-key"));
    }

    #[test]
    fn syncset_maps_the_secret_to_the_target_ref() {
        let cluster = hive_cluster("foo", "uhc-x-1", &[], &[], false);
        let ss = propagation_syncset(&cluster, &integration());

        assert_eq!(ss.metadata.name.as_deref(), Some(SECRET_NAME));
        assert_eq!(
            ss.spec.cluster_deployment_refs[0].name.as_deref(),
            Some("foo")
        );
        assert_eq!(ss.spec.resource_apply_mode.as_deref(), Some("Sync"));
        let mapping = &ss.spec.secret_mappings[0];
        assert_eq!(mapping.source_ref.name, SECRET_NAME);
        assert_eq!(mapping.source_ref.namespace.as_deref(), Some("uhc-x-1"));
        assert_eq!(mapping.target_ref.name, "goalert-secret");
        assert_eq!(
            mapping.target_ref.namespace.as_deref(),
            Some("openshift-monitoring")
        );
    }

    #[test]
    fn secret_comparison_detects_changed_keys() {
        let mut data = BTreeMap::new();
        data.insert(
            HIGH_URL_SECRET_KEY.to_string(),
            ByteString(b"high-key".to_vec()),
        );
        data.insert(
            LOW_URL_SECRET_KEY.to_string(),
            ByteString(b"low-key".to_vec()),
        );
        data.insert(
            HEARTBEAT_SECRET_KEY.to_string(),
            ByteString(b"hb-key".to_vec()),
        );
        let existing = Secret {
            data: Some(data),
            ..Default::default()
        };

        assert!(!secret_needs_replacement(
            &existing, "high-key", "low-key", "hb-key"
        ));
        assert!(secret_needs_replacement(
            &existing, "high-key", "rotated", "hb-key"
        ));
    }

    #[test]
    fn secret_with_no_data_always_needs_replacement() {
        let existing = Secret::default();
        assert!(secret_needs_replacement(&existing, "h", "l", "hb"));
    }
}
