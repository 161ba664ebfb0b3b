//! Cluster-event fan-out
//!
//! When a managed cluster changes, every integration whose selector matches
//! the cluster's labels needs a reconcile. The mapping is a pure function
//! over the controller's reflector store, deduplicated before enqueueing.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

use crate::crds::GoalertIntegration;

use super::scope::CompiledSelector;

/// Integrations whose selector matches the changed cluster's labels.
/// Integrations with invalid selectors are skipped; their own reconcile
/// surfaces the error.
pub fn affected_integrations(
    cluster_labels: &BTreeMap<String, String>,
    integrations: impl IntoIterator<Item = Arc<GoalertIntegration>>,
) -> Vec<ObjectRef<GoalertIntegration>> {
    let mut seen = BTreeSet::new();
    let mut requests = Vec::new();

    for gi in integrations {
        let Ok(selector) = CompiledSelector::compile(&gi.spec.cluster_deployment_selector) else {
            continue;
        };
        if !selector.matches(cluster_labels) {
            continue;
        }

        let name = gi.name_any();
        let namespace = gi.namespace().unwrap_or_default();
        if seen.insert((namespace.clone(), name.clone())) {
            requests.push(ObjectRef::new(&name).within(&namespace));
        }
    }

    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{ClusterType, GoalertIntegrationSpec};
    use k8s_openapi::api::core::v1::SecretReference;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        LabelSelector, LabelSelectorRequirement, ObjectMeta,
    };

    fn integration(name: &str, selector: LabelSelector) -> Arc<GoalertIntegration> {
        Arc::new(GoalertIntegration {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("operators".to_string()),
                ..Default::default()
            },
            spec: GoalertIntegrationSpec {
                cluster_type: ClusterType::Hive,
                cluster_deployment_selector: selector,
                target_secret_ref: SecretReference::default(),
                high_escalation_policy: "hp1".to_string(),
                low_escalation_policy: "lp1".to_string(),
                service_prefix: "osd".to_string(),
                goalert_creds_secret_ref: SecretReference::default(),
            },
        })
    }

    fn selector(key: &str, value: &str) -> LabelSelector {
        LabelSelector {
            match_labels: Some([(key.to_string(), value.to_string())].into()),
            match_expressions: None,
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn only_matching_integrations_are_enqueued() {
        let prod = integration("prod-alerts", selector("env", "prod"));
        let dev = integration("dev-alerts", selector("env", "dev"));

        let requests = affected_integrations(&labels(&[("env", "prod")]), vec![prod, dev]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "prod-alerts");
    }

    #[test]
    fn duplicate_integrations_collapse_to_one_request() {
        let a = integration("prod-alerts", selector("env", "prod"));
        let b = integration("prod-alerts", selector("env", "prod"));

        let requests = affected_integrations(&labels(&[("env", "prod")]), vec![a, b]);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let broken = integration(
            "broken",
            LabelSelector {
                match_labels: None,
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: "env".to_string(),
                    operator: "Bogus".to_string(),
                    values: None,
                }]),
            },
        );
        let ok = integration("prod-alerts", selector("env", "prod"));

        let requests = affected_integrations(&labels(&[("env", "prod")]), vec![broken, ok]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "prod-alerts");
    }

    #[test]
    fn empty_selector_matches_every_cluster() {
        let catch_all = integration("catch-all", LabelSelector::default());
        let requests = affected_integrations(&labels(&[]), vec![catch_all]);
        assert_eq!(requests.len(), 1);
    }
}
