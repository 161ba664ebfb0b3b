//! Scope resolution
//!
//! Computes which managed clusters an integration is responsible for. The
//! label selector is compiled and validated before any matching happens; an
//! invalid selector fails the whole reconcile pass.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::crds::{ClusterDeployment, ClusterType, GoalertIntegration, HostedCluster};

use super::cluster::ManagedCluster;
use super::types::{Error, Result};

/// All clusters known to the system plus the subset in scope of one
/// integration (label match and no deletion timestamp).
pub struct ClusterScope {
    pub all: Vec<ManagedCluster>,
    pub matching: Vec<ManagedCluster>,
}

impl ClusterScope {
    pub fn is_matching(&self, cluster: &ManagedCluster) -> bool {
        self.matching.iter().any(|m| m.same_object(cluster))
    }
}

/// List every cluster of the integration's kind and split out the in-scope
/// subset. No side effects.
pub async fn resolve_scope(client: &Client, gi: &GoalertIntegration) -> Result<ClusterScope> {
    let selector = CompiledSelector::compile(&gi.spec.cluster_deployment_selector)?;

    let all = match gi.spec.cluster_type {
        ClusterType::Hive => {
            let api: Api<ClusterDeployment> = Api::all(client.clone());
            api.list(&ListParams::default())
                .await?
                .items
                .into_iter()
                .map(ManagedCluster::Hive)
                .collect::<Vec<_>>()
        }
        ClusterType::Hypershift => {
            let api: Api<HostedCluster> = Api::all(client.clone());
            api.list(&ListParams::default())
                .await?
                .items
                .into_iter()
                .map(ManagedCluster::Hosted)
                .collect::<Vec<_>>()
        }
    };

    let matching = all
        .iter()
        .filter(|cluster| !cluster.is_deleting() && selector.matches(cluster.labels()))
        .cloned()
        .collect();

    Ok(ClusterScope { all, matching })
}

#[derive(Debug, PartialEq, Eq)]
enum Requirement {
    In { key: String, values: Vec<String> },
    NotIn { key: String, values: Vec<String> },
    Exists { key: String },
    DoesNotExist { key: String },
}

/// A validated label selector. An empty selector matches everything.
#[derive(Debug, Default)]
pub struct CompiledSelector {
    requirements: Vec<Requirement>,
}

impl CompiledSelector {
    pub fn compile(selector: &LabelSelector) -> Result<Self> {
        let mut requirements = Vec::new();

        if let Some(match_labels) = &selector.match_labels {
            for (key, value) in match_labels {
                requirements.push(Requirement::In {
                    key: key.clone(),
                    values: vec![value.clone()],
                });
            }
        }

        for expr in selector.match_expressions.iter().flatten() {
            if expr.key.is_empty() {
                return Err(Error::SelectorError(
                    "match expression key must not be empty".to_string(),
                ));
            }
            let values = expr.values.clone().unwrap_or_default();
            let requirement = match expr.operator.as_str() {
                "In" | "NotIn" => {
                    if values.is_empty() {
                        return Err(Error::SelectorError(format!(
                            "operator {:?} on key {:?} requires at least one value",
                            expr.operator, expr.key
                        )));
                    }
                    if expr.operator == "In" {
                        Requirement::In {
                            key: expr.key.clone(),
                            values,
                        }
                    } else {
                        Requirement::NotIn {
                            key: expr.key.clone(),
                            values,
                        }
                    }
                }
                "Exists" | "DoesNotExist" => {
                    if !values.is_empty() {
                        return Err(Error::SelectorError(format!(
                            "operator {:?} on key {:?} must not carry values",
                            expr.operator, expr.key
                        )));
                    }
                    if expr.operator == "Exists" {
                        Requirement::Exists {
                            key: expr.key.clone(),
                        }
                    } else {
                        Requirement::DoesNotExist {
                            key: expr.key.clone(),
                        }
                    }
                }
                other => {
                    return Err(Error::SelectorError(format!(
                        "unknown operator {other:?} on key {:?}",
                        expr.key
                    )));
                }
            };
            requirements.push(requirement);
        }

        Ok(Self { requirements })
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::In { key, values } => labels
                .get(key)
                .is_some_and(|value| values.contains(value)),
            Requirement::NotIn { key, values } => labels
                .get(key)
                .map_or(true, |value| !values.contains(value)),
            Requirement::Exists { key } => labels.contains_key(key),
            Requirement::DoesNotExist { key } => !labels.contains_key(key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::cluster::test_support::hive_cluster;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn selector_with_expr(key: &str, operator: &str, values: Option<Vec<&str>>) -> LabelSelector {
        LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: key.to_string(),
                operator: operator.to_string(),
                values: values.map(|vs| vs.into_iter().map(String::from).collect()),
            }]),
        }
    }

    #[test]
    fn empty_selector_matches_everything() {
        let compiled = CompiledSelector::compile(&LabelSelector::default()).unwrap();
        assert!(compiled.matches(&labels(&[])));
        assert!(compiled.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn match_labels_require_equality() {
        let selector = LabelSelector {
            match_labels: Some(labels(&[("env", "prod")])),
            match_expressions: None,
        };
        let compiled = CompiledSelector::compile(&selector).unwrap();
        assert!(compiled.matches(&labels(&[("env", "prod"), ("region", "us")])));
        assert!(!compiled.matches(&labels(&[("env", "dev")])));
        assert!(!compiled.matches(&labels(&[])));
    }

    #[test]
    fn not_in_matches_absent_or_different() {
        let compiled =
            CompiledSelector::compile(&selector_with_expr("env", "NotIn", Some(vec!["dev"])))
                .unwrap();
        assert!(compiled.matches(&labels(&[("env", "prod")])));
        assert!(compiled.matches(&labels(&[])));
        assert!(!compiled.matches(&labels(&[("env", "dev")])));
    }

    #[test]
    fn exists_and_does_not_exist() {
        let exists =
            CompiledSelector::compile(&selector_with_expr("env", "Exists", None)).unwrap();
        assert!(exists.matches(&labels(&[("env", "anything")])));
        assert!(!exists.matches(&labels(&[])));

        let absent =
            CompiledSelector::compile(&selector_with_expr("env", "DoesNotExist", None)).unwrap();
        assert!(absent.matches(&labels(&[])));
        assert!(!absent.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn in_without_values_is_invalid() {
        let err = CompiledSelector::compile(&selector_with_expr("env", "In", Some(vec![])))
            .unwrap_err();
        assert!(matches!(err, Error::SelectorError(_)));
    }

    #[test]
    fn exists_with_values_is_invalid() {
        let err =
            CompiledSelector::compile(&selector_with_expr("env", "Exists", Some(vec!["prod"])))
                .unwrap_err();
        assert!(matches!(err, Error::SelectorError(_)));
    }

    #[test]
    fn unknown_operator_is_invalid() {
        let err =
            CompiledSelector::compile(&selector_with_expr("env", "GreaterThan", Some(vec!["1"])))
                .unwrap_err();
        assert!(matches!(err, Error::SelectorError(_)));
    }

    #[test]
    fn scope_membership_check_compares_objects() {
        let foo = hive_cluster("foo", "uhc-a-1", &[("env", "prod")], &[], false);
        let bar = hive_cluster("bar", "uhc-b-2", &[("env", "dev")], &[], false);
        let scope = ClusterScope {
            all: vec![foo.clone(), bar.clone()],
            matching: vec![foo.clone()],
        };
        assert!(scope.is_matching(&foo));
        assert!(!scope.is_matching(&bar));
    }
}
