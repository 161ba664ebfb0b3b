//! Lifecycle reconciler
//!
//! One reconcile pass maps the integration's cluster scope onto the
//! provisioning and teardown protocols, in a fixed order: load, resolve
//! scope, authenticate, poll heartbeats, handle integration deletion, ensure
//! the integration finalizer, tear down out-of-scope clusters, provision
//! in-scope ones. Which failures abort the pass and which are isolated to a
//! cluster is decided by the policy table.

use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, Resource, ResourceExt};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::crds::{GoalertIntegration, SyncSet};
use crate::goalert::{self, Session};

use super::cluster::ManagedCluster;
use super::policy::{failure_action, FailureAction, Operation};
use super::scope::resolve_scope;
use super::types::{
    finalizer_name, generated_name, load_secret_data, Context, Error, Result, CONFIG_MAP_SUFFIX,
    CONTROLLER_NAME, PASSWORD_SECRET_KEY, SECRET_NAME, USERNAME_SECRET_KEY,
};
use super::{heartbeat, provision, teardown};

#[instrument(skip(ctx), fields(integration = %gi.name_any()))]
pub async fn reconcile_integration(
    gi: Arc<GoalertIntegration>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let start = Instant::now();
    let result = reconcile_pass(&gi, &ctx).await;

    let duration = start.elapsed();
    ctx.metrics
        .observe_reconcile_duration(CONTROLLER_NAME, duration.as_secs_f64());
    info!(?duration, "reconcile complete");

    result
}

async fn reconcile_pass(gi: &GoalertIntegration, ctx: &Context) -> Result<Action> {
    let name = gi.name_any();
    let namespace = gi.namespace().ok_or(Error::MissingObjectKey)?;
    let integrations: Api<GoalertIntegration> = Api::namespaced(ctx.client.clone(), &namespace);

    // Re-read the integration; the watch cache may be stale and a deleted
    // object needs no work.
    let gi = match integrations.get(&name).await {
        Ok(gi) => gi,
        Err(kube::Error::Api(response)) if response.code == 404 => {
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };

    let scope = resolve_scope(&ctx.client, &gi).await?;
    info!(
        all = scope.all.len(),
        matching = scope.matching.len(),
        "resolved cluster scope"
    );

    let auth_policy = ctx.config.goalert.auth_failure_policy;
    let session = establish_session(ctx, &gi).await?;
    let gclient = (ctx.goalert)(session);
    let finalizer = finalizer_name(&name);

    // Heartbeat health is observed independently of provisioning decisions.
    for cluster in &scope.matching {
        if let Err(err) =
            heartbeat::check_heartbeat_monitor(ctx, gclient.as_ref(), &gi, cluster).await
        {
            warn!(cluster = %cluster.name(), "failed to check cluster heartbeat monitor: {err}");
            bail_or_continue(Operation::HeartbeatCheck, auth_policy, err)?;
        }
    }

    // Integration deletion cascades to every cluster still holding this
    // integration's finalizer, then releases the integration itself.
    if gi.meta().deletion_timestamp.is_some() {
        if gi.finalizers().iter().any(|f| f == &finalizer) {
            for cluster in &scope.all {
                if cluster.has_finalizer(&finalizer) {
                    if let Err(err) =
                        teardown::handle_delete(ctx, gclient.as_ref(), &gi, cluster).await
                    {
                        error!(
                            cluster = %cluster.name(),
                            "failed to bulk remove cluster services from GoAlert: {err}"
                        );
                        bail_or_continue(
                            Operation::TeardownForIntegrationDeletion,
                            auth_policy,
                            err,
                        )?;
                    }
                }
            }

            let remaining: Vec<String> = gi
                .finalizers()
                .iter()
                .filter(|f| f.as_str() != finalizer)
                .cloned()
                .collect();
            patch_integration_finalizers(&integrations, &gi, remaining).await?;
        }
        return Ok(Action::await_change());
    }

    // The integration's own finalizer blocks its deletion until the cascade
    // above has run.
    if !gi.finalizers().iter().any(|f| f == &finalizer) {
        let mut finalizers: Vec<String> = gi.finalizers().to_vec();
        finalizers.push(finalizer.clone());
        if let Err(err) = patch_integration_finalizers(&integrations, &gi, finalizers).await {
            bail_or_continue(Operation::EnsureIntegrationFinalizer, auth_policy, err)?;
        }
    }

    // Clusters that are deleting, or that dropped out of the selector, get
    // torn down. A deleting cluster must not lose its teardown retry, so
    // those failures abort the pass; unmatched-cluster failures are isolated.
    for cluster in &scope.all {
        if !cluster.has_finalizer(&finalizer) {
            continue;
        }

        if cluster.is_deleting() {
            if let Err(err) = teardown::handle_delete(ctx, gclient.as_ref(), &gi, cluster).await {
                error!(
                    cluster = %cluster.name(),
                    "failed to remove cluster services from GoAlert: {err}"
                );
                bail_or_continue(Operation::TeardownDeletingCluster, auth_policy, err)?;
            }
            continue;
        }

        if !scope.is_matching(cluster) {
            info!(
                cluster = %cluster.name(),
                "cleaning up cluster as it no longer has a matching label"
            );
            if let Err(err) = teardown::handle_delete(ctx, gclient.as_ref(), &gi, cluster).await {
                error!(
                    cluster = %cluster.name(),
                    "unmatched cluster, failed to remove associated goalert service: {err}"
                );
                bail_or_continue(Operation::TeardownUnmatchedCluster, auth_policy, err)?;
            }
        }
    }

    // Provision (or repair) every in-scope cluster missing any of its three
    // artifacts. One broken cluster does not block the rest.
    for cluster in &scope.matching {
        let artifacts = provisioned_artifacts(ctx, &gi, cluster).await?;
        if artifacts.fully_provisioned() {
            continue;
        }
        if let Err(err) = provision::handle_create(ctx, gclient.as_ref(), &gi, cluster).await {
            error!(
                cluster = %cluster.name(),
                "failed to register cluster with GoAlert: {err}"
            );
            bail_or_continue(Operation::ProvisionCluster, auth_policy, err)?;
        }
    }

    Ok(Action::await_change())
}

/// Apply the failure policy table to one failed operation: abort the pass or
/// swallow the (already logged) error and continue.
fn bail_or_continue(
    op: Operation,
    auth_policy: crate::config::AuthFailurePolicy,
    err: Error,
) -> Result<()> {
    match failure_action(op, auth_policy) {
        FailureAction::AbortPass => Err(err),
        FailureAction::SkipAndContinue => Ok(()),
    }
}

/// Presence of the three per-cluster artifacts.
struct ProvisionedArtifacts {
    state_record: bool,
    secret: bool,
    syncset: bool,
}

impl ProvisionedArtifacts {
    fn fully_provisioned(&self) -> bool {
        self.state_record && self.secret && self.syncset
    }
}

async fn provisioned_artifacts(
    ctx: &Context,
    gi: &GoalertIntegration,
    cluster: &ManagedCluster,
) -> Result<ProvisionedArtifacts> {
    let namespace = cluster.namespace();
    let cm_name = generated_name(&gi.spec.service_prefix, &cluster.name(), CONFIG_MAP_SUFFIX);

    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &namespace);
    let state_record = exists(configmaps.get(&cm_name).await)?;

    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
    let secret = exists(secrets.get(SECRET_NAME).await)?;

    let syncsets: Api<SyncSet> = Api::namespaced(ctx.client.clone(), &namespace);
    let syncset = exists(syncsets.get(SECRET_NAME).await)?;

    Ok(ProvisionedArtifacts {
        state_record,
        secret,
        syncset,
    })
}

fn exists<T>(result: std::result::Result<T, kube::Error>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Load credentials and perform the authentication exchange, honoring the
/// configured failure policy. `Ok(None)` means the pass continues degraded.
async fn establish_session(ctx: &Context, gi: &GoalertIntegration) -> Result<Option<Session>> {
    let auth_policy = ctx.config.goalert.auth_failure_policy;
    let secret_ref = &gi.spec.goalert_creds_secret_ref;
    let secret_name = secret_ref.name.as_deref().unwrap_or_default();
    let secret_namespace = secret_ref.namespace.as_deref().unwrap_or_default();

    let credentials = async {
        let username = load_secret_data(
            &ctx.client,
            secret_name,
            secret_namespace,
            USERNAME_SECRET_KEY,
        )
        .await?;
        let password = load_secret_data(
            &ctx.client,
            secret_name,
            secret_namespace,
            PASSWORD_SECRET_KEY,
        )
        .await?;
        Ok::<_, Error>((username, password))
    }
    .await;

    let (username, password) = match credentials {
        Ok(credentials) => credentials,
        Err(err) => {
            error!("failed to load GoAlert credentials from referenced secret: {err}");
            return match failure_action(Operation::LoadCredentials, auth_policy) {
                FailureAction::AbortPass => Err(err),
                FailureAction::SkipAndContinue => Ok(None),
            };
        }
    };

    let timeout = std::time::Duration::from_secs(ctx.config.goalert.request_timeout_seconds);
    match goalert::authenticate(&ctx.config.goalert.endpoint, &username, &password, timeout).await {
        Ok(session) => Ok(Some(session)),
        Err(err) => {
            error!("failed to authenticate to GoAlert: {err}");
            match failure_action(Operation::Authenticate, auth_policy) {
                FailureAction::AbortPass => Err(Error::AuthError(err.to_string())),
                FailureAction::SkipAndContinue => Ok(None),
            }
        }
    }
}

/// Merge-patch the integration's finalizer list, guarded by the observed
/// resourceVersion.
async fn patch_integration_finalizers(
    integrations: &Api<GoalertIntegration>,
    gi: &GoalertIntegration,
    finalizers: Vec<String>,
) -> Result<()> {
    let patch = json!({
        "metadata": {
            "resourceVersion": gi.meta().resource_version,
            "finalizers": finalizers,
        }
    });
    integrations
        .patch(&gi.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifacts_must_all_be_present() {
        let full = ProvisionedArtifacts {
            state_record: true,
            secret: true,
            syncset: true,
        };
        assert!(full.fully_provisioned());

        for (state_record, secret, syncset) in [
            (false, true, true),
            (true, false, true),
            (true, true, false),
        ] {
            let drifted = ProvisionedArtifacts {
                state_record,
                secret,
                syncset,
            };
            assert!(!drifted.fully_provisioned());
        }
    }

    #[test]
    fn not_found_is_an_existence_signal_not_an_error() {
        let missing: std::result::Result<(), kube::Error> =
            Err(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "not found".to_string(),
                reason: "NotFound".to_string(),
                code: 404,
            }));
        assert!(!exists(missing).unwrap());

        let forbidden: std::result::Result<(), kube::Error> =
            Err(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "forbidden".to_string(),
                reason: "Forbidden".to_string(),
                code: 403,
            }));
        assert!(exists(forbidden).is_err());
    }
}
