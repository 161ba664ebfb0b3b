//! Provisioning protocol
//!
//! Idempotent create sequence for one cluster: service pair, integration
//! keys, heartbeat monitor, State Record, Credential Secret, propagation
//! SyncSet. Every step creates only what is absent; a failure aborts the
//! remaining steps for this cluster and the next pass verifies again.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{DeleteParams, PostParams};
use kube::{Api, ResourceExt};
use tracing::{error, info};

use crate::crds::{GoalertIntegration, SyncSet};
use crate::goalert::{GoAlert, ServiceInput};

use super::cluster::ManagedCluster;
use super::resources::{
    credential_secret, propagation_syncset, secret_needs_replacement, state_configmap,
};
use super::types::{
    finalizer_name, generated_name, Context, Result, CONFIG_MAP_SUFFIX,
    HEARTBEAT_TIMEOUT_MINUTES, INTEGRATION_KEY_TYPE, SECRET_NAME,
};

/// Register one cluster with GoAlert and persist the resulting identifiers.
pub async fn handle_create(
    ctx: &Context,
    gclient: &dyn GoAlert,
    gi: &GoalertIntegration,
    cluster: &ManagedCluster,
) -> Result<()> {
    let finalizer = finalizer_name(&gi.name_any());

    // The finalizer gates deletion ordering and must be observed before any
    // external state exists. Provisioning happens on the next pass.
    if !cluster.has_finalizer(&finalizer) {
        info!(cluster = %cluster.name(), "attaching finalizer, deferring provisioning");
        return cluster.add_finalizer(&ctx.client, &finalizer).await;
    }

    let identifier = cluster.identifier();
    let display_name = cluster.display_name();

    let high_service = ServiceInput {
        name: format!("{identifier} - High"),
        description: display_name.clone(),
        favorite: true,
        escalation_policy_id: gi.spec.high_escalation_policy.clone(),
    };
    let low_service = ServiceInput {
        name: format!("{identifier} - Low"),
        description: display_name,
        favorite: true,
        escalation_policy_id: gi.spec.low_escalation_policy.clone(),
    };

    let high_service_id = match gclient.create_service(&high_service).await {
        Ok(id) => id,
        Err(err) => {
            error!(service = %high_service.name, "failed to create service for High alerts: {err}");
            ctx.metrics.set_create_failure(&high_service.name);
            return Err(err.into());
        }
    };
    let low_service_id = match gclient.create_service(&low_service).await {
        Ok(id) => id,
        Err(err) => {
            error!(service = %low_service.name, "failed to create service for Low alerts: {err}");
            ctx.metrics.set_create_failure(&low_service.name);
            return Err(err.into());
        }
    };

    let high_integration_key = gclient
        .create_integration_key(&high_service_id, INTEGRATION_KEY_TYPE, "High alerts")
        .await?;
    let low_integration_key = gclient
        .create_integration_key(&low_service_id, INTEGRATION_KEY_TYPE, "Low alerts")
        .await?;

    let monitor = gclient
        .create_heartbeat_monitor(&high_service_id, &identifier, HEARTBEAT_TIMEOUT_MINUTES)
        .await?;

    if !high_service_id.is_empty() && !low_service_id.is_empty() {
        persist_state_record(ctx, gi, cluster, &high_service_id, &low_service_id, &monitor.id)
            .await?;
    }

    ensure_credential_secret(
        ctx,
        cluster,
        &high_integration_key,
        &low_integration_key,
        &monitor.key,
    )
    .await?;

    ensure_syncset(ctx, gi, cluster).await?;

    Ok(())
}

/// Create-or-update the State Record ConfigMap.
async fn persist_state_record(
    ctx: &Context,
    gi: &GoalertIntegration,
    cluster: &ManagedCluster,
    high_service_id: &str,
    low_service_id: &str,
    monitor_id: &str,
) -> Result<()> {
    let cm_name = generated_name(&gi.spec.service_prefix, &cluster.name(), CONFIG_MAP_SUFFIX);
    let configmap = state_configmap(cluster, &cm_name, high_service_id, low_service_id, monitor_id);

    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &cluster.namespace());
    match configmaps.create(&PostParams::default(), &configmap).await {
        Ok(_) => {
            info!(configmap = %cm_name, cluster = %cluster.name(), "created state record");
            Ok(())
        }
        Err(kube::Error::Api(response)) if response.code == 409 => {
            configmaps
                .replace(&cm_name, &PostParams::default(), &configmap)
                .await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create the Credential Secret, replacing it wholesale when its stored keys
/// differ from the freshly computed values.
async fn ensure_credential_secret(
    ctx: &Context,
    cluster: &ManagedCluster,
    high_integration_key: &str,
    low_integration_key: &str,
    heartbeat_key: &str,
) -> Result<()> {
    let secret = credential_secret(
        cluster,
        high_integration_key,
        low_integration_key,
        heartbeat_key,
    );

    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &cluster.namespace());
    match secrets.create(&PostParams::default(), &secret).await {
        Ok(_) => {
            info!(namespace = %cluster.namespace(), "created goalert secret");
            Ok(())
        }
        Err(kube::Error::Api(response)) if response.code == 409 => {
            let existing = secrets.get(SECRET_NAME).await?;
            if secret_needs_replacement(
                &existing,
                high_integration_key,
                low_integration_key,
                heartbeat_key,
            ) {
                info!(
                    namespace = %cluster.namespace(),
                    "secret data changed, deleting and recreating"
                );
                secrets
                    .delete(SECRET_NAME, &DeleteParams::default())
                    .await?;
                secrets.create(&PostParams::default(), &secret).await?;
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create the propagation SyncSet when it does not exist. Existing SyncSets
/// are never updated.
async fn ensure_syncset(
    ctx: &Context,
    gi: &GoalertIntegration,
    cluster: &ManagedCluster,
) -> Result<()> {
    let syncsets: Api<SyncSet> = Api::namespaced(ctx.client.clone(), &cluster.namespace());
    match syncsets.get(SECRET_NAME).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => {
            info!(namespace = %cluster.namespace(), "creating goalert syncset");
            let syncset = propagation_syncset(cluster, gi);
            syncsets.create(&PostParams::default(), &syncset).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
