//! Teardown protocol
//!
//! Idempotent delete sequence for one cluster: GoAlert services (cascading
//! to their keys and monitor), State Record, Credential Secret, propagation
//! SyncSet, then the finalizer. Any deletion failure blocks finalizer
//! removal so external resources are never orphaned.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::DeleteParams;
use kube::{Api, ResourceExt};
use tracing::{error, info};

use crate::crds::{GoalertIntegration, SyncSet};
use crate::goalert::GoAlert;

use super::cluster::ManagedCluster;
use super::types::{
    finalizer_name, generated_name, Context, Result, CONFIG_MAP_SUFFIX, HIGH_SERVICE_ID_KEY,
    LOW_SERVICE_ID_KEY, SECRET_NAME,
};

/// Release everything one cluster owns and drop its finalizer.
pub async fn handle_delete(
    ctx: &Context,
    gclient: &dyn GoAlert,
    gi: &GoalertIntegration,
    cluster: &ManagedCluster,
) -> Result<()> {
    let cm_name = generated_name(&gi.spec.service_prefix, &cluster.name(), CONFIG_MAP_SUFFIX);
    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &cluster.namespace());

    // An absent State Record means the services were never created or were
    // already torn down; dependent objects are still removed below.
    let state_record = match configmaps.get(&cm_name).await {
        Ok(cm) => Some(cm),
        Err(kube::Error::Api(response)) if response.code == 404 => None,
        Err(e) => return Err(e.into()),
    };

    if let Some(state_record) = state_record {
        let data = state_record.data.clone().unwrap_or_default();
        for key in [HIGH_SERVICE_ID_KEY, LOW_SERVICE_ID_KEY] {
            let Some(service_id) = data.get(key).filter(|id| !id.is_empty()) else {
                continue;
            };
            info!(cluster = %cluster.name(), service_id = %service_id, "deleting goalert service");
            if let Err(err) = gclient.delete_service(service_id).await {
                error!(service_id = %service_id, "unable to delete service: {err}");
                ctx.metrics.set_delete_failure(service_id);
                return Err(err.into());
            }
        }

        info!(cluster = %cluster.name(), configmap = %cm_name, "deleting state record");
        configmaps.delete(&cm_name, &DeleteParams::default()).await?;
    }

    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &cluster.namespace());
    match secrets.get(SECRET_NAME).await {
        Ok(_) => {
            info!(cluster = %cluster.name(), "deleting goalert secret");
            secrets.delete(SECRET_NAME, &DeleteParams::default()).await?;
        }
        Err(kube::Error::Api(response)) if response.code == 404 => {
            info!(cluster = %cluster.name(), "no goalert secret to remove, moving on");
        }
        Err(e) => return Err(e.into()),
    }

    let syncsets: Api<SyncSet> = Api::namespaced(ctx.client.clone(), &cluster.namespace());
    match syncsets.get(SECRET_NAME).await {
        Ok(_) => {
            info!(cluster = %cluster.name(), "deleting goalert syncset");
            syncsets
                .delete(SECRET_NAME, &DeleteParams::default())
                .await?;
        }
        Err(kube::Error::Api(response)) if response.code == 404 => {
            info!(cluster = %cluster.name(), "no goalert syncset to remove, moving on");
        }
        Err(e) => return Err(e.into()),
    }

    let finalizer = finalizer_name(&gi.name_any());
    info!(cluster = %cluster.name(), "removing goalert finalizer");
    cluster.remove_finalizer(&ctx.client, &finalizer).await?;

    ctx.metrics.drop_heartbeat_series(&cluster.name());

    Ok(())
}
