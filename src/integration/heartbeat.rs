//! Heartbeat health monitoring
//!
//! Read-only side loop: for each in-scope cluster, look up the provisioned
//! heartbeat monitor id and reflect the backend's inactive state into the
//! heartbeat gauge. Never mutates backend state.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use tracing::debug;

use crate::crds::GoalertIntegration;
use crate::goalert::GoAlert;
use crate::metrics::MetricsSink;

use super::cluster::ManagedCluster;
use super::types::{
    generated_name, Context, Result, CONFIG_MAP_SUFFIX, HEARTBEAT_MONITOR_ID_KEY,
};

/// Poll the heartbeat monitor of one cluster and update its gauge. A missing
/// State Record or monitor id is tolerated and skipped.
pub async fn check_heartbeat_monitor(
    ctx: &Context,
    gclient: &dyn GoAlert,
    gi: &GoalertIntegration,
    cluster: &ManagedCluster,
) -> Result<()> {
    let cm_name = generated_name(&gi.spec.service_prefix, &cluster.name(), CONFIG_MAP_SUFFIX);
    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &cluster.namespace());

    let state_record = match configmaps.get(&cm_name).await {
        Ok(cm) => cm,
        Err(kube::Error::Api(response)) if response.code == 404 => {
            debug!(
                cluster = %cluster.name(),
                "no state record, skipping heartbeat check"
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let Some(monitor_id) = monitor_id_from(&state_record) else {
        debug!(
            cluster = %cluster.name(),
            "state record has no heartbeat monitor id, skipping"
        );
        return Ok(());
    };

    observe_monitor_state(gclient, ctx.metrics.as_ref(), &cluster.name(), &monitor_id).await
}

/// Heartbeat monitor id stored in a State Record, if any.
fn monitor_id_from(state_record: &ConfigMap) -> Option<String> {
    state_record
        .data
        .as_ref()
        .and_then(|data| data.get(HEARTBEAT_MONITOR_ID_KEY))
        .filter(|id| !id.is_empty())
        .cloned()
}

/// Query the backend and reflect the result into the gauge. The gauge is
/// only reset to zero when it is currently nonzero.
async fn observe_monitor_state(
    gclient: &dyn GoAlert,
    metrics: &dyn MetricsSink,
    cluster_name: &str,
    monitor_id: &str,
) -> Result<()> {
    if gclient.is_heartbeat_monitor_inactive(monitor_id).await? {
        metrics.set_heartbeat_inactive(cluster_name);
    } else {
        metrics.clear_heartbeat_inactive(cluster_name);
    }
    Ok(())
}
