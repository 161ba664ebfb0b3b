use futures::StreamExt;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::crds::{ClusterDeployment, GoalertIntegration, HostedCluster};

pub mod cluster;
pub mod controller;
pub mod events;
pub mod heartbeat;
pub mod policy;
pub mod provision;
pub mod resources;
pub mod scope;
pub mod teardown;
pub mod types;

// Re-export commonly used items
pub use controller::reconcile_integration;
pub use events::affected_integrations;
pub use types::{Context, Error, Result};

/// Main entry point for the `GoalertIntegration` controller
#[instrument(skip(ctx))]
pub async fn run_integration_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting GoalertIntegration controller");

    let client = ctx.client.clone();
    let integrations: Api<GoalertIntegration> = Api::all(client.clone());
    let watcher_config = Config::default().any_semantic();

    let mut integration_controller = Controller::new(integrations, watcher_config.clone());
    let store = integration_controller.store();

    // Cluster events fan out to every integration whose selector matches the
    // changed cluster's labels.
    if ctx.config.watch.cluster_deployments {
        let store = store.clone();
        integration_controller = integration_controller.watches(
            Api::<ClusterDeployment>::all(client.clone()),
            watcher_config.clone(),
            move |cd| affected_integrations(cd.labels(), store.state()),
        );
    }
    if ctx.config.watch.hosted_clusters {
        let store = store.clone();
        integration_controller = integration_controller.watches(
            Api::<HostedCluster>::all(client.clone()),
            watcher_config.clone(),
            move |hc| affected_integrations(hc.labels(), store.state()),
        );
    }

    integration_controller
        .run(reconcile_integration, error_policy, ctx)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok(integration_resource) => {
                    info!(
                        resource = ?integration_resource,
                        "GoalertIntegration reconciliation successful"
                    );
                }
                Err(reconciliation_err) => {
                    error!(
                        error = ?reconciliation_err,
                        "GoalertIntegration reconciliation error"
                    );
                }
            }
        })
        .await;

    info!("GoalertIntegration controller shutting down");
    Ok(())
}

/// Error policy for the `GoalertIntegration` controller - retry with backoff
#[instrument(skip(_ctx), fields(integration = %gi.name_any()))]
fn error_policy(gi: Arc<GoalertIntegration>, err: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        error = ?err,
        integration = %gi.name_any(),
        "GoalertIntegration reconciliation failed, requeueing"
    );
    Action::requeue(std::time::Duration::from_secs(30))
}
