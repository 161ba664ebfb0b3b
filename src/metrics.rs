//! Operator metrics
//!
//! The reconciler reports into an injected [`MetricsSink`] rather than a
//! package-level registry so the core stays testable without a live metrics
//! endpoint. [`OperatorMetrics`] is the default sink, rendered in Prometheus
//! text exposition format by the HTTP server.

use std::collections::HashMap;
use std::sync::RwLock;

/// Observability surface the reconciler reports into.
pub trait MetricsSink: Send + Sync {
    /// Record the wall-clock duration of one reconcile pass.
    fn observe_reconcile_duration(&self, controller: &str, seconds: f64);

    /// Flag a failed GoAlert service creation, keyed by service name.
    fn set_create_failure(&self, service_name: &str);

    /// Flag a failed GoAlert service deletion, keyed by service id.
    fn set_delete_failure(&self, service_id: &str);

    /// Mark a cluster's heartbeat monitor as inactive.
    fn set_heartbeat_inactive(&self, cluster_name: &str);

    /// Reset a cluster's heartbeat gauge to zero. Only writes when the gauge
    /// is currently nonzero.
    fn clear_heartbeat_inactive(&self, cluster_name: &str);

    /// Remove the heartbeat gauge series for a cluster that is being torn
    /// down. Returns whether a series existed.
    fn drop_heartbeat_series(&self, cluster_name: &str) -> bool;
}

/// Default in-process sink backing the `/metrics` endpoint.
#[derive(Default)]
pub struct OperatorMetrics {
    reconcile_durations: RwLock<HashMap<String, Vec<f64>>>,
    create_failures: RwLock<HashMap<String, f64>>,
    delete_failures: RwLock<HashMap<String, f64>>,
    heartbeat_inactive: RwLock<HashMap<String, f64>>,
}

impl OperatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the heartbeat gauge for a cluster, if the series exists.
    pub fn heartbeat_inactive_value(&self, cluster_name: &str) -> Option<f64> {
        self.heartbeat_inactive
            .read()
            .expect("metrics lock poisoned")
            .get(cluster_name)
            .copied()
    }

    /// Render all series in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str(
            "# HELP cgao_reconcile_duration_seconds Distribution of the number of seconds a reconcile takes, broken down by controller\n",
        );
        output.push_str("# TYPE cgao_reconcile_duration_seconds histogram\n");
        for (controller, samples) in &*self
            .reconcile_durations
            .read()
            .expect("metrics lock poisoned")
        {
            let sum: f64 = samples.iter().sum();
            output.push_str(&format!(
                "cgao_reconcile_duration_seconds_sum{{controller=\"{controller}\"}} {sum}\n"
            ));
            output.push_str(&format!(
                "cgao_reconcile_duration_seconds_count{{controller=\"{controller}\"}} {}\n",
                samples.len()
            ));
        }

        output.push_str("# HELP cgao_create_failure Failures creating a GoAlert service\n");
        output.push_str("# TYPE cgao_create_failure gauge\n");
        for (service, value) in &*self.create_failures.read().expect("metrics lock poisoned") {
            output.push_str(&format!(
                "cgao_create_failure{{service_name=\"{service}\"}} {value}\n"
            ));
        }

        output.push_str("# HELP cgao_delete_failure Failures deleting a GoAlert service\n");
        output.push_str("# TYPE cgao_delete_failure gauge\n");
        for (service, value) in &*self.delete_failures.read().expect("metrics lock poisoned") {
            output.push_str(&format!(
                "cgao_delete_failure{{service_name=\"{service}\"}} {value}\n"
            ));
        }

        output.push_str("# HELP cgao_heartbeat_inactive Inactive heartbeat monitors in GoAlert\n");
        output.push_str("# TYPE cgao_heartbeat_inactive gauge\n");
        for (cluster, value) in &*self
            .heartbeat_inactive
            .read()
            .expect("metrics lock poisoned")
        {
            output.push_str(&format!(
                "cgao_heartbeat_inactive{{service_name=\"{cluster}\"}} {value}\n"
            ));
        }

        output
    }
}

impl MetricsSink for OperatorMetrics {
    fn observe_reconcile_duration(&self, controller: &str, seconds: f64) {
        self.reconcile_durations
            .write()
            .expect("metrics lock poisoned")
            .entry(controller.to_string())
            .or_default()
            .push(seconds);
    }

    fn set_create_failure(&self, service_name: &str) {
        self.create_failures
            .write()
            .expect("metrics lock poisoned")
            .insert(service_name.to_string(), 1.0);
    }

    fn set_delete_failure(&self, service_id: &str) {
        self.delete_failures
            .write()
            .expect("metrics lock poisoned")
            .insert(service_id.to_string(), 1.0);
    }

    fn set_heartbeat_inactive(&self, cluster_name: &str) {
        self.heartbeat_inactive
            .write()
            .expect("metrics lock poisoned")
            .insert(cluster_name.to_string(), 1.0);
    }

    fn clear_heartbeat_inactive(&self, cluster_name: &str) {
        let mut gauges = self.heartbeat_inactive.write().expect("metrics lock poisoned");
        if let Some(value) = gauges.get_mut(cluster_name) {
            if *value != 0.0 {
                *value = 0.0;
            }
        }
    }

    fn drop_heartbeat_series(&self, cluster_name: &str) -> bool {
        self.heartbeat_inactive
            .write()
            .expect("metrics lock poisoned")
            .remove(cluster_name)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_gauge_set_then_cleared() {
        let metrics = OperatorMetrics::new();
        metrics.set_heartbeat_inactive("foo");
        assert_eq!(metrics.heartbeat_inactive_value("foo"), Some(1.0));

        metrics.clear_heartbeat_inactive("foo");
        assert_eq!(metrics.heartbeat_inactive_value("foo"), Some(0.0));
    }

    #[test]
    fn clear_without_prior_set_writes_nothing() {
        let metrics = OperatorMetrics::new();
        metrics.clear_heartbeat_inactive("foo");
        assert_eq!(metrics.heartbeat_inactive_value("foo"), None);
    }

    #[test]
    fn drop_removes_the_series() {
        let metrics = OperatorMetrics::new();
        metrics.set_heartbeat_inactive("foo");
        assert!(metrics.drop_heartbeat_series("foo"));
        assert!(!metrics.drop_heartbeat_series("foo"));
        assert_eq!(metrics.heartbeat_inactive_value("foo"), None);
    }

    #[test]
    fn render_includes_each_series() {
        let metrics = OperatorMetrics::new();
        metrics.observe_reconcile_duration("goalertintegration", 0.25);
        metrics.set_create_failure("osd-x - High");
        metrics.set_delete_failure("svc-123");
        metrics.set_heartbeat_inactive("foo");

        let body = metrics.render_prometheus();
        assert!(body.contains("cgao_reconcile_duration_seconds_count{controller=\"goalertintegration\"} 1"));
        assert!(body.contains("cgao_create_failure{service_name=\"osd-x - High\"} 1"));
        assert!(body.contains("cgao_delete_failure{service_name=\"svc-123\"} 1"));
        assert!(body.contains("cgao_heartbeat_inactive{service_name=\"foo\"} 1"));
    }
}
