/*
 * GoAlert Integration Operator - Alerting Lifecycle for Managed Clusters
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! GoAlert integration operator core library
//!
//! This crate reconciles GoAlert alerting configuration (services,
//! integration keys, heartbeat monitors) against the lifecycle of managed
//! cluster resources: scope resolution, provisioning, drift repair, and
//! finalizer-gated teardown.

pub mod config;
pub mod crds;
pub mod goalert;
pub mod integration;
pub mod metrics;

// Re-export commonly used types
pub use config::{AuthFailurePolicy, OperatorConfig};
pub use crds::{GoalertIntegration, GoalertIntegrationSpec};
pub use integration::{run_integration_controller, Context, Error, Result};
pub use metrics::{MetricsSink, OperatorMetrics};
