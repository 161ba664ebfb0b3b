//! Typed operation contract against GoAlert's GraphQL API

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{GoAlertError, Session};

/// Input for creating a notifiable service bound to an escalation policy.
#[derive(Debug, Clone)]
pub struct ServiceInput {
    pub name: String,
    pub description: String,
    pub favorite: bool,
    pub escalation_policy_id: String,
}

/// Identifiers produced when a heartbeat monitor is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatMonitor {
    pub id: String,
    pub key: String,
}

/// Operation contract for the alerting backend.
///
/// All operations are scoped to the session the client was built with and may
/// fail with a transport error or a backend-reported logical failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GoAlert: Send + Sync {
    /// Create a service, returning its id.
    async fn create_service(&self, input: &ServiceInput) -> Result<String, GoAlertError>;

    /// Create an integration key on a service, returning the webhook key.
    async fn create_integration_key(
        &self,
        service_id: &str,
        key_type: &str,
        name: &str,
    ) -> Result<String, GoAlertError>;

    /// Create a heartbeat monitor on a service.
    async fn create_heartbeat_monitor(
        &self,
        service_id: &str,
        name: &str,
        timeout_minutes: u32,
    ) -> Result<HeartbeatMonitor, GoAlertError>;

    /// Delete a service and everything attached to it. A backend response of
    /// `deleteAll: false` is surfaced as [`GoAlertError::DeleteRefused`].
    async fn delete_service(&self, service_id: &str) -> Result<(), GoAlertError>;

    /// Whether the backend reports a heartbeat monitor as inactive.
    async fn is_heartbeat_monitor_inactive(&self, monitor_id: &str)
        -> Result<bool, GoAlertError>;
}

/// Production [`GoAlert`] implementation.
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
    session: Option<Session>,
}

#[derive(Deserialize)]
struct SvcEnvelope {
    data: Option<SvcData>,
}

#[derive(Deserialize)]
struct SvcData {
    #[serde(rename = "createService")]
    create_service: Option<SvcId>,
}

#[derive(Deserialize)]
struct SvcId {
    id: String,
}

#[derive(Deserialize)]
struct IntKeyEnvelope {
    data: Option<IntKeyData>,
}

#[derive(Deserialize)]
struct IntKeyData {
    #[serde(rename = "createIntegrationKey")]
    create_integration_key: Option<IntKeyHref>,
}

#[derive(Deserialize)]
struct IntKeyHref {
    href: String,
}

#[derive(Deserialize)]
struct HeartbeatEnvelope {
    data: Option<HeartbeatData>,
}

#[derive(Deserialize)]
struct HeartbeatData {
    #[serde(rename = "createHeartbeatMonitor")]
    create_heartbeat_monitor: Option<HeartbeatIds>,
}

#[derive(Deserialize, Default)]
struct HeartbeatIds {
    #[serde(default)]
    id: String,
    #[serde(default)]
    href: String,
}

#[derive(Deserialize)]
struct DeleteEnvelope {
    data: Option<DeleteData>,
}

#[derive(Deserialize, Default)]
struct DeleteData {
    #[serde(rename = "deleteAll", default)]
    delete_all: bool,
}

#[derive(Deserialize)]
struct MonitorStateEnvelope {
    data: Option<MonitorStateData>,
}

#[derive(Deserialize)]
struct MonitorStateData {
    #[serde(rename = "heartbeatMonitor")]
    heartbeat_monitor: Option<MonitorState>,
}

#[derive(Deserialize)]
struct MonitorState {
    #[serde(rename = "lastState", default)]
    last_state: Option<String>,
}

impl GraphqlClient {
    pub fn new(endpoint: &str, session: Option<Session>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// POST one GraphQL document and return the raw response body.
    async fn request(&self, query: String) -> Result<String, GoAlertError> {
        let session = self.session.as_ref().ok_or(GoAlertError::NoSession)?;

        let response = self
            .http
            .post(format!("{}/api/graphql", self.endpoint))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", super::SESSION_COOKIE, session.token),
            )
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        Ok(response.text().await?)
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, GoAlertError> {
        serde_json::from_str(body).map_err(|source| GoAlertError::Decode {
            body: body.to_string(),
            source,
        })
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl GoAlert for GraphqlClient {
    async fn create_service(&self, input: &ServiceInput) -> Result<String, GoAlertError> {
        let query = format!(
            "mutation {{createService(input:{{name:{},description:{},favorite:{},escalationPolicyID:{}}}){{id}}}}",
            quote(&input.name),
            quote(&input.description),
            input.favorite,
            quote(&input.escalation_policy_id),
        );

        let body = self.request(query).await?;
        let envelope: SvcEnvelope = Self::decode(&body)?;
        Ok(envelope
            .data
            .and_then(|d| d.create_service)
            .map(|s| s.id)
            .unwrap_or_default())
    }

    async fn create_integration_key(
        &self,
        service_id: &str,
        key_type: &str,
        name: &str,
    ) -> Result<String, GoAlertError> {
        let query = format!(
            "mutation {{createIntegrationKey(input:{{serviceID:{},type:{},name:{}}}){{href}}}}",
            quote(service_id),
            key_type,
            quote(name),
        );

        let body = self.request(query).await?;
        let envelope: IntKeyEnvelope = Self::decode(&body)?;
        Ok(envelope
            .data
            .and_then(|d| d.create_integration_key)
            .map(|k| k.href)
            .unwrap_or_default())
    }

    async fn create_heartbeat_monitor(
        &self,
        service_id: &str,
        name: &str,
        timeout_minutes: u32,
    ) -> Result<HeartbeatMonitor, GoAlertError> {
        let query = format!(
            "mutation {{createHeartbeatMonitor(input: {{serviceID: {},name: {},timeoutMinutes: {} }}){{id href}}}}",
            quote(service_id),
            quote(name),
            timeout_minutes,
        );

        let body = self.request(query).await?;
        let envelope: HeartbeatEnvelope = Self::decode(&body)?;
        let ids = envelope
            .data
            .and_then(|d| d.create_heartbeat_monitor)
            .unwrap_or_default();
        Ok(HeartbeatMonitor {
            id: ids.id,
            key: ids.href,
        })
    }

    async fn delete_service(&self, service_id: &str) -> Result<(), GoAlertError> {
        let query = format!(
            "mutation {{deleteAll(input: {{id: {},type: service}})}}",
            quote(service_id),
        );

        let body = self.request(query).await?;
        let envelope: DeleteEnvelope = Self::decode(&body)?;
        if !envelope.data.unwrap_or_default().delete_all {
            return Err(GoAlertError::DeleteRefused(service_id.to_string()));
        }
        Ok(())
    }

    async fn is_heartbeat_monitor_inactive(
        &self,
        monitor_id: &str,
    ) -> Result<bool, GoAlertError> {
        let query = format!(
            "query {{heartbeatMonitor(id: {}){{lastState}}}}",
            quote(monitor_id),
        );

        let body = self.request(query).await?;
        let envelope: MonitorStateEnvelope = Self::decode(&body)?;
        Ok(envelope
            .data
            .and_then(|d| d.heartbeat_monitor)
            .and_then(|m| m.last_state)
            .is_some_and(|state| state == "inactive"))
    }
}
