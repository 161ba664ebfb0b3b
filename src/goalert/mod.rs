//! GoAlert backend access
//!
//! The alerting backend is treated as an opaque external service behind the
//! [`GoAlert`] operation contract. [`GraphqlClient`] is the production
//! implementation speaking GoAlert's GraphQL endpoint with a session cookie
//! obtained once per reconcile pass by [`session::authenticate`].

pub mod client;
pub mod session;

pub use client::{GoAlert, GraphqlClient, HeartbeatMonitor, ServiceInput};
pub use session::{authenticate, Session, SESSION_COOKIE};

#[cfg(test)]
pub use client::MockGoAlert;

use thiserror::Error;

/// Errors produced by GoAlert calls.
#[derive(Debug, Error)]
pub enum GoAlertError {
    #[error("GoAlert request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unable to decode GoAlert response {body:?}: {source}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no GoAlert session available")]
    NoSession,

    #[error("GoAlert refused to delete service {0}")]
    DeleteRefused(String),

    #[error("session cookie goalert_session.2 missing from authentication response")]
    SessionCookieMissing,
}
