//! GoAlert session establishment
//!
//! One authentication exchange per reconcile pass. The backend signals
//! success by setting the `goalert_session.2` cookie on the response to a
//! form POST against its basic identity provider; the cookie value scopes
//! every GraphQL call made during the pass and is never persisted.

use std::time::Duration;

use reqwest::header;
use reqwest::redirect::Policy;

use super::GoAlertError;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "goalert_session.2";

/// Short-lived credential for one reconcile pass.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
}

/// Authenticate against GoAlert's identity endpoint and extract the session
/// cookie from the response headers.
pub async fn authenticate(
    endpoint: &str,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<Session, GoAlertError> {
    let endpoint = endpoint.trim_end_matches('/');

    // Redirects are disabled so the set-cookie headers of the login response
    // itself are observable.
    let http = reqwest::Client::builder()
        .redirect(Policy::none())
        .timeout(timeout)
        .build()?;

    let response = http
        .post(format!("{endpoint}/api/v2/identity/providers/basic"))
        .header(header::REFERER, format!("{endpoint}/alerts"))
        .form(&[("username", username), ("password", password)])
        .send()
        .await?;

    let token = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_session_cookie)
        .ok_or(GoAlertError::SessionCookieMissing)?;

    Ok(Session { token })
}

/// Extract the session token from one `set-cookie` header value.
fn parse_session_cookie(raw: &str) -> Option<String> {
    let (name, rest) = raw.split_once('=')?;
    if name.trim() != SESSION_COOKIE {
        return None;
    }
    let value = rest.split(';').next().unwrap_or(rest).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
