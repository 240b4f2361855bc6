//! HTTP client for the IAM and Resource Manager REST APIs.

mod accounts;
mod keys;
mod policy;

use reqwest::{RequestBuilder, Response, StatusCode};
use sakey_core::{ServiceAccountKey, ServiceAccountRequest};
use serde::de::DeserializeOwned;
#[cfg(feature = "tracing")]
use tracing::{debug, warn};

use crate::USER_AGENT;
use crate::error::{Operation, ProvisionError};
use crate::provisioner::{BindingChange, BoxFuture, Provisioner, ServiceAccount};
use crate::settings::ClientSettings;
use crate::token::AccessToken;

pub use policy::{Binding, Policy};

/// Talks to the identity-management API on behalf of one caller.
///
/// Every call is authenticated with the caller's [`AccessToken`]. Rate
/// limiting (429), server errors (5xx) and transport failures are retried
/// with linear backoff; everything else fails immediately. Creating calls
/// are retried more narrowly, see [`send`](Self::send).
#[derive(Debug)]
pub struct IamClient {
    http: reqwest::Client,
    token: AccessToken,
    settings: ClientSettings,
}

impl IamClient {
    /// Builds a client with the given settings and caller token.
    pub fn new(settings: ClientSettings, token: AccessToken) -> Result<Self, ProvisionError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProvisionError::ClientInit(e.to_string()))?;

        Ok(Self { http, token, settings })
    }

    /// The settings the client was built with.
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn iam_url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.settings.iam_endpoint)
    }

    fn resource_manager_url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.settings.resource_manager_endpoint)
    }

    /// Sends the request produced by `build`, retrying transient failures.
    ///
    /// Calls that create a resource are only repeated after a refused
    /// connection, 429 or 503. Any other transient failure of such a call
    /// becomes [`ProvisionError::Unconfirmed`], since the server may have
    /// acted on it. Returns the response only for 2xx statuses.
    async fn send<F>(&self, operation: Operation, build: F) -> Result<Response, ProvisionError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let creates = operation.creates_resource();
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < max_attempts {
            attempt = attempt.saturating_add(1);

            #[cfg(feature = "tracing")]
            debug!(%operation, attempt, "sending request");

            match build(&self.http).bearer_auth(self.token.secret()).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_transient(response.status()) => {
                    let status = response.status();
                    let message = format!("HTTP {}: {}", status.as_u16(), error_message(response).await);
                    if creates && !was_turned_away(status) {
                        return Err(ProvisionError::Unconfirmed { operation, message });
                    }
                    last_error = Some(message);
                }
                Ok(response) => return Err(classify(operation, response).await),
                Err(error) => {
                    let message = format!("transport error: {error}");
                    if creates && !error.is_connect() {
                        return Err(ProvisionError::Unconfirmed { operation, message });
                    }
                    last_error = Some(message);
                }
            }

            if attempt < max_attempts {
                let delay = self.settings.backoff_after(attempt);

                #[cfg(feature = "tracing")]
                warn!(
                    %operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = last_error.as_deref().unwrap_or_default(),
                    "transient failure, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }

        Err(ProvisionError::Transient {
            operation,
            attempts: attempt,
            message: last_error.unwrap_or_else(|| "retries exhausted".to_string()),
        })
    }

    /// Like [`send`](Self::send), decoding the JSON body as `T`.
    async fn send_json<T, F>(&self, operation: Operation, build: F) -> Result<T, ProvisionError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.send(operation, build).await?;
        response.json::<T>().await.map_err(|e| ProvisionError::InvalidResponse {
            operation,
            message: e.to_string(),
        })
    }
}

impl Provisioner for IamClient {
    fn find_by_display_name<'a>(
        &'a self,
        project_id: &'a str,
        display_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<ServiceAccount>, ProvisionError>> {
        Box::pin(async move {
            let accounts = self.list_service_accounts(project_id).await?;
            Ok(accounts.into_iter().find(|a| a.display_name == display_name))
        })
    }

    fn create_service_account<'a>(
        &'a self,
        request: &'a ServiceAccountRequest,
    ) -> BoxFuture<'a, Result<ServiceAccount, ProvisionError>> {
        Box::pin(self.create_account(request))
    }

    fn bind_role<'a>(
        &'a self,
        project_id: &'a str,
        role: &'a str,
        member: &'a str,
    ) -> BoxFuture<'a, Result<BindingChange, ProvisionError>> {
        Box::pin(self.add_project_binding(project_id, role, member))
    }

    fn create_key<'a>(&'a self, account: &'a ServiceAccount) -> BoxFuture<'a, Result<ServiceAccountKey, ProvisionError>> {
        Box::pin(self.create_json_key(account))
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Statuses the front end returns before the request is acted on.
fn was_turned_away(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Maps a non-transient failure response to an error.
async fn classify(operation: Operation, response: Response) -> ProvisionError {
    let status = response.status().as_u16();
    let message = error_message(response).await;
    match status {
        401 | 403 => ProvisionError::Authorization { operation, message },
        404 => ProvisionError::NotFound { operation, message },
        _ => ProvisionError::Rejected {
            operation,
            status,
            message,
        },
    }
}

/// Extracts `error.message` from a Google API error body, falling back to the raw text.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    message_from_body(&body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status.canonical_reason().unwrap_or("no response body").to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}

fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::test_support::{TOKEN, client_for, client_with_timeout};
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Pong {
        ok: bool,
    }

    #[test]
    fn message_from_body_reads_google_error_shape() {
        let body = r#"{"error":{"code":403,"message":"Permission 'iam.serviceAccounts.create' denied","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            message_from_body(body).as_deref(),
            Some("Permission 'iam.serviceAccounts.create' denied")
        );
        assert_eq!(message_from_body("<html>oops</html>"), None);
    }

    #[tokio::test]
    async fn send_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let pong: Pong = client
            .send_json(Operation::ListAccounts, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap();

        assert!(pong.ok);
    }

    #[tokio::test]
    async fn send_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let pong: Pong = client
            .send_json(Operation::ListAccounts, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap();

        assert!(pong.ok);
    }

    #[tokio::test]
    async fn send_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Quota exceeded"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send(Operation::CreateKey, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap_err();

        match err {
            ProvisionError::Transient {
                operation,
                attempts,
                message,
            } => {
                assert_eq!(operation, Operation::CreateKey);
                assert_eq!(attempts, 3);
                assert!(message.contains("Quota exceeded"));
            }
            other => panic!("expected transient error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_retries_timeouts_of_reads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true}))
                    .set_delay(Duration::from_millis(400)),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_timeout(&server, Duration::from_millis(150));
        let pong: Pong = client
            .send_json(Operation::ListAccounts, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap();

        assert!(pong.ok);
    }

    #[tokio::test]
    async fn send_sends_creating_call_once_after_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_timeout(&server, Duration::from_millis(150));
        let err = client
            .send(Operation::CreateKey, |http| http.post(client.iam_url("ping")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Unconfirmed { operation: Operation::CreateKey, .. }
        ));
    }

    #[tokio::test]
    async fn send_does_not_repeat_creating_call_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send(Operation::CreateAccount, |http| http.post(client.iam_url("ping")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Unconfirmed { operation: Operation::CreateAccount, ref message }
                if message.starts_with("HTTP 500")
        ));
    }

    #[tokio::test]
    async fn send_repeats_creating_call_after_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let pong: Pong = client
            .send_json(Operation::CreateKey, |http| http.post(client.iam_url("ping")))
            .await
            .unwrap();

        assert!(pong.ok);
    }

    #[tokio::test]
    async fn send_does_not_retry_authorization_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "The caller does not have permission"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send(Operation::GetPolicy, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Authorization { operation: Operation::GetPolicy, ref message }
                if message == "The caller does not have permission"
        ));
    }

    #[tokio::test]
    async fn send_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send(Operation::ListAccounts, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn send_json_reports_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send_json::<Pong, _>(Operation::ListAccounts, |http| http.get(client.iam_url("ping")))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::InvalidResponse { .. }));
    }
}
