//! Service account listing and creation.

use std::sync::atomic::{AtomicU8, Ordering};

use sakey_core::ServiceAccountRequest;
use serde::{Deserialize, Serialize};
#[cfg(feature = "tracing")]
use tracing::debug;

use super::IamClient;
use crate::error::{Operation, ProvisionError};
use crate::provisioner::ServiceAccount;

const PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    accounts: Vec<ServiceAccount>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    account_id: &'a str,
    service_account: CreateAccount<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccount<'a> {
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl IamClient {
    /// Lists every service account in `project_id`, following pagination.
    pub async fn list_service_accounts(&self, project_id: &str) -> Result<Vec<ServiceAccount>, ProvisionError> {
        let url = self.iam_url(&format!("projects/{project_id}/serviceAccounts"));
        let mut accounts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListResponse = self
                .send_json(Operation::ListAccounts, |http| {
                    let request = http.get(&url).query(&[("pageSize", PAGE_SIZE)]);
                    match &page_token {
                        Some(token) => request.query(&[("pageToken", token.as_str())]),
                        None => request,
                    }
                })
                .await?;

            accounts.extend(page.accounts);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(accounts),
            }
        }
    }

    /// Reads one service account by email.
    pub async fn get_account(&self, project_id: &str, email: &str) -> Result<ServiceAccount, ProvisionError> {
        let url = self.iam_url(&format!("projects/{project_id}/serviceAccounts/{email}"));
        self.send_json(Operation::GetAccount, |http| http.get(&url)).await
    }

    /// Creates the account described by `request`.
    ///
    /// A 409 from the API means the account id is taken and becomes
    /// [`ProvisionError::Conflict`]. When the 409 answers a repeated attempt,
    /// the earlier attempt may have created the account; if the existing
    /// account carries the requested display name it is returned instead.
    pub async fn create_account(&self, request: &ServiceAccountRequest) -> Result<ServiceAccount, ProvisionError> {
        let url = self.iam_url(&format!("projects/{}/serviceAccounts", request.project_id));
        let body = CreateBody {
            account_id: &request.account_id,
            service_account: CreateAccount {
                display_name: &request.display_name,
                description: request.description.as_deref(),
            },
        };
        let attempts = AtomicU8::new(0);

        let result = self
            .send_json(Operation::CreateAccount, |http| {
                attempts.fetch_add(1, Ordering::Relaxed);
                http.post(&url).json(&body)
            })
            .await;

        match result {
            Err(e) if e.has_status(409) && attempts.load(Ordering::Relaxed) > 1 => {
                self.existing_from_earlier_attempt(request).await
            }
            other => other.map_err(|e| e.into_conflict(&request.account_email())),
        }
    }

    async fn existing_from_earlier_attempt(
        &self,
        request: &ServiceAccountRequest,
    ) -> Result<ServiceAccount, ProvisionError> {
        let email = request.account_email();
        let existing = self.get_account(&request.project_id, &email).await?;

        if existing.display_name == request.display_name {
            #[cfg(feature = "tracing")]
            debug!(%email, "account created by an earlier attempt");
            Ok(existing)
        } else {
            Err(ProvisionError::Conflict { account_email: email })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::test_support::{client_for, client_with_timeout};

    const PROJECT: &str = "invoice-sorter-prod";

    fn request() -> ServiceAccountRequest {
        ServiceAccountRequest::builder(PROJECT, "Invoice Sorter", "roles/drive.file")
            .description("Reads invoices from the shared drive")
            .build()
            .unwrap()
    }

    fn account_json(id: &str, display_name: &str) -> serde_json::Value {
        json!({
            "name": format!("projects/{PROJECT}/serviceAccounts/{id}@{PROJECT}.iam.gserviceaccount.com"),
            "projectId": PROJECT,
            "uniqueId": "104857600000000000001",
            "email": format!("{id}@{PROJECT}.iam.gserviceaccount.com"),
            "displayName": display_name,
            "etag": "MDEwMjE5MjA=",
            "oauth2ClientId": "104857600000000000001"
        })
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{PROJECT}/serviceAccounts")))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accounts": [account_json("reporting", "Reporting")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{PROJECT}/serviceAccounts")))
            .and(query_param("pageSize", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accounts": [account_json("invoice-sorter", "Invoice Sorter")],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let accounts = client_for(&server).list_service_accounts(PROJECT).await.unwrap();

        let names: Vec<_> = accounts.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, ["Invoice Sorter", "Reporting"]);
        assert_eq!(accounts[0].unique_id, "104857600000000000001");
    }

    #[tokio::test]
    async fn list_of_empty_project_returns_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let accounts = client_for(&server).list_service_accounts(PROJECT).await.unwrap();

        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn create_posts_account_id_and_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}/serviceAccounts")))
            .and(body_json(json!({
                "accountId": "invoice-sorter",
                "serviceAccount": {
                    "displayName": "Invoice Sorter",
                    "description": "Reads invoices from the shared drive"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(account_json("invoice-sorter", "Invoice Sorter")))
            .expect(1)
            .mount(&server)
            .await;

        let account = client_for(&server).create_account(&request()).await.unwrap();

        assert_eq!(account.email, "invoice-sorter@invoice-sorter-prod.iam.gserviceaccount.com");
        assert_eq!(account.display_name, "Invoice Sorter");
    }

    #[tokio::test]
    async fn create_maps_409_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "message": "Service account invoice-sorter already exists within project", "status": "ALREADY_EXISTS"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).create_account(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Conflict { ref account_email }
                if account_email == "invoice-sorter@invoice-sorter-prod.iam.gserviceaccount.com"
        ));
    }

    #[tokio::test]
    async fn create_is_not_repeated_after_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}/serviceAccounts")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(account_json("invoice-sorter", "Invoice Sorter"))
                    .set_delay(Duration::from_millis(400)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_with_timeout(&server, Duration::from_millis(150))
            .create_account(&request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Unconfirmed { operation: Operation::CreateAccount, .. }
        ));
        assert!(err.to_string().contains("check whether the account exists"));
    }

    async fn mount_503_then_409(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}/serviceAccounts")))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}/serviceAccounts")))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "message": "Service account invoice-sorter already exists within project"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_reuses_account_from_earlier_attempt() {
        let server = MockServer::start().await;
        mount_503_then_409(&server).await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1/projects/{PROJECT}/serviceAccounts/invoice-sorter@{PROJECT}.iam.gserviceaccount.com"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(account_json("invoice-sorter", "Invoice Sorter")))
            .expect(1)
            .mount(&server)
            .await;

        let account = client_for(&server).create_account(&request()).await.unwrap();

        assert_eq!(account.email, "invoice-sorter@invoice-sorter-prod.iam.gserviceaccount.com");
    }

    #[tokio::test]
    async fn create_after_retry_still_conflicts_with_other_account() {
        let server = MockServer::start().await;
        mount_503_then_409(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(account_json("invoice-sorter", "Someone Else")))
            .mount(&server)
            .await;

        let err = client_for(&server).create_account(&request()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Conflict { .. }));
    }

    #[tokio::test]
    async fn create_maps_403_to_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Permission 'iam.serviceAccounts.create' denied on resource"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).create_account(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Authorization { operation: Operation::CreateAccount, .. }
        ));
    }
}
