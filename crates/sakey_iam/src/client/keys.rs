//! JSON key creation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use sakey_core::{CredentialFile, PrivateKeyMaterial, ServiceAccountKey};
use serde::Deserialize;
use serde_json::json;

use super::IamClient;
use crate::error::{Operation, ProvisionError};
use crate::provisioner::ServiceAccount;

const PRIVATE_KEY_TYPE: &str = "TYPE_GOOGLE_CREDENTIALS_FILE";
const KEY_ALGORITHM: &str = "KEY_ALG_RSA_2048";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    name: String,
    #[serde(default)]
    private_key_data: String,
    #[serde(default)]
    valid_after_time: Option<String>,
}

impl IamClient {
    /// Creates a JSON key for `account`.
    ///
    /// The decoded key file is checked to be a complete service-account
    /// credential before it is handed back.
    pub async fn create_json_key(&self, account: &ServiceAccount) -> Result<ServiceAccountKey, ProvisionError> {
        let project = if account.project_id.is_empty() {
            "-"
        } else {
            account.project_id.as_str()
        };
        let url = self.iam_url(&format!("projects/{project}/serviceAccounts/{}/keys", account.email));
        let body = json!({
            "privateKeyType": PRIVATE_KEY_TYPE,
            "keyAlgorithm": KEY_ALGORITHM,
        });

        let response: KeyResponse = self
            .send_json(Operation::CreateKey, |http| http.post(&url).json(&body))
            .await?;

        key_from_response(response, &account.email)
    }
}

fn key_from_response(response: KeyResponse, account_email: &str) -> Result<ServiceAccountKey, ProvisionError> {
    let invalid = |message: String| ProvisionError::InvalidResponse {
        operation: Operation::CreateKey,
        message,
    };

    let key_id = response
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| invalid(format!("key name `{}` has no key id", response.name)))?
        .to_string();

    let decoded = STANDARD
        .decode(response.private_key_data.trim())
        .map_err(|e| invalid(format!("privateKeyData is not base64: {e}")))?;
    let content = String::from_utf8(decoded).map_err(|e| invalid(format!("privateKeyData is not UTF-8: {e}")))?;

    let file = CredentialFile::from_json(&content).map_err(|e| invalid(e.to_string()))?;
    file.validate().map_err(|e| invalid(e.to_string()))?;

    let created_at = response
        .valid_after_time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc));

    Ok(ServiceAccountKey {
        key_id,
        private_key_material: PrivateKeyMaterial::new(content),
        account_email: account_email.to_string(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::test_support::{
        EMAIL, KEY_ID, client_for, client_with_timeout, key_file_json, key_response_json,
    };

    fn account() -> ServiceAccount {
        ServiceAccount {
            email: EMAIL.to_string(),
            project_id: "invoice-sorter-prod".to_string(),
            ..ServiceAccount::default()
        }
    }

    #[tokio::test]
    async fn create_key_decodes_key_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/invoice-sorter-prod/serviceAccounts/{EMAIL}/keys")))
            .and(body_json(json!({
                "privateKeyType": "TYPE_GOOGLE_CREDENTIALS_FILE",
                "keyAlgorithm": "KEY_ALG_RSA_2048"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_response_json()))
            .expect(1)
            .mount(&server)
            .await;

        let key = client_for(&server).create_json_key(&account()).await.unwrap();

        assert_eq!(key.key_id, KEY_ID);
        assert_eq!(key.account_email, EMAIL);
        assert_eq!(key.private_key_material.expose(), key_file_json());
        assert_eq!(key.created_at.to_rfc3339(), "2026-10-19T08:30:00+00:00");
        assert_eq!(key.credential_file().unwrap().private_key_id, KEY_ID);
    }

    #[tokio::test]
    async fn create_key_without_project_uses_wildcard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/-/serviceAccounts/{EMAIL}/keys")))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_response_json()))
            .expect(1)
            .mount(&server)
            .await;
        let account = ServiceAccount {
            email: EMAIL.to_string(),
            ..ServiceAccount::default()
        };

        client_for(&server).create_json_key(&account).await.unwrap();
    }

    #[tokio::test]
    async fn slow_key_response_requests_only_one_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/invoice-sorter-prod/serviceAccounts/{EMAIL}/keys")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(key_response_json())
                    .set_delay(Duration::from_millis(400)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_with_timeout(&server, Duration::from_millis(150))
            .create_json_key(&account())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Unconfirmed { operation: Operation::CreateKey, .. }
        ));
        assert!(err.to_string().contains("list the account's keys"));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn rejects_undecodable_key_data() {
        let response = KeyResponse {
            name: format!("projects/p/serviceAccounts/{EMAIL}/keys/{KEY_ID}"),
            private_key_data: "%%% not base64 %%%".into(),
            valid_after_time: None,
        };

        let err = key_from_response(response, EMAIL).unwrap_err();

        assert!(matches!(err, ProvisionError::InvalidResponse { .. }));
    }

    #[test]
    fn rejects_incomplete_key_file() {
        let response = KeyResponse {
            name: format!("projects/p/serviceAccounts/{EMAIL}/keys/{KEY_ID}"),
            private_key_data: STANDARD.encode(r#"{"type":"service_account","client_email":"x"}"#),
            valid_after_time: None,
        };

        let err = key_from_response(response, EMAIL).unwrap_err();

        assert!(err.to_string().contains("private_key"));
    }

    #[test]
    fn missing_valid_after_time_defaults_to_now() {
        let before = Utc::now();
        let response = KeyResponse {
            name: format!("keys/{KEY_ID}"),
            private_key_data: STANDARD.encode(key_file_json()),
            valid_after_time: None,
        };

        let key = key_from_response(response, EMAIL).unwrap();

        assert!(key.created_at >= before);
    }
}
