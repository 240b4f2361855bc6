//! Project IAM policy read-modify-write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
#[cfg(feature = "tracing")]
use tracing::debug;

use super::IamClient;
use crate::error::{Operation, ProvisionError};
use crate::provisioner::BindingChange;

/// Policy version that allows conditional bindings to round-trip intact.
const POLICY_VERSION: i64 = 3;

/// A project IAM policy.
///
/// Fields this client does not interpret (audit configs, conditions) are kept
/// in `other` so that writing the policy back does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Role bindings.
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Concurrency token; a write with a stale etag fails with 409.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Everything else in the policy.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Members granted one role, optionally under a condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Role name, e.g. `roles/drive.file`.
    pub role: String,
    /// Member strings, e.g. `serviceAccount:…`.
    #[serde(default)]
    pub members: Vec<String>,
    /// Everything else in the binding, including `condition`.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Binding {
    fn is_conditional(&self) -> bool {
        self.other.contains_key("condition")
    }
}

impl Policy {
    /// Grants `role` to `member` without a condition.
    ///
    /// Returns [`BindingChange::AlreadyPresent`] and leaves the policy untouched
    /// if an unconditional binding already lists the member.
    pub fn add_member(&mut self, role: &str, member: &str) -> BindingChange {
        let existing = self
            .bindings
            .iter_mut()
            .find(|b| b.role == role && !b.is_conditional());

        match existing {
            Some(binding) if binding.members.iter().any(|m| m == member) => BindingChange::AlreadyPresent,
            Some(binding) => {
                binding.members.push(member.to_string());
                BindingChange::Added
            }
            None => {
                self.bindings.push(Binding {
                    role: role.to_string(),
                    members: vec![member.to_string()],
                    other: Map::new(),
                });
                BindingChange::Added
            }
        }
    }
}

impl IamClient {
    /// Reads the IAM policy of `project_id`.
    pub async fn get_project_policy(&self, project_id: &str) -> Result<Policy, ProvisionError> {
        let url = self.resource_manager_url(&format!("projects/{project_id}:getIamPolicy"));
        let body = json!({ "options": { "requestedPolicyVersion": POLICY_VERSION } });
        self.send_json(Operation::GetPolicy, |http| http.post(&url).json(&body))
            .await
    }

    /// Replaces the IAM policy of `project_id` with `policy`.
    pub async fn set_project_policy(&self, project_id: &str, policy: &Policy) -> Result<Policy, ProvisionError> {
        let url = self.resource_manager_url(&format!("projects/{project_id}:setIamPolicy"));
        let body = json!({ "policy": policy });
        self.send_json(Operation::SetPolicy, |http| http.post(&url).json(&body))
            .await
    }

    /// Grants `role` on `project_id` to `member`.
    ///
    /// The policy is read, modified and written back with its etag. A 409
    /// (concurrent modification) restarts the cycle. A 400 naming a member
    /// that does not exist is also retried: a freshly created account can
    /// take a few seconds to become visible to the policy service.
    pub async fn add_project_binding(
        &self,
        project_id: &str,
        role: &str,
        member: &str,
    ) -> Result<BindingChange, ProvisionError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0_u8;

        loop {
            attempt = attempt.saturating_add(1);

            let mut policy = self.get_project_policy(project_id).await?;
            let change = policy.add_member(role, member);
            if change == BindingChange::AlreadyPresent {
                #[cfg(feature = "tracing")]
                debug!(role, member, "binding already present");
                return Ok(change);
            }
            policy.version = Some(POLICY_VERSION);

            match self.set_project_policy(project_id, &policy).await {
                Ok(_) => return Ok(change),
                Err(err) if attempt < max_attempts && is_retryable_write(&err) => {
                    #[cfg(feature = "tracing")]
                    debug!(attempt, error = %err, "policy write rejected, retrying");

                    tokio::time::sleep(self.settings.backoff_after(attempt)).await;
                }
                Err(err) if err.has_status(409) => {
                    return Err(ProvisionError::Transient {
                        operation: Operation::SetPolicy,
                        attempts: attempt,
                        message: "policy kept changing concurrently".to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_retryable_write(err: &ProvisionError) -> bool {
    match err {
        ProvisionError::Rejected { status: 409, .. } => true,
        ProvisionError::Rejected {
            status: 400, message, ..
        } => message.contains("does not exist"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::test_support::client_for;

    const PROJECT: &str = "invoice-sorter-prod";
    const MEMBER: &str = "serviceAccount:invoice-sorter@invoice-sorter-prod.iam.gserviceaccount.com";

    fn existing_policy() -> Value {
        json!({
            "version": 1,
            "etag": "BwXhqDbTjPU=",
            "bindings": [
                {"role": "roles/owner", "members": ["user:ops@example.com"]},
                {
                    "role": "roles/drive.file",
                    "members": ["group:temps@example.com"],
                    "condition": {"title": "expires", "expression": "request.time < timestamp('2027-01-01T00:00:00Z')"}
                }
            ],
            "auditConfigs": [{"service": "allServices"}]
        })
    }

    #[test]
    fn add_member_creates_binding_for_new_role() {
        let mut policy = Policy::default();
        assert_eq!(policy.add_member("roles/drive.file", MEMBER), BindingChange::Added);
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members, [MEMBER]);
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut policy = Policy::default();
        policy.add_member("roles/drive.file", MEMBER);
        let before = policy.clone();

        assert_eq!(policy.add_member("roles/drive.file", MEMBER), BindingChange::AlreadyPresent);
        assert_eq!(policy, before);
    }

    #[test]
    fn add_member_skips_conditional_bindings() {
        let mut policy: Policy = serde_json::from_value(existing_policy()).unwrap();

        policy.add_member("roles/drive.file", MEMBER);

        assert_eq!(policy.bindings.len(), 3);
        assert_eq!(policy.bindings[1].members, ["group:temps@example.com"]);
        assert_eq!(policy.bindings[2].members, [MEMBER]);
    }

    #[test]
    fn policy_round_trip_keeps_unknown_fields() {
        let policy: Policy = serde_json::from_value(existing_policy()).unwrap();
        let value = serde_json::to_value(&policy).unwrap();

        assert_eq!(value["auditConfigs"], existing_policy()["auditConfigs"]);
        assert_eq!(value["bindings"][1]["condition"]["title"], "expires");
    }

    #[tokio::test]
    async fn add_binding_writes_policy_with_etag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:getIamPolicy")))
            .and(body_partial_json(json!({"options": {"requestedPolicyVersion": 3}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(existing_policy()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .and(body_partial_json(json!({"policy": {"etag": "BwXhqDbTjPU=", "version": 3}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"etag": "BwXhqDbTjPV="})))
            .expect(1)
            .mount(&server)
            .await;

        let change = client_for(&server)
            .add_project_binding(PROJECT, "roles/drive.file", MEMBER)
            .await
            .unwrap();

        assert_eq!(change, BindingChange::Added);
    }

    #[tokio::test]
    async fn add_binding_skips_write_when_member_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:getIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "etag": "abc",
                "bindings": [{"role": "roles/drive.file", "members": [MEMBER]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let change = client_for(&server)
            .add_project_binding(PROJECT, "roles/drive.file", MEMBER)
            .await
            .unwrap();

        assert_eq!(change, BindingChange::AlreadyPresent);
    }

    #[tokio::test]
    async fn add_binding_retries_on_etag_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:getIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(existing_policy()))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "message": "There were concurrent policy changes.", "status": "ABORTED"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let change = client_for(&server)
            .add_project_binding(PROJECT, "roles/drive.file", MEMBER)
            .await
            .unwrap();

        assert_eq!(change, BindingChange::Added);
    }

    #[tokio::test]
    async fn add_binding_retries_member_not_yet_visible() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:getIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"etag": "abc"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": format!("Service account {MEMBER} does not exist."), "status": "INVALID_ARGUMENT"}
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let change = client_for(&server)
            .add_project_binding(PROJECT, "roles/drive.file", MEMBER)
            .await
            .unwrap();

        assert_eq!(change, BindingChange::Added);
    }

    #[tokio::test]
    async fn add_binding_reports_persistent_conflict_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:getIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"etag": "abc"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(409))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .add_project_binding(PROJECT, "roles/drive.file", MEMBER)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Transient { operation: Operation::SetPolicy, attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn add_binding_does_not_retry_other_bad_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:getIamPolicy")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"etag": "abc"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{PROJECT}:setIamPolicy")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "Role roles/drive.fil is not supported for this resource."}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .add_project_binding(PROJECT, "roles/drive.fil", MEMBER)
            .await
            .unwrap_err();

        assert!(err.has_status(400));
    }
}
