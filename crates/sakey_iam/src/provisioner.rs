//! The provisioning seam and the account, role, key workflow built on it.

use std::fmt;
use std::pin::Pin;

use sakey_core::{ServiceAccountKey, ServiceAccountRequest};
use serde::{Deserialize, Serialize};
#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::error::ProvisionError;

/// A pinned, boxed, `Send` future used as the return type for async provisioning calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A service account as reported by the identity-management API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    /// Resource name, `projects/<project>/serviceAccounts/<email>`.
    #[serde(default)]
    pub name: String,
    /// Owning project.
    #[serde(default)]
    pub project_id: String,
    /// Numeric identifier, also used as the OAuth client id.
    #[serde(default)]
    pub unique_id: String,
    /// Account email.
    pub email: String,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the account is disabled.
    #[serde(default)]
    pub disabled: bool,
}

impl ServiceAccount {
    /// Returns the IAM policy member string for the account.
    #[must_use]
    pub fn member(&self) -> String {
        format!("serviceAccount:{}", self.email)
    }
}

/// Outcome of granting a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingChange {
    /// The member was added to the role binding.
    Added,
    /// The member already held the role; the policy was left unchanged.
    AlreadyPresent,
}

/// One step of the provisioning workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Making sure no account already uses the display name.
    CheckDisplayName,
    /// Creating the account.
    CreateAccount,
    /// Granting the role on the project.
    BindRole,
    /// Issuing a new JSON key.
    CreateKey,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Self; 4] = [Self::CheckDisplayName, Self::CreateAccount, Self::BindRole, Self::CreateKey];

    /// Describes what the step does for `request`.
    #[must_use]
    pub fn describe(self, request: &ServiceAccountRequest) -> String {
        match self {
            Self::CheckDisplayName => format!(
                "check that no account in {} is named \"{}\"",
                request.project_id, request.display_name
            ),
            Self::CreateAccount => format!("create service account {}", request.account_email()),
            Self::BindRole => format!("grant {} on project {}", request.role, request.project_id),
            Self::CreateKey => "create a JSON key".to_string(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CheckDisplayName => "checking display name",
            Self::CreateAccount => "creating service account",
            Self::BindRole => "granting role",
            Self::CreateKey => "creating key",
        };
        f.write_str(label)
    }
}

/// Everything produced by a successful run.
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// The new account.
    pub account: ServiceAccount,
    /// Whether the role binding had to be added.
    pub binding: BindingChange,
    /// The new key. Its material must go straight to the credential writer.
    pub key: ServiceAccountKey,
}

/// Backend able to perform the individual provisioning calls.
pub trait Provisioner: Send + Sync {
    /// Returns the account in `project_id` whose display name equals `display_name`, if any.
    fn find_by_display_name<'a>(
        &'a self,
        project_id: &'a str,
        display_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<ServiceAccount>, ProvisionError>>;

    /// Creates the account. Fails with [`ProvisionError::Conflict`] if the id is taken.
    fn create_service_account<'a>(
        &'a self,
        request: &'a ServiceAccountRequest,
    ) -> BoxFuture<'a, Result<ServiceAccount, ProvisionError>>;

    /// Grants `role` on `project_id` to `member`.
    fn bind_role<'a>(
        &'a self,
        project_id: &'a str,
        role: &'a str,
        member: &'a str,
    ) -> BoxFuture<'a, Result<BindingChange, ProvisionError>>;

    /// Issues a new JSON key for `account`.
    fn create_key<'a>(&'a self, account: &'a ServiceAccount) -> BoxFuture<'a, Result<ServiceAccountKey, ProvisionError>>;
}

/// Runs the full workflow: uniqueness check, create, bind, key.
pub async fn provision(
    provisioner: &dyn Provisioner,
    request: &ServiceAccountRequest,
) -> Result<Provisioned, ProvisionError> {
    provision_with(provisioner, request, |_| {}).await
}

/// Like [`provision`], calling `on_step` before each step starts.
pub async fn provision_with<F>(
    provisioner: &dyn Provisioner,
    request: &ServiceAccountRequest,
    mut on_step: F,
) -> Result<Provisioned, ProvisionError>
where
    F: FnMut(Step) + Send,
{
    on_step(Step::CheckDisplayName);
    if let Some(existing) = provisioner
        .find_by_display_name(&request.project_id, &request.display_name)
        .await?
    {
        #[cfg(feature = "tracing")]
        debug!(email = %existing.email, "display name already in use");
        return Err(ProvisionError::Conflict {
            account_email: existing.email,
        });
    }

    on_step(Step::CreateAccount);
    let account = provisioner.create_service_account(request).await?;

    #[cfg(feature = "tracing")]
    info!(email = %account.email, "service account created");

    let incomplete = |source: ProvisionError| ProvisionError::Incomplete {
        account_email: account.email.clone(),
        source: Box::new(source),
    };

    on_step(Step::BindRole);
    let binding = provisioner
        .bind_role(&request.project_id, &request.role, &account.member())
        .await
        .map_err(incomplete)?;

    on_step(Step::CreateKey);
    let key = provisioner.create_key(&account).await.map_err(incomplete)?;

    #[cfg(feature = "tracing")]
    info!(
        email = %account.email,
        key_id = %key.key_id,
        fingerprint = key.fingerprint(),
        "key created"
    );

    Ok(Provisioned { account, binding, key })
}
