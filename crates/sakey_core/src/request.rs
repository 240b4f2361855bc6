//! Service account creation requests and their validation rules.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Domain suffix appended to `<account_id>@<project_id>` to form an account email.
pub const SERVICE_ACCOUNT_DOMAIN: &str = "iam.gserviceaccount.com";

/// Maximum length of a service account display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// Maximum length of a service account description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 256;

const MIN_ACCOUNT_ID_LEN: usize = 6;
const MAX_ACCOUNT_ID_LEN: usize = 30;

static PROJECT_ID: LazyLock<Regex> = LazyLock::new(|| compile(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$"));
static ACCOUNT_ID: LazyLock<Regex> = LazyLock::new(|| compile(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$"));
static PREDEFINED_ROLE: LazyLock<Regex> = LazyLock::new(|| compile(r"^roles/[A-Za-z0-9_.]+$"));
static CUSTOM_ROLE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(projects/[a-z][a-z0-9-]{4,28}[a-z0-9]|organizations/[0-9]+)/roles/[A-Za-z0-9_.]+$"));

#[expect(clippy::expect_used, reason = "static patterns; failure is a programmer error")]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid built-in regex")
}

/// Errors raised when a request does not satisfy the provider's naming rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// No project identifier was supplied.
    #[error("project_id must not be empty")]
    EmptyProjectId,

    /// The project identifier does not follow the provider's grammar.
    #[error(
        "invalid project_id '{0}': expected 6-30 lowercase letters, digits or hyphens, starting with a letter"
    )]
    InvalidProjectId(String),

    /// No display name was supplied.
    #[error("display_name must not be empty")]
    EmptyDisplayName,

    /// The display name exceeds the provider limit.
    #[error("display_name is {0} characters long (limit is {MAX_DISPLAY_NAME_CHARS})")]
    DisplayNameTooLong(usize),

    /// The role is neither a predefined nor a custom IAM role name.
    #[error(
        "invalid role '{0}': expected 'roles/<name>', 'projects/<id>/roles/<name>' or 'organizations/<id>/roles/<name>'"
    )]
    InvalidRole(String),

    /// The account id is malformed, or could not be derived from the display name.
    #[error("invalid account_id '{0}': expected 6-30 lowercase letters, digits or hyphens, starting with a letter")]
    InvalidAccountId(String),

    /// The description exceeds the provider limit.
    #[error("description is {0} characters long (limit is {MAX_DESCRIPTION_CHARS})")]
    DescriptionTooLong(usize),
}

/// Everything needed to create a service account, grant it a role and issue a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountRequest {
    /// Project that will own the account.
    pub project_id: String,
    /// Human-readable name shown in the console. Unique within the project.
    pub display_name: String,
    /// IAM role granted to the account on the project.
    pub role: String,
    /// Local part of the account email.
    pub account_id: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServiceAccountRequest {
    /// Starts building a request. The account id defaults to one derived
    /// from `display_name`.
    #[must_use]
    pub fn builder(
        project_id: impl Into<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
    ) -> ServiceAccountRequestBuilder {
        ServiceAccountRequestBuilder {
            project_id: project_id.into(),
            display_name: display_name.into(),
            role: role.into(),
            account_id: None,
            description: None,
        }
    }

    /// Checks every field against the provider's naming rules.
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_project_id(&self.project_id)?;
        validate_display_name(&self.display_name)?;
        validate_role(&self.role)?;

        if !ACCOUNT_ID.is_match(&self.account_id) {
            return Err(RequestError::InvalidAccountId(self.account_id.clone()));
        }

        if let Some(description) = &self.description {
            let chars = description.chars().count();
            if chars > MAX_DESCRIPTION_CHARS {
                return Err(RequestError::DescriptionTooLong(chars));
            }
        }

        Ok(())
    }

    /// Returns the email the account will have once created.
    #[must_use]
    pub fn account_email(&self) -> String {
        format!("{}@{}.{SERVICE_ACCOUNT_DOMAIN}", self.account_id, self.project_id)
    }

    /// Returns the IAM policy member string for the account.
    #[must_use]
    pub fn member(&self) -> String {
        format!("serviceAccount:{}", self.account_email())
    }
}

/// Builder returned by [`ServiceAccountRequest::builder`].
#[derive(Debug, Clone)]
pub struct ServiceAccountRequestBuilder {
    project_id: String,
    display_name: String,
    role: String,
    account_id: Option<String>,
    description: Option<String>,
}

impl ServiceAccountRequestBuilder {
    /// Uses an explicit account id instead of deriving one.
    #[must_use]
    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Sets the account description. Blank descriptions are dropped.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    /// Trims the inputs, derives the account id if needed, and validates the result.
    pub fn build(self) -> Result<ServiceAccountRequest, RequestError> {
        let project_id = self.project_id.trim().to_string();
        let display_name = self.display_name.trim().to_string();
        let role = self.role.trim().to_string();

        validate_project_id(&project_id)?;
        validate_display_name(&display_name)?;

        let account_id = match self.account_id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => derive_account_id(&display_name)
                .ok_or_else(|| RequestError::InvalidAccountId(slugify(&display_name)))?,
        };

        let request = ServiceAccountRequest {
            project_id,
            display_name,
            role,
            account_id,
            description: self.description,
        };

        request.validate()?;
        Ok(request)
    }
}

/// Derives an account id from a display name.
///
/// Lowercases the name, collapses every run of other characters into a single
/// hyphen, strips leading non-letters and truncates to 30 characters. Returns
/// `None` when fewer than 6 characters survive.
#[must_use]
pub fn derive_account_id(display_name: &str) -> Option<String> {
    let slug = slugify(display_name);
    (slug.len() >= MIN_ACCOUNT_ID_LEN).then_some(slug)
}

fn slugify(display_name: &str) -> String {
    let mut slug = String::with_capacity(display_name.len());

    for c in display_name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || (c.is_ascii_digit() && !slug.is_empty()) {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.truncate(MAX_ACCOUNT_ID_LEN);
    slug.trim_end_matches('-').to_string()
}

fn validate_project_id(project_id: &str) -> Result<(), RequestError> {
    if project_id.is_empty() {
        return Err(RequestError::EmptyProjectId);
    }
    if !PROJECT_ID.is_match(project_id) {
        return Err(RequestError::InvalidProjectId(project_id.to_string()));
    }
    Ok(())
}

fn validate_display_name(display_name: &str) -> Result<(), RequestError> {
    if display_name.is_empty() {
        return Err(RequestError::EmptyDisplayName);
    }
    let chars = display_name.chars().count();
    if chars > MAX_DISPLAY_NAME_CHARS {
        return Err(RequestError::DisplayNameTooLong(chars));
    }
    Ok(())
}

fn validate_role(role: &str) -> Result<(), RequestError> {
    if PREDEFINED_ROLE.is_match(role) || CUSTOM_ROLE.is_match(role) {
        Ok(())
    } else {
        Err(RequestError::InvalidRole(role.to_string()))
    }
}
