//! Provisioning client for sakey.
//!
//! Creates a service account, grants it a role on its project and issues a
//! JSON key, talking to the IAM and Resource Manager REST APIs with the
//! caller's own OAuth access token.
//!
//! # Main Types
//!
//! - [`Provisioner`] - The seam the workflow runs against
//! - [`IamClient`] - The HTTP implementation of [`Provisioner`]
//! - [`provision`] - Runs uniqueness check, create, bind and key in order
//! - [`ProvisionError`] - Authorization, conflict and transient failures

mod client;
mod error;
mod provisioner;
mod settings;
mod token;

pub use client::{Binding, IamClient, Policy};
pub use error::{Operation, ProvisionError};
pub use provisioner::{BindingChange, BoxFuture, Provisioned, Provisioner, ServiceAccount, Step, provision, provision_with};
pub use settings::ClientSettings;
pub use token::AccessToken;

/// HTTP `User-Agent` header sent with every API request.
pub(crate) const USER_AGENT: &str = concat!("sakey/", env!("CARGO_PKG_VERSION"));
