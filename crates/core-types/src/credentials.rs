//! Credential records and the extraction of flow-ready credentials.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named field inside a custom credential record. Order is preserved as
/// stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub value: String,
}

/// One typed credential record. A bundle may hold several records of
/// different kinds for the same identity (e.g. a password plus an
/// authenticator secret).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialRecord {
    UsernamePassword { username: String, password: String },
    Authenticator { secret: String },
    Custom { fields: Vec<CustomField> },
}

/// The full set of records stored for one identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub display_name: String,
    pub records: Vec<CredentialRecord>,
}

impl CredentialBundle {
    pub fn new(display_name: impl Into<String>, records: Vec<CredentialRecord>) -> Self {
        Self {
            display_name: display_name.into(),
            records,
        }
    }
}

/// Extraction failed because required fields were absent from the bundle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("missing credential field(s): {}", fields.join(", "))]
pub struct ExtractionError {
    pub fields: Vec<String>,
}

const USERNAME_ALIASES: &[&str] = &["username", "email", "login"];
const PASSWORD_ALIASES: &[&str] = &["password"];
const ORGANIZATION_ALIASES: &[&str] = &["organization", "company", "tenant"];

fn matches_alias(name: &str, aliases: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    aliases.iter().any(|alias| lowered.contains(alias))
}

/// The subset of fields a login flow actually needs, pulled out of a
/// [`CredentialBundle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub username: String,
    pub password: String,
    pub otp: Option<String>,
    pub organization: Option<String>,
}

impl ResolvedCredentials {
    /// Extract flow-ready credentials from a bundle.
    ///
    /// `UsernamePassword` records win over custom fields for the required
    /// pair. Custom record fields are matched case-insensitively by
    /// substring against a small alias set. Fails if username or password
    /// is still empty afterwards, naming the absent field(s).
    pub fn from_bundle(bundle: &CredentialBundle) -> Result<Self, ExtractionError> {
        let mut username = String::new();
        let mut password = String::new();
        let mut otp = None;
        let mut organization = None;

        for record in &bundle.records {
            match record {
                CredentialRecord::UsernamePassword {
                    username: user,
                    password: pass,
                } => {
                    if username.is_empty() {
                        username = user.clone();
                    }
                    if password.is_empty() {
                        password = pass.clone();
                    }
                }
                CredentialRecord::Authenticator { secret } => {
                    if otp.is_none() && !secret.is_empty() {
                        otp = Some(secret.clone());
                    }
                }
                CredentialRecord::Custom { fields } => {
                    for field in fields {
                        if field.value.is_empty() {
                            continue;
                        }
                        if username.is_empty() && matches_alias(&field.name, USERNAME_ALIASES) {
                            username = field.value.clone();
                        } else if password.is_empty()
                            && matches_alias(&field.name, PASSWORD_ALIASES)
                        {
                            password = field.value.clone();
                        } else if organization.is_none()
                            && matches_alias(&field.name, ORGANIZATION_ALIASES)
                        {
                            organization = Some(field.value.clone());
                        }
                    }
                }
            }
        }

        let mut missing = Vec::new();
        if username.is_empty() {
            missing.push("username".to_string());
        }
        if password.is_empty() {
            missing.push("password".to_string());
        }
        if !missing.is_empty() {
            return Err(ExtractionError { fields: missing });
        }

        Ok(Self {
            username,
            password,
            otp,
            organization,
        })
    }

    pub fn has_otp(&self) -> bool {
        self.otp.is_some()
    }
}
