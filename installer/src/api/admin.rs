// Administrator account bootstrap
//
// Validates the credentials entered on the admin page and, at completion, turns them into an
// `AdminIdentity` with a salted PBKDF2 hash. Nothing is stored here; the host's user store
// persists the identity.

use chrono::{DateTime, Utc};
use log::{error, info};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::{PersistError, ValidationError, ValidationReason, WizardError};
use crate::security::password;
use crate::utils::settings::InstallerSettings;

pub const ADMIN_ROLE: &str = "Admin";
pub const EDITOR_ROLE: &str = "Editor";

/// The first administrator, ready for the host's user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub id: Uuid,
    pub email: String,
    /// `pbkdf2-sha256$<iterations>$<salt>$<hash>`
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrapper {
    min_password_length: usize,
    pbkdf2_iterations: u32,
}

impl AdminBootstrapper {
    pub fn new(min_password_length: usize, pbkdf2_iterations: u32) -> Self {
        Self {
            min_password_length,
            pbkdf2_iterations,
        }
    }

    pub fn from_settings(settings: &InstallerSettings) -> Self {
        Self::new(settings.min_password_length, settings.pbkdf2_iterations)
    }

    /// First failing rule wins: email, then password confirmation, then strength.
    pub fn check_credentials(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), ValidationError> {
        check_credential_shape(email, password, confirm)?;
        self.check_password_policy(password)
    }

    /// Strength rule alone; the minimum length comes from the installer settings.
    pub fn check_password_policy(&self, password: &str) -> Result<(), ValidationError> {
        if password.trim().is_empty() || password.chars().count() < self.min_password_length {
            return Err(ValidationError::new(
                "AdminPassword",
                ValidationReason::WeakPassword,
            ));
        }
        Ok(())
    }

    pub fn provision(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<AdminIdentity, WizardError> {
        self.check_credentials(email, password, confirm)?;
        let password_hash = password::hash_password(password, self.pbkdf2_iterations)
            .map_err(|e| PersistError::Secret(e.to_string()))?;

        let identity = AdminIdentity {
            id: Uuid::new_v4(),
            email: email.trim().to_string(),
            password_hash,
            roles: vec![ADMIN_ROLE.to_string(), EDITOR_ROLE.to_string()],
            created_utc: Utc::now(),
        };
        info!(
            "[PHASE: install] [STEP: admin] Provisioned administrator {} (roles={:?})",
            identity.id, identity.roles
        );
        Ok(identity)
    }

    pub fn verify_password(&self, password_hash: &str, candidate: &str) -> bool {
        password::verify_password(password_hash, candidate)
    }
}

/// Credential rules that need no configuration: email present and plausible, password present
/// and confirmed.
pub fn check_credential_shape(
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::new("AdminEmail", ValidationReason::Required));
    }
    if !is_plausible_email(email) {
        return Err(ValidationError::new(
            "AdminEmail",
            ValidationReason::InvalidEmail,
        ));
    }
    if password.is_empty() {
        return Err(ValidationError::new(
            "AdminPassword",
            ValidationReason::Required,
        ));
    }
    if password != confirm {
        return Err(ValidationError::new(
            "ConfirmPassword",
            ValidationReason::PasswordMismatch,
        ));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    // Deliberately loose: `admin@localhost` is a valid intranet address.
    let pattern = PATTERN.get_or_init(|| match Regex::new(r"^[^@\s]+@[^@\s]+$") {
        Ok(re) => Some(re),
        Err(e) => {
            error!("[PHASE: wizard] [STEP: admin_account] Email pattern failed to compile: {}", e);
            None
        }
    });
    match pattern {
        Some(re) => re.is_match(email),
        None => email.split('@').filter(|p| !p.is_empty()).count() == 2,
    }
}
