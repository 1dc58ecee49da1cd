//! Error types returned by the installer engine.
//!
//! Every failure the wizard can report is a typed value. Hosts translate them
//! into user-facing text through `LocalizationProvider::localize_error`, using
//! the stable `message_key()` each error exposes.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::state::WizardState;

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    Required,
    TooLong,
    PasswordMismatch,
    WeakPassword,
    InvalidEmail,
}

impl ValidationReason {
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationReason::Required => "error.required",
            ValidationReason::TooLong => "error.too_long",
            ValidationReason::PasswordMismatch => "error.password_mismatch",
            ValidationReason::WeakPassword => "error.weak_password",
            ValidationReason::InvalidEmail => "error.invalid_email",
        }
    }
}

/// A user-correctable problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason:?}")]
pub struct ValidationError {
    /// Form field name, as the UI knows it (e.g. `AdminPassword`).
    pub field: &'static str,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: ValidationReason) -> Self {
        Self { field, reason }
    }
}

/// The target path cannot be written by the installer process.
#[derive(Debug, Clone, Error)]
#[error("not writable: {path:?} ({reason})")]
pub struct NotWritable {
    pub path: PathBuf,
    pub reason: String,
}

/// An external resource needed by a step could not be reached.
///
/// `detail` is safe to show; internal details (masked) only go to the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource} unavailable: {detail}")]
pub struct DependencyUnavailable {
    pub resource: &'static str,
    pub detail: String,
}

impl DependencyUnavailable {
    pub fn new(resource: &'static str, detail: impl Into<String>) -> Self {
        Self {
            resource,
            detail: detail.into(),
        }
    }
}

/// Failures of the durable configuration commit/load.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("the site is already installed")]
    AlreadyInstalled,

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("connection record provider {record} does not match configured provider {config}")]
    Inconsistent { config: String, record: String },

    #[error("another install is committing (lock file {path:?} exists)")]
    Locked { path: PathBuf },

    #[error("secret protection failed: {0}")]
    Secret(String),

    #[error("draft is missing {0}")]
    IncompleteDraft(&'static str),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Everything `advance`, `back` and `complete` can return.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    DependencyUnavailable(#[from] DependencyUnavailable),

    #[error("failed to persist configuration: {0}")]
    Persist(PersistError),

    #[error("the site is already installed")]
    AlreadyInstalled,

    #[error("invalid transition: {attempted} requested while in {state}")]
    InvalidTransition {
        state: WizardState,
        attempted: &'static str,
    },

    #[error("another request is already running for this wizard session")]
    SessionBusy,
}

impl From<PersistError> for WizardError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::AlreadyInstalled => WizardError::AlreadyInstalled,
            other => WizardError::Persist(other),
        }
    }
}

impl WizardError {
    pub fn message_key(&self) -> &'static str {
        match self {
            WizardError::Validation(v) => v.reason.message_key(),
            WizardError::DependencyUnavailable(d) => match d.resource {
                "database" => "error.database_unavailable",
                _ => "error.not_writable",
            },
            WizardError::Persist(_) => "error.persist_failed",
            WizardError::AlreadyInstalled => "info.already_installed",
            WizardError::InvalidTransition { .. } => "error.invalid_transition",
            WizardError::SessionBusy => "error.session_busy",
        }
    }

    /// True for errors the user can fix and retry on the same step.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            WizardError::Validation(_) | WizardError::DependencyUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_installed_persist_error_maps_to_wizard_variant() {
        let err: WizardError = PersistError::AlreadyInstalled.into();
        assert!(matches!(err, WizardError::AlreadyInstalled));
        assert_eq!(err.message_key(), "info.already_installed");
    }

    #[test]
    fn io_persist_error_stays_wrapped() {
        let err: WizardError = PersistError::io(
            "/nope/roadkill.toml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        assert!(matches!(err, WizardError::Persist(PersistError::Io { .. })));
        assert!(!err.is_user_correctable());
    }

    #[test]
    fn dependency_errors_pick_resource_specific_keys() {
        let db: WizardError = DependencyUnavailable::new("database", "down").into();
        let fs: WizardError = DependencyUnavailable::new("attachments", "read-only").into();
        assert_eq!(db.message_key(), "error.database_unavailable");
        assert_eq!(fs.message_key(), "error.not_writable");
        assert!(db.is_user_correctable());
    }

    #[test]
    fn validation_display_names_field() {
        let err = ValidationError::new("AdminPassword", ValidationReason::PasswordMismatch);
        assert_eq!(err.to_string(), "AdminPassword: PasswordMismatch");
    }
}
