// Wizard step table
//
// One immutable descriptor per input-taking page, in wizard order. The state machine looks up
// the descriptor for the current state and runs its shape predicate, then its follow-up check.
// Summary takes no input and has no descriptor. Nothing here depends on the display language.

use crate::api::admin::check_credential_shape;
use crate::errors::ValidationError;
use crate::models::draft::DraftField;
use crate::models::requests::StepInput;
use crate::models::state::WizardState;
use crate::utils::validation::{require, validate_connection_string, validate_site_name};

/// Check a step performs after its predicate passes, against state the predicate cannot see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyCheck {
    /// The target site must not already be installed.
    NotInstalled,
    /// Config documents writable, then the database reachable.
    ConfigAndDatabase,
    /// Attachments folder writable.
    AttachmentsFolder,
    /// Minimum password length. Not external: the length is configured and lives on
    /// `AdminBootstrapper`, so it runs after the shape predicate has checked email and
    /// confirmation.
    PasswordPolicy,
}

pub struct StepDescriptor {
    pub step: WizardState,
    pub title_key: &'static str,
    /// Draft fields this step populates; cleared again when the user goes back past it.
    pub fields: &'static [DraftField],
    pub dependency: DependencyCheck,
    pub predicate: fn(&StepInput) -> Result<(), ValidationError>,
}

pub static STEPS: [StepDescriptor; 4] = [
    StepDescriptor {
        step: WizardState::Welcome,
        title_key: "step.welcome.title",
        fields: &[],
        dependency: DependencyCheck::NotInstalled,
        predicate: accept_any,
    },
    StepDescriptor {
        step: WizardState::TestConfig,
        title_key: "step.test_config.title",
        fields: &[DraftField::DatabaseProvider, DraftField::ConnectionString],
        dependency: DependencyCheck::ConfigAndDatabase,
        predicate: test_config_shape,
    },
    StepDescriptor {
        step: WizardState::SiteSettings,
        title_key: "step.site_settings.title",
        fields: &[
            DraftField::SiteName,
            DraftField::SiteUrl,
            DraftField::AttachmentsFolder,
            DraftField::MarkupType,
            DraftField::Theme,
            DraftField::EnableObjectCache,
            DraftField::AllowUserSignup,
        ],
        dependency: DependencyCheck::AttachmentsFolder,
        predicate: site_settings_shape,
    },
    StepDescriptor {
        step: WizardState::AdminAccount,
        title_key: "step.admin_account.title",
        fields: &[DraftField::AdminEmail, DraftField::AdminPassword],
        dependency: DependencyCheck::PasswordPolicy,
        predicate: admin_account_shape,
    },
];

pub fn descriptor(state: WizardState) -> Option<&'static StepDescriptor> {
    STEPS.iter().find(|d| d.step == state)
}

/// Title key for any state, terminal ones included.
pub fn title_key(state: WizardState) -> &'static str {
    match state {
        WizardState::Summary => "step.summary.title",
        WizardState::Completed => "step.completed.title",
        WizardState::Failed => "step.failed.title",
        other => descriptor(other).map_or("step.welcome.title", |d| d.title_key),
    }
}

/// Fields populated by `state` and every step after it.
pub fn fields_from(state: WizardState) -> impl Iterator<Item = DraftField> {
    STEPS
        .iter()
        .filter(move |d| d.step.step_number() >= state.step_number())
        .flat_map(|d| d.fields.iter().copied())
}

fn accept_any(_: &StepInput) -> Result<(), ValidationError> {
    Ok(())
}

fn test_config_shape(input: &StepInput) -> Result<(), ValidationError> {
    match input {
        StepInput::TestConfig(i) => validate_connection_string(i.connection_string.expose()),
        _ => Ok(()),
    }
}

fn admin_account_shape(input: &StepInput) -> Result<(), ValidationError> {
    match input {
        StepInput::AdminAccount(i) => check_credential_shape(
            &i.admin_email,
            i.admin_password.expose(),
            i.confirm_password.expose(),
        ),
        _ => Ok(()),
    }
}

fn site_settings_shape(input: &StepInput) -> Result<(), ValidationError> {
    match input {
        StepInput::SiteSettings(i) => {
            validate_site_name(&i.site_name)?;
            require("AttachmentsFolder", &i.attachments_folder)?;
            Ok(())
        }
        _ => Ok(()),
    }
}
