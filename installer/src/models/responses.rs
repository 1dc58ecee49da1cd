// Read models returned to the host UI

use serde::Serialize;

use super::config::PersistedConfig;
use super::draft::DraftView;
use super::state::WizardState;
use crate::api::admin::AdminIdentity;
use crate::localization::{Language, LocalizationProvider};

/// Snapshot for rendering the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub state: WizardState,
    pub step_number: u8,
    pub total_steps: u8,
    /// Catalog key of the page title; resolve with `LocalizationProvider`.
    pub title_key: &'static str,
    pub draft: DraftView,
}

impl StepView {
    pub fn localized_title(&self, provider: &LocalizationProvider, language: Language) -> String {
        provider.resolve(language, self.title_key)
    }
}

/// Result of a successful `complete()`.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub config: PersistedConfig,
    /// For the host's user store to persist; the installer keeps no copy.
    pub admin: AdminIdentity,
}
