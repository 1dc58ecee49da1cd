// Step input models
//
// One variant per input-taking wizard step. The variant names the step it belongs to, so a form
// submitted for the wrong step is detected before anything is validated.

use serde::Deserialize;

use super::draft::{DatabaseProvider, MarkupType, SecretString};
use super::state::WizardState;

/// Database page: which engine, and how to reach it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfigInput {
    pub database_provider: DatabaseProvider,
    pub connection_string: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettingsInput {
    pub site_name: String,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default = "default_attachments_folder")]
    pub attachments_folder: String,
    #[serde(default)]
    pub markup_type: MarkupType,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub enable_object_cache: bool,
    #[serde(default)]
    pub allow_user_signup: bool,
}

pub fn default_attachments_folder() -> String {
    "App_Data/Attachments".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccountInput {
    pub admin_email: String,
    pub admin_password: SecretString,
    pub confirm_password: SecretString,
}

#[derive(Debug, Clone)]
pub enum StepInput {
    /// "Start" on the language/welcome page.
    Welcome,
    TestConfig(TestConfigInput),
    SiteSettings(SiteSettingsInput),
    AdminAccount(AdminAccountInput),
}

impl StepInput {
    /// The step this input was produced by.
    pub fn step(&self) -> WizardState {
        match self {
            StepInput::Welcome => WizardState::Welcome,
            StepInput::TestConfig(_) => WizardState::TestConfig,
            StepInput::SiteSettings(_) => WizardState::SiteSettings,
            StepInput::AdminAccount(_) => WizardState::AdminAccount,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            StepInput::Welcome => "advance(welcome)",
            StepInput::TestConfig(_) => "advance(test_config)",
            StepInput::SiteSettings(_) => "advance(site_settings)",
            StepInput::AdminAccount(_) => "advance(admin_account)",
        }
    }
}

/// Answers for a non-interactive run, one table per step (`--answers <file>`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswersFile {
    #[serde(default)]
    pub language: Option<String>,
    pub database: TestConfigInput,
    pub site: SiteSettingsInput,
    pub admin: AdminAccountInput,
}

impl AnswersFile {
    /// Inputs in wizard order.
    pub fn into_inputs(self) -> Vec<StepInput> {
        vec![
            StepInput::Welcome,
            StepInput::TestConfig(self.database),
            StepInput::SiteSettings(self.site),
            StepInput::AdminAccount(self.admin),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_file_parses_into_ordered_inputs() {
        let text = r#"
language = "de"

[database]
databaseProvider = "SqlServer2008"
connectionString = 'Server=(LocalDB)\v11.0;Integrated Security=true;'

[site]
siteName = "Acceptance tests"
enableObjectCache = true

[admin]
adminEmail = "admin@localhost"
adminPassword = "password"
confirmPassword = "password"
"#;
        let answers: AnswersFile = toml::from_str(text).unwrap();
        assert_eq!(answers.language.as_deref(), Some("de"));
        assert_eq!(answers.site.attachments_folder, "App_Data/Attachments");

        let steps: Vec<WizardState> = answers.into_inputs().iter().map(StepInput::step).collect();
        assert_eq!(
            steps,
            vec![
                WizardState::Welcome,
                WizardState::TestConfig,
                WizardState::SiteSettings,
                WizardState::AdminAccount,
            ]
        );
    }

    #[test]
    fn provider_names_are_read_in_any_case() {
        let text = r#"
[database]
databaseProvider = "sqlserver2008"
connectionString = "Server=db;Database=wiki;"

[site]
siteName = "Lowercase provider"

[admin]
adminEmail = "admin@localhost"
adminPassword = "password"
confirmPassword = "password"
"#;
        let answers: AnswersFile = toml::from_str(text).unwrap();
        assert_eq!(answers.database.database_provider, DatabaseProvider::SqlServer2008);

        let bad = text.replace("sqlserver2008", "oracle");
        let err = toml::from_str::<AnswersFile>(&bad).unwrap_err();
        assert!(err.to_string().contains("Unknown database provider"));
    }
}
