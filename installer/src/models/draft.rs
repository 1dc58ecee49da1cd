// Draft configuration accumulated across wizard steps.
//
// Lives only in memory, owned by one wizard session. Nothing here is written to disk until
// `ConfigStore::commit` runs on the final step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database engines the wiki can run on. Serialized names match the installer form values;
/// reading accepts them in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DatabaseProvider {
    SqlServer2008,
    SqlServer2012,
    MySql,
    Postgres,
    Sqlite,
}

/// Client family used to reach a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    SqlServer,
    MySql,
    Postgres,
    Sqlite,
}

impl DatabaseProvider {
    pub const ALL: [DatabaseProvider; 5] = [
        DatabaseProvider::SqlServer2008,
        DatabaseProvider::SqlServer2012,
        DatabaseProvider::MySql,
        DatabaseProvider::Postgres,
        DatabaseProvider::Sqlite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseProvider::SqlServer2008 => "SqlServer2008",
            DatabaseProvider::SqlServer2012 => "SqlServer2012",
            DatabaseProvider::MySql => "MySql",
            DatabaseProvider::Postgres => "Postgres",
            DatabaseProvider::Sqlite => "Sqlite",
        }
    }

    pub fn family(&self) -> EngineFamily {
        match self {
            DatabaseProvider::SqlServer2008 | DatabaseProvider::SqlServer2012 => {
                EngineFamily::SqlServer
            }
            DatabaseProvider::MySql => EngineFamily::MySql,
            DatabaseProvider::Postgres => EngineFamily::Postgres,
            DatabaseProvider::Sqlite => EngineFamily::Sqlite,
        }
    }
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DatabaseProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown database provider: {}", wanted))
    }
}

impl<'de> Deserialize<'de> for DatabaseProvider {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkupType {
    #[default]
    Creole,
    Markdown,
    MediaWiki,
}

/// String whose contents never show up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

/// In-progress install configuration.
#[derive(Debug, Clone, Default)]
pub struct WizardDraft {
    pub site_name: Option<String>,
    pub site_url: Option<String>,
    pub database_provider: Option<DatabaseProvider>,
    pub connection_string: Option<SecretString>,
    pub admin_email: Option<String>,
    pub admin_password: Option<SecretString>,
    pub enable_object_cache: bool,
    pub attachments_folder: Option<String>,
    pub markup_type: MarkupType,
    pub theme: Option<String>,
    pub allow_user_signup: bool,
}

/// Draft fields, as populated by individual steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    DatabaseProvider,
    ConnectionString,
    SiteName,
    SiteUrl,
    AttachmentsFolder,
    MarkupType,
    Theme,
    EnableObjectCache,
    AllowUserSignup,
    AdminEmail,
    AdminPassword,
}

impl WizardDraft {
    /// Reset a field to its initial (unset) value.
    pub fn clear(&mut self, field: DraftField) {
        match field {
            DraftField::DatabaseProvider => self.database_provider = None,
            DraftField::ConnectionString => self.connection_string = None,
            DraftField::SiteName => self.site_name = None,
            DraftField::SiteUrl => self.site_url = None,
            DraftField::AttachmentsFolder => self.attachments_folder = None,
            DraftField::MarkupType => self.markup_type = MarkupType::default(),
            DraftField::Theme => self.theme = None,
            DraftField::EnableObjectCache => self.enable_object_cache = false,
            DraftField::AllowUserSignup => self.allow_user_signup = false,
            DraftField::AdminEmail => self.admin_email = None,
            DraftField::AdminPassword => self.admin_password = None,
        }
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            site_name: self.site_name.clone(),
            site_url: self.site_url.clone(),
            database_provider: self.database_provider,
            connection_string_set: self.connection_string.is_some(),
            admin_email: self.admin_email.clone(),
            enable_object_cache: self.enable_object_cache,
            attachments_folder: self.attachments_folder.clone(),
            markup_type: self.markup_type,
            theme: self.theme.clone(),
            allow_user_signup: self.allow_user_signup,
        }
    }
}

/// Non-secret projection of the draft for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub site_name: Option<String>,
    pub site_url: Option<String>,
    pub database_provider: Option<DatabaseProvider>,
    pub connection_string_set: bool,
    pub admin_email: Option<String>,
    pub enable_object_cache: bool,
    pub attachments_folder: Option<String>,
    pub markup_type: MarkupType,
    pub theme: Option<String>,
    pub allow_user_signup: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_form_values_case_insensitively() {
        assert_eq!(
            "SqlServer2008".parse::<DatabaseProvider>(),
            Ok(DatabaseProvider::SqlServer2008)
        );
        assert_eq!(
            " postgres ".parse::<DatabaseProvider>(),
            Ok(DatabaseProvider::Postgres)
        );
        assert!("Oracle".parse::<DatabaseProvider>().is_err());
    }

    #[test]
    fn provider_serializes_with_form_names() {
        let json = serde_json::to_string(&DatabaseProvider::SqlServer2008).unwrap();
        assert_eq!(json, "\"SqlServer2008\"");
    }

    #[test]
    fn secret_debug_never_prints_value() {
        let secret = SecretString::new("password");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("password"), "leaked: {}", debug);
    }

    #[test]
    fn draft_view_hides_secrets() {
        let draft = WizardDraft {
            connection_string: Some("Server=x;Password=hunter2;".into()),
            admin_password: Some("hunter2".into()),
            ..WizardDraft::default()
        };
        let json = serde_json::to_string(&draft.view()).unwrap();
        assert!(!json.contains("hunter2"), "leaked: {}", json);
        assert!(json.contains("\"connectionStringSet\":true"));
    }

    #[test]
    fn clear_resets_field_to_default() {
        let mut draft = WizardDraft {
            enable_object_cache: true,
            markup_type: MarkupType::Markdown,
            site_name: Some("wiki".into()),
            ..WizardDraft::default()
        };
        draft.clear(DraftField::EnableObjectCache);
        draft.clear(DraftField::MarkupType);
        draft.clear(DraftField::SiteName);
        assert!(!draft.enable_object_cache);
        assert_eq!(draft.markup_type, MarkupType::Creole);
        assert_eq!(draft.site_name, None);
    }
}
