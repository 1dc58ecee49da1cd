// Persisted configuration documents
//
// `roadkill.toml` holds the site settings and the `installed` flag.
// `connectionstrings.toml` holds the secret-bearing connection record, kept apart so it can be
// blanked or rotated without rewriting the site settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::draft::{DatabaseProvider, MarkupType};

/// Version of the `roadkill.toml` layout written by this installer.
pub const SCHEMA_VERSION: u32 = 1;

/// Key of the wiki's connection string entry.
pub const CONNECTION_NAME: &str = "Roadkill";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedConfig {
    pub site_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    pub database_provider: DatabaseProvider,
    pub enable_object_cache: bool,
    pub attachments_folder: String,
    #[serde(default)]
    pub markup_type: MarkupType,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub allow_user_signup: bool,
    #[serde(default = "default_admin_role")]
    pub admin_role_name: String,
    #[serde(default = "default_editor_role")]
    pub editor_role_name: String,
    #[serde(default)]
    pub use_windows_auth: bool,
    pub installed: bool,
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_version: Option<String>,
}

pub fn default_theme() -> String {
    "Responsive".to_string()
}

fn default_admin_role() -> String {
    "Admin".to_string()
}

fn default_editor_role() -> String {
    "Editor".to_string()
}

/// One named connection string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub provider: DatabaseProvider,
    /// Encrypted (`ENCv1:` prefix) on disk; plaintext values are tolerated on read.
    pub connection_string: String,
    pub updated_utc: DateTime<Utc>,
}

/// On-disk shape of `connectionstrings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStringsDocument {
    #[serde(default)]
    pub connection_strings: BTreeMap<String, ConnectionRecord>,
}

impl ConnectionStringsDocument {
    pub fn roadkill(&self) -> Option<&ConnectionRecord> {
        self.connection_strings.get(CONNECTION_NAME)
    }
}

/// What the host reads at startup: both documents, connection string decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSite {
    pub config: PersistedConfig,
    pub connection_string: Option<String>,
}
