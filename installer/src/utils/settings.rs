// Installer runtime settings
//
// Layered with the `config` crate: built-in defaults, then an optional `roadkill-installer.toml`,
// then `ROADKILL_INSTALLER__*` environment variables (e.g. `ROADKILL_INSTALLER__SITE_ROOT`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::localization::Language;

pub const ENV_PREFIX: &str = "ROADKILL_INSTALLER";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Folder holding the wiki's configuration documents.
    pub site_root: PathBuf,
    pub config_file_name: String,
    pub connection_file_name: String,
    /// Where the connection-string encryption key lives. Defaults under `App_Data`.
    pub secret_key_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    /// Locale code used when the UI has not picked one.
    pub default_language: String,
    pub db_connect_timeout_secs: u64,
    pub db_connect_attempts: usize,
    pub min_password_length: usize,
    pub pbkdf2_iterations: u32,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            site_root: PathBuf::from("."),
            config_file_name: "roadkill.toml".to_string(),
            connection_file_name: "connectionstrings.toml".to_string(),
            secret_key_path: None,
            log_dir: None,
            default_language: Language::English.code().to_string(),
            db_connect_timeout_secs: 15,
            db_connect_attempts: 2,
            min_password_length: 6,
            pbkdf2_iterations: 100_000,
        }
    }
}

impl InstallerSettings {
    /// Load settings from an optional file plus the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: InstallerSettings = builder
            .build()
            .context("Failed to read installer settings")?
            .try_deserialize()
            .context("Invalid installer settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.db_connect_timeout_secs == 0 {
            anyhow::bail!("db_connect_timeout_secs must be at least 1");
        }
        if self.db_connect_attempts == 0 {
            anyhow::bail!("db_connect_attempts must be at least 1");
        }
        if self.pbkdf2_iterations == 0 {
            anyhow::bail!("pbkdf2_iterations must be at least 1");
        }
        if self.config_file_name.trim().is_empty() || self.connection_file_name.trim().is_empty() {
            anyhow::bail!("configuration file names must not be empty");
        }
        if Language::from_code(&self.default_language).is_none() {
            anyhow::bail!("unsupported default_language: {}", self.default_language);
        }
        Ok(())
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    pub fn config_path(&self) -> PathBuf {
        self.site_root.join(&self.config_file_name)
    }

    pub fn connection_path(&self) -> PathBuf {
        self.site_root.join(&self.connection_file_name)
    }

    pub fn secret_key_path(&self) -> PathBuf {
        self.secret_key_path.clone().unwrap_or_else(|| {
            self.site_root
                .join("App_Data")
                .join("secrets")
                .join("installer_master_key.b64")
        })
    }

    pub fn default_language(&self) -> Language {
        Language::from_code(&self.default_language).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_site_root() {
        let s = InstallerSettings {
            site_root: PathBuf::from("/srv/wiki"),
            ..InstallerSettings::default()
        };
        assert_eq!(s.config_path(), PathBuf::from("/srv/wiki/roadkill.toml"));
        assert_eq!(
            s.connection_path(),
            PathBuf::from("/srv/wiki/connectionstrings.toml")
        );
        assert!(s.secret_key_path().starts_with("/srv/wiki/App_Data"));
        assert_eq!(s.default_language(), Language::English);
    }

    #[test]
    fn file_values_override_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("roadkill-installer.toml");
        std::fs::write(
            &file,
            "site_root = \"/srv/wiki\"\nmin_password_length = 10\ndefault_language = \"sv\"\n",
        )
        .unwrap();

        let s = InstallerSettings::load(Some(&file)).unwrap();
        assert_eq!(s.site_root, PathBuf::from("/srv/wiki"));
        assert_eq!(s.min_password_length, 10);
        assert_eq!(s.default_language(), Language::Swedish);
        assert_eq!(s.db_connect_attempts, 2);
    }

    #[test]
    fn unknown_language_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("roadkill-installer.toml");
        std::fs::write(&file, "default_language = \"tlh\"\n").unwrap();
        assert!(InstallerSettings::load(Some(&file)).is_err());
    }
}
