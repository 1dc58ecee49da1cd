// Durable configuration store
//
// Owns `roadkill.toml` (site settings + `installed` flag) and `connectionstrings.toml` (the
// encrypted connection record). Both are written through temp file + rename; the document that
// carries `installed = true` is renamed last, so a reader never sees an installed site without
// its connection record.

use chrono::Utc;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::errors::PersistError;
use crate::models::config::{
    default_theme, ConnectionRecord, ConnectionStringsDocument, InstalledSite, PersistedConfig,
    CONNECTION_NAME, SCHEMA_VERSION,
};
use crate::models::draft::WizardDraft;
use crate::models::requests::default_attachments_folder;
use crate::security::secret_protector::SecretProtector;
use crate::utils::settings::InstallerSettings;

const LOCK_FILE_NAME: &str = ".install.lock";
/// A lock older than this is left over from a crashed run.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(600);
/// Extra attempts at a live lock; with the backoff below that is roughly ten seconds.
const LOCK_RETRIES: usize = 12;

pub struct ConfigStore {
    config_path: PathBuf,
    connection_path: PathBuf,
    lock_path: PathBuf,
    protector: SecretProtector,
    commit_gate: Mutex<()>,
    lock_retries: usize,
    #[cfg(test)]
    fail_config_rename: std::sync::atomic::AtomicBool,
}

impl ConfigStore {
    pub fn new(config_path: PathBuf, connection_path: PathBuf, protector: SecretProtector) -> Self {
        let lock_path = parent_dir(&config_path).join(LOCK_FILE_NAME);
        Self {
            config_path,
            connection_path,
            lock_path,
            protector,
            commit_gate: Mutex::new(()),
            lock_retries: LOCK_RETRIES,
            #[cfg(test)]
            fail_config_rename: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn from_settings(settings: &InstallerSettings) -> Self {
        Self::new(
            settings.config_path(),
            settings.connection_path(),
            SecretProtector::new(settings.secret_key_path()),
        )
    }

    /// How many times a commit retries a lock held by another process before giving up.
    pub fn with_lock_retries(mut self, retries: usize) -> Self {
        self.lock_retries = retries;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn connection_path(&self) -> &Path {
        &self.connection_path
    }

    /// Persist the draft and mark the site installed, all or nothing.
    ///
    /// Fails with `AlreadyInstalled` (writing nothing) when the current document already says
    /// `installed = true`. A lock held by another process is waited out with bounded backoff;
    /// `Locked` is returned only when it is still held afterwards.
    pub async fn commit(&self, draft: &WizardDraft) -> Result<PersistedConfig, PersistError> {
        let _gate = self.commit_gate.lock().await;
        let _lock = InstallLock::acquire(&self.lock_path, self.lock_retries).await?;

        if let Some(current) = self.read_config().await? {
            if current.installed {
                warn!(
                    "[PHASE: install] [STEP: commit] {:?} already marks the site installed; nothing written",
                    self.config_path
                );
                return Err(PersistError::AlreadyInstalled);
            }
        }

        let config = config_from_draft(draft)?;
        let connection_string = draft
            .connection_string
            .as_ref()
            .ok_or(PersistError::IncompleteDraft("connection string"))?;
        let protected = self
            .protector
            .protect(connection_string.expose())
            .map_err(|e| PersistError::Secret(e.to_string()))?;

        let mut connections = self.read_connections().await?.unwrap_or_default();
        connections.connection_strings.insert(
            CONNECTION_NAME.to_string(),
            ConnectionRecord {
                provider: config.database_provider,
                connection_string: protected,
                updated_utc: Utc::now(),
            },
        );

        let config_text = toml::to_string_pretty(&config)?;
        let connection_text = toml::to_string_pretty(&connections)?;

        let previous_connections = read_optional(&self.connection_path).await?;
        let connection_tmp = write_temp(&self.connection_path, &connection_text).await?;
        let config_tmp = match write_temp(&self.config_path, &config_text).await {
            Ok(tmp) => tmp,
            Err(e) => {
                remove_quietly(&connection_tmp).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&connection_tmp, &self.connection_path).await {
            remove_quietly(&connection_tmp).await;
            remove_quietly(&config_tmp).await;
            return Err(PersistError::io(&self.connection_path, e));
        }

        if let Err(e) = self.rename_config(&config_tmp).await {
            remove_quietly(&config_tmp).await;
            self.restore_connections(previous_connections.as_deref()).await;
            return Err(PersistError::io(&self.config_path, e));
        }

        info!(
            "[PHASE: install] [STEP: commit] Site '{}' installed ({}, config={:?})",
            config.site_name, config.database_provider, self.config_path
        );
        Ok(config)
    }

    /// Both documents, connection string decrypted. `None` when nothing has been written yet.
    pub async fn load(&self) -> Result<Option<InstalledSite>, PersistError> {
        let Some(config) = self.read_config().await? else {
            return Ok(None);
        };

        let record = self
            .read_connections()
            .await?
            .and_then(|doc| doc.roadkill().cloned());
        let connection_string = match record {
            Some(record) => {
                if record.provider != config.database_provider {
                    return Err(PersistError::Inconsistent {
                        config: config.database_provider.to_string(),
                        record: record.provider.to_string(),
                    });
                }
                if !SecretProtector::is_protected(&record.connection_string) {
                    warn!(
                        "[PHASE: load] [STEP: connection] {:?} holds an unencrypted connection string",
                        self.connection_path
                    );
                }
                let plain = self
                    .protector
                    .unprotect(&record.connection_string)
                    .map_err(|e| PersistError::Secret(e.to_string()))?;
                Some(plain).filter(|s| !s.is_empty())
            }
            None => None,
        };

        Ok(Some(InstalledSite {
            config,
            connection_string,
        }))
    }

    /// Readers send the user to the wizard unless this is true.
    pub async fn is_installed(&self) -> Result<bool, PersistError> {
        Ok(self.read_config().await?.is_some_and(|c| c.installed))
    }

    /// Mark the site not installed and blank its connection string, keeping every other setting.
    ///
    /// Returns false when there was no configuration to reset.
    pub async fn reset(&self) -> Result<bool, PersistError> {
        let _gate = self.commit_gate.lock().await;
        let _lock = InstallLock::acquire(&self.lock_path, self.lock_retries).await?;

        let Some(mut config) = self.read_config().await? else {
            return Ok(false);
        };
        config.installed = false;
        config.installed_utc = None;
        atomic_write(&self.config_path, &toml::to_string_pretty(&config)?).await?;

        if let Some(mut connections) = self.read_connections().await? {
            if let Some(record) = connections.connection_strings.get_mut(CONNECTION_NAME) {
                record.connection_string = String::new();
                record.updated_utc = Utc::now();
            }
            atomic_write(&self.connection_path, &toml::to_string_pretty(&connections)?).await?;
        }

        info!(
            "[PHASE: install] [STEP: reset] {:?} reset to installed = false",
            self.config_path
        );
        Ok(true)
    }

    async fn read_config(&self) -> Result<Option<PersistedConfig>, PersistError> {
        parse_optional(&self.config_path).await
    }

    async fn read_connections(&self) -> Result<Option<ConnectionStringsDocument>, PersistError> {
        parse_optional(&self.connection_path).await
    }

    async fn rename_config(&self, tmp: &Path) -> std::io::Result<()> {
        #[cfg(test)]
        {
            if self
                .fail_config_rename
                .load(std::sync::atomic::Ordering::SeqCst)
            {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "injected rename failure",
                ));
            }
        }
        tokio::fs::rename(tmp, &self.config_path).await
    }

    /// Put the connection record back the way it was before a failed commit.
    async fn restore_connections(&self, previous: Option<&[u8]>) {
        let restored = match previous {
            Some(bytes) => match write_temp(&self.connection_path, bytes).await {
                Ok(tmp) => tokio::fs::rename(&tmp, &self.connection_path)
                    .await
                    .map_err(|e| PersistError::io(&self.connection_path, e)),
                Err(e) => Err(e),
            },
            None => tokio::fs::remove_file(&self.connection_path)
                .await
                .map_err(|e| PersistError::io(&self.connection_path, e)),
        };
        if let Err(e) = restored {
            warn!(
                "[PHASE: install] [STEP: rollback] Could not restore {:?}: {}",
                self.connection_path, e
            );
        }
    }
}

fn config_from_draft(draft: &WizardDraft) -> Result<PersistedConfig, PersistError> {
    Ok(PersistedConfig {
        site_name: draft
            .site_name
            .clone()
            .ok_or(PersistError::IncompleteDraft("site name"))?,
        site_url: draft.site_url.clone(),
        database_provider: draft
            .database_provider
            .ok_or(PersistError::IncompleteDraft("database provider"))?,
        enable_object_cache: draft.enable_object_cache,
        attachments_folder: draft
            .attachments_folder
            .clone()
            .unwrap_or_else(default_attachments_folder),
        markup_type: draft.markup_type,
        theme: draft.theme.clone().unwrap_or_else(default_theme),
        allow_user_signup: draft.allow_user_signup,
        admin_role_name: crate::api::admin::ADMIN_ROLE.to_string(),
        editor_role_name: crate::api::admin::EDITOR_ROLE.to_string(),
        use_windows_auth: false,
        installed: true,
        schema_version: SCHEMA_VERSION,
        installed_utc: Some(Utc::now()),
        installer_version: Some(env!("CARGO_PKG_VERSION").to_string()),
    })
}

/// Cross-process guard: a create-new marker file, removed on drop.
struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    async fn acquire(path: &Path, retries: usize) -> Result<Self, PersistError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistError::io(parent, e))?;
        }

        let retry_strategy = ExponentialBackoff::from_millis(10)
            .factor(5)
            .max_delay(Duration::from_secs(1))
            .take(retries)
            .map(jitter);
        let result = RetryIf::spawn(
            retry_strategy,
            || Self::try_acquire(path),
            |e: &PersistError| {
                let held = matches!(e, PersistError::Locked { .. });
                if held {
                    info!(
                        "[PHASE: install] [STEP: lock] {:?} is held by another installer; waiting",
                        path
                    );
                }
                held
            },
        )
        .await;
        if let Err(PersistError::Locked { .. }) = &result {
            warn!(
                "[PHASE: install] [STEP: lock] Gave up waiting for {:?} after {} retries",
                path, retries
            );
        }
        result
    }

    async fn try_acquire(path: &Path) -> Result<Self, PersistError> {
        for _ in 0..2 {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(mut file) => {
                    let lock = Self {
                        path: path.to_path_buf(),
                    };
                    let owner = format!("pid={} at={}\n", std::process::id(), Utc::now().to_rfc3339());
                    file.write_all(owner.as_bytes())
                        .await
                        .map_err(|e| PersistError::io(path, e))?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !is_stale(path).await {
                        return Err(PersistError::Locked {
                            path: path.to_path_buf(),
                        });
                    }
                    warn!(
                        "[PHASE: install] [STEP: lock] Removing stale lock file {:?}",
                        path
                    );
                    remove_quietly(path).await;
                }
                Err(e) => return Err(PersistError::io(path, e)),
            }
        }
        Err(PersistError::Locked {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(
                "[PHASE: install] [STEP: lock] Failed to remove lock file {:?}: {}",
                self.path, e
            );
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(modified) = tokio::fs::metadata(path).await.and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age > STALE_LOCK_AFTER)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, PersistError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistError::io(path, e)),
    }
}

async fn parse_optional<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, PersistError> {
    let Some(bytes) = read_optional(path).await? else {
        return Ok(None);
    };
    let text = String::from_utf8(bytes).map_err(|e| PersistError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&text)
        .map(Some)
        .map_err(|e| PersistError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Write `contents` to a fresh temp file next to `target`, fsynced, and return its path.
async fn write_temp(target: &Path, contents: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
    let dir = parent_dir(target);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| PersistError::io(&dir, e))?;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

    let written = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await?;
        file.write_all(contents.as_ref()).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    match written {
        Ok(()) => Ok(tmp),
        Err(e) => {
            remove_quietly(&tmp).await;
            Err(PersistError::io(&tmp, e))
        }
    }
}

async fn atomic_write(target: &Path, contents: &str) -> Result<(), PersistError> {
    let tmp = write_temp(target, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        remove_quietly(&tmp).await;
        return Err(PersistError::io(target, e));
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}
