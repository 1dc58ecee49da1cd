// Dependency checks run by wizard steps before they accept input.
//
// All checks are side-effect free: probe files are removed again and database probes never run
// DDL. Connection strings only reach the log masked.

use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::database::connection::{ConnectError, DbConnector};
use crate::errors::{DependencyUnavailable, NotWritable};
use crate::models::draft::DatabaseProvider;
use crate::security::crypto::secret_fingerprint;
use crate::utils::disk::{nearest_existing_dir, parent_dir, probe_directory};
use crate::utils::logging::mask_connection_string;

pub struct DependencyValidator {
    connector: Arc<dyn DbConnector>,
}

impl DependencyValidator {
    pub fn new(connector: Arc<dyn DbConnector>) -> Self {
        Self { connector }
    }

    /// Can the installer create or replace the file at `path`?
    ///
    /// An existing file must open for append (nothing is written to it); the directory that
    /// will receive it must accept a new file, since commits go through a temp file + rename.
    pub async fn check_writable(&self, path: &Path) -> Result<(), NotWritable> {
        let started = Instant::now();
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(not_writable(path, "path is a directory, expected a file"));
            }
            Ok(_) => {
                tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| not_writable(path, e))?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(not_writable(path, e)),
        }

        let parent = parent_dir(path);
        let dir = nearest_existing_dir(&parent)
            .await
            .ok_or_else(|| not_writable(&parent, "no existing parent directory"))?;
        probe_directory(&dir)
            .await
            .map_err(|e| not_writable(&dir, e))?;

        info!(
            "[PHASE: preflight] [STEP: writable] {:?} is writable (duration_ms={})",
            path,
            started.elapsed().as_millis()
        );
        Ok(())
    }

    /// Can files be created in `dir`? A folder that does not exist yet is judged by the
    /// nearest ancestor that does, since the wiki creates it on first upload.
    pub async fn check_directory_writable(&self, dir: &Path) -> Result<(), NotWritable> {
        if let Ok(meta) = tokio::fs::metadata(dir).await {
            if !meta.is_dir() {
                return Err(not_writable(dir, "path exists and is not a directory"));
            }
        }
        let existing = nearest_existing_dir(dir)
            .await
            .ok_or_else(|| not_writable(dir, "no existing parent directory"))?;
        probe_directory(&existing)
            .await
            .map_err(|e| not_writable(&existing, e))?;
        info!(
            "[PHASE: preflight] [STEP: directory_writable] {:?} is writable (probed {:?})",
            dir, existing
        );
        Ok(())
    }

    /// Open a connection, run a trivial query and close it, with a bounded timeout per attempt
    /// and bounded retry for transient failures.
    pub async fn check_database(
        &self,
        provider: DatabaseProvider,
        connection_string: &str,
    ) -> Result<(), DependencyUnavailable> {
        let started = Instant::now();
        info!(
            "[PHASE: preflight] [STEP: database] Testing {} connection ({}, fingerprint={})",
            provider,
            mask_connection_string(connection_string),
            secret_fingerprint(connection_string)
        );

        let connector = self.connector.as_ref();
        let per_attempt = connector.timeout_duration();
        let extra_attempts = connector.max_retries().saturating_sub(1) as usize;

        let attempt = || async move {
            match timeout(per_attempt, connector.check_reachable(provider, connection_string)).await
            {
                Ok(result) => result,
                Err(_) => Err(ConnectError::timed_out(per_attempt)),
            }
        };

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(2))
            .take(extra_attempts)
            .map(jitter);

        match RetryIf::spawn(retry_strategy, attempt, |e: &ConnectError| e.transient).await {
            Ok(()) => {
                info!(
                    "[PHASE: preflight] [STEP: database] {} connection OK (duration_ms={})",
                    provider,
                    started.elapsed().as_millis()
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    "[PHASE: preflight] [STEP: database] {} connection failed: {} (duration_ms={})",
                    provider,
                    mask_connection_string(&e.internal_details),
                    started.elapsed().as_millis()
                );
                Err(DependencyUnavailable::new("database", e.user_message))
            }
        }
    }
}

fn not_writable(path: &Path, reason: impl ToString) -> NotWritable {
    NotWritable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
