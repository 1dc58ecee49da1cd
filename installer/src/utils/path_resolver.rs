use anyhow::Result;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "roadkill-installer.toml";

/// Resolve deployment folder (absolute path)
pub fn resolve_deployment_folder() -> PathBuf {
    // Prefer the folder the executable runs from; fall back to the working directory.
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return dir.to_path_buf();
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Locate the installer settings file, if any.
///
/// Search order: working directory, deployment folder, `<user config dir>/roadkill/`.
pub fn resolve_settings_file() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(SETTINGS_FILE_NAME));
    }
    candidates.push(resolve_deployment_folder().join(SETTINGS_FILE_NAME));
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("roadkill").join(SETTINGS_FILE_NAME));
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Resolve `path` against the site root unless it is already absolute.
///
/// A leading `~/` is the ASP.NET-style "application root" marker, not the user's home.
pub fn resolve_under_site_root(site_root: &Path, path: &str) -> PathBuf {
    let trimmed = path.trim();
    let relative = trimmed
        .strip_prefix("~/")
        .or_else(|| trimmed.strip_prefix("~\\"))
        .unwrap_or(trimmed);
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        site_root.join(candidate)
    }
}

/// Resolve log folder (absolute path), creating it when missing.
pub fn resolve_log_folder(site_root: &Path, configured: Option<&Path>) -> Result<PathBuf> {
    let log_dir = match configured {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => site_root.join(p),
        None => site_root.join("App_Data").join("Logs"),
    };
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", log_dir, e))?;
    Ok(log_dir)
}
