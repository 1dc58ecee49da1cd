//! Filesystem probes (detection only).
//!
//! Probe files are removed again before returning; folders that do not exist yet are judged by
//! the nearest ancestor that does and are never created here.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const PROBE_PREFIX: &str = ".roadkill-write-test-";

/// Folder that will receive `path`; a bare file name lives in the working directory.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Closest existing ancestor of `path` (itself included), if that ancestor is a directory.
pub async fn nearest_existing_dir(path: &Path) -> Option<PathBuf> {
    for candidate in path.ancestors() {
        let candidate = if candidate.as_os_str().is_empty() {
            Path::new(".")
        } else {
            candidate
        };
        if let Ok(meta) = tokio::fs::metadata(candidate).await {
            return meta.is_dir().then(|| candidate.to_path_buf());
        }
    }
    None
}

/// Create and remove a uniquely named file in `dir`.
pub async fn probe_directory(dir: &Path) -> io::Result<()> {
    let probe = dir.join(format!("{}{}", PROBE_PREFIX, uuid::Uuid::new_v4().simple()));
    let written = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe)
            .await?;
        file.write_all(b"ok").await?;
        file.flush().await
    }
    .await;
    let removed = tokio::fs::remove_file(&probe).await;
    written?;
    // A probe that cannot be removed again means deletes will fail for the wiki too.
    removed
}

/// Could a new file be created at `path`? Returns the directory that was probed.
pub async fn probe_file_creation(path: &Path) -> io::Result<PathBuf> {
    let parent = parent_dir(path);
    let dir = nearest_existing_dir(&parent).await.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no existing parent directory for {:?}", path),
        )
    })?;
    probe_directory(&dir).await?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftovers(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(PROBE_PREFIX))
            .count()
    }

    #[test]
    fn bare_file_name_lives_in_working_directory() {
        assert_eq!(parent_dir(Path::new("wiki.db")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/srv/wiki.db")), PathBuf::from("/srv"));
    }

    #[tokio::test]
    async fn file_creation_is_judged_by_existing_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("App_Data").join("roadkill.sqlite");
        let probed = probe_file_creation(&target).await.unwrap();
        assert_eq!(probed, tmp.path());
        assert!(!tmp.path().join("App_Data").exists());
        assert_eq!(leftovers(tmp.path()), 0);
    }

    #[tokio::test]
    async fn file_in_place_of_folder_stops_the_search() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("App_Data"), b"").unwrap();
        let target = tmp.path().join("App_Data").join("roadkill.sqlite");
        assert!(probe_file_creation(&target).await.is_err());
    }
}
