//! All-or-nothing file commits.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

use crate::error::{ExportError, Result};

/// Write every `(path, bytes)` pair atomically.
///
/// All files are first written to temporary files next to their
/// destinations, then renamed into place. A file being replaced is moved
/// aside first. If any rename fails, files created by this call are removed
/// and replaced files are put back.
pub(crate) fn commit_all(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let staged = files
        .iter()
        .map(|(path, bytes)| stage(path, bytes).map(|tmp| (path.as_path(), tmp)))
        .collect::<Result<Vec<_>>>()?;

    let mut committed = Vec::with_capacity(staged.len());
    for (path, tmp) in staged {
        let previous = match set_aside(path) {
            Ok(previous) => previous,
            Err(e) => {
                rollback(committed);
                return Err(e);
            }
        };
        if let Err(e) = tmp.persist(path) {
            if previous.is_some() {
                committed.push(Committed { path, previous });
            }
            rollback(committed);
            return Err(io_error(path, e.error));
        }
        debug!(path = %path.display(), replaced = previous.is_some(), "committed");
        committed.push(Committed { path, previous });
    }
    Ok(())
}

/// A file renamed into place, and the file it replaced.
struct Committed<'a> {
    path: &'a Path,
    /// Deleted on drop once the whole commit has succeeded.
    previous: Option<TempPath>,
}

fn rollback(committed: Vec<Committed<'_>>) {
    for Committed { path, previous } in committed.into_iter().rev() {
        let undone = match previous {
            Some(backup) => backup.persist(path).map_err(|e| e.error),
            None => fs::remove_file(path),
        };
        if let Err(error) = undone {
            warn!(path = %path.display(), error = %error, "rollback failed");
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `bytes` to a temporary file in the destination directory.
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let io_err = |source| io_error(path, source);
    let mut tmp = NamedTempFile::new_in(dir_of(path)).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(io_err)?;
    }
    Ok(tmp)
}

/// Move an existing regular file at `path` to a temporary backup.
fn set_aside(path: &Path) -> Result<Option<TempPath>> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => {}
        _ => return Ok(None),
    }
    let io_err = |source| io_error(path, source);
    let backup = NamedTempFile::new_in(dir_of(path))
        .map_err(io_err)?
        .into_temp_path();
    fs::rename(path, &backup).map_err(io_err)?;
    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_writes_all() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            (dir.path().join("a.bin"), vec![1, 2, 3]),
            (dir.path().join("b.bin"), vec![4]),
        ];
        commit_all(&files).unwrap();
        assert_eq!(fs::read(dir.path().join("a.bin")).unwrap(), [1, 2, 3]);
        assert_eq!(fs::read(dir.path().join("b.bin")).unwrap(), [4]);
    }

    #[test]
    fn test_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            (dir.path().join("a.bin"), vec![1]),
            (dir.path().join("missing/b.bin"), vec![2]),
        ];
        let err = commit_all(&files).unwrap_err();
        match err {
            ExportError::Io { path, .. } => assert!(path.ends_with("missing/b.bin")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"old").unwrap();
        commit_all(&[(path.clone(), b"new".to_vec())]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        // The replaced file's backup is gone.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_commit_restores_replaced_file() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.bin");
        fs::write(&kept, b"old").unwrap();
        let blocked = dir.path().join("b.bin");
        fs::create_dir(&blocked).unwrap();

        let files = vec![(kept.clone(), b"new".to_vec()), (blocked.clone(), vec![1])];
        let err = commit_all(&files).unwrap_err();
        assert!(matches!(err, ExportError::Io { ref path, .. } if path == &blocked));
        assert_eq!(fs::read(&kept).unwrap(), b"old");
        assert!(blocked.is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
