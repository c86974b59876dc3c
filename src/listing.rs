use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Extensions the thumbnail indexer considers frame-extractable.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v", "3gp", "mpg", "mpeg", "ts",
];

/// Errors that can occur while enumerating a directory
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("failed to read directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identity of a selected directory, compared by normalized path.
///
/// The handle is owned by the presentation layer; the core only reads
/// through it and never touches the filesystem it points at.
#[derive(Debug, Clone)]
pub struct DirectoryHandle {
    normalized: String,
    path: PathBuf,
}

impl PartialEq for DirectoryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for DirectoryHandle {}

impl std::hash::Hash for DirectoryHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl DirectoryHandle {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        DirectoryHandle {
            normalized: normalize(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }
}

impl std::fmt::Display for DirectoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Collapse `.` components and trailing separators so two spellings of the
/// same directory compare equal. Does not touch the filesystem, so `..` and
/// symlinks are left as-is.
fn normalize(path: &Path) -> String {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}

/// One child of a listed directory, snapshotted at listing time.
/// Entries are never re-validated once yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEntry {
    pub path: PathBuf,
    /// Creation timestamp, the only sort key used by the core.
    pub created_at: DateTime<Utc>,
    pub is_directory: bool,
}

impl MediaEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    pub fn is_video(&self) -> bool {
        !self.is_directory
            && self
                .path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
    }
}

/// Directory-listing collaborator (allows mocking for tests)
#[async_trait::async_trait]
pub trait DirectoryLister: Send + Sync {
    /// List the immediate children of `path`, files and directories alike.
    async fn list_children(&self, path: &Path) -> Result<Vec<MediaEntry>, EnumerationError>;
}

/// Production lister over the real filesystem
pub struct FsLister;

#[async_trait::async_trait]
impl DirectoryLister for FsLister {
    async fn list_children(&self, path: &Path) -> Result<Vec<MediaEntry>, EnumerationError> {
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|source| EnumerationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = Vec::new();
        loop {
            let dir_entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(EnumerationError::Unreadable {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            };

            let child_path = dir_entry.path();
            let metadata = match dir_entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    // One unreadable child doesn't fail the listing.
                    warn!("skipping {}: {}", child_path.display(), e);
                    continue;
                }
            };

            // Birth time is unavailable on some filesystems; mtime is the
            // closest stable stand-in.
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

            entries.push(MediaEntry {
                path: child_path,
                created_at: DateTime::<Utc>::from(created),
                is_directory: metadata.is_dir(),
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_identity_ignores_trailing_separator() {
        let a = DirectoryHandle::new("/cam/footage/");
        let b = DirectoryHandle::new("/cam/footage");
        assert_eq!(a, b);
    }

    #[test]
    fn test_handle_identity_ignores_cur_dir() {
        let a = DirectoryHandle::new("/cam/./footage");
        let b = DirectoryHandle::new("/cam/footage");
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_video_by_extension() {
        let entry = |p: &str, dir: bool| MediaEntry {
            path: PathBuf::from(p),
            created_at: Utc::now(),
            is_directory: dir,
        };
        assert!(entry("clip.mp4", false).is_video());
        assert!(entry("clip.MKV", false).is_video());
        assert!(!entry("notes.txt", false).is_video());
        assert!(!entry("clip.mp4", true).is_video());
        assert!(!entry("noext", false).is_video());
    }

    #[tokio::test]
    async fn test_fs_lister_lists_files_and_dirs() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.mp4"), b"x").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();

        let entries = FsLister.list_children(temp.path()).await.unwrap();
        assert_eq!(entries.len(), 2);
        let sub = entries.iter().find(|e| e.path.ends_with("sub")).unwrap();
        assert!(sub.is_directory);
        let file = entries.iter().find(|e| e.path.ends_with("a.mp4")).unwrap();
        assert!(!file.is_directory);
    }

    #[tokio::test]
    async fn test_fs_lister_missing_directory_fails() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope");
        let err = FsLister.list_children(&missing).await.unwrap_err();
        assert!(matches!(err, EnumerationError::Unreadable { .. }));
    }
}
