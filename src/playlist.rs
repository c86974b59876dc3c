use crate::listing::{DirectoryLister, MediaEntry};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lazy, finite, newest-first walk of a folder's direct file children.
///
/// The listing is taken on the first pull, not at construction; exhaustion
/// is a normal terminal condition. Reconstructing with the same
/// `(directory, anchor, include_anchor)` triple yields the same remaining
/// sequence — that is the documented way to restart, there is no wraparound.
///
/// Entries are ordered by creation timestamp descending. Two entries with
/// identical timestamps keep the order the lister yielded them in; that
/// tie-break is implementation-defined but stable within one listing.
pub struct PlaylistIterator {
    lister: Arc<dyn DirectoryLister>,
    directory: PathBuf,
    anchor: Option<PathBuf>,
    include_anchor: bool,
    remaining: Option<VecDeque<MediaEntry>>,
}

impl PlaylistIterator {
    pub fn new(
        lister: Arc<dyn DirectoryLister>,
        directory: impl Into<PathBuf>,
        anchor: Option<PathBuf>,
        include_anchor: bool,
    ) -> Self {
        PlaylistIterator {
            lister,
            directory: directory.into(),
            anchor,
            include_anchor,
            remaining: None,
        }
    }

    pub fn directory(&self) -> &PathBuf {
        &self.directory
    }

    /// Pull the next entry. `None` means the sequence is exhausted.
    ///
    /// A listing failure on the lazy first pull is logged and reported as
    /// exhaustion so traversal always makes progress toward a graceful stop.
    pub async fn next_entry(&mut self) -> Option<MediaEntry> {
        if self.remaining.is_none() {
            self.remaining = Some(self.load().await);
        }
        self.remaining.as_mut().and_then(|entries| entries.pop_front())
    }

    async fn load(&self) -> VecDeque<MediaEntry> {
        let mut entries = match self.lister.list_children(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("playlist listing failed for {}: {}", self.directory.display(), e);
                return VecDeque::new();
            }
        };

        entries.retain(|entry| !entry.is_directory);
        // Stable sort: creation-time ties keep listing order.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let start = match &self.anchor {
            Some(anchor) => match entries.iter().position(|entry| &entry.path == anchor) {
                Some(index) if self.include_anchor => index,
                Some(index) => index + 1,
                None => {
                    // Anchor vanished between selection and traversal; fall
                    // back to the full sequence rather than failing.
                    debug!(
                        "anchor {} not found in {}, starting from the top",
                        anchor.display(),
                        self.directory.display()
                    );
                    0
                }
            },
            None => 0,
        };

        entries.drain(..start.min(entries.len()));
        entries.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{file_entry, MockLister};

    fn three_file_lister() -> (Arc<MockLister>, PathBuf) {
        let lister = Arc::new(MockLister::new());
        let dir = PathBuf::from("/cam1");
        lister.insert(
            &dir,
            vec![
                file_entry("/cam1/old.mp4", 100),
                file_entry("/cam1/mid.mp4", 200),
                file_entry("/cam1/new.mp4", 300),
            ],
        );
        (lister, dir)
    }

    async fn collect(mut iter: PlaylistIterator) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(entry) = iter.next_entry().await {
            names.push(entry.file_name());
        }
        names
    }

    #[tokio::test]
    async fn test_no_anchor_yields_newest_first() {
        let (lister, dir) = three_file_lister();
        let iter = PlaylistIterator::new(lister, dir, None, true);
        assert_eq!(collect(iter).await, ["new.mp4", "mid.mp4", "old.mp4"]);
    }

    #[tokio::test]
    async fn test_anchor_inclusive() {
        let (lister, dir) = three_file_lister();
        let iter =
            PlaylistIterator::new(lister, dir, Some(PathBuf::from("/cam1/mid.mp4")), true);
        assert_eq!(collect(iter).await, ["mid.mp4", "old.mp4"]);
    }

    #[tokio::test]
    async fn test_anchor_exclusive() {
        let (lister, dir) = three_file_lister();
        let iter =
            PlaylistIterator::new(lister, dir, Some(PathBuf::from("/cam1/mid.mp4")), false);
        assert_eq!(collect(iter).await, ["old.mp4"]);
    }

    #[tokio::test]
    async fn test_missing_anchor_falls_back_to_full_sequence() {
        let (lister, dir) = three_file_lister();
        let iter = PlaylistIterator::new(
            lister,
            dir,
            Some(PathBuf::from("/cam1/deleted.mp4")),
            true,
        );
        assert_eq!(collect(iter).await, ["new.mp4", "mid.mp4", "old.mp4"]);
    }

    #[tokio::test]
    async fn test_directories_are_skipped() {
        let lister = Arc::new(MockLister::new());
        let dir = PathBuf::from("/cam1");
        let mut sub = file_entry("/cam1/sub", 999);
        sub.is_directory = true;
        lister.insert(&dir, vec![sub, file_entry("/cam1/a.mp4", 1)]);

        let iter = PlaylistIterator::new(lister, dir, None, true);
        assert_eq!(collect(iter).await, ["a.mp4"]);
    }

    #[tokio::test]
    async fn test_listing_failure_reads_as_exhaustion() {
        let lister = Arc::new(MockLister::new());
        let mut iter = PlaylistIterator::new(lister, "/unreadable", None, true);
        assert!(iter.next_entry().await.is_none());
    }

    #[tokio::test]
    async fn test_restart_by_reconstruction_yields_same_sequence() {
        let (lister, dir) = three_file_lister();
        let first = PlaylistIterator::new(lister.clone(), dir.clone(), None, true);
        let again = PlaylistIterator::new(lister, dir, None, true);
        assert_eq!(collect(first).await, collect(again).await);
    }

    #[tokio::test]
    async fn test_creation_time_ties_keep_listing_order() {
        let lister = Arc::new(MockLister::new());
        let dir = PathBuf::from("/cam1");
        lister.insert(
            &dir,
            vec![
                file_entry("/cam1/a.mp4", 100),
                file_entry("/cam1/b.mp4", 100),
            ],
        );
        let iter = PlaylistIterator::new(lister, dir, None, true);
        assert_eq!(collect(iter).await, ["a.mp4", "b.mp4"]);
    }
}
