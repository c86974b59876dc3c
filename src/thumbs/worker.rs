use crate::config::CoreConfig;
use crate::engine::{EngineError, MediaEngine};
use crate::listing::{DirectoryHandle, DirectoryLister, MediaEntry};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// One candidate file's probe or frame-extraction failure. Always recovered
/// locally as an absent-thumbnail result, never aborts the indexing job.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("probe failed: {0}")]
    Probe(#[source] EngineError),
    #[error("frame extraction failed: {0}")]
    Extract(#[source] EngineError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One tile's outcome, streamed back while a directory is being indexed.
///
/// Valid only while the owning directory selection is current; the cache
/// discards results for anything else.
#[derive(Debug, Clone)]
pub struct ThumbnailResult {
    /// Selection this result belongs to
    pub directory: DirectoryHandle,
    /// Folder the tile represents: a subfolder, or the selection root itself
    /// when the root directly contains files
    pub folder: PathBuf,
    /// Candidate file the frame was taken from, if one was found
    pub source: Option<PathBuf>,
    /// Generated still frame; `None` means no representative frame could be
    /// produced and the presentation layer shows its placeholder
    pub thumbnail: Option<PathBuf>,
    /// Total results this directory will produce, for completion detection
    pub expected: usize,
}

#[derive(Debug)]
pub(crate) enum WorkerPayload {
    Result(ThumbnailResult),
    RootFailed(String),
}

#[derive(Debug)]
pub(crate) struct WorkerMessage {
    pub generation: u64,
    pub payload: WorkerPayload,
}

/// One directory's indexing job, run off the interactive thread.
///
/// For every immediate subfolder of the selected directory the worker picks
/// the most recently created video file and extracts a frame at half its
/// duration. If the root itself directly contains files it gets a tile too.
/// Cancellation is cooperative: the flag is checked between children, and
/// the cache filters whatever a slow job still emits afterwards.
pub(crate) struct ThumbnailWorker {
    lister: Arc<dyn DirectoryLister>,
    engine: Arc<dyn MediaEngine>,
    config: CoreConfig,
    directory: DirectoryHandle,
    generation: u64,
    cancel: Arc<AtomicBool>,
    out_tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl ThumbnailWorker {
    pub(crate) fn new(
        lister: Arc<dyn DirectoryLister>,
        engine: Arc<dyn MediaEngine>,
        config: CoreConfig,
        directory: DirectoryHandle,
        generation: u64,
        cancel: Arc<AtomicBool>,
        out_tx: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Self {
        ThumbnailWorker {
            lister,
            engine,
            config,
            directory,
            generation,
            cancel,
            out_tx,
        }
    }

    pub(crate) async fn run(self) {
        let children = match self.lister.list_children(self.directory.path()).await {
            Ok(children) => children,
            Err(e) => {
                // Root enumeration failure fails the whole job, reported
                // upward as a single "no data" error.
                warn!("indexing failed for {}: {}", self.directory, e);
                self.send(WorkerPayload::RootFailed(e.to_string()));
                return;
            }
        };

        let subfolders: Vec<&MediaEntry> =
            children.iter().filter(|entry| entry.is_directory).collect();
        let root_files: Vec<MediaEntry> = children
            .iter()
            .filter(|entry| !entry.is_directory)
            .cloned()
            .collect();

        let expected = subfolders.len() + usize::from(!root_files.is_empty());
        debug!(
            "indexing {}: {} subfolder(s), root tile: {}",
            self.directory,
            subfolders.len(),
            !root_files.is_empty()
        );

        if !root_files.is_empty() {
            self.emit_tile(self.directory.path().to_path_buf(), root_files, expected)
                .await;
        }

        for subfolder in subfolders {
            if self.cancel.load(Ordering::Relaxed) {
                debug!("indexing of {} cancelled", self.directory);
                return;
            }

            let files = match self.lister.list_children(&subfolder.path).await {
                Ok(entries) => entries
                    .into_iter()
                    .filter(|entry| !entry.is_directory)
                    .collect(),
                Err(e) => {
                    // An unreadable child is a placeholder tile, not a
                    // failed job.
                    warn!("cannot enumerate {}: {}", subfolder.path.display(), e);
                    Vec::new()
                }
            };

            self.emit_tile(subfolder.path.clone(), files, expected).await;
        }
    }

    /// Produce one tile for `folder` from its direct `files` and emit it.
    async fn emit_tile(&self, folder: PathBuf, files: Vec<MediaEntry>, expected: usize) {
        let candidate = pick_candidate(files);

        let thumbnail = match &candidate {
            Some(entry) => match self.extract(entry).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("thumbnail for {} failed: {}", entry.path.display(), e);
                    None
                }
            },
            None => None,
        };

        self.send(WorkerPayload::Result(ThumbnailResult {
            directory: self.directory.clone(),
            folder,
            source: candidate.map(|entry| entry.path),
            thumbnail,
            expected,
        }));
    }

    async fn extract(&self, entry: &MediaEntry) -> Result<PathBuf, ExtractionError> {
        let probe = self
            .engine
            .probe(&entry.path)
            .await
            .map_err(ExtractionError::Probe)?;

        // Mid-stream frame, away from black opening/closing frames.
        let timestamp = probe.duration_secs / 2.0;

        tokio::fs::create_dir_all(&self.config.thumb_dir).await?;
        let out_path = self
            .config
            .thumb_dir
            .join(format!("{}.png", Uuid::new_v4()));

        self.engine
            .extract_frame(
                &entry.path,
                timestamp,
                &out_path,
                self.config.thumb_width,
                self.config.preserve_aspect,
            )
            .await
            .map_err(ExtractionError::Extract)?;

        Ok(out_path)
    }

    fn send(&self, payload: WorkerPayload) {
        let _ = self.out_tx.send(WorkerMessage {
            generation: self.generation,
            payload,
        });
    }
}

/// Latest-created video file among a folder's direct children. Creation-time
/// ties keep listing order (stable within one listing, otherwise
/// implementation-defined).
fn pick_candidate(files: Vec<MediaEntry>) -> Option<MediaEntry> {
    files
        .into_iter()
        .filter(|entry| entry.is_video())
        .reduce(|best, entry| {
            if entry.created_at > best.created_at {
                entry
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::file_entry;

    #[test]
    fn test_candidate_is_latest_video() {
        let files = vec![
            file_entry("/f/a.mp4", 100),
            file_entry("/f/b.mp4", 300),
            file_entry("/f/c.mp4", 200),
        ];
        let candidate = pick_candidate(files).unwrap();
        assert!(candidate.path.ends_with("b.mp4"));
    }

    #[test]
    fn test_candidate_skips_non_video_files() {
        let files = vec![
            file_entry("/f/notes.txt", 900),
            file_entry("/f/a.mp4", 100),
        ];
        let candidate = pick_candidate(files).unwrap();
        assert!(candidate.path.ends_with("a.mp4"));
    }

    #[test]
    fn test_candidate_tie_keeps_listing_order() {
        let files = vec![file_entry("/f/a.mp4", 100), file_entry("/f/b.mp4", 100)];
        let candidate = pick_candidate(files).unwrap();
        assert!(candidate.path.ends_with("a.mp4"));
    }

    #[test]
    fn test_no_videos_means_no_candidate() {
        assert!(pick_candidate(vec![file_entry("/f/notes.txt", 1)]).is_none());
        assert!(pick_candidate(Vec::new()).is_none());
    }
}
