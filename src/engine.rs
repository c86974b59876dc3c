use std::path::Path;
use thiserror::Error;

/// Errors reported by the media-engine collaborator
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load media: {0}")]
    Load(String),
    #[error("playback control failed: {0}")]
    Control(String),
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("frame extraction failed: {0}")]
    Extraction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata reported by [`MediaEngine::probe`]
#[derive(Debug, Clone)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    /// Embedded title, if the container carries one
    pub title: Option<String>,
}

/// Media-engine collaborator: the decode/render capability the core drives
/// but never implements. Positions are normalized to [0, 1].
///
/// Every call is fallible I/O; the session and the thumbnail worker treat
/// failures as data or events, never as panics.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    async fn load(&self, path: &Path) -> Result<(), EngineError>;
    async fn play(&self) -> Result<(), EngineError>;
    async fn pause(&self) -> Result<(), EngineError>;
    async fn stop(&self) -> Result<(), EngineError>;

    /// Engine-reported playing flag. Noisy right after load/resume; the
    /// playback session reconciles it against its own state.
    async fn is_playing(&self) -> bool;

    async fn position(&self) -> f64;
    async fn set_position(&self, normalized: f64) -> Result<(), EngineError>;
    async fn set_mute(&self, mute: bool) -> Result<(), EngineError>;

    async fn probe(&self, path: &Path) -> Result<MediaProbe, EngineError>;

    /// Extract one still frame at `timestamp_secs` into `out_path`, scaled
    /// to `width` pixels (keeping aspect when `preserve_aspect` is set).
    async fn extract_frame(
        &self,
        path: &Path,
        timestamp_secs: f64,
        out_path: &Path,
        width: u32,
        preserve_aspect: bool,
    ) -> Result<(), EngineError>;
}
