// Test support utilities for both unit and integration tests

use crate::engine::{EngineError, MediaEngine, MediaProbe};
use crate::listing::{DirectoryLister, EnumerationError, MediaEntry};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Build a file entry with a creation time `secs` after the epoch
pub fn file_entry(path: &str, secs: i64) -> MediaEntry {
    MediaEntry {
        path: PathBuf::from(path),
        created_at: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        is_directory: false,
    }
}

/// Build a directory entry with a creation time `secs` after the epoch
pub fn dir_entry(path: &str, secs: i64) -> MediaEntry {
    MediaEntry {
        path: PathBuf::from(path),
        created_at: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        is_directory: true,
    }
}

/// Mock directory lister backed by scripted listings
///
/// Unknown paths fail with `EnumerationError::Unreadable`, which doubles as
/// the way to script an unreadable directory.
#[derive(Default)]
pub struct MockLister {
    trees: Mutex<HashMap<PathBuf, Vec<MediaEntry>>>,
}

impl MockLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, entries: Vec<MediaEntry>) {
        self.trees.lock().unwrap().insert(path.into(), entries);
    }

    pub fn remove(&self, path: &Path) {
        self.trees.lock().unwrap().remove(path);
    }
}

#[async_trait::async_trait]
impl DirectoryLister for MockLister {
    async fn list_children(&self, path: &Path) -> Result<Vec<MediaEntry>, EnumerationError> {
        self.trees
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| EnumerationError::Unreadable {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not scripted"),
            })
    }
}

#[derive(Default)]
struct EngineInner {
    loaded: Option<PathBuf>,
    playing: bool,
    muted: bool,
    position: f64,
    probes: HashMap<PathBuf, MediaProbe>,
    fail_load: HashSet<PathBuf>,
    fail_probe: HashSet<PathBuf>,
    fail_extract: HashSet<PathBuf>,
    load_log: Vec<PathBuf>,
    extract_log: Vec<(PathBuf, f64, PathBuf)>,
}

/// Mock media engine
///
/// Keeps an in-memory transport state the tests can inspect and script:
/// per-path probe data, per-path failures, and a manual end-of-media
/// trigger ([`finish_current`](Self::finish_current)) that flips the playing
/// flag the way a real engine does when media runs out.
#[derive(Default)]
pub struct MockMediaEngine {
    inner: Mutex<EngineInner>,
}

impl MockMediaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_probe(&self, path: impl Into<PathBuf>, probe: MediaProbe) {
        self.inner.lock().unwrap().probes.insert(path.into(), probe);
    }

    pub fn fail_load(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().fail_load.insert(path.into());
    }

    pub fn fail_probe(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().fail_probe.insert(path.into());
    }

    pub fn fail_extract(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().fail_extract.insert(path.into());
    }

    /// Simulate natural end-of-media: the engine stops reporting playing
    /// without any pause command having been issued.
    pub fn finish_current(&self) {
        self.inner.lock().unwrap().playing = false;
    }

    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().load_log.clone()
    }

    pub fn extract_calls(&self) -> Vec<(PathBuf, f64, PathBuf)> {
        self.inner.lock().unwrap().extract_log.clone()
    }

    pub fn is_muted(&self) -> bool {
        self.inner.lock().unwrap().muted
    }

    fn default_probe() -> MediaProbe {
        MediaProbe {
            duration_secs: 60.0,
            width: 1920,
            height: 1080,
            title: None,
        }
    }
}

#[async_trait::async_trait]
impl MediaEngine for MockMediaEngine {
    async fn load(&self, path: &Path) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.load_log.push(path.to_path_buf());
        if inner.fail_load.contains(path) {
            return Err(EngineError::Load(format!(
                "scripted failure: {}",
                path.display()
            )));
        }
        inner.loaded = Some(path.to_path_buf());
        inner.position = 0.0;
        inner.playing = false;
        Ok(())
    }

    async fn play(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.loaded.is_none() {
            return Err(EngineError::Control("nothing loaded".into()));
        }
        inner.playing = true;
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.inner.lock().unwrap().playing = false;
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.playing = false;
        inner.loaded = None;
        inner.position = 0.0;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    async fn position(&self) -> f64 {
        self.inner.lock().unwrap().position
    }

    async fn set_position(&self, normalized: f64) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.loaded.is_none() {
            return Err(EngineError::Control("nothing loaded".into()));
        }
        inner.position = normalized.clamp(0.0, 1.0);
        Ok(())
    }

    async fn set_mute(&self, mute: bool) -> Result<(), EngineError> {
        self.inner.lock().unwrap().muted = mute;
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<MediaProbe, EngineError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_probe.contains(path) {
            return Err(EngineError::Probe(format!(
                "scripted failure: {}",
                path.display()
            )));
        }
        Ok(inner
            .probes
            .get(path)
            .cloned()
            .unwrap_or_else(Self::default_probe))
    }

    async fn extract_frame(
        &self,
        path: &Path,
        timestamp_secs: f64,
        out_path: &Path,
        _width: u32,
        _preserve_aspect: bool,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_extract.contains(path) {
            return Err(EngineError::Extraction(format!(
                "scripted failure: {}",
                path.display()
            )));
        }
        std::fs::write(out_path, b"frame")?;
        inner
            .extract_log
            .push((path.to_path_buf(), timestamp_secs, out_path.to_path_buf()));
        Ok(())
    }
}
