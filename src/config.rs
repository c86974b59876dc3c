use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
///
/// `Default` gives working values; `from_env` layers `CAMROLL_*` overrides
/// on top for development and testing.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Width thumbnails are scaled to, in pixels
    pub thumb_width: u32,
    /// Keep the source aspect ratio when scaling thumbnails
    pub preserve_aspect: bool,
    /// Where generated thumbnails live. Process-scoped by default; nothing
    /// is persisted across runs.
    pub thumb_dir: PathBuf,
    /// Interval of the playback position poll
    pub poll_interval: Duration,
    /// Normalized step applied by relative seeks
    pub seek_step: f64,
    /// How long to distrust the engine's playing flag after a resume
    pub settle_delay: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            thumb_width: 111,
            preserve_aspect: true,
            thumb_dir: std::env::temp_dir().join(format!("camroll-{}", std::process::id())),
            poll_interval: Duration::from_millis(100),
            seek_step: 0.05,
            settle_delay: Duration::from_millis(300),
        }
    }
}

impl CoreConfig {
    /// Load configuration with environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(width) = env_parse::<u32>("CAMROLL_THUMB_WIDTH") {
            config.thumb_width = width;
        }
        if let Ok(dir) = std::env::var("CAMROLL_THUMB_DIR") {
            config.thumb_dir = PathBuf::from(dir);
        }
        if let Some(ms) = env_parse::<u64>("CAMROLL_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(step) = env_parse::<f64>("CAMROLL_SEEK_STEP") {
            config.seek_step = step;
        }
        if let Some(ms) = env_parse::<u64>("CAMROLL_SETTLE_DELAY_MS") {
            config.settle_delay = Duration::from_millis(ms);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
