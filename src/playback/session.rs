use crate::config::CoreConfig;
use crate::engine::MediaEngine;
use crate::events::EventFan;
use crate::listing::{DirectoryLister, MediaEntry};
use crate::playlist::PlaylistIterator;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Session-owned playback state. The engine's boolean playing flag is a
/// noisy derivative of this, never the other way around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    /// Terminal: playlist exhausted, or the engine failed mid-session
    Ended { error: bool },
}

/// Events the session delivers to the presentation layer
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    StateChanged(PlaybackState),
    /// Display label for the current media: embedded title if the container
    /// has one, else the filename
    MediaLabelChanged(String),
    /// Normalized position in [0, 1], emitted by the poll and after seeks
    PositionChanged(f64),
}

#[derive(Debug)]
enum PlaybackCommand {
    PlayFolder {
        directory: PathBuf,
        anchor: Option<PathBuf>,
        include_anchor: bool,
    },
    Open(MediaEntry),
    TogglePlayPause,
    SeekRelative(f64),
    SeekForward,
    SeekBackward,
    SeekAbsolute(f64),
    SetMute(bool),
    Stop,
}

/// Handle to the playback session for sending commands
#[derive(Clone)]
pub struct PlaybackHandle {
    command_tx: mpsc::UnboundedSender<PlaybackCommand>,
    events: EventFan<PlaybackEvent>,
}

impl PlaybackHandle {
    /// Start continuous playback of `directory`, newest file first.
    ///
    /// With an `anchor`, traversal starts at the anchor (inclusive when
    /// `include_anchor`); a vanished anchor falls back to the whole folder.
    pub fn play_folder(
        &self,
        directory: impl Into<PathBuf>,
        anchor: Option<PathBuf>,
        include_anchor: bool,
    ) {
        let _ = self.command_tx.send(PlaybackCommand::PlayFolder {
            directory: directory.into(),
            anchor,
            include_anchor,
        });
    }

    /// Open a single entry without a playlist; playback ends after it.
    pub fn open(&self, entry: MediaEntry) {
        let _ = self.command_tx.send(PlaybackCommand::Open(entry));
    }

    pub fn toggle_play_pause(&self) {
        let _ = self.command_tx.send(PlaybackCommand::TogglePlayPause);
    }

    /// Adjust the normalized position by `delta`, clamped to [0, 1]
    pub fn seek_relative(&self, delta: f64) {
        let _ = self.command_tx.send(PlaybackCommand::SeekRelative(delta));
    }

    /// Step forward by the configured seek increment
    pub fn seek_forward(&self) {
        let _ = self.command_tx.send(PlaybackCommand::SeekForward);
    }

    /// Step backward by the configured seek increment
    pub fn seek_backward(&self) {
        let _ = self.command_tx.send(PlaybackCommand::SeekBackward);
    }

    /// Jump to a normalized position, clamped to [0, 1]. Scrubber input.
    pub fn seek_absolute(&self, position: f64) {
        let _ = self.command_tx.send(PlaybackCommand::SeekAbsolute(position));
    }

    pub fn set_mute(&self, mute: bool) {
        let _ = self.command_tx.send(PlaybackCommand::SetMute(mute));
    }

    /// Stop the engine and the poll and reset to `Idle`, cancelling any
    /// in-flight auto-advance. Used on directory switch or back-navigation.
    pub fn stop(&self) {
        let _ = self.command_tx.send(PlaybackCommand::Stop);
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        self.events.subscribe()
    }
}

/// State machine coordinating the media engine, the playlist iterator, and
/// UI-facing events.
///
/// Everything runs in one service task: commands and the periodic position
/// poll are multiplexed through `select!`, so the poll never runs
/// concurrently with itself and is disabled before any operation that would
/// mutate playback state out from under it.
pub struct PlaybackSession {
    engine: Arc<dyn MediaEngine>,
    lister: Arc<dyn DirectoryLister>,
    config: CoreConfig,
    command_rx: mpsc::UnboundedReceiver<PlaybackCommand>,
    event_tx: mpsc::UnboundedSender<PlaybackEvent>,
    state: PlaybackState,
    /// Set only by an explicit user pause; this, not the engine flag,
    /// disambiguates "user paused" from "media finished"
    paused: bool,
    polling: bool,
    /// Until this instant the engine's playing flag is not trusted (engines
    /// need a brief warm-up after load/resume)
    settle_until: Option<Instant>,
    playlist: Option<PlaylistIterator>,
    current: Option<MediaEntry>,
}

impl PlaybackSession {
    /// Start the session on the given runtime, returning its handle
    pub fn start(
        engine: Arc<dyn MediaEngine>,
        lister: Arc<dyn DirectoryLister>,
        config: CoreConfig,
        runtime_handle: tokio::runtime::Handle,
    ) -> PlaybackHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let events = EventFan::new(event_rx, runtime_handle.clone());

        let session = PlaybackSession {
            engine,
            lister,
            config,
            command_rx,
            event_tx,
            state: PlaybackState::Idle,
            paused: false,
            polling: false,
            settle_until: None,
            playlist: None,
            current: None,
        };

        runtime_handle.spawn(session.run());

        PlaybackHandle { command_tx, events }
    }

    async fn run(mut self) {
        info!("PlaybackSession started");

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = poll.tick(), if self.polling => self.on_poll_tick().await,
            }
        }

        info!("PlaybackSession stopped");
    }

    async fn handle_command(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::PlayFolder {
                directory,
                anchor,
                include_anchor,
            } => {
                self.reset().await;
                let mut playlist = PlaylistIterator::new(
                    self.lister.clone(),
                    directory,
                    anchor,
                    include_anchor,
                );
                match playlist.next_entry().await {
                    Some(entry) => {
                        self.playlist = Some(playlist);
                        self.open(entry).await;
                    }
                    None => {
                        debug!("folder has no playable entries");
                        self.finish(false);
                    }
                }
            }
            PlaybackCommand::Open(entry) => {
                self.reset().await;
                self.open(entry).await;
            }
            PlaybackCommand::TogglePlayPause => self.toggle_play_pause().await,
            PlaybackCommand::SeekRelative(delta) => {
                let position = self.engine.position().await;
                self.seek_to(position + delta).await;
            }
            PlaybackCommand::SeekForward => {
                let position = self.engine.position().await;
                self.seek_to(position + self.config.seek_step).await;
            }
            PlaybackCommand::SeekBackward => {
                let position = self.engine.position().await;
                self.seek_to(position - self.config.seek_step).await;
            }
            PlaybackCommand::SeekAbsolute(position) => self.seek_to(position).await,
            PlaybackCommand::SetMute(mute) => {
                if let Err(e) = self.engine.set_mute(mute).await {
                    warn!("mute failed: {}", e);
                }
            }
            PlaybackCommand::Stop => {
                self.reset().await;
                self.set_state(PlaybackState::Idle);
            }
        }
    }

    /// Load and start one entry: Idle/Ended -> Loading -> Playing
    async fn open(&mut self, entry: MediaEntry) {
        info!("opening {}", entry.path.display());
        self.set_state(PlaybackState::Loading);

        // Prefer the embedded title for the label; fall back to the filename.
        let label = match self.engine.probe(&entry.path).await {
            Ok(probe) => probe.title.unwrap_or_else(|| entry.file_name()),
            Err(_) => entry.file_name(),
        };
        let _ = self
            .event_tx
            .send(PlaybackEvent::MediaLabelChanged(label));

        if let Err(e) = self.engine.load(&entry.path).await {
            error!("load failed for {}: {}", entry.path.display(), e);
            self.finish(true);
            return;
        }
        if let Err(e) = self.engine.play().await {
            error!("play failed for {}: {}", entry.path.display(), e);
            self.finish(true);
            return;
        }

        self.current = Some(entry);
        self.paused = false;
        self.polling = true;
        self.settle_until = Some(Instant::now() + self.config.settle_delay);
        self.set_state(PlaybackState::Playing);
    }

    async fn toggle_play_pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                if let Err(e) = self.engine.pause().await {
                    error!("pause failed: {}", e);
                    self.finish(true);
                    return;
                }
                self.paused = true;
                self.polling = false;
                self.set_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => {
                if let Err(e) = self.engine.play().await {
                    error!("resume failed: {}", e);
                    self.finish(true);
                    return;
                }
                self.paused = false;
                self.polling = true;
                // The engine may briefly still report not-playing.
                self.settle_until = Some(Instant::now() + self.config.settle_delay);
                self.set_state(PlaybackState::Playing);
            }
            _ => debug!("toggle ignored in state {:?}", self.state),
        }
    }

    async fn seek_to(&mut self, position: f64) {
        if self.current.is_none() {
            debug!("seek ignored: nothing loaded");
            return;
        }

        // The poll stays off for the duration of the seek so it cannot read
        // a half-applied position.
        let was_polling = self.polling;
        self.polling = false;

        let clamped = position.clamp(0.0, 1.0);
        if let Err(e) = self.engine.set_position(clamped).await {
            error!("seek failed: {}", e);
            self.finish(true);
            return;
        }
        let _ = self.event_tx.send(PlaybackEvent::PositionChanged(clamped));

        self.settle_until = Some(Instant::now() + self.config.settle_delay);
        self.polling = was_polling;
    }

    /// One tick of the periodic poll: report position, then check for
    /// natural end-of-media and auto-advance.
    async fn on_poll_tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        let position = self.engine.position().await;
        let _ = self.event_tx.send(PlaybackEvent::PositionChanged(position));

        if let Some(until) = self.settle_until {
            if Instant::now() < until {
                return;
            }
            self.settle_until = None;
        }

        // Not playing without a user pause means the media finished.
        if !self.engine.is_playing().await && !self.paused {
            self.advance().await;
        }
    }

    async fn advance(&mut self) {
        let next = match self.playlist.as_mut() {
            Some(playlist) => playlist.next_entry().await,
            None => None,
        };

        match next {
            Some(entry) => {
                debug!("auto-advancing to {}", entry.path.display());
                self.open(entry).await;
            }
            None => {
                info!("playlist exhausted");
                self.finish(false);
            }
        }
    }

    /// Stop the poll and the engine and drop the active playlist
    async fn reset(&mut self) {
        self.polling = false;
        self.settle_until = None;
        self.paused = false;
        self.playlist = None;
        self.current = None;
        if let Err(e) = self.engine.stop().await {
            warn!("engine stop failed: {}", e);
        }
    }

    /// Terminal transition; play-control affordances reset on the UI side
    fn finish(&mut self, error: bool) {
        self.polling = false;
        self.settle_until = None;
        self.set_state(PlaybackState::Ended { error });
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            let _ = self
                .event_tx
                .send(PlaybackEvent::StateChanged(self.state.clone()));
        }
    }
}
