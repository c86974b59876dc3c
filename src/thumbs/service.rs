use crate::config::CoreConfig;
use crate::engine::MediaEngine;
use crate::events::EventFan;
use crate::listing::{DirectoryHandle, DirectoryLister};
use crate::thumbs::{ThumbnailResult, ThumbnailWorker, WorkerMessage, WorkerPayload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Events the thumbnail pipeline delivers to the presentation layer
#[derive(Debug, Clone)]
pub enum ThumbnailEvent {
    /// A fresh tile for the currently selected directory
    Updated(ThumbnailResult),
    /// The selected directory itself could not be enumerated; the view shows
    /// a single "no data" state instead of tiles
    IndexingFailed {
        directory: DirectoryHandle,
        error: String,
    },
}

enum ThumbnailCommand {
    Select(DirectoryHandle),
}

/// Handle for driving the thumbnail pipeline and observing its output
#[derive(Clone)]
pub struct ThumbnailHandle {
    command_tx: mpsc::UnboundedSender<ThumbnailCommand>,
    events: EventFan<ThumbnailEvent>,
}

impl ThumbnailHandle {
    /// Make `directory` the active selection. Any in-flight job is asked to
    /// cancel and its late output is filtered out.
    pub fn select(&self, directory: DirectoryHandle) {
        let _ = self.command_tx.send(ThumbnailCommand::Select(directory));
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ThumbnailEvent> {
        self.events.subscribe()
    }
}

/// The active job's identity: at most one per service instance.
struct WorkerSlot {
    directory: DirectoryHandle,
    generation: u64,
    cancel: Arc<AtomicBool>,
    /// Results already forwarded for this job, for idempotent completion
    delivered: usize,
}

/// Owns the single-active-worker invariant and the staleness filter.
///
/// The service is the only component allowed to start or cancel workers.
/// Workers stream results back over a queued channel; anything tagged with a
/// stale generation, a different directory, or arriving after the expected
/// count is dropped, so a slow job that ignores cancellation stays harmless.
pub struct ThumbnailService {
    lister: Arc<dyn DirectoryLister>,
    engine: Arc<dyn MediaEngine>,
    config: CoreConfig,
    command_rx: mpsc::UnboundedReceiver<ThumbnailCommand>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    event_tx: mpsc::UnboundedSender<ThumbnailEvent>,
    active: Option<WorkerSlot>,
    next_generation: u64,
}

impl ThumbnailService {
    /// Start the service on the given runtime, returning its handle
    pub fn start(
        lister: Arc<dyn DirectoryLister>,
        engine: Arc<dyn MediaEngine>,
        config: CoreConfig,
        runtime_handle: tokio::runtime::Handle,
    ) -> ThumbnailHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let events = EventFan::new(event_rx, runtime_handle.clone());

        let service = ThumbnailService {
            lister,
            engine,
            config,
            command_rx,
            worker_tx,
            worker_rx,
            event_tx,
            active: None,
            next_generation: 0,
        };

        runtime_handle.spawn(service.run());

        ThumbnailHandle { command_tx, events }
    }

    async fn run(mut self) {
        info!("ThumbnailService started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(ThumbnailCommand::Select(directory)) => self.select(directory),
                    None => break,
                },
                Some(message) = self.worker_rx.recv() => self.on_worker_message(message),
            }
        }

        info!("ThumbnailService stopped");
    }

    fn select(&mut self, directory: DirectoryHandle) {
        if let Some(previous) = &self.active {
            // Cooperative: flag the old job and stop trusting its output.
            previous.cancel.store(true, Ordering::Relaxed);
            debug!("cancelling indexing of {}", previous.directory);
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = Arc::new(AtomicBool::new(false));

        info!("indexing {}", directory);

        let worker = ThumbnailWorker::new(
            self.lister.clone(),
            self.engine.clone(),
            self.config.clone(),
            directory.clone(),
            generation,
            cancel.clone(),
            self.worker_tx.clone(),
        );
        tokio::spawn(worker.run());

        self.active = Some(WorkerSlot {
            directory,
            generation,
            cancel,
            delivered: 0,
        });
    }

    fn on_worker_message(&mut self, message: WorkerMessage) {
        let Some(active) = &mut self.active else {
            return;
        };
        if message.generation != active.generation {
            debug!("dropping result from stale worker");
            return;
        }

        match message.payload {
            WorkerPayload::Result(result) => {
                if result.directory != active.directory {
                    debug!("dropping result for stale directory {}", result.directory);
                    return;
                }
                if active.delivered >= result.expected {
                    // Idempotent completion: duplicates after a late
                    // cancellation race are never re-rendered.
                    debug!("dropping result past expected count for {}", result.directory);
                    return;
                }
                active.delivered += 1;
                let _ = self.event_tx.send(ThumbnailEvent::Updated(result));
            }
            WorkerPayload::RootFailed(error) => {
                let _ = self.event_tx.send(ThumbnailEvent::IndexingFailed {
                    directory: active.directory.clone(),
                    error,
                });
            }
        }
    }
}
