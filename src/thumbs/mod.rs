mod service;
mod worker;

pub use service::{ThumbnailEvent, ThumbnailHandle, ThumbnailService};
pub use worker::{ExtractionError, ThumbnailResult};

pub(crate) use worker::{ThumbnailWorker, WorkerMessage, WorkerPayload};
