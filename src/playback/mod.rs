mod session;

pub use session::{PlaybackEvent, PlaybackHandle, PlaybackSession, PlaybackState};
