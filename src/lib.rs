// Library exports for integration tests and reusable components

pub mod config;
pub mod engine;
pub mod events;
pub mod layout;
pub mod listing;
pub mod playback;
pub mod playlist;
pub mod thumbs;

// Test support (available in unit tests and with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
