//! Library entry for relaychat components used by the binary and tests.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod ui;

pub use error::ChatError;
