//! # Flagwatch Core
//! Shared foundation: configuration, error taxonomy, event types, and the
//! collaborator traits that the directory client and the Discord channel
//! implement.

pub mod config;
pub mod embed;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FlagwatchConfig;
pub use error::{FlagwatchError, Result};
pub use traits::{EventDirectory, NotificationSink};
pub use types::{EventInfo, ReactionSignal};
