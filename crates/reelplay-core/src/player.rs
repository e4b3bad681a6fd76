//! Media player abstraction
//!
//! The session drives a native player through [`MediaPlayer`] and receives
//! its lifecycle through [`PlayerEvent`]s. Players are built by a
//! [`PlayerFactory`], which also wires the player's event stream to the
//! session's driver.

use crate::{manifest::ManifestInterceptor, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Classification of streaming-engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingErrorKind {
    /// Manifest or segment request failed
    Network,
    /// Demux or decode failure
    Media,
    Other,
}

impl std::fmt::Display for StreamingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamingErrorKind::Network => write!(f, "network"),
            StreamingErrorKind::Media => write!(f, "media"),
            StreamingErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Error reported by the streaming engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingError {
    pub kind: StreamingErrorKind,
    /// The engine gave up on its own
    pub fatal: bool,
    pub details: String,
}

impl StreamingError {
    pub fn fatal(kind: StreamingErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            details: details.into(),
        }
    }

    pub fn recoverable(kind: StreamingErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: false,
            details: details.into(),
        }
    }
}

/// Lifecycle events emitted by a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Player UI mounted
    Ready,
    /// Enough data to start playback
    CanPlay,
    VolumeChange,
    Ended,
    TimeUpdate,
    Pause,
    Error(StreamingError),
}

/// Handle to the streaming library attached to a player
pub trait StreamingEngine: Send {
    /// Restart loading after a network failure
    fn start_load(&mut self);

    /// Attempt to recover from a decode failure
    fn recover_media_error(&mut self);

    /// Release connections and decoders
    fn destroy(&mut self);
}

/// A live native player instance
pub trait MediaPlayer: Send {
    /// Playback position in seconds
    fn current_time(&self) -> f64;

    /// Stream duration in seconds; 0 or NaN when unknown
    fn duration(&self) -> f64;

    fn is_paused(&self) -> bool;

    fn seek(&mut self, position: f64) -> Result<()>;

    fn volume(&self) -> f64;

    fn set_volume(&mut self, volume: f64);

    /// Swap the playing URL without recreating the player
    fn switch_url(&mut self, url: &str, title: &str, poster: &str) -> Result<()>;

    /// Streaming library handle, when the current URL uses one
    fn engine(&mut self) -> Option<&mut (dyn StreamingEngine + 'static)>;

    /// Tear the player down; the engine is destroyed separately first
    fn destroy(&mut self);
}

/// Construction parameters for a player
#[derive(Clone)]
pub struct PlayerOptions {
    pub url: String,
    pub title: String,
    pub poster: String,
    pub volume: f64,
    pub autoplay: bool,
    /// Applied by the player's manifest loader to every loaded response
    pub interceptor: Arc<dyn ManifestInterceptor>,
}

impl std::fmt::Debug for PlayerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerOptions")
            .field("url", &self.url)
            .field("title", &self.title)
            .field("volume", &self.volume)
            .field("autoplay", &self.autoplay)
            .field("interceptor", &self.interceptor.name())
            .finish()
    }
}

/// Builds player instances
pub trait PlayerFactory: Send + Sync {
    fn create(&self, options: PlayerOptions) -> Result<Box<dyn MediaPlayer>>;
}
