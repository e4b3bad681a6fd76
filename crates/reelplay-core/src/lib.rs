//! Reelplay Core - Source selection and playback session engine
//!
//! This crate provides the engine behind the play page:
//! - Catalog search with one shared title-matching predicate
//! - Concurrent, batched probing of candidate sources
//! - Weighted scoring and best-source selection
//! - Discontinuity filtering of HLS playlists
//! - The playback session state machine (episodes, sources, resume)
//! - Throttled progress persistence and favorites
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Reelplay Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Catalog    │  │    Source    │  │    Source    │           │
//! │  │     API      │  │   Selector   │──│ Prober/Scorer│           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────┘           │
//! │         │                 │                                     │
//! │         └────────┬────────┘                                     │
//! │                  │                                              │
//! │           ┌──────┴──────┐       ┌──────────────┐                │
//! │           │  Playback   │───────│   Manifest   │                │
//! │           │   Session   │       │    Filter    │                │
//! │           └──────┬──────┘       └──────────────┘                │
//! │                  │                                              │
//! │  ┌──────────────┐│ ┌──────────────┐  ┌──────────────┐           │
//! │  │   Playback   ├┴─│   Progress   │──│   Playback   │           │
//! │  │    Driver    │  │    Bridge    │  │    Store     │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod catalog;
pub mod manifest;
pub mod probe;
pub mod scorer;
pub mod selector;
pub mod player;
pub mod storage;
pub mod progress;
pub mod session;
pub mod driver;

pub use error::{Error, Result};
pub use types::*;
pub use config::{SessionConfig, StorageKind};
pub use catalog::{aggregate, normalize_title, CatalogApi, HttpCatalogApi, MatchCriteria, SourceGroup};
pub use manifest::{filter_manifest, interceptor_for, ManifestInterceptor, ResponseKind};
pub use probe::{HttpProbe, LoadSpeed, ProbeResult, Quality, SourceProber, SpeedUnit, VideoProbe};
pub use scorer::{score, ScoreBounds};
pub use selector::{ProbeCache, ProbeOutcome, RankedSource, Selection, SourceSelector};
pub use player::{MediaPlayer, PlayerEvent, PlayerFactory, PlayerOptions, StreamingEngine, StreamingError, StreamingErrorKind};
pub use storage::{FavoriteRecord, MemoryStore, PlayRecord, PlaybackStore, StorageEvent};
pub use progress::ProgressBridge;
pub use session::{PlaybackSession, SessionDeps, SessionView};
pub use driver::{PlaybackDriver, SessionCommand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Reelplay Core initialized");
}
