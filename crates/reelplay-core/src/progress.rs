//! Progress persistence bridge
//!
//! Saves are best effort: a failed write is logged and dropped, playback
//! continues regardless.

use crate::{
    storage::{PlayRecord, PlaybackStore},
    types::CandidateSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// Player position below which nothing is saved
pub const MIN_SAVE_POSITION_SECS: f64 = 1.0;

/// Everything needed to build a play record
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot<'a> {
    pub title: &'a str,
    pub source: &'a CandidateSource,
    /// 0-based
    pub episode_index: usize,
    pub current_time: f64,
    pub duration: f64,
    pub search_title: &'a str,
}

/// Build the record for a snapshot, or `None` when it must not be saved
/// (position under a second, unknown duration, missing identity).
pub fn build_record(snapshot: &ProgressSnapshot<'_>, saved_at_ms: i64) -> Option<PlayRecord> {
    let ProgressSnapshot { title, source, current_time, duration, .. } = *snapshot;

    if title.is_empty() || source.source_name.is_empty() {
        return None;
    }
    if !(current_time >= MIN_SAVE_POSITION_SECS) || !(duration > 0.0) || !duration.is_finite() {
        return None;
    }

    Some(PlayRecord {
        title: title.to_string(),
        source_name: source.source_name.clone(),
        year: source.year.clone(),
        cover: source.poster_url.clone(),
        index: snapshot.episode_index + 1,
        total_episodes: source.total_episodes().max(1),
        play_time: current_time.floor() as u64,
        total_time: duration.floor() as u64,
        save_time: saved_at_ms,
        search_title: snapshot.search_title.to_string(),
    })
}

/// Pushes playback progress to the store
pub struct ProgressBridge {
    store: Arc<dyn PlaybackStore>,
    interval: Duration,
    last_save: Option<Instant>,
}

impl ProgressBridge {
    pub fn new(store: Arc<dyn PlaybackStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            last_save: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a throttled save is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_save
            .map_or(true, |last| now.saturating_duration_since(last) > self.interval)
    }

    /// Save unconditionally; returns whether a record was written
    pub async fn save(&mut self, snapshot: &ProgressSnapshot<'_>) -> bool {
        let Some(record) = build_record(snapshot, chrono::Utc::now().timestamp_millis()) else {
            return false;
        };
        let key = snapshot.source.key().storage_key();

        match self.store.save_play_record(&key, record).await {
            Ok(()) => {
                self.last_save = Some(Instant::now());
                debug!(
                    key = %key,
                    episode = snapshot.episode_index + 1,
                    position = snapshot.current_time.floor(),
                    duration = snapshot.duration.floor(),
                    "Progress saved"
                );
                true
            }
            Err(e) => {
                error!(key = %key, error = %e, "Failed to save progress");
                false
            }
        }
    }

    /// Save from a time update once the backend's interval has elapsed
    pub async fn save_if_due(&mut self, snapshot: &ProgressSnapshot<'_>, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        let saved = self.save(snapshot).await;
        self.last_save = Some(now);
        saved
    }

    /// Remove the record of a source; failures are logged
    pub async fn forget(&self, source: &CandidateSource) {
        let key = source.key().storage_key();
        if let Err(e) = self.store.delete_play_record(&key).await {
            error!(key = %key, error = %e, "Failed to delete play record");
        }
    }
}
