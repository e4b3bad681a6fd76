//! Play-record and favorite persistence
//!
//! The engine only needs get-all / save / delete per collection plus a
//! change feed; [`MemoryStore`] is the in-process implementation.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Persisted playback progress of one (source, id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub title: String,
    pub source_name: String,
    pub year: String,
    pub cover: String,
    /// 1-based episode number
    pub index: usize,
    pub total_episodes: usize,
    /// Seconds, floored
    pub play_time: u64,
    /// Seconds, floored
    pub total_time: u64,
    /// Epoch milliseconds
    pub save_time: i64,
    #[serde(default)]
    pub search_title: String,
}

/// Persisted favorite of one (source, id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub title: String,
    pub source_name: String,
    pub year: String,
    pub cover: String,
    pub total_episodes: usize,
    /// Epoch milliseconds
    pub save_time: i64,
    #[serde(default)]
    pub search_title: String,
}

/// Change notification broadcast after every write
#[derive(Debug, Clone, PartialEq)]
pub enum StorageEvent {
    PlayRecordsUpdated(HashMap<String, PlayRecord>),
    FavoritesUpdated(HashMap<String, FavoriteRecord>),
}

/// Client-side persistence collaborator
#[async_trait]
pub trait PlaybackStore: Send + Sync {
    async fn play_records(&self) -> Result<HashMap<String, PlayRecord>>;

    async fn save_play_record(&self, key: &str, record: PlayRecord) -> Result<()>;

    async fn delete_play_record(&self, key: &str) -> Result<()>;

    async fn favorites(&self) -> Result<HashMap<String, FavoriteRecord>>;

    async fn save_favorite(&self, key: &str, record: FavoriteRecord) -> Result<()>;

    async fn delete_favorite(&self, key: &str) -> Result<()>;

    /// Change feed; dropping the receiver unsubscribes
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    async fn is_favorited(&self, key: &str) -> Result<bool> {
        Ok(self.favorites().await?.contains_key(key))
    }
}

/// In-memory store
pub struct MemoryStore {
    play_records: RwLock<HashMap<String, PlayRecord>>,
    favorites: RwLock<HashMap<String, FavoriteRecord>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            play_records: RwLock::new(HashMap::new()),
            favorites: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn notify(&self, event: StorageEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackStore for MemoryStore {
    async fn play_records(&self) -> Result<HashMap<String, PlayRecord>> {
        Ok(self.play_records.read().await.clone())
    }

    async fn save_play_record(&self, key: &str, record: PlayRecord) -> Result<()> {
        let snapshot = {
            let mut records = self.play_records.write().await;
            records.insert(key.to_string(), record);
            records.clone()
        };
        debug!(key = key, "Play record saved");
        self.notify(StorageEvent::PlayRecordsUpdated(snapshot));
        Ok(())
    }

    async fn delete_play_record(&self, key: &str) -> Result<()> {
        let snapshot = {
            let mut records = self.play_records.write().await;
            records.remove(key);
            records.clone()
        };
        self.notify(StorageEvent::PlayRecordsUpdated(snapshot));
        Ok(())
    }

    async fn favorites(&self) -> Result<HashMap<String, FavoriteRecord>> {
        Ok(self.favorites.read().await.clone())
    }

    async fn save_favorite(&self, key: &str, record: FavoriteRecord) -> Result<()> {
        let snapshot = {
            let mut favorites = self.favorites.write().await;
            favorites.insert(key.to_string(), record);
            favorites.clone()
        };
        self.notify(StorageEvent::FavoritesUpdated(snapshot));
        Ok(())
    }

    async fn delete_favorite(&self, key: &str) -> Result<()> {
        let snapshot = {
            let mut favorites = self.favorites.write().await;
            favorites.remove(key);
            favorites.clone()
        };
        self.notify(StorageEvent::FavoritesUpdated(snapshot));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
