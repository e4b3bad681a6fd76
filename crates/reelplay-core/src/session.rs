//! Playback Session - stateful core of the engine
//!
//! Coordinates:
//! - Candidate resolution (search, detail fallback, source ranking)
//! - Play-history restore and the one-shot resume position
//! - The single live player instance and its streaming engine
//! - Episode, source and ad-filter transitions
//! - Progress and favorite persistence
//!
//! The session is driven from one task: every operation takes `&mut self`,
//! player events are fed through [`PlaybackSession::handle_event`] and the
//! auto-advance timer is owned by whoever drives the session (see
//! [`crate::driver::PlaybackDriver`]).

use crate::{
    catalog::{CatalogApi, MatchCriteria},
    config::SessionConfig,
    manifest::interceptor_for,
    player::{MediaPlayer, PlayerEvent, PlayerFactory, PlayerOptions, StreamingError, StreamingErrorKind},
    probe::{SourceProber, VideoProbe},
    progress::{ProgressBridge, ProgressSnapshot},
    selector::{ProbeCache, SourceSelector},
    storage::{FavoriteRecord, PlaybackStore, StorageEvent},
    types::*,
    Error, Result,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Volume difference below which a restore is skipped
const VOLUME_EPSILON: f64 = 0.01;

/// Position a source change must exceed to carry over as a resume point
const MIN_CARRY_OVER_SECS: f64 = 1.0;

/// External collaborators of a session
#[derive(Clone)]
pub struct SessionDeps {
    pub catalog: Arc<dyn CatalogApi>,
    pub probe: Arc<dyn VideoProbe>,
    pub store: Arc<dyn PlaybackStore>,
    pub player_factory: Arc<dyn PlayerFactory>,
}

/// Auto-advance scheduled by an `ended` event
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingAdvance {
    target: usize,
    due: Instant,
}

/// Snapshot of what the UI renders
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub state: SessionState,
    pub loading_stage: LoadingStage,
    pub episode_index: usize,
    pub total_episodes: usize,
    pub title: String,
    pub year: String,
    pub cover: String,
    pub source: Option<SourceKey>,
    pub error: Option<String>,
    pub source_search_error: Option<String>,
    pub source_error: Option<String>,
    pub favorited: bool,
    pub ad_filter_enabled: bool,
    pub is_video_loading: bool,
    pub sources: Vec<CandidateSource>,
    pub probes: ProbeCache,
}

/// Playback session managing one title
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    config: SessionConfig,
    request: PlayRequest,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    stage: LoadingStage,

    catalog: Arc<dyn CatalogApi>,
    selector: SourceSelector,
    store: Arc<dyn PlaybackStore>,
    player_factory: Arc<dyn PlayerFactory>,
    progress: ProgressBridge,

    /// Resolved candidate set
    candidates: Vec<CandidateSource>,
    /// Probe outcomes of the initial ranking
    probes: ProbeCache,
    active: Option<CandidateSource>,
    title: String,
    search_title: String,
    /// 0-based
    episode_index: usize,
    resume: ResumePosition,
    last_volume: f64,
    ad_filter_enabled: bool,
    /// The only live player
    player: Option<Box<dyn MediaPlayer>>,
    pending_advance: Option<PendingAdvance>,

    favorited: bool,
    is_video_loading: bool,
    /// Terminal error message
    error: Option<String>,
    source_search_error: Option<String>,
    /// Inline error of the last failed source change
    source_error: Option<String>,
}

impl PlaybackSession {
    /// Create a new session for a request
    pub fn new(request: PlayRequest, config: SessionConfig, deps: SessionDeps) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);

        let title = request
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| request.search_query().map(str::to_string))
            .unwrap_or_default();
        let search_title = request.search_title.clone().unwrap_or_default();

        Self {
            id: SessionId::new(),
            stage: LoadingStage::Searching,
            state: SessionState::Idle,
            state_tx,
            catalog: deps.catalog,
            selector: SourceSelector::new(SourceProber::new(deps.probe)),
            progress: ProgressBridge::new(deps.store.clone(), config.storage_kind.save_interval()),
            store: deps.store,
            player_factory: deps.player_factory,
            candidates: Vec::new(),
            probes: ProbeCache::default(),
            active: None,
            title,
            search_title,
            episode_index: 0,
            resume: ResumePosition::default(),
            last_volume: config.initial_volume,
            ad_filter_enabled: config.ad_filter_enabled,
            player: None,
            pending_advance: None,
            favorited: false,
            is_video_loading: false,
            error: None,
            source_search_error: None,
            source_error: None,
            request,
            config,
        }
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Change feed of the session's store
    pub fn subscribe_storage(&self) -> broadcast::Receiver<StorageEvent> {
        self.store.subscribe()
    }

    pub fn loading_stage(&self) -> LoadingStage {
        self.stage
    }

    pub fn active_source(&self) -> Option<&CandidateSource> {
        self.active.as_ref()
    }

    pub fn candidates(&self) -> &[CandidateSource] {
        &self.candidates
    }

    pub fn probes(&self) -> &ProbeCache {
        &self.probes
    }

    pub fn episode_index(&self) -> usize {
        self.episode_index
    }

    pub fn total_episodes(&self) -> usize {
        self.active.as_ref().map_or(0, CandidateSource::total_episodes)
    }

    pub fn resume_position(&self) -> Option<f64> {
        self.resume.peek()
    }

    pub fn is_favorited(&self) -> bool {
        self.favorited
    }

    pub fn is_video_loading(&self) -> bool {
        self.is_video_loading
    }

    pub fn ad_filter_enabled(&self) -> bool {
        self.ad_filter_enabled
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn source_error(&self) -> Option<&str> {
        self.source_error.as_deref()
    }

    /// When the scheduled auto-advance is due
    pub fn pending_advance_deadline(&self) -> Option<Instant> {
        self.pending_advance.map(|p| p.due)
    }

    /// Snapshot for the UI
    pub fn view(&self) -> SessionView {
        let active = self.active.as_ref();
        SessionView {
            session_id: self.id,
            state: self.state,
            loading_stage: self.stage,
            episode_index: self.episode_index,
            total_episodes: self.total_episodes(),
            title: self.title.clone(),
            year: active.map(|s| s.year.clone()).or_else(|| self.request.year.clone()).unwrap_or_default(),
            cover: active.map(|s| s.poster_url.clone()).unwrap_or_default(),
            source: active.map(CandidateSource::key),
            error: self.error.clone(),
            source_search_error: self.source_search_error.clone(),
            source_error: self.source_error.clone(),
            favorited: self.favorited,
            ad_filter_enabled: self.ad_filter_enabled,
            is_video_loading: self.is_video_loading,
            sources: self.candidates.clone(),
            probes: self.probes.clone(),
        }
    }

    /// Transition to new state
    fn set_state(&mut self, new_state: SessionState) -> Result<()> {
        let current = self.state;
        if current == new_state && current != SessionState::SourceChanging {
            return Ok(());
        }

        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state = new_state;
        let _ = self.state_tx.send(new_state);
        info!(session_id = %self.id, from = %current, to = %new_state, "State transition");
        Ok(())
    }

    /// Record a terminal error and enter `Failed`
    fn fail(&mut self, error: &Error) {
        error!(session_id = %self.id, code = error.error_code(), error = %error, "Session failed");
        self.error = Some(error.user_message());
        self.is_video_loading = false;
        if !self.state.is_terminal() {
            let _ = self.set_state(SessionState::Failed);
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve the candidate set and choose the active source
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn resolve(&mut self) -> Result<()> {
        self.set_state(SessionState::Resolving)?;

        match self.resolve_source().await {
            Ok(()) => {
                self.restore_history().await;
                self.refresh_favorite().await;
                self.stage = LoadingStage::Ready;
                self.set_state(SessionState::Ready)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn resolve_source(&mut self) -> Result<()> {
        if !self.request.has_identity() {
            return Err(Error::MissingParameters);
        }

        let forced = self.request.forced_pair();
        self.stage = if forced.is_some() {
            LoadingStage::Fetching
        } else {
            LoadingStage::Searching
        };

        let mut candidates = self.search_candidates().await;

        if let Some(pair) = &forced {
            if !candidates.iter().any(|c| c.key() == *pair) {
                candidates = Self::fetch_detail(self.catalog.as_ref(), pair).await;
            }
        }
        if candidates.is_empty() {
            return Err(Error::NoResultsFound);
        }
        self.candidates = candidates;

        let mut chosen = match &forced {
            Some(pair) if !self.request.prefer => self
                .candidates
                .iter()
                .find(|c| c.key() == *pair)
                .cloned()
                .ok_or(Error::NoResultsFound)?,
            _ => self.candidates[0].clone(),
        };

        if (forced.is_none() || self.request.prefer) && self.config.optimization_enabled {
            self.stage = LoadingStage::Preferring;
            self.set_state(SessionState::Probing)?;
            let selection = self.selector.select_best(&self.candidates).await?;
            self.probes = selection.probes;
            chosen = selection.best;
        }

        if !chosen.title.is_empty() {
            self.title = chosen.title.clone();
        }
        if self.episode_index >= chosen.total_episodes() {
            self.episode_index = 0;
        }

        info!(
            source = %chosen.key(),
            source_name = %chosen.source_name,
            episodes = chosen.total_episodes(),
            "Source resolved"
        );
        self.active = Some(chosen);
        Ok(())
    }

    fn criteria(&self) -> MatchCriteria {
        MatchCriteria::new(self.title.clone())
            .with_year(self.request.year.clone())
            .with_kind(self.request.search_kind)
    }

    /// Search results matching the requested title; failures leave the set empty
    async fn search_candidates(&mut self) -> Vec<CandidateSource> {
        let Some(query) = self.request.search_query().map(str::to_string) else {
            return Vec::new();
        };

        match self.catalog.search(&query).await {
            Ok(results) => {
                let total = results.len();
                let matched = self.criteria().filter(results);
                debug!(query = %query, total, matched = matched.len(), "Search results filtered");
                matched
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Source search failed");
                self.source_search_error = Some(e.to_string());
                Vec::new()
            }
        }
    }

    async fn fetch_detail(catalog: &dyn CatalogApi, pair: &SourceKey) -> Vec<CandidateSource> {
        match catalog.detail(&pair.source, &pair.id).await {
            Ok(detail) => vec![detail],
            Err(e) => {
                warn!(source = %pair, error = %e, "Detail lookup failed");
                Vec::new()
            }
        }
    }

    /// Restore episode and position from the active source's play record
    async fn restore_history(&mut self) {
        let Some(active) = &self.active else { return };
        let key = active.key().storage_key();
        let total = active.total_episodes();

        let records = match self.store.play_records().await {
            Ok(records) => records,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to read play records");
                return;
            }
        };
        let Some(record) = records.get(&key) else { return };

        // The saved position only belongs to the saved episode
        match record.index.checked_sub(1) {
            Some(index) if index < total => {
                self.episode_index = index;
                self.resume.arm(record.play_time as f64);
            }
            _ => {
                warn!(key = %key, index = record.index, total, "Ignoring out-of-range history episode");
                return;
            }
        }
        info!(
            key = %key,
            episode = self.episode_index + 1,
            position = record.play_time,
            "Play history restored"
        );
    }

    async fn refresh_favorite(&mut self) {
        let Some(active) = &self.active else { return };
        let key = active.key().storage_key();
        match self.store.is_favorited(&key).await {
            Ok(favorited) => self.favorited = favorited,
            Err(e) => warn!(key = %key, error = %e, "Failed to read favorite status"),
        }
    }

    // ------------------------------------------------------------------
    // Player lifecycle
    // ------------------------------------------------------------------

    /// Create the player for the resolved source and start playing
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: SessionState::Playing.to_string(),
            });
        }

        self.is_video_loading = true;
        if let Err(e) = self.load_current_episode(true) {
            self.fail(&e);
            return Err(e);
        }
        self.set_state(SessionState::Playing)
    }

    /// Point the player at the current episode, swapping in place when possible
    fn load_current_episode(&mut self, force_recreate: bool) -> Result<()> {
        let active = self.active.as_ref().ok_or(Error::NoResultsFound)?;
        let url = active
            .episode_url(self.episode_index)
            .ok_or(Error::InvalidEpisode {
                index: self.episode_index,
                total: active.total_episodes(),
            })?
            .to_string();
        let title = format!("{} - Episode {}", self.title, self.episode_index + 1);
        let poster = active.poster_url.clone();

        if !force_recreate && self.config.supports_in_place_source_swap {
            if let Some(player) = self.player.as_mut() {
                match player.switch_url(&url, &title, &poster) {
                    Ok(()) => {
                        debug!(url = %url, episode = self.episode_index + 1, "Player source swapped");
                        return Ok(());
                    }
                    Err(e) => warn!(url = %url, error = %e, "In-place swap failed, recreating player"),
                }
            }
        }

        self.release_player();

        let options = PlayerOptions {
            url: url.clone(),
            title,
            poster,
            volume: self.config.initial_volume,
            autoplay: true,
            interceptor: interceptor_for(self.ad_filter_enabled),
        };
        let player = self.player_factory.create(options).map_err(|e| match e {
            Error::PlayerInit(_) => e,
            other => Error::PlayerInit(other.to_string()),
        })?;
        self.player = Some(player);

        info!(
            url = %url,
            episode = self.episode_index + 1,
            ad_filter = self.ad_filter_enabled,
            "Player created"
        );
        Ok(())
    }

    /// Destroy the streaming engine, then the player
    fn release_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            if let Some(engine) = player.engine() {
                engine.destroy();
            }
            player.destroy();
            debug!("Player released");
        }
    }

    /// Apply a player lifecycle event
    pub async fn handle_event(&mut self, event: PlayerEvent) -> Result<()> {
        if self.player.is_none() {
            debug!(?event, "Ignoring event without a live player");
            return Ok(());
        }

        match event {
            PlayerEvent::Ready => {
                self.error = None;
            }
            PlayerEvent::VolumeChange => {
                if let Some(player) = self.player.as_ref() {
                    self.last_volume = player.volume();
                }
            }
            PlayerEvent::CanPlay => self.on_can_play()?,
            PlayerEvent::Error(err) => self.on_streaming_error(err)?,
            PlayerEvent::Ended => self.on_ended(),
            PlayerEvent::TimeUpdate => self.save_progress_if_due(Instant::now()).await,
            PlayerEvent::Pause => {
                self.save_progress().await;
            }
        }
        Ok(())
    }

    fn on_can_play(&mut self) -> Result<()> {
        let Some(player) = self.player.as_mut() else { return Ok(()) };

        if let Some(position) = self.resume.take() {
            let target = resume_target(position, player.duration());
            match player.seek(target) {
                Ok(()) => info!(position, target, "Playback position restored"),
                Err(e) => warn!(position, error = %e, "Failed to restore playback position"),
            }
        }

        if (player.volume() - self.last_volume).abs() > VOLUME_EPSILON {
            player.set_volume(self.last_volume);
        }

        self.is_video_loading = false;
        if self.state == SessionState::SourceChanging {
            self.set_state(SessionState::Playing)?;
        }
        Ok(())
    }

    fn on_streaming_error(&mut self, err: StreamingError) -> Result<()> {
        if !err.fatal {
            debug!(kind = %err.kind, details = %err.details, "Non-fatal streaming error");
            return Ok(());
        }

        let Some(player) = self.player.as_mut() else { return Ok(()) };
        match (err.kind, player.engine()) {
            (StreamingErrorKind::Network, Some(engine)) => {
                warn!(details = %err.details, "Fatal network error, reloading");
                engine.start_load();
                Ok(())
            }
            (StreamingErrorKind::Media, Some(engine)) => {
                warn!(details = %err.details, "Fatal media error, recovering");
                engine.recover_media_error();
                Ok(())
            }
            _ => {
                self.release_player();
                let error = Error::StreamingProtocol {
                    kind: err.kind,
                    details: err.details,
                };
                self.fail(&error);
                Err(error)
            }
        }
    }

    fn on_ended(&mut self) {
        if self.pending_advance.is_some() {
            debug!("Auto-advance already scheduled");
            return;
        }

        let target = self.episode_index + 1;
        if target < self.total_episodes() {
            let due = Instant::now() + self.config.auto_advance_delay();
            self.pending_advance = Some(PendingAdvance { target, due });
            debug!(episode = target + 1, "Auto-advance scheduled");
        }
    }

    /// Run the scheduled auto-advance once its deadline has passed
    pub fn fire_pending_advance(&mut self, now: Instant) -> Result<()> {
        match self.pending_advance {
            Some(pending) if pending.due <= now => {
                self.pending_advance = None;
                info!(episode = pending.target + 1, "Advancing to next episode");
                self.switch_episode(pending.target)
            }
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Switch to another episode of the active source
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn change_episode(&mut self, index: usize) -> Result<()> {
        let total = self.total_episodes();
        if index >= total {
            debug!(index, total, "Ignoring out-of-range episode");
            return Err(Error::InvalidEpisode { index, total });
        }
        if index == self.episode_index {
            return Ok(());
        }

        self.save_progress().await;
        self.pending_advance = None;
        self.switch_episode(index)
    }

    pub async fn next_episode(&mut self) -> Result<()> {
        if self.episode_index + 1 >= self.total_episodes() {
            return Ok(());
        }
        self.step_episode(self.episode_index + 1).await
    }

    pub async fn previous_episode(&mut self) -> Result<()> {
        if self.episode_index == 0 {
            return Ok(());
        }
        self.step_episode(self.episode_index - 1).await
    }

    // Stepping only saves while the player is running
    async fn step_episode(&mut self, index: usize) -> Result<()> {
        let playing = self.player.as_ref().is_some_and(|p| !p.is_paused());
        if playing {
            self.save_progress().await;
        }
        self.pending_advance = None;
        self.switch_episode(index)
    }

    fn switch_episode(&mut self, index: usize) -> Result<()> {
        self.episode_index = index;
        if self.player.is_none() {
            return Ok(());
        }
        if let Err(e) = self.load_current_episode(false) {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Switch to another resolved candidate, keeping the episode when it exists
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn change_source(&mut self, source: &str, id: &str) -> Result<()> {
        let key = SourceKey::new(source, id);
        let Some(target) = self.candidates.iter().find(|c| c.key() == key).cloned() else {
            let error = Error::SourceNotFound {
                source_id: source.to_string(),
                id: id.to_string(),
            };
            warn!(source = %key, "Requested source is not among the candidates");
            self.source_error = Some(error.user_message());
            return Err(error);
        };

        if self.active.as_ref().map(CandidateSource::key) == Some(key.clone()) {
            return Ok(());
        }

        self.set_state(SessionState::SourceChanging)?;
        self.is_video_loading = true;
        self.source_error = None;
        self.pending_advance = None;

        let current_time = self.player.as_ref().map_or(0.0, |p| p.current_time());

        // Records are keyed by source, the new one starts its own
        if let Some(previous) = &self.active {
            self.progress.forget(previous).await;
        }

        let target_index = if self.episode_index < target.total_episodes() {
            self.episode_index
        } else {
            0
        };
        if target_index != self.episode_index {
            self.resume.disarm();
        } else if !self.resume.is_armed() && current_time > MIN_CARRY_OVER_SECS {
            self.resume.arm(current_time);
        }

        info!(
            from = ?self.active.as_ref().map(CandidateSource::key).map(|k| k.to_string()),
            to = %key,
            episode = target_index + 1,
            "Changing source"
        );

        if !target.title.is_empty() {
            self.title = target.title.clone();
        }
        self.episode_index = target_index;
        self.active = Some(target);
        self.refresh_favorite().await;

        if self.player.is_some() {
            if let Err(e) = self.load_current_episode(false) {
                self.fail(&e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Toggle manifest filtering; the player is recreated so the new
    /// interceptor is registered with its loader
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn set_ad_filter(&mut self, enabled: bool) -> Result<()> {
        if enabled == self.ad_filter_enabled {
            return Ok(());
        }
        self.ad_filter_enabled = enabled;

        let Some(player) = self.player.as_ref() else { return Ok(()) };
        let position = player.current_time();
        if position > 0.0 {
            self.resume.arm(position);
        }
        self.pending_advance = None;

        info!(enabled, resume = ?self.resume.peek(), "Ad filter toggled, recreating player");
        if let Err(e) = self.load_current_episode(true) {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Save or remove the active source's favorite; returns the new status
    pub async fn toggle_favorite(&mut self) -> bool {
        let Some(active) = &self.active else { return self.favorited };
        let key = active.key().storage_key();

        let result = if self.favorited {
            self.store.delete_favorite(&key).await.map(|()| false)
        } else {
            let record = FavoriteRecord {
                title: self.title.clone(),
                source_name: active.source_name.clone(),
                year: active.year.clone(),
                cover: active.poster_url.clone(),
                total_episodes: active.total_episodes(),
                save_time: chrono::Utc::now().timestamp_millis(),
                search_title: self.search_title.clone(),
            };
            self.store.save_favorite(&key, record).await.map(|()| true)
        };

        match result {
            Ok(favorited) => {
                info!(key = %key, favorited, "Favorite toggled");
                self.favorited = favorited;
            }
            Err(e) => error!(key = %key, error = %e, "Failed to toggle favorite"),
        }
        self.favorited
    }

    /// Apply a change notification from the store
    pub fn apply_storage_event(&mut self, event: &StorageEvent) {
        match event {
            StorageEvent::FavoritesUpdated(favorites) => {
                if let Some(active) = &self.active {
                    self.favorited = favorites.contains_key(&active.key().storage_key());
                }
            }
            StorageEvent::PlayRecordsUpdated(_) => {}
        }
    }

    /// Save progress now; failures are logged
    pub async fn save_progress(&mut self) -> bool {
        let Some((current_time, duration)) = self.player.as_deref().map(|p| (p.current_time(), p.duration())) else {
            return false;
        };
        let Some(source) = &self.active else { return false };

        let snapshot = ProgressSnapshot {
            title: &self.title,
            source,
            episode_index: self.episode_index,
            current_time,
            duration,
            search_title: &self.search_title,
        };
        self.progress.save(&snapshot).await
    }

    async fn save_progress_if_due(&mut self, now: Instant) {
        let Some((current_time, duration)) = self.player.as_deref().map(|p| (p.current_time(), p.duration())) else {
            return;
        };
        let Some(source) = &self.active else { return };

        let snapshot = ProgressSnapshot {
            title: &self.title,
            source,
            episode_index: self.episode_index,
            current_time,
            duration,
            search_title: &self.search_title,
        };
        self.progress.save_if_due(&snapshot, now).await;
    }

    /// Page hidden: flush progress
    pub async fn on_page_hidden(&mut self) {
        self.save_progress().await;
    }

    /// Flush progress, cancel timers and release the player
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn shutdown(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }

        self.save_progress().await;
        self.pending_advance = None;
        self.release_player();
        let _ = self.set_state(SessionState::Destroyed);
        info!("Session destroyed");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release_player();
    }
}
