//! Integration tests for Reelplay Core

use async_trait::async_trait;
use reelplay_core::{
    aggregate, filter_manifest, score, CandidateSource, CatalogApi, ContentKind, Error, LoadSpeed,
    MatchCriteria, MediaPlayer, MemoryStore, PlayRequest, PlaybackDriver, PlaybackSession,
    PlaybackStore, PlayerEvent, PlayerFactory, PlayerOptions, ProbeResult, Quality, Result,
    SessionCommand, SessionConfig, SessionDeps, SessionState, SourceProber, SourceSelector,
    StreamingEngine, VideoProbe,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Fixtures
// =============================================================================

fn candidate(source: &str, title: &str, episodes: usize) -> CandidateSource {
    CandidateSource {
        source: source.to_string(),
        id: "1".to_string(),
        title: title.to_string(),
        year: "2021".to_string(),
        source_name: source.to_uppercase(),
        category: None,
        episodes: (1..=episodes)
            .map(|i| format!("https://{}.example.com/ep{}/index.m3u8", source, i))
            .collect(),
        description: None,
        poster_url: String::new(),
    }
}

struct StaticCatalog(Vec<CandidateSource>);

#[async_trait]
impl CatalogApi for StaticCatalog {
    async fn search(&self, _query: &str) -> Result<Vec<CandidateSource>> {
        Ok(self.0.clone())
    }

    async fn detail(&self, source: &str, id: &str) -> Result<CandidateSource> {
        self.0
            .iter()
            .find(|c| c.source == source && c.id == id)
            .cloned()
            .ok_or(Error::NoResultsFound)
    }
}

struct TableProbe {
    table: HashMap<String, ProbeResult>,
    calls: AtomicUsize,
}

impl TableProbe {
    fn new(entries: Vec<(String, ProbeResult)>) -> Arc<Self> {
        Arc::new(Self {
            table: entries.into_iter().collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VideoProbe for TableProbe {
    async fn measure(&self, url: &str) -> Result<ProbeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table.get(url).copied().ok_or_else(|| Error::probe(url, "timeout"))
    }
}

#[derive(Default)]
struct Stage {
    alive: usize,
    created: usize,
    urls: Vec<String>,
    current_time: f64,
}

struct StubEngine;

impl StreamingEngine for StubEngine {
    fn start_load(&mut self) {}
    fn recover_media_error(&mut self) {}
    fn destroy(&mut self) {}
}

struct StubPlayer {
    stage: Arc<Mutex<Stage>>,
    engine: StubEngine,
}

impl MediaPlayer for StubPlayer {
    fn current_time(&self) -> f64 {
        self.stage.lock().unwrap().current_time
    }

    fn duration(&self) -> f64 {
        1500.0
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        self.stage.lock().unwrap().current_time = position;
        Ok(())
    }

    fn volume(&self) -> f64 {
        0.7
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn switch_url(&mut self, url: &str, _title: &str, _poster: &str) -> Result<()> {
        self.stage.lock().unwrap().urls.push(url.to_string());
        Ok(())
    }

    fn engine(&mut self) -> Option<&mut (dyn StreamingEngine + 'static)> {
        Some(&mut self.engine)
    }

    fn destroy(&mut self) {
        self.stage.lock().unwrap().alive -= 1;
    }
}

struct StubFactory(Arc<Mutex<Stage>>);

impl PlayerFactory for StubFactory {
    fn create(&self, options: PlayerOptions) -> Result<Box<dyn MediaPlayer>> {
        let mut stage = self.0.lock().unwrap();
        stage.alive += 1;
        stage.created += 1;
        stage.urls.push(options.url);
        Ok(Box::new(StubPlayer {
            stage: self.0.clone(),
            engine: StubEngine,
        }))
    }
}

struct Rig {
    driver: PlaybackDriver,
    events: mpsc::UnboundedSender<PlayerEvent>,
    commands: mpsc::Sender<SessionCommand>,
    stage: Arc<Mutex<Stage>>,
    store: Arc<MemoryStore>,
}

fn rig(request: PlayRequest, results: Vec<CandidateSource>) -> Rig {
    let stage = Arc::new(Mutex::new(Stage::default()));
    let store = Arc::new(MemoryStore::new());
    let deps = SessionDeps {
        catalog: Arc::new(StaticCatalog(results)),
        probe: TableProbe::new(vec![]),
        store: store.clone(),
        player_factory: Arc::new(StubFactory(stage.clone())),
    };
    let session = PlaybackSession::new(request, SessionConfig::default(), deps);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::channel(reelplay_core::driver::COMMAND_BUFFER);
    Rig {
        driver: PlaybackDriver::new(session, events_rx, commands_rx),
        events: events_tx,
        commands: commands_tx,
        stage,
        store,
    }
}

fn request_for(source: &str) -> PlayRequest {
    PlayRequest {
        source: Some(source.to_string()),
        id: Some("1".to_string()),
        title: Some("Night Train".to_string()),
        ..Default::default()
    }
}

// =============================================================================
// Scorer Tests
// =============================================================================

#[test]
fn test_score_reference_value() {
    let probe = ProbeResult {
        quality: Quality::Fhd1080p,
        load_speed: LoadSpeed::parse("2.0MB/s"),
        ping_ms: 100,
    };
    assert_eq!(score(&probe, 2048.0, 50.0, 1000.0), 88.95);
}

#[test]
fn test_score_unknown_speed_and_invalid_ping() {
    let probe = ProbeResult {
        quality: Quality::Hd720p,
        load_speed: LoadSpeed::parse("fast"),
        ping_ms: 0,
    };
    // 60 * 0.4 + 30 * 0.4 + 0
    assert_eq!(score(&probe, 1024.0, 50.0, 1000.0), 36.0);
}

// =============================================================================
// Selector Tests
// =============================================================================

#[tokio::test]
async fn test_selector_single_source_is_not_probed() {
    let probe = TableProbe::new(vec![]);
    let selector = SourceSelector::new(SourceProber::new(probe.clone()));
    let only = candidate("alpha", "Night Train", 4);

    let selection = selector.select_best(std::slice::from_ref(&only)).await.unwrap();
    assert_eq!(selection.best, only);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_selector_falls_back_to_first_source() {
    let probe = TableProbe::new(vec![]);
    let selector = SourceSelector::new(SourceProber::new(probe.clone()));
    let sources = vec![
        candidate("alpha", "Night Train", 4),
        candidate("beta", "Night Train", 4),
        candidate("gamma", "Night Train", 4),
    ];

    let selection = selector.select_best(&sources).await.unwrap();
    assert_eq!(selection.best.source, "alpha");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_selector_probes_second_episode() {
    let fast = ProbeResult {
        quality: Quality::Uhd4K,
        load_speed: LoadSpeed::parse("3.5 MB/s"),
        ping_ms: 40,
    };
    let probe = TableProbe::new(vec![("https://beta.example.com/ep2/index.m3u8".to_string(), fast)]);
    let selector = SourceSelector::new(SourceProber::new(probe));
    let sources = vec![candidate("alpha", "Night Train", 4), candidate("beta", "Night Train", 4)];

    let selection = selector.select_best(&sources).await.unwrap();
    assert_eq!(selection.best.source, "beta");
    assert_eq!(selection.ranking.len(), 1);
    assert_eq!(selection.probes.measured(), 1);
}

// =============================================================================
// Manifest Filter Tests
// =============================================================================

#[test]
fn test_filter_is_idempotent() {
    let playlist = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\na.ts\n#EXT-X-DISCONTINUITY\n#EXTINF:4.0,\nad.ts\n#EXT-X-DISCONTINUITY\n#EXTINF:6.0,\nb.ts";
    let once = filter_manifest(playlist);
    assert!(!once.contains("DISCONTINUITY"));
    assert_eq!(filter_manifest(&once), once);
}

#[test]
fn test_filter_preserves_clean_playlists() {
    let playlist = "#EXTM3U\r\n#EXTINF:6.0,\r\na.ts\r\n#EXT-X-ENDLIST\r\n";
    assert_eq!(filter_manifest(playlist), playlist);
    assert_eq!(filter_manifest(""), "");
}

// =============================================================================
// Matching Tests
// =============================================================================

#[test]
fn test_matching_and_aggregation_agree() {
    let results = vec![
        candidate("alpha", "Night Train", 8),
        candidate("beta", "night  train", 8),
        candidate("gamma", "Night Train", 1),
    ];
    let criteria = MatchCriteria::new("NightTrain").with_kind(Some(ContentKind::Tv));
    let matched = criteria.filter(results.clone());
    assert_eq!(matched.len(), 2);

    let groups = aggregate(results, "night train");
    let series = groups.iter().find(|g| g.key.kind == ContentKind::Tv).unwrap();
    assert_eq!(series.sources.len(), matched.len());
}

// =============================================================================
// Driver Tests
// =============================================================================

#[tokio::test]
async fn test_driver_plays_and_saves_on_shutdown() {
    let rig = rig(
        request_for("beta"),
        vec![candidate("alpha", "Night Train", 4), candidate("beta", "Night Train", 4)],
    );
    let mut state = rig.driver.session().subscribe_state();
    let mut driver = rig.driver;
    let handle = tokio::spawn(async move {
        let outcome = driver.run().await;
        (outcome, driver.into_session())
    });

    state.wait_for(|s| *s == SessionState::Playing).await.unwrap();
    rig.stage.lock().unwrap().current_time = 64.8;
    rig.events.send(PlayerEvent::CanPlay).unwrap();
    rig.commands.send(SessionCommand::Shutdown).await.unwrap();

    let (outcome, session) = handle.await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(session.state(), SessionState::Destroyed);

    let records = rig.store.play_records().await.unwrap();
    assert_eq!(records["beta+1"].play_time, 64);
    assert_eq!(records["beta+1"].total_time, 1500);
    assert_eq!(rig.stage.lock().unwrap().alive, 0);
}

#[tokio::test(start_paused = true)]
async fn test_driver_auto_advances_after_delay() {
    let rig = rig(request_for("alpha"), vec![candidate("alpha", "Night Train", 3)]);
    let mut state = rig.driver.session().subscribe_state();
    let mut driver = rig.driver;
    let handle = tokio::spawn(async move {
        let outcome = driver.run().await;
        (outcome, driver.into_session())
    });

    state.wait_for(|s| *s == SessionState::Playing).await.unwrap();
    rig.events.send(PlayerEvent::Ended).unwrap();

    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if rig.stage.lock().unwrap().urls.len() > 1 {
            break;
        }
    }
    rig.commands.send(SessionCommand::Shutdown).await.unwrap();

    let (outcome, session) = handle.await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(session.episode_index(), 1);
    assert_eq!(
        rig.stage.lock().unwrap().urls,
        vec![
            "https://alpha.example.com/ep1/index.m3u8",
            "https://alpha.example.com/ep2/index.m3u8"
        ]
    );
}

#[tokio::test]
async fn test_driver_keeps_playing_after_rejected_command() {
    let rig = rig(request_for("alpha"), vec![candidate("alpha", "Night Train", 2)]);
    let mut state = rig.driver.session().subscribe_state();
    let mut driver = rig.driver;
    let handle = tokio::spawn(async move {
        let outcome = driver.run().await;
        (outcome, driver.into_session())
    });

    state.wait_for(|s| *s == SessionState::Playing).await.unwrap();
    rig.commands
        .send(SessionCommand::ChangeSource {
            source: "nowhere".to_string(),
            id: "1".to_string(),
        })
        .await
        .unwrap();
    rig.commands.send(SessionCommand::ChangeEpisode(7)).await.unwrap();
    rig.commands.send(SessionCommand::Shutdown).await.unwrap();

    let (outcome, session) = handle.await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(session.active_source().unwrap().source, "alpha");
    assert!(session.source_error().is_some());
    assert_eq!(session.episode_index(), 0);
}

#[tokio::test]
async fn test_driver_surfaces_terminal_errors() {
    let request = PlayRequest {
        title: Some("Nothing Here".to_string()),
        ..Default::default()
    };
    let mut rig = rig(request, vec![candidate("alpha", "Night Train", 2)]);

    let outcome = rig.driver.run().await;
    assert!(matches!(outcome, Err(Error::NoResultsFound)));

    let session = rig.driver.into_session();
    assert_eq!(session.state(), SessionState::Destroyed);
    assert_eq!(session.error(), Some("No results found"));
    assert_eq!(rig.stage.lock().unwrap().created, 0);
}
