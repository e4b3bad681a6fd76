//! Core types for Reelplay

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a candidate: (source, content id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub source: String,
    pub id: String,
}

impl SourceKey {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }

    /// Key under which play records and favorites are persisted
    pub fn storage_key(&self) -> String {
        format!("{}+{}", self.source, self.id)
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source, self.id)
    }
}

impl Serialize for SourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A provider's entry for one title, as returned by search or detail lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSource {
    /// Provider identifier
    pub source: String,
    /// Content identifier within the provider
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default, rename = "class", alias = "type_name")]
    pub category: Option<String>,
    /// Playable URLs, one per episode
    #[serde(default)]
    pub episodes: Vec<String>,
    #[serde(default, rename = "desc")]
    pub description: Option<String>,
    #[serde(default, rename = "poster")]
    pub poster_url: String,
}

impl CandidateSource {
    pub fn key(&self) -> SourceKey {
        SourceKey::new(self.source.clone(), self.id.clone())
    }

    pub fn total_episodes(&self) -> usize {
        self.episodes.len()
    }

    pub fn episode_url(&self, index: usize) -> Option<&str> {
        self.episodes.get(index).map(String::as_str)
    }
}

/// Movie vs. series, derived from the episode count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Tv,
}

impl ContentKind {
    /// One episode is a movie, more than one is a series, none is neither
    pub fn from_episode_count(count: usize) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(ContentKind::Movie),
            _ => Some(ContentKind::Tv),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "movie" => Some(ContentKind::Movie),
            "tv" => Some(ContentKind::Tv),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Movie => write!(f, "movie"),
            ContentKind::Tv => write!(f, "tv"),
        }
    }
}

/// Parameters a playback session is opened with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayRequest {
    /// Forced provider, paired with `id`
    pub source: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    /// Query used for searching when it differs from the display title
    pub search_title: Option<String>,
    pub search_kind: Option<ContentKind>,
    /// Re-rank sources even though a pair was given
    pub prefer: bool,
}

impl PlayRequest {
    /// Returns the forced (source, id) pair when both are present
    pub fn forced_pair(&self) -> Option<SourceKey> {
        match (non_empty(&self.source), non_empty(&self.id)) {
            (Some(source), Some(id)) => Some(SourceKey::new(source, id)),
            _ => None,
        }
    }

    /// Query sent to the search collaborator
    pub fn search_query(&self) -> Option<&str> {
        non_empty(&self.search_title).or_else(|| non_empty(&self.title))
    }

    pub fn has_identity(&self) -> bool {
        self.forced_pair().is_some() || self.search_query().is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Loading stage shown while a session resolves its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStage {
    Searching,
    Preferring,
    Fetching,
    Ready,
}

/// Playback session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, nothing resolved yet
    Idle,
    /// Fetching candidates
    Resolving,
    /// Ranking candidates
    Probing,
    /// Source chosen, no player yet
    Ready,
    /// Player attached
    Playing,
    /// Switching to another source
    SourceChanging,
    /// Terminal error
    Failed,
    /// Torn down
    Destroyed,
}

impl SessionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Idle, Resolving) |
            (Resolving, Probing) | (Resolving, Ready) | (Resolving, Failed) |
            (Probing, Ready) | (Probing, Failed) |
            (Ready, Playing) | (Ready, Failed) |
            (Playing, SourceChanging) | (Playing, Failed) |
            (SourceChanging, Playing) | (SourceChanging, SourceChanging) | (SourceChanging, Failed) |
            (Idle, Destroyed) | (Resolving, Destroyed) | (Probing, Destroyed) | (Ready, Destroyed) |
            (Playing, Destroyed) | (SourceChanging, Destroyed) | (Failed, Destroyed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Destroyed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Resolving => write!(f, "resolving"),
            SessionState::Probing => write!(f, "probing"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::SourceChanging => write!(f, "source_changing"),
            SessionState::Failed => write!(f, "failed"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// One-shot seek target applied when the player can start playback
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResumePosition(Option<f64>);

impl ResumePosition {
    /// Arm with a position; non-positive positions leave it disarmed
    pub fn arm(&mut self, seconds: f64) {
        self.0 = (seconds > 0.0).then_some(seconds);
    }

    pub fn disarm(&mut self) {
        self.0 = None;
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }

    pub fn peek(&self) -> Option<f64> {
        self.0
    }

    /// Consume the armed value
    pub fn take(&mut self) -> Option<f64> {
        self.0.take()
    }
}

/// Where to seek for a resume position given the stream duration.
///
/// Positions within 2s of the end would look finished, so they back off to
/// 5s before the end.
pub fn resume_target(position: f64, duration: f64) -> f64 {
    if duration > 0.0 && position >= duration - 2.0 {
        (duration - 5.0).max(0.0)
    } else {
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_key_formats() {
        let key = SourceKey::new("alpha", "42");
        assert_eq!(key.to_string(), "alpha-42");
        assert_eq!(key.storage_key(), "alpha+42");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"alpha-42\"");
    }

    #[test]
    fn test_candidate_wire_shape() {
        let json = r#"{
            "id": "42", "title": "Show", "poster": "p.jpg",
            "episodes": ["a.m3u8", "b.m3u8"], "source": "alpha",
            "source_name": "Alpha", "class": "Drama", "year": "2021", "desc": "d"
        }"#;
        let candidate: CandidateSource = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.key(), SourceKey::new("alpha", "42"));
        assert_eq!(candidate.category.as_deref(), Some("Drama"));
        assert_eq!(candidate.poster_url, "p.jpg");
        assert_eq!(candidate.episode_url(1), Some("b.m3u8"));
        assert_eq!(candidate.episode_url(2), None);
    }

    #[test]
    fn test_content_kind_from_episodes() {
        assert_eq!(ContentKind::from_episode_count(0), None);
        assert_eq!(ContentKind::from_episode_count(1), Some(ContentKind::Movie));
        assert_eq!(ContentKind::from_episode_count(12), Some(ContentKind::Tv));
        assert_eq!(ContentKind::parse(" TV "), Some(ContentKind::Tv));
    }

    #[test]
    fn test_play_request_identity() {
        let empty = PlayRequest::default();
        assert!(!empty.has_identity());

        let pair_only = PlayRequest {
            source: Some("alpha".into()),
            id: Some("1".into()),
            ..Default::default()
        };
        assert!(pair_only.has_identity());
        assert_eq!(pair_only.forced_pair(), Some(SourceKey::new("alpha", "1")));

        let half_pair = PlayRequest {
            source: Some("alpha".into()),
            id: Some("  ".into()),
            ..Default::default()
        };
        assert!(!half_pair.has_identity());

        let titled = PlayRequest {
            title: Some("Show".into()),
            search_title: Some("Show Search".into()),
            ..Default::default()
        };
        assert_eq!(titled.search_query(), Some("Show Search"));
    }

    #[test]
    fn test_session_transitions() {
        assert!(SessionState::Idle.can_transition_to(SessionState::Resolving));
        assert!(SessionState::Resolving.can_transition_to(SessionState::Probing));
        assert!(SessionState::Playing.can_transition_to(SessionState::SourceChanging));
        assert!(SessionState::SourceChanging.can_transition_to(SessionState::Playing));
        assert!(!SessionState::Idle.can_transition_to(SessionState::Playing));
        assert!(!SessionState::Destroyed.can_transition_to(SessionState::Playing));
    }

    #[test]
    fn test_resume_position_is_one_shot() {
        let mut resume = ResumePosition::default();
        resume.arm(0.0);
        assert!(!resume.is_armed());

        resume.arm(42.5);
        assert_eq!(resume.take(), Some(42.5));
        assert_eq!(resume.take(), None);
    }

    #[test]
    fn test_resume_target_near_end() {
        assert_eq!(resume_target(30.0, 120.0), 30.0);
        assert_eq!(resume_target(119.0, 120.0), 115.0);
        assert_eq!(resume_target(3.5, 4.0), 0.0);
        assert_eq!(resume_target(30.0, 0.0), 30.0);
    }
}
