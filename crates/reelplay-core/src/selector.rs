//! Source selection
//!
//! Probes every candidate in two sequential batches (members of a batch run
//! concurrently), scores the successful probes and picks the best source.
//! Probing never blocks playback: if every probe fails the first candidate
//! wins unchanged.

use crate::{
    probe::{ProbeResult, SourceProber},
    scorer::ScoreBounds,
    types::{CandidateSource, SourceKey},
    Error, Result,
};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Outcome of probing one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Measured(ProbeResult),
    Failed { reason: String },
}

impl ProbeOutcome {
    pub fn result(&self) -> Option<&ProbeResult> {
        match self {
            ProbeOutcome::Measured(result) => Some(result),
            ProbeOutcome::Failed { .. } => None,
        }
    }
}

/// Probe outcomes keyed by source identity, for display without re-probing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbeCache(HashMap<SourceKey, ProbeOutcome>);

impl ProbeCache {
    pub fn get(&self, key: &SourceKey) -> Option<&ProbeOutcome> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceKey, &ProbeOutcome)> {
        self.0.iter()
    }

    /// Number of successful probes
    pub fn measured(&self) -> usize {
        self.0.values().filter(|o| o.result().is_some()).count()
    }
}

impl FromIterator<(SourceKey, ProbeOutcome)> for ProbeCache {
    fn from_iter<I: IntoIterator<Item = (SourceKey, ProbeOutcome)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A scored candidate
#[derive(Debug, Clone, Serialize)]
pub struct RankedSource {
    pub source: CandidateSource,
    pub probe: ProbeResult,
    pub score: f64,
}

/// Result of a selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub best: CandidateSource,
    /// Successful probes, best first
    pub ranking: Vec<RankedSource>,
    pub probes: ProbeCache,
}

impl Selection {
    fn unprobed(best: CandidateSource) -> Self {
        Self {
            best,
            ranking: Vec::new(),
            probes: ProbeCache::default(),
        }
    }
}

/// Chooses the best source among candidates
#[derive(Clone)]
pub struct SourceSelector {
    prober: SourceProber,
}

impl SourceSelector {
    pub fn new(prober: SourceProber) -> Self {
        Self { prober }
    }

    /// Size of each probe batch: half the candidates, rounded up
    pub fn batch_size(count: usize) -> usize {
        count.div_ceil(2).max(1)
    }

    /// Pick the best source; fails only for an empty candidate list
    #[instrument(skip(self, sources), fields(candidates = sources.len()))]
    pub async fn select_best(&self, sources: &[CandidateSource]) -> Result<Selection> {
        let first = sources.first().ok_or(Error::NoResultsFound)?;
        if sources.len() == 1 {
            return Ok(Selection::unprobed(first.clone()));
        }

        let outcomes = self.probe_all(sources).await;

        let probes: ProbeCache = sources
            .iter()
            .zip(&outcomes)
            .map(|(source, outcome)| {
                let entry = match outcome {
                    Ok(result) => ProbeOutcome::Measured(*result),
                    Err(e) => ProbeOutcome::Failed { reason: e.to_string() },
                };
                (source.key(), entry)
            })
            .collect();

        let successes: Vec<(&CandidateSource, ProbeResult)> = sources
            .iter()
            .zip(&outcomes)
            .filter_map(|(source, outcome)| outcome.as_ref().ok().map(|r| (source, *r)))
            .collect();

        if successes.is_empty() {
            warn!("All source probes failed, falling back to the first source");
            return Ok(Selection {
                best: first.clone(),
                ranking: Vec::new(),
                probes,
            });
        }

        let bounds = ScoreBounds::from_probes(successes.iter().map(|(_, r)| r));
        let mut ranking: Vec<RankedSource> = successes
            .into_iter()
            .map(|(source, probe)| RankedSource {
                source: source.clone(),
                probe,
                score: bounds.score(&probe),
            })
            .collect();
        ranking.sort_by(|a, b| b.score.total_cmp(&a.score));

        for (rank, entry) in ranking.iter().enumerate() {
            debug!(
                rank = rank + 1,
                source = %entry.source.source_name,
                score = entry.score,
                quality = %entry.probe.quality,
                speed = %entry.probe.load_speed,
                ping_ms = entry.probe.ping_ms,
                "Source ranked"
            );
        }

        let best = ranking[0].source.clone();
        info!(source = %best.key(), score = ranking[0].score, "Best source selected");

        Ok(Selection { best, ranking, probes })
    }

    /// Probe in batches; the result is index-aligned with `sources`
    async fn probe_all(&self, sources: &[CandidateSource]) -> Vec<Result<ProbeResult>> {
        let mut outcomes = Vec::with_capacity(sources.len());
        for batch in sources.chunks(Self::batch_size(sources.len())) {
            let results = join_all(batch.iter().map(|source| self.prober.probe(source))).await;
            outcomes.extend(results);
        }
        outcomes
    }
}
