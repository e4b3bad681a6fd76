//! CLI command implementations

use crate::output::{format_json, format_rows, OutputFormat};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reelplay_core::{
    aggregate, filter_manifest,
    scorer::{ping_score, quality_score, score as total_score, speed_score},
    CandidateSource, CatalogApi, ContentKind, Error, HttpCatalogApi, HttpProbe, LoadSpeed,
    MatchCriteria, ProbeOutcome, ProbeResult, Quality, SessionConfig, SourceKey, SourceProber,
    SourceSelector,
};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tracing::{debug, info};
use url::Url;

#[derive(Serialize, Tabled)]
struct ResultRow {
    source: String,
    id: String,
    title: String,
    year: String,
    episodes: usize,
}

#[derive(Serialize, Tabled)]
struct GroupRow {
    title: String,
    year: String,
    kind: String,
    sources: usize,
    providers: String,
}

#[derive(Serialize, Tabled)]
struct RankRow {
    rank: usize,
    source: String,
    name: String,
    score: f64,
    quality: String,
    speed: String,
    ping_ms: u32,
}

#[derive(Serialize, Tabled)]
struct FailureRow {
    source: String,
    reason: String,
}

#[derive(Serialize)]
struct ProbeReport {
    best: SourceKey,
    ranking: Vec<RankRow>,
    failures: Vec<FailureRow>,
}

#[derive(Serialize, Tabled)]
struct ScoreRow {
    quality: f64,
    speed: f64,
    ping: f64,
    total: f64,
}

fn parse_kind(kind: Option<String>) -> anyhow::Result<Option<ContentKind>> {
    match kind {
        None => Ok(None),
        Some(value) => ContentKind::parse(&value)
            .map(Some)
            .with_context(|| format!("unknown kind '{}', expected movie or tv", value)),
    }
}

fn spinner(message: String) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(ProgressStyle::with_template("{spinner:.blue} {msg}")?);
    pb.set_message(message);
    Ok(pb)
}

/// Search all sources
pub async fn search(
    api: &Url,
    config: &SessionConfig,
    query: &str,
    year: Option<String>,
    kind: Option<String>,
    all: bool,
    format: &str,
) -> anyhow::Result<()> {
    let criteria = MatchCriteria::any_title()
        .with_year(year)
        .with_kind(parse_kind(kind)?);
    let catalog = HttpCatalogApi::new(api.clone(), config.request_timeout())?;

    let results = catalog.search(query).await?;
    let total = results.len();
    let results = criteria.filter(results);
    debug!(total, kept = results.len(), "Search results filtered");

    if results.is_empty() {
        return Err(Error::NoResultsFound.into());
    }

    if all {
        let rows: Vec<ResultRow> = results
            .iter()
            .map(|c| ResultRow {
                source: c.source_name.clone(),
                id: c.key().to_string(),
                title: c.title.clone(),
                year: c.year.clone(),
                episodes: c.total_episodes(),
            })
            .collect();
        println!("{}", format_rows(&rows, format));
        return Ok(());
    }

    let rows: Vec<GroupRow> = aggregate(results, query)
        .into_iter()
        .map(|group| GroupRow {
            title: group.title().to_string(),
            year: group.key.year.clone(),
            kind: group.key.kind.to_string(),
            sources: group.sources.len(),
            providers: group
                .sources
                .iter()
                .map(|s| s.source_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    println!("{}", format_rows(&rows, format));
    Ok(())
}

/// Probe and rank every source of a title
pub async fn probe(
    api: &Url,
    config: &SessionConfig,
    title: &str,
    year: Option<String>,
    kind: Option<String>,
    format: &str,
) -> anyhow::Result<()> {
    let criteria = MatchCriteria::new(title)
        .with_year(year)
        .with_kind(parse_kind(kind)?);
    let catalog = HttpCatalogApi::new(api.clone(), config.request_timeout())?;

    let candidates: Vec<CandidateSource> = criteria.filter(catalog.search(title).await?);
    if candidates.is_empty() {
        return Err(Error::NoResultsFound.into());
    }
    info!(candidates = candidates.len(), "Candidates resolved");

    let selector = SourceSelector::new(SourceProber::new(Arc::new(HttpProbe::new(
        config.probe_timeout(),
    )?)));

    let pb = spinner(format!("Probing {} sources...", candidates.len()))?;
    let selection = selector.select_best(&candidates).await?;
    pb.finish_and_clear();

    let ranking: Vec<RankRow> = selection
        .ranking
        .iter()
        .enumerate()
        .map(|(i, ranked)| RankRow {
            rank: i + 1,
            source: ranked.source.key().to_string(),
            name: ranked.source.source_name.clone(),
            score: ranked.score,
            quality: ranked.probe.quality.to_string(),
            speed: ranked.probe.load_speed.to_string(),
            ping_ms: ranked.probe.ping_ms,
        })
        .collect();
    let failures: Vec<FailureRow> = selection
        .probes
        .iter()
        .filter_map(|(key, outcome)| match outcome {
            ProbeOutcome::Failed { reason } => Some(FailureRow {
                source: key.to_string(),
                reason: reason.clone(),
            }),
            ProbeOutcome::Measured(_) => None,
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            let report = ProbeReport {
                best: selection.best.key(),
                ranking,
                failures,
            };
            println!("{}", format_json(&report));
        }
        OutputFormat::Text | OutputFormat::Table => {
            if !ranking.is_empty() {
                println!("{}", format_rows(&ranking, format));
            }
            if !failures.is_empty() {
                println!("\nFailed probes:");
                println!("{}", format_rows(&failures, format));
            }
            println!(
                "\nBest source: {} ({})",
                selection.best.source_name,
                selection.best.key()
            );
        }
    }
    Ok(())
}

/// Print a playlist with discontinuity markers removed
pub fn filter(input: &str) -> anyhow::Result<()> {
    let text = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?
    };

    print!("{}", filter_manifest(&text));
    Ok(())
}

/// Score one probe result against explicit bounds
pub fn score(
    quality: &str,
    speed: &str,
    ping: u32,
    max_speed: f64,
    min_ping: f64,
    max_ping: f64,
    format: &str,
) -> anyhow::Result<()> {
    let probe = ProbeResult {
        quality: Quality::from_label(quality),
        load_speed: LoadSpeed::parse(speed),
        ping_ms: ping,
    };
    debug!(quality = %probe.quality, speed = %probe.load_speed, ping_ms = ping, "Scoring probe");

    let row = ScoreRow {
        quality: quality_score(probe.quality),
        speed: speed_score(&probe, max_speed),
        ping: ping_score(&probe, min_ping, max_ping),
        total: total_score(&probe, max_speed, min_ping, max_ping),
    };
    println!("{}", format_rows(&[row], format));
    Ok(())
}
