//! Source probing
//!
//! A probe fetches one episode playlist of a candidate and derives:
//! - delivered quality tier (from the variant resolution)
//! - load speed (throughput of the first media segment)
//! - latency (time until the playlist response arrives)
//!
//! [`SourceProber`] owns the policy of which episode to probe and contains
//! every failure as an [`Error::ProbeFailure`]; the measurement itself sits
//! behind the [`VideoProbe`] trait.

use crate::{
    manifest::{detect_manifest_type, ManifestType},
    types::CandidateSource,
    Error, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use m3u8_rs::Playlist;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::space0,
    combinator::{all_consuming, map_res, value},
    IResult, Parser,
};
use reqwest::Client;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Delivered quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Uhd4K,
    Qhd2K,
    Fhd1080p,
    Hd720p,
    Sd480p,
    Sd,
    Unknown,
}

impl Quality {
    /// Tier for a frame width in pixels
    pub fn from_width(width: u64) -> Self {
        match width {
            0 => Quality::Unknown,
            w if w >= 3840 => Quality::Uhd4K,
            w if w >= 2560 => Quality::Qhd2K,
            w if w >= 1920 => Quality::Fhd1080p,
            w if w >= 1280 => Quality::Hd720p,
            w if w >= 854 => Quality::Sd480p,
            _ => Quality::Sd,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "4K" => Quality::Uhd4K,
            "2K" => Quality::Qhd2K,
            "1080p" => Quality::Fhd1080p,
            "720p" => Quality::Hd720p,
            "480p" => Quality::Sd480p,
            "SD" => Quality::Sd,
            _ => Quality::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::Uhd4K => "4K",
            Quality::Qhd2K => "2K",
            Quality::Fhd1080p => "1080p",
            Quality::Hd720p => "720p",
            Quality::Sd480p => "480p",
            Quality::Sd => "SD",
            Quality::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Unit of a measured load speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedUnit {
    KBps,
    MBps,
}

impl SpeedUnit {
    pub fn label(&self) -> &'static str {
        match self {
            SpeedUnit::KBps => "KB/s",
            SpeedUnit::MBps => "MB/s",
        }
    }
}

/// Load speed of a probe, typed at the prober boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadSpeed {
    Measured { value: f64, unit: SpeedUnit },
    /// Measurement still running
    Measuring,
    Unknown,
}

impl LoadSpeed {
    /// Parse the `"<value> <unit>"` text form; anything else is `Unknown`
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "measuring" => LoadSpeed::Measuring,
            trimmed => match speed_text(trimmed) {
                Ok((_, (value, unit))) => LoadSpeed::Measured { value, unit },
                Err(_) => LoadSpeed::Unknown,
            },
        }
    }

    /// Speed from a download of `bytes` taking `elapsed`
    pub fn from_throughput(bytes: usize, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        if bytes == 0 || secs <= 0.0 {
            return LoadSpeed::Unknown;
        }
        let kbps = bytes as f64 / 1024.0 / secs;
        if kbps >= 1024.0 {
            LoadSpeed::Measured {
                value: round_one_decimal(kbps / 1024.0),
                unit: SpeedUnit::MBps,
            }
        } else {
            LoadSpeed::Measured {
                value: round_one_decimal(kbps),
                unit: SpeedUnit::KBps,
            }
        }
    }

    /// Speed normalized to KB/s, if measured
    pub fn kbps(&self) -> Option<f64> {
        match self {
            LoadSpeed::Measured { value, unit: SpeedUnit::KBps } => Some(*value),
            LoadSpeed::Measured { value, unit: SpeedUnit::MBps } => Some(value * 1024.0),
            LoadSpeed::Measuring | LoadSpeed::Unknown => None,
        }
    }
}

impl std::fmt::Display for LoadSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadSpeed::Measured { value, unit } => write!(f, "{:.1} {}", value, unit.label()),
            LoadSpeed::Measuring => write!(f, "measuring"),
            LoadSpeed::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for LoadSpeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn speed_text(input: &str) -> IResult<&str, (f64, SpeedUnit)> {
    let number = map_res(
        take_while1(|c: char| c.is_ascii_digit() || c == '.'),
        str::parse::<f64>,
    );
    let unit = alt((
        value(SpeedUnit::KBps, tag("KB/s")),
        value(SpeedUnit::MBps, tag("MB/s")),
    ));
    all_consuming((number, space0, unit))
        .map(|(value, _, unit)| (value, unit))
        .parse(input)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Measured metrics of one source
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeResult {
    pub quality: Quality,
    pub load_speed: LoadSpeed,
    /// Playlist latency; 0 means no valid measurement
    pub ping_ms: u32,
}

impl ProbeResult {
    pub fn has_valid_ping(&self) -> bool {
        self.ping_ms > 0
    }
}

/// Measurement utility for one playable URL
#[async_trait]
pub trait VideoProbe: Send + Sync {
    async fn measure(&self, url: &str) -> Result<ProbeResult>;
}

/// Applies the probe-target policy and contains failures
#[derive(Clone)]
pub struct SourceProber {
    probe: Arc<dyn VideoProbe>,
}

impl SourceProber {
    pub fn new(probe: Arc<dyn VideoProbe>) -> Self {
        Self { probe }
    }

    /// URL to probe: the second episode when there are two or more, since
    /// openings are often short or truncated
    pub fn probe_target(source: &CandidateSource) -> Option<&str> {
        source
            .episode_url(1)
            .or_else(|| source.episode_url(0))
    }

    /// Probe one candidate
    #[instrument(skip(self, source), fields(source = %source.key()))]
    pub async fn probe(&self, source: &CandidateSource) -> Result<ProbeResult> {
        let Some(url) = Self::probe_target(source) else {
            warn!(source_name = %source.source_name, "Source has no playable episode");
            return Err(Error::probe(&source.source_name, "no playable episode url"));
        };

        match self.probe.measure(url).await {
            Ok(result) => {
                debug!(
                    quality = %result.quality,
                    speed = %result.load_speed,
                    ping_ms = result.ping_ms,
                    "Probe finished"
                );
                Ok(result)
            }
            Err(Error::ProbeFailure { reason, .. }) => Err(Error::probe(&source.source_name, reason)),
            Err(e) => Err(Error::probe(&source.source_name, e.to_string())),
        }
    }
}

/// HTTP measurement of an HLS episode
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }

    /// Quality and media playlist for a playlist that may be multivariant
    async fn resolve_media_playlist(&self, url: &Url, body: String) -> Result<(Quality, Url, String)> {
        let playlist = m3u8_rs::parse_playlist_res(body.as_bytes())
            .map_err(|e| Error::ManifestParse(format!("{:?}", e)))?;

        match playlist {
            Playlist::MasterPlaylist(master) => {
                let variant = master
                    .variants
                    .iter()
                    .filter(|v| !v.is_i_frame)
                    .max_by_key(|v| v.bandwidth)
                    .ok_or_else(|| Error::probe(url.as_str(), "multivariant playlist has no variants"))?;

                let quality = variant
                    .resolution
                    .map(|r| Quality::from_width(r.width))
                    .unwrap_or(Quality::Unknown);

                let media_url = url
                    .join(&variant.uri)
                    .map_err(|e| Error::probe(url.as_str(), e.to_string()))?;
                let media_body = self.fetch_text(&media_url).await?;
                Ok((quality, media_url, media_body))
            }
            Playlist::MediaPlaylist(_) => Ok((Quality::Unknown, url.clone(), body)),
        }
    }
}

#[async_trait]
impl VideoProbe for HttpProbe {
    #[instrument(skip(self))]
    async fn measure(&self, url: &str) -> Result<ProbeResult> {
        let url = Url::parse(url).map_err(|e| Error::probe(url, e.to_string()))?;

        let started = Instant::now();
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let ping = started.elapsed();
        let body = response.text().await?;

        if detect_manifest_type(&url, Some(&body)) != ManifestType::Hls {
            return Err(Error::probe(url.as_str(), "not an HLS playlist"));
        }

        let (quality, media_url, media_body) = self.resolve_media_playlist(&url, body).await?;

        let media = m3u8_rs::parse_media_playlist_res(media_body.as_bytes())
            .map_err(|e| Error::ManifestParse(format!("{:?}", e)))?;
        let segment = media
            .segments
            .first()
            .ok_or_else(|| Error::probe(media_url.as_str(), "media playlist has no segments"))?;
        let segment_url = media_url
            .join(&segment.uri)
            .map_err(|e| Error::probe(media_url.as_str(), e.to_string()))?;

        let started = Instant::now();
        let data = self.fetch_bytes(&segment_url).await?;
        let load_speed = LoadSpeed::from_throughput(data.len(), started.elapsed());

        debug!(
            segment = %segment_url,
            bytes = data.len(),
            ping_ms = ping.as_millis(),
            "Segment measured"
        );

        Ok(ProbeResult {
            quality,
            load_speed,
            ping_ms: u32::try_from(ping.as_millis()).unwrap_or(u32::MAX),
        })
    }
}
