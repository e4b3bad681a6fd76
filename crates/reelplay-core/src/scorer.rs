//! Source scoring
//!
//! Weighted heuristic over probe results:
//! - quality: 40%
//! - load speed: 40%, linear against the fastest measured source
//! - latency: 20%, linear between the fastest and slowest ping
//!
//! The constants are part of the ranking contract; changing them reorders
//! sources users have already seen ranked.

use crate::probe::{ProbeResult, Quality};

pub const QUALITY_WEIGHT: f64 = 0.4;
pub const SPEED_WEIGHT: f64 = 0.4;
pub const PING_WEIGHT: f64 = 0.2;

/// Speed sub-score when the speed is unknown or unparseable
pub const UNKNOWN_SPEED_SCORE: f64 = 30.0;

/// Reference values used when no probe produced a valid metric
pub const FALLBACK_MAX_SPEED_KBPS: f64 = 1024.0;
pub const FALLBACK_MIN_PING_MS: f64 = 50.0;
pub const FALLBACK_MAX_PING_MS: f64 = 1000.0;

/// Quality sub-score (0-100)
pub fn quality_score(quality: Quality) -> f64 {
    match quality {
        Quality::Uhd4K => 100.0,
        Quality::Qhd2K => 85.0,
        Quality::Fhd1080p => 75.0,
        Quality::Hd720p => 60.0,
        Quality::Sd480p => 40.0,
        Quality::Sd => 20.0,
        Quality::Unknown => 0.0,
    }
}

/// Speed sub-score (0-100)
pub fn speed_score(probe: &ProbeResult, max_speed_kbps: f64) -> f64 {
    match probe.load_speed.kbps() {
        Some(kbps) => (kbps / max_speed_kbps * 100.0).clamp(0.0, 100.0),
        None => UNKNOWN_SPEED_SCORE,
    }
}

/// Latency sub-score (0-100)
pub fn ping_score(probe: &ProbeResult, min_ping_ms: f64, max_ping_ms: f64) -> f64 {
    if !probe.has_valid_ping() {
        return 0.0;
    }
    if max_ping_ms == min_ping_ms {
        return 100.0;
    }
    let ping = probe.ping_ms as f64;
    ((max_ping_ms - ping) / (max_ping_ms - min_ping_ms) * 100.0).clamp(0.0, 100.0)
}

/// Total score in [0, 100], rounded to two decimals
pub fn score(probe: &ProbeResult, max_speed_kbps: f64, min_ping_ms: f64, max_ping_ms: f64) -> f64 {
    let total = quality_score(probe.quality) * QUALITY_WEIGHT
        + speed_score(probe, max_speed_kbps) * SPEED_WEIGHT
        + ping_score(probe, min_ping_ms, max_ping_ms) * PING_WEIGHT;
    (total * 100.0).round() / 100.0
}

/// Reference values derived from a set of probes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBounds {
    pub max_speed_kbps: f64,
    pub min_ping_ms: f64,
    pub max_ping_ms: f64,
}

impl ScoreBounds {
    /// Bounds over valid metrics only, falling back to fixed references
    pub fn from_probes<'a>(probes: impl IntoIterator<Item = &'a ProbeResult>) -> Self {
        let mut max_speed: Option<f64> = None;
        let mut min_ping: Option<f64> = None;
        let mut max_ping: Option<f64> = None;

        for probe in probes {
            if let Some(kbps) = probe.load_speed.kbps().filter(|s| *s > 0.0) {
                max_speed = Some(max_speed.map_or(kbps, |m| m.max(kbps)));
            }
            if probe.has_valid_ping() {
                let ping = probe.ping_ms as f64;
                min_ping = Some(min_ping.map_or(ping, |m| m.min(ping)));
                max_ping = Some(max_ping.map_or(ping, |m| m.max(ping)));
            }
        }

        Self {
            max_speed_kbps: max_speed.unwrap_or(FALLBACK_MAX_SPEED_KBPS),
            min_ping_ms: min_ping.unwrap_or(FALLBACK_MIN_PING_MS),
            max_ping_ms: max_ping.unwrap_or(FALLBACK_MAX_PING_MS),
        }
    }

    pub fn score(&self, probe: &ProbeResult) -> f64 {
        score(probe, self.max_speed_kbps, self.min_ping_ms, self.max_ping_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::LoadSpeed;

    fn probe(quality: &str, speed: &str, ping_ms: u32) -> ProbeResult {
        ProbeResult {
            quality: Quality::from_label(quality),
            load_speed: LoadSpeed::parse(speed),
            ping_ms,
        }
    }

    #[test]
    fn test_reference_score() {
        let result = probe("1080p", "2.0MB/s", 100);
        assert_eq!(score(&result, 2048.0, 50.0, 1000.0), 88.95);
    }

    #[test]
    fn test_quality_table() {
        let expected = [("4K", 100.0), ("2K", 85.0), ("1080p", 75.0), ("720p", 60.0), ("480p", 40.0), ("SD", 20.0), ("8K", 0.0)];
        for (label, value) in expected {
            assert_eq!(quality_score(Quality::from_label(label)), value, "{}", label);
        }
    }

    #[test]
    fn test_unknown_speed_scores_thirty() {
        assert_eq!(speed_score(&probe("SD", "unknown", 10), 1024.0), 30.0);
        assert_eq!(speed_score(&probe("SD", "measuring", 10), 1024.0), 30.0);
        assert_eq!(speed_score(&probe("SD", "2 GB/s", 10), 1024.0), 30.0);
    }

    #[test]
    fn test_speed_clamped() {
        assert_eq!(speed_score(&probe("SD", "4.0 MB/s", 10), 1024.0), 100.0);
        assert_eq!(speed_score(&probe("SD", "256 KB/s", 10), 1024.0), 25.0);
    }

    #[test]
    fn test_ping_edges() {
        assert_eq!(ping_score(&probe("SD", "1 KB/s", 0), 50.0, 1000.0), 0.0);
        assert_eq!(ping_score(&probe("SD", "1 KB/s", 300), 300.0, 300.0), 100.0);
        assert_eq!(ping_score(&probe("SD", "1 KB/s", 2000), 50.0, 1000.0), 0.0);
        assert_eq!(ping_score(&probe("SD", "1 KB/s", 50), 50.0, 1000.0), 100.0);
    }

    #[test]
    fn test_bounds_ignore_invalid_metrics() {
        let probes = [
            probe("720p", "1.0 MB/s", 120),
            probe("720p", "unknown", 0),
            probe("720p", "300 KB/s", 40),
        ];
        let bounds = ScoreBounds::from_probes(&probes);
        assert_eq!(bounds.max_speed_kbps, 1024.0);
        assert_eq!(bounds.min_ping_ms, 40.0);
        assert_eq!(bounds.max_ping_ms, 120.0);
    }

    #[test]
    fn test_bounds_fallback() {
        let probes = [probe("720p", "unknown", 0)];
        let bounds = ScoreBounds::from_probes(&probes);
        assert_eq!(
            bounds,
            ScoreBounds {
                max_speed_kbps: FALLBACK_MAX_SPEED_KBPS,
                min_ping_ms: FALLBACK_MIN_PING_MS,
                max_ping_ms: FALLBACK_MAX_PING_MS,
            }
        );
    }
}
