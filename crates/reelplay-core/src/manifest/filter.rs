//! Discontinuity-marker filter
//!
//! Spliced-in ads are bracketed by discontinuity tags. Dropping the tags
//! makes the engine treat the playlist as one continuous timeline. Nothing
//! else is touched: segment URIs, durations and other tags stay as loaded.

use super::{ManifestInterceptor, ResponseKind};
use tracing::trace;

/// Marker token; any line containing it is removed
pub const DISCONTINUITY_TAG: &str = "#EXT-X-DISCONTINUITY";

/// Remove every line containing the discontinuity tag.
///
/// Lines are split on `\n` and rejoined with `\n`, so `\r\n` input keeps
/// its carriage returns.
pub fn filter_manifest(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    text.split('\n')
        .filter(|line| !line.contains(DISCONTINUITY_TAG))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interceptor applying [`filter_manifest`] to playlist responses
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscontinuityFilter;

impl ManifestInterceptor for DiscontinuityFilter {
    fn on_response(&self, kind: ResponseKind, body: String) -> String {
        if !kind.is_playlist() {
            return body;
        }
        let filtered = filter_manifest(&body);
        trace!(
            kind = ?kind,
            removed_bytes = body.len() - filtered.len(),
            "Filtered playlist"
        );
        filtered
    }

    fn name(&self) -> &'static str {
        "discontinuity-filter"
    }
}
