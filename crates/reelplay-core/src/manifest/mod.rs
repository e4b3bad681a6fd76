//! Manifest interception for the streaming engine
//!
//! The player's streaming library hands every loaded response to a
//! [`ManifestInterceptor`] before parsing it. Only playlist documents
//! (multivariant manifests and level playlists) are ever rewritten;
//! segment payloads pass through untouched.

mod filter;

pub use filter::{filter_manifest, DiscontinuityFilter, DISCONTINUITY_TAG};

use std::sync::Arc;
use url::Url;

/// Kind of response the streaming engine loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Multivariant or single playlist requested by URL
    Manifest,
    /// Media playlist of one level
    Level,
    /// Media segment payload
    Fragment,
    /// Decryption key
    Key,
}

impl ResponseKind {
    /// Playlist text that may be rewritten
    pub fn is_playlist(&self) -> bool {
        matches!(self, ResponseKind::Manifest | ResponseKind::Level)
    }
}

/// Hook applied to response bodies before the engine parses them
pub trait ManifestInterceptor: Send + Sync {
    fn on_response(&self, kind: ResponseKind, body: String) -> String;

    /// Name for logs
    fn name(&self) -> &'static str;
}

/// Interceptor that leaves every response as loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ManifestInterceptor for PassThrough {
    fn on_response(&self, _kind: ResponseKind, body: String) -> String {
        body
    }

    fn name(&self) -> &'static str {
        "pass-through"
    }
}

/// Interceptor for the current ad-filter setting
pub fn interceptor_for(ad_filter_enabled: bool) -> Arc<dyn ManifestInterceptor> {
    if ad_filter_enabled {
        Arc::new(DiscontinuityFilter)
    } else {
        Arc::new(PassThrough)
    }
}

/// Media types an episode URL can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestType {
    Hls,
    /// Progressive file (mp4, mkv, ...), nothing to intercept
    Progressive,
}

/// Detect the media type from URL or content
pub fn detect_manifest_type(url: &Url, content: Option<&str>) -> ManifestType {
    let path = url.path().to_lowercase();
    if path.ends_with(".m3u8") || path.ends_with(".m3u") {
        return ManifestType::Hls;
    }
    if [".mp4", ".mkv", ".webm", ".flv", ".mov"]
        .iter()
        .any(|ext| path.ends_with(ext))
    {
        return ManifestType::Progressive;
    }

    if let Some(content) = content {
        if content.trim_start().starts_with("#EXTM3U") {
            return ManifestType::Hls;
        }
        return ManifestType::Progressive;
    }

    // Providers commonly serve playlists from extension-less paths
    ManifestType::Hls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_hls() {
        let url = Url::parse("https://example.com/vod/index.m3u8").unwrap();
        assert_eq!(detect_manifest_type(&url, None), ManifestType::Hls);
    }

    #[test]
    fn test_detect_progressive() {
        let url = Url::parse("https://example.com/movie.MP4").unwrap();
        assert_eq!(detect_manifest_type(&url, None), ManifestType::Progressive);

        let bare = Url::parse("https://example.com/play?id=1").unwrap();
        assert_eq!(detect_manifest_type(&bare, Some("\u{0}\u{0}ftyp")), ManifestType::Progressive);
        assert_eq!(detect_manifest_type(&bare, Some("#EXTM3U\n")), ManifestType::Hls);
    }

    #[test]
    fn test_interceptor_only_rewrites_playlists() {
        let body = "#EXTM3U\n#EXT-X-DISCONTINUITY\nseg.ts".to_string();
        let filter = interceptor_for(true);
        assert_eq!(filter.on_response(ResponseKind::Level, body.clone()), "#EXTM3U\nseg.ts");
        assert_eq!(filter.on_response(ResponseKind::Fragment, body.clone()), body);

        let passthrough = interceptor_for(false);
        assert_eq!(passthrough.on_response(ResponseKind::Manifest, body.clone()), body);
        assert_eq!(passthrough.name(), "pass-through");
    }
}
