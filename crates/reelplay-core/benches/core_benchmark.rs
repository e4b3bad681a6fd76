//! Benchmark tests for reelplay-core operations
//!
//! Run with: cargo bench -p reelplay-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use reelplay_core::catalog::{aggregate, normalize_title};
use reelplay_core::manifest::filter_manifest;
use reelplay_core::probe::{LoadSpeed, ProbeResult, Quality};
use reelplay_core::scorer::ScoreBounds;
use reelplay_core::types::CandidateSource;

// ============================================================================
// Helpers
// ============================================================================

fn create_playlist(segments: usize) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n");
    for i in 0..segments {
        if i % 10 == 0 {
            playlist.push_str("#EXT-X-DISCONTINUITY\n");
        }
        playlist.push_str(&format!("#EXTINF:6.0,\nhttps://cdn.example.com/seg{}.ts\n", i));
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    playlist
}

fn create_probes(count: usize) -> Vec<ProbeResult> {
    let qualities = [Quality::Uhd4K, Quality::Fhd1080p, Quality::Hd720p, Quality::Sd480p];
    (0..count)
        .map(|i| ProbeResult {
            quality: qualities[i % qualities.len()],
            load_speed: LoadSpeed::parse(&format!("{}.{} MB/s", i % 5, i % 10)),
            ping_ms: 40 + (i as u32 * 37) % 900,
        })
        .collect()
}

fn create_results(count: usize) -> Vec<CandidateSource> {
    (0..count)
        .map(|i| CandidateSource {
            source: format!("source{}", i),
            id: i.to_string(),
            title: format!("Title {}", i % 20),
            year: (2000 + i % 25).to_string(),
            source_name: format!("Source {}", i),
            category: None,
            episodes: vec!["https://cdn.example.com/index.m3u8".to_string(); 1 + i % 3],
            description: None,
            poster_url: String::new(),
        })
        .collect()
}

// ============================================================================
// Manifest Benchmarks
// ============================================================================

fn bench_filter_manifest(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_manifest");

    for segments in [100, 1000, 10000] {
        let playlist = create_playlist(segments);
        group.bench_with_input(BenchmarkId::from_parameter(segments), &playlist, |b, playlist| {
            b.iter(|| filter_manifest(black_box(playlist)))
        });
    }

    group.finish();
}

// ============================================================================
// Scoring Benchmarks
// ============================================================================

fn bench_score_sources(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_sources");

    for count in [4, 16, 64] {
        let probes = create_probes(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &probes, |b, probes| {
            b.iter(|| {
                let bounds = ScoreBounds::from_probes(probes.iter());
                probes.iter().map(|p| bounds.score(black_box(p))).sum::<f64>()
            })
        });
    }

    group.finish();
}

fn bench_parse_speed(c: &mut Criterion) {
    c.bench_function("parse_speed", |b| {
        b.iter(|| LoadSpeed::parse(black_box("12.5 MB/s")))
    });
}

// ============================================================================
// Catalog Benchmarks
// ============================================================================

fn bench_aggregate(c: &mut Criterion) {
    let results = create_results(200);
    c.bench_function("aggregate_200", |b| {
        b.iter(|| aggregate(black_box(results.clone()), "Title 1"))
    });

    c.bench_function("normalize_title", |b| {
        b.iter(|| normalize_title(black_box("  The Long   Night Returns ")))
    });
}

criterion_group!(
    benches,
    bench_filter_manifest,
    bench_score_sources,
    bench_parse_speed,
    bench_aggregate,
);
criterion_main!(benches);
