//! Ingest hot-path benchmarks.
//!
//! Run with: `cargo bench --bench sequence_buffering`
//!
//! Measures the sequence state machine under in-order and out-of-order
//! feeds, and the sequence-id codec used on every changes-feed response.

use change_cache::cache::entry::{ChannelMap, LogEntry};
use change_cache::{CacheOptions, ChangeCache, InMemoryBackingStore, SequenceId, SystemClock};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

fn new_cache() -> ChangeCache {
    ChangeCache::new(
        0,
        CacheOptions::default(),
        Arc::new(InMemoryBackingStore::new()),
        Arc::new(SystemClock::new()),
    )
}

fn entry(sequence: u64) -> LogEntry {
    let mut channels = ChannelMap::default();
    channels.insert("bench".to_string(), None);
    LogEntry {
        sequence,
        doc_id: format!("doc-{}", sequence),
        rev_id: "1-abc".to_string(),
        channels: Some(channels),
        ..Default::default()
    }
}

fn bench_in_order_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_order_ingest");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("1000_contiguous", |b| {
        b.iter_with_setup(new_cache, |cache| {
            for seq in 1..=1000 {
                cache.process_entry(black_box(entry(seq)));
            }
            cache
        })
    });

    group.finish();
}

fn bench_out_of_order_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("out_of_order_ingest");
    group.throughput(Throughput::Elements(1000));

    // every even sequence arrives before its odd predecessor
    group.bench_function("1000_pairwise_swapped", |b| {
        b.iter_with_setup(new_cache, |cache| {
            for pair in 0..500u64 {
                cache.process_entry(black_box(entry(pair * 2 + 2)));
                cache.process_entry(black_box(entry(pair * 2 + 1)));
            }
            cache
        })
    });

    group.finish();
}

fn bench_sequence_id_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_id");

    group.bench_function("format_compound", |b| {
        let id = SequenceId {
            seq: 18446744073709551615,
            triggered_by: 1234567,
            low_seq: 999999,
        };
        b.iter(|| black_box(id).to_string())
    });

    group.bench_function("parse_compound", |b| {
        b.iter(|| black_box("999999:1234567:18446744073709551615").parse::<SequenceId>())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_in_order_ingest,
    bench_out_of_order_ingest,
    bench_sequence_id_codec
);
criterion_main!(benches);
