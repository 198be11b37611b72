//! Reader-path tests: cached reads, store backfill below the validity
//! window, and the merge between the two.

use change_cache::cache::channel_cache::{ChangesOptions, ChannelCache};
use change_cache::cache::entry::ChannelMap;
use change_cache::cache::ChannelCacheOptions;
use change_cache::feed::sync_meta::SyncData;
use change_cache::store::Document;
use change_cache::{InMemoryBackingStore, LogEntry, SequenceId, SimulatedClock};
use std::sync::Arc;

fn store_doc(seq: u64, doc_id: &str, channels: &[&str]) -> Document {
    let mut channel_map = ChannelMap::default();
    for &name in channels {
        channel_map.insert(name.to_string(), None);
    }
    Document {
        id: doc_id.to_string(),
        sync: SyncData {
            sequence: seq,
            current_rev: format!("1-{}", seq),
            channels: channel_map,
            ..Default::default()
        },
    }
}

fn cached_entry(seq: u64) -> Arc<LogEntry> {
    Arc::new(LogEntry {
        sequence: seq,
        doc_id: format!("doc{}", seq),
        rev_id: format!("1-{}", seq),
        ..Default::default()
    })
}

fn cache_with_store(valid_from: u64, store: Arc<InMemoryBackingStore>) -> ChannelCache {
    ChannelCache::new(
        "A",
        valid_from,
        store,
        Arc::new(SimulatedClock::new(0)),
        ChannelCacheOptions::test(),
    )
}

#[tokio::test]
async fn test_backfill_below_valid_from() {
    let store = Arc::new(InMemoryBackingStore::new());
    // sequences 1-3 predate the cache; they only exist in the store
    for seq in 1..=3 {
        store.put_document(store_doc(seq, &format!("doc{}", seq), &["A"]));
    }

    let cache = cache_with_store(4, store);
    cache.add_to_cache(&cached_entry(4), None);
    cache.add_to_cache(&cached_entry(5), None);

    let entries = cache.get_changes(&ChangesOptions::since(0)).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_backfill_respects_since() {
    let store = Arc::new(InMemoryBackingStore::new());
    for seq in 1..=3 {
        store.put_document(store_doc(seq, &format!("doc{}", seq), &["A"]));
    }

    let cache = cache_with_store(4, store);
    cache.add_to_cache(&cached_entry(4), None);

    let entries = cache.get_changes(&ChangesOptions::since(2)).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![3, 4]);
}

#[tokio::test]
async fn test_backfill_dedups_late_cached_entries() {
    let store = Arc::new(InMemoryBackingStore::new());
    for seq in 1..=3 {
        store.put_document(store_doc(seq, &format!("doc{}", seq), &["A"]));
    }

    // sequence 2 arrived late, so it is cached even though it sits below
    // the validity bound
    let cache = cache_with_store(4, store);
    cache.add_late_to_cache(&cached_entry(2), None);
    cache.add_to_cache(&cached_entry(4), None);

    let entries = cache.get_changes(&ChangesOptions::since(0)).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4], "no duplicate for sequence 2");
}

#[tokio::test]
async fn test_limit_applies_across_backfill_and_cache() {
    let store = Arc::new(InMemoryBackingStore::new());
    for seq in 1..=3 {
        store.put_document(store_doc(seq, &format!("doc{}", seq), &["A"]));
    }

    let cache = cache_with_store(4, store);
    cache.add_to_cache(&cached_entry(4), None);
    cache.add_to_cache(&cached_entry(5), None);

    let entries = cache
        .get_changes(&ChangesOptions {
            since: SequenceId::new(0),
            limit: 4,
        })
        .await
        .unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_no_store_query_when_cache_covers_request() {
    let store = Arc::new(InMemoryBackingStore::new());
    store.fail_sequence_queries(true); // does not affect channel queries
    let cache = cache_with_store(1, store);
    for seq in 1..=3 {
        cache.add_to_cache(&cached_entry(seq), None);
    }

    let entries = cache.get_changes(&ChangesOptions::since(1)).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![2, 3]);
}

#[tokio::test]
async fn test_empty_channel_backfills_entirely_from_store() {
    let store = Arc::new(InMemoryBackingStore::new());
    for seq in 1..=2 {
        store.put_document(store_doc(seq, &format!("doc{}", seq), &["A"]));
    }

    let cache = cache_with_store(3, store);
    let entries = cache.get_changes(&ChangesOptions::since(0)).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![1, 2]);
}

#[tokio::test]
async fn test_resume_with_low_seq_re_reads_from_low_bound() {
    let cache = cache_with_store(1, Arc::new(InMemoryBackingStore::new()));
    for seq in 1..=5 {
        cache.add_to_cache(&cached_entry(seq), None);
    }

    // "2::4": the client saw up to 4, but 3 was still in flight at the time
    let since: SequenceId = "2::4".parse().unwrap();
    let entries = cache
        .get_changes(&ChangesOptions { since, limit: 0 })
        .await
        .unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![3, 4, 5], "resume starts after the low bound");
}
