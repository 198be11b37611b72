//! The two periodic maintenance tasks.
//!
//! The pending sweeper promotes entries that waited too long for their gap
//! and prunes the channel caches. The skipped sweeper tries to heal expired
//! skipped sequences from the backing store and abandons the rest. Both run
//! until the cache's terminator fires; shutdown joins them.

use crate::cache::change_cache::ChangeCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Sweep at half the configured wait, so nothing lingers for more than
/// 1.5x its bound.
fn sweep_period(max_wait: Duration) -> Duration {
    (max_wait / 2).max(Duration::from_millis(1))
}

pub(crate) fn spawn(cache: &Arc<ChangeCache>) -> Vec<JoinHandle<()>> {
    let pending = tokio::spawn(pending_sweeper(
        Arc::clone(cache),
        sweep_period(cache.options().pending_seq_max_wait),
    ));
    let skipped = tokio::spawn(skipped_sweeper(
        Arc::clone(cache),
        sweep_period(cache.options().skipped_seq_max_wait),
    ));
    vec![pending, skipped]
}

async fn pending_sweeper(cache: Arc<ChangeCache>, period: Duration) {
    let mut terminator = cache.terminator();
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await; // immediate first tick
    loop {
        if *terminator.borrow() {
            break;
        }
        tokio::select! {
            _ = tick.tick() => {
                if !cache.clean_up() {
                    break;
                }
            }
            _ = terminator.changed() => break,
        }
    }
    debug!("pending sweeper exiting");
}

async fn skipped_sweeper(cache: Arc<ChangeCache>, period: Duration) {
    let mut terminator = cache.terminator();
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await;
    loop {
        if *terminator.borrow() {
            break;
        }
        tokio::select! {
            _ = tick.tick() => cache.clean_skipped_sequences().await,
            _ = terminator.changed() => break,
        }
    }
    debug!("skipped sweeper exiting");
}
