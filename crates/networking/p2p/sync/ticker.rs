//! Coordinator and progress ticker.
//!
//! The coordinator owns the buddy lifecycle for the current pivot, the shared
//! coverage tracker, and the node store handle buddies heal into. While at
//! least one buddy is attached, a ticker task periodically samples statistics
//! through an updater and logs them, swallowing repeated identical readouts.
//! The ticker observes healing state but never mutates it.

use std::sync::{Arc, Mutex, MutexGuard};

use cinder_common::types::BlockHeader;
use cinder_trie::NodeStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    peer::{PeerId, SnapPeer},
    snap::constants::{TICKER_INTERVAL, TICKER_LOG_SUPPRESS_MAX},
    sync::{
        ChainSource, SyncError,
        pivot::{PivotEnv, SharedPivot},
        range_tracker::CoverageTracker,
        state_healing::SnapBuddy,
    },
};

/// Streaming mean and standard deviation (Welford update).
#[derive(Debug, Clone, Default)]
pub struct MeanStdDev {
    count: u64,
    mean: f64,
    m2: f64,
}

impl MeanStdDev {
    pub fn update(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stddev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

/// One statistics readout, as logged by the ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerStats {
    /// Block number of the pivot being healed.
    pub pivot_block: u64,
    /// Accounts processed: running mean and standard deviation over readouts.
    pub n_accounts: (f64, f64),
    /// Storage tries queued for healing: mean and standard deviation.
    pub n_storage: (f64, f64),
    /// Processed fraction of the key space: mean, standard deviation, and the
    /// fraction merged into the global coverage tracker across pivots.
    pub accounts_fill: (f64, f64, f64),
    /// Instantaneous processed fraction of the current pivot.
    pub acc_coverage: f64,
    /// Unprocessed range queues of the current pivot.
    pub n_queues: usize,
}

#[derive(Default)]
struct StatAccumulators {
    n_accounts: MeanStdDev,
    n_storage: MeanStdDev,
    accounts_fill: MeanStdDev,
}

/// Periodic statistics logger. Stopped when the last buddy detaches or the
/// handle is dropped.
pub struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawns the ticker task reading readouts from `updater`.
    pub fn start<F>(updater: F) -> Self
    where
        F: Fn() -> TickerStats + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICKER_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<TickerStats> = None;
            let mut suppressed: u32 = 0;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let stats = updater();
                        if last.as_ref() == Some(&stats) && suppressed < TICKER_LOG_SUPPRESS_MAX {
                            suppressed += 1;
                            continue;
                        }
                        suppressed = 0;
                        debug!(
                            pivot = stats.pivot_block,
                            accounts_mean = stats.n_accounts.0,
                            accounts_stddev = stats.n_accounts.1,
                            storage_mean = stats.n_storage.0,
                            fill_mean = stats.accounts_fill.0,
                            fill_merged = stats.accounts_fill.2,
                            coverage = stats.acc_coverage,
                            queues = stats.n_queues,
                            "Healing",
                        );
                        last = Some(stats);
                    }
                }
            }
        });
        Self { cancel, handle }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Owns the healing fleet: the current pivot, the shared coverage tracker and
/// the buddy count that gates the ticker.
pub struct Coordinator {
    store: NodeStore,
    coverage: CoverageTracker,
    pivot: Arc<Mutex<Option<SharedPivot>>>,
    accumulators: Arc<Mutex<StatAccumulators>>,
    buddy_count: usize,
    ticker: Option<Ticker>,
}

impl Coordinator {
    pub fn new(store: NodeStore) -> Self {
        Self {
            store,
            coverage: CoverageTracker::new(),
            pivot: Arc::new(Mutex::new(None)),
            accumulators: Arc::new(Mutex::new(StatAccumulators::default())),
            buddy_count: 0,
            ticker: None,
        }
    }

    pub fn coverage(&self) -> CoverageTracker {
        self.coverage.clone()
    }

    pub fn store(&self) -> NodeStore {
        self.store.clone()
    }

    pub fn current_pivot(&self) -> Option<SharedPivot> {
        lock(&self.pivot).clone()
    }

    pub fn buddy_count(&self) -> usize {
        self.buddy_count
    }

    /// Installs a new pivot. The previous pivot becomes stale; its buddies
    /// observe that at their next tick and terminate.
    pub fn adopt_pivot(&mut self, header: BlockHeader) -> SharedPivot {
        let mut slot = lock(&self.pivot);
        if let Some(old) = slot.take() {
            old.mark_stale();
            debug!("Previous pivot marked stale");
        }
        let pivot = SharedPivot::new(PivotEnv::new(header));
        *slot = Some(pivot.clone());
        pivot
    }

    /// Adopts the canonical chain head as the new pivot.
    pub fn adopt_canonical_pivot(
        &mut self,
        chain: &dyn ChainSource,
    ) -> Result<SharedPivot, SyncError> {
        let head = chain.canonical_head()?;
        Ok(self.adopt_pivot(head))
    }

    /// Binds a peer to the current pivot as a healing buddy. Returns `None`
    /// while no pivot is adopted. The first buddy starts the ticker.
    pub fn attach_buddy(&mut self, peer_id: PeerId, peer: Arc<dyn SnapPeer>) -> Option<SnapBuddy> {
        let pivot = self.current_pivot()?;
        let buddy = SnapBuddy::new(
            peer_id,
            peer,
            pivot,
            self.coverage.clone(),
            self.store.clone(),
        );
        self.buddy_count += 1;
        if self.buddy_count == 1 {
            let pivot_slot = self.pivot.clone();
            let coverage = self.coverage.clone();
            let accumulators = self.accumulators.clone();
            self.ticker = Some(Ticker::start(move || {
                sample(&pivot_slot, &coverage, &accumulators)
            }));
        }
        Some(buddy)
    }

    /// Releases a buddy slot. The last buddy stops the ticker.
    pub fn detach_buddy(&mut self, buddy: SnapBuddy) {
        debug!(peer = %buddy.peer_id(), zombie = buddy.is_zombie(), "Detaching healing buddy");
        self.buddy_count = self.buddy_count.saturating_sub(1);
        if self.buddy_count == 0
            && let Some(ticker) = self.ticker.take()
        {
            ticker.stop();
        }
    }

    /// Takes a statistics readout outside the ticker, e.g. for tests or a
    /// final summary line.
    pub fn sample_stats(&self) -> TickerStats {
        sample(&self.pivot, &self.coverage, &self.accumulators)
    }
}

fn sample(
    pivot: &Arc<Mutex<Option<SharedPivot>>>,
    coverage: &CoverageTracker,
    accumulators: &Arc<Mutex<StatAccumulators>>,
) -> TickerStats {
    let current = lock(pivot).clone();
    let (pivot_block, accounts, storage, fill, n_queues) = match current {
        Some(pivot) => {
            let env = pivot.lock();
            let unprocessed: f64 = env.unprocessed.iter().map(|set| set.full_factor()).sum();
            (
                env.state_header.number,
                env.n_accounts as f64,
                env.fetch_storage.len() as f64,
                (1.0 - unprocessed).clamp(0.0, 1.0),
                env.unprocessed.len(),
            )
        }
        None => (0, 0.0, 0.0, 0.0, 0),
    };

    let mut accumulators = lock(accumulators);
    accumulators.n_accounts.update(accounts);
    accumulators.n_storage.update(storage);
    accumulators.accounts_fill.update(fill);
    TickerStats {
        pivot_block,
        n_accounts: (
            accumulators.n_accounts.mean(),
            accumulators.n_accounts.stddev(),
        ),
        n_storage: (
            accumulators.n_storage.mean(),
            accumulators.n_storage.stddev(),
        ),
        accounts_fill: (
            accumulators.accounts_fill.mean(),
            accumulators.accounts_fill.stddev(),
            coverage.full_factor(),
        ),
        acc_coverage: fill,
        n_queues,
    }
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_stddev_of_constant_samples() {
        let mut acc = MeanStdDev::default();
        for _ in 0..5 {
            acc.update(3.0);
        }
        assert_eq!(acc.mean(), 3.0);
        assert_eq!(acc.stddev(), 0.0);
    }

    #[test]
    fn mean_stddev_of_spread_samples() {
        let mut acc = MeanStdDev::default();
        for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.update(sample);
        }
        assert_eq!(acc.mean(), 5.0);
        assert!((acc.stddev() - 2.0).abs() < 1e-12);
    }
}
