//! Matching worker - drains one ring into one engine.
//!
//! Each worker exclusively owns its ring's consumer side and its engine, so
//! the whole dispatch path is lock-free and share-nothing. Local counters
//! fold into the shared [`Stats`] in large chunks to keep atomics off the
//! hot path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::engine::{MatchingEngine, DONE_FILL};
use crate::message::{MsgType, OrderMsg};
use crate::pool::NIL;
use crate::queue::RingQueue;
use crate::stats::Stats;

/// Messages drained per `pop_batch` call
pub const BATCH_SIZE: usize = 8192;

/// Fold local counters into the shared stats once this many messages have
/// been processed locally
const STATS_FOLD_THRESHOLD: u64 = 50_000;

pub struct MatchingWorker {
    ring: Arc<RingQueue<OrderMsg>>,
    stats: Arc<Stats>,
    done: Arc<AtomicBool>,
    engine: MatchingEngine,
    /// Caller-side synthetic id -> engine handle, for cancel routing.
    /// External bookkeeping only; the engine itself never sees client ids.
    live: FxHashMap<u64, u32>,
}

#[derive(Default)]
struct LocalCounters {
    popped: u64,
    donefill: u64,
    rejected: u64,
    cancels: u64,
}

impl MatchingWorker {
    pub fn new(
        cfg: &Config,
        ring: Arc<RingQueue<OrderMsg>>,
        stats: Arc<Stats>,
        done: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ring,
            stats,
            done,
            engine: MatchingEngine::new(cfg.max_ticks, cfg.max_orders),
            live: FxHashMap::default(),
        }
    }

    /// Pin the current thread to core `index` (modulo the available cores).
    pub fn pin_to_core(index: usize) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if !core_ids.is_empty() {
                core_affinity::set_for_current(core_ids[index % core_ids.len()]);
            }
        }
    }

    /// Drain the ring until the producer raises `done` and the ring reports
    /// empty. On an empty pop, spin-hint and re-check termination.
    pub fn run(&mut self) {
        let mut batch = vec![OrderMsg::default(); BATCH_SIZE];
        let mut local = LocalCounters::default();
        let mut batches = 0u64;

        loop {
            let n = self.ring.pop_batch(&mut batch);
            if n == 0 {
                if self.done.load(Ordering::Acquire) && self.ring.is_empty() {
                    break;
                }
                std::hint::spin_loop();
                continue;
            }
            batches += 1;

            for msg in &batch[..n] {
                local.popped += 1;
                match msg.msg_type {
                    MsgType::Add => {
                        let ret = self.engine.add_limit(&msg.order());
                        if ret == DONE_FILL {
                            local.donefill += 1;
                        } else if ret == NIL {
                            local.rejected += 1;
                        } else {
                            self.live.insert(msg.client_id, ret);
                        }
                    }
                    MsgType::Cancel => {
                        // a missing entry means the order already filled
                        if let Some(handle) = self.live.remove(&(msg.handle_to_cancel as u64)) {
                            if self.engine.cancel(handle) {
                                local.cancels += 1;
                            }
                        }
                    }
                }
            }

            if local.popped >= STATS_FOLD_THRESHOLD {
                self.fold(&mut local);
            }
        }

        self.fold(&mut local);
        self.stats
            .resting
            .fetch_add(self.engine.resting_orders() as u64, Ordering::AcqRel);
        self.stats
            .trades
            .fetch_add(self.engine.total_trades(), Ordering::AcqRel);
        self.stats
            .volume
            .fetch_add(self.engine.total_volume(), Ordering::AcqRel);

        log::info!(
            "worker done: {} batches, {} trades, {} resting",
            batches,
            self.engine.total_trades(),
            self.engine.resting_orders()
        );
    }

    fn fold(&self, local: &mut LocalCounters) {
        self.stats.popped.fetch_add(local.popped, Ordering::AcqRel);
        self.stats.donefill.fetch_add(local.donefill, Ordering::AcqRel);
        self.stats.rejected.fetch_add(local.rejected, Ordering::AcqRel);
        self.stats.cancels.fetch_add(local.cancels, Ordering::AcqRel);
        *local = LocalCounters::default();
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Side;

    fn test_config() -> Config {
        Config {
            max_ticks: 1024,
            max_orders: 4096,
            ring_capacity: 1 << 14,
            workers: 1,
            num_orders: 0,
            span_ticks: 10,
            max_qty: 5,
            cancel_every: 0,
            seed: 1,
        }
    }

    fn drained_worker(msgs: &[OrderMsg]) -> (MatchingWorker, Arc<Stats>) {
        let ring = Arc::new(RingQueue::with_capacity(1 << 14));
        let stats = Arc::new(Stats::new());
        let done = Arc::new(AtomicBool::new(false));

        assert_eq!(ring.push_batch(msgs), msgs.len());
        done.store(true, Ordering::Release);

        let mut worker = MatchingWorker::new(&test_config(), ring, stats.clone(), done);
        worker.run();
        (worker, stats)
    }

    #[test]
    fn test_dispatch_add_and_cross() {
        let (worker, stats) = drained_worker(&[
            OrderMsg::add(1, 100, 5, Side::Buy, 0, 0),
            OrderMsg::add(2, 100, 5, Side::Sell, 0, 0),
        ]);

        assert_eq!(stats.popped.load(Ordering::Acquire), 2);
        assert_eq!(stats.donefill.load(Ordering::Acquire), 1);
        assert_eq!(stats.trades.load(Ordering::Acquire), 1);
        assert_eq!(stats.volume.load(Ordering::Acquire), 5);
        assert_eq!(worker.engine().resting_orders(), 0);
    }

    #[test]
    fn test_dispatch_cancel_by_client_id() {
        let (worker, stats) = drained_worker(&[
            OrderMsg::add(7, 100, 5, Side::Buy, 0, 0),
            OrderMsg::cancel(0, 7),
        ]);

        assert_eq!(stats.cancels.load(Ordering::Acquire), 1);
        assert_eq!(worker.engine().resting_orders(), 0);
        assert_eq!(stats.resting.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_cancel_of_filled_order_is_ignored() {
        let (_, stats) = drained_worker(&[
            OrderMsg::add(1, 100, 5, Side::Sell, 0, 0),
            OrderMsg::add(2, 100, 5, Side::Buy, 0, 0), // fills maker 1
            OrderMsg::cancel(0, 1),
        ]);

        assert_eq!(stats.cancels.load(Ordering::Acquire), 0);
        assert_eq!(stats.donefill.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_rejects_counted() {
        let (_, stats) = drained_worker(&[
            OrderMsg::add(1, 5000, 5, Side::Buy, 0, 0), // tick out of range
            OrderMsg::add(2, 100, 0, Side::Buy, 0, 0),  // zero qty
        ]);

        assert_eq!(stats.rejected.load(Ordering::Acquire), 2);
    }

    #[test]
    fn test_resting_folded_at_exit() {
        let (_, stats) = drained_worker(&[
            OrderMsg::add(1, 100, 5, Side::Buy, 0, 0),
            OrderMsg::add(2, 90, 5, Side::Buy, 0, 0),
        ]);

        assert_eq!(stats.resting.load(Ordering::Acquire), 2);
    }
}
