//! Synthetic workload generator - the single producer of the benchmark.
//!
//! Streams randomized ADD and CANCEL messages into the workers' rings,
//! round-robin. Prices cluster around the middle of the tick range, which
//! keeps both sides of each book dense near the touch and produces a steady
//! crossing rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::message::{OrderMsg, Side};
use crate::queue::RingQueue;
use crate::stats::Stats;

/// How many failed pushes to spin through before yielding the CPU
const SPINS_BEFORE_YIELD: u32 = 100;

pub struct OrderGenerator {
    cfg: Config,
    rings: Vec<Arc<RingQueue<OrderMsg>>>,
    done: Arc<AtomicBool>,
    stats: Arc<Stats>,
}

impl OrderGenerator {
    pub fn new(
        cfg: Config,
        rings: Vec<Arc<RingQueue<OrderMsg>>>,
        done: Arc<AtomicBool>,
        stats: Arc<Stats>,
    ) -> Self {
        assert!(!rings.is_empty(), "need at least one ring");
        Self {
            cfg,
            rings,
            done,
            stats,
        }
    }

    /// Produce the configured number of messages, then raise the `done` flag.
    ///
    /// Back-pressure on a full ring is spin-with-hint, then yield; nothing is
    /// ever dropped.
    pub fn run(&self) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.cfg.seed);
        let mid = self.cfg.max_ticks / 2;
        let span = self.cfg.span_ticks as i64;

        // synthetic ids of orders issued to each worker, for cancel targeting
        let mut active: Vec<Vec<u64>> = vec![Vec::new(); self.rings.len()];

        let mut generated = 0u64;
        let mut pushed = 0u64;

        for i in 0..self.cfg.num_orders {
            let worker = (i % self.rings.len() as u64) as usize;

            let cancel_due = self.cfg.cancel_every > 0
                && i > 0
                && i % self.cfg.cancel_every == 0
                && !active[worker].is_empty();

            let msg = if cancel_due {
                let pick = rng.gen_range(0..active[worker].len());
                let target = active[worker].swap_remove(pick);
                OrderMsg::cancel(worker as u32, target as u32)
            } else {
                let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                let qty = rng.gen_range(1..=self.cfg.max_qty);
                let offset = rng.gen_range(-span..=span);
                let tick = (mid as i64 + offset).clamp(1, self.cfg.max_ticks as i64 - 2) as u32;

                let client_id = i + 1;
                active[worker].push(client_id);
                OrderMsg::add(client_id, tick, qty, side, 0, worker as u32)
            };

            generated += 1;

            let ring = &self.rings[worker];
            let mut spins = 0u32;
            while !ring.push(msg) {
                spins += 1;
                if spins < SPINS_BEFORE_YIELD {
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                    spins = 0;
                }
            }
            pushed += 1;
        }

        self.stats.generated.fetch_add(generated, Ordering::AcqRel);
        self.stats.pushed.fetch_add(pushed, Ordering::AcqRel);

        log::info!("generator finished: {} messages pushed", pushed);
        self.done.store(true, Ordering::Release);
    }
}
