//! End-to-end benchmark: generator -> rings -> workers, followed by a
//! single-threaded engine latency profile.
//!
//! Configuration comes from `Config::default()`; a few knobs can be
//! overridden through environment variables (`RINGBOOK_ORDERS`,
//! `RINGBOOK_WORKERS`, `RINGBOOK_SEED`).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use hdrhistogram::Histogram;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use ringbook::{
    Config, MatchingEngine, MatchingWorker, OrderGenerator, OrderIn, OrderMsg, RingQueue, Side,
    Stats,
};

fn env_override<T: std::str::FromStr>(name: &str, value: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        if let Ok(parsed) = raw.parse() {
            *value = parsed;
        }
    }
}

fn main() {
    env_logger::init();

    let mut cfg = Config::default();
    env_override("RINGBOOK_ORDERS", &mut cfg.num_orders);
    env_override("RINGBOOK_WORKERS", &mut cfg.workers);
    env_override("RINGBOOK_SEED", &mut cfg.seed);

    println!(
        "ringbook: {} messages, {} workers, {} ticks, {} order slots",
        cfg.num_orders, cfg.workers, cfg.max_ticks, cfg.max_orders
    );

    let stats = Arc::new(Stats::new());
    let done = Arc::new(AtomicBool::new(false));
    let rings: Vec<Arc<RingQueue<OrderMsg>>> = (0..cfg.workers)
        .map(|_| Arc::new(RingQueue::with_capacity(cfg.ring_capacity)))
        .collect();

    let started = Instant::now();

    std::thread::scope(|scope| {
        for (i, ring) in rings.iter().enumerate() {
            let mut worker = MatchingWorker::new(&cfg, ring.clone(), stats.clone(), done.clone());
            scope.spawn(move || {
                MatchingWorker::pin_to_core(i + 1);
                worker.run();
            });
        }

        // the generator is the single producer; run it on this thread
        let generator = OrderGenerator::new(cfg.clone(), rings.clone(), done.clone(), stats.clone());
        MatchingWorker::pin_to_core(0);
        generator.run();
    });

    stats.report(started.elapsed());

    latency_profile(&cfg);
}

/// Single-threaded per-op latency percentiles, ring overhead excluded.
fn latency_profile(cfg: &Config) {
    const OPS: u64 = 1_000_000;

    let mut engine = MatchingEngine::new(cfg.max_ticks, cfg.max_orders);
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000, 3).unwrap();

    let mid = cfg.max_ticks / 2;
    let span = cfg.span_ticks as i64;

    for _ in 0..OPS {
        let offset = rng.gen_range(-span..=span);
        let order = OrderIn {
            client_id: 0,
            price_tick: (mid as i64 + offset).clamp(1, cfg.max_ticks as i64 - 2) as u32,
            qty: rng.gen_range(1..=cfg.max_qty),
            side: if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
            flags: 0,
            _pad: 0,
        };

        let start = Instant::now();
        std::hint::black_box(engine.add_limit(std::hint::black_box(&order)));
        let elapsed = start.elapsed();

        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
    }

    println!("=== add_limit latency (ns, {} ops) ===", OPS);
    println!("Min:    {:6}", histogram.min());
    println!("P50:    {:6}", histogram.value_at_quantile(0.50));
    println!("P90:    {:6}", histogram.value_at_quantile(0.90));
    println!("P99:    {:6}", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6}", histogram.value_at_quantile(0.999));
    println!("Max:    {:6}", histogram.max());
}
