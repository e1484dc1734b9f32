//! Pipeline tests - generator -> rings -> workers, end to end.
//!
//! Runs the full benchmark topology on a small workload and verifies message
//! accounting, clean shutdown, and single-worker determinism across runs.

use ringbook::{Config, MatchingWorker, OrderGenerator, OrderMsg, RingQueue, Stats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn small_config(workers: usize, seed: u64) -> Config {
    Config {
        max_ticks: 2048,
        max_orders: 200_000,
        ring_capacity: 1 << 14,
        workers,
        num_orders: 200_000,
        span_ticks: 40,
        max_qty: 8,
        cancel_every: 50,
        seed,
    }
}

/// Run the full topology and return the folded stats.
fn run_pipeline(cfg: &Config) -> Arc<Stats> {
    let stats = Arc::new(Stats::new());
    let done = Arc::new(AtomicBool::new(false));
    let rings: Vec<Arc<RingQueue<OrderMsg>>> = (0..cfg.workers)
        .map(|_| Arc::new(RingQueue::with_capacity(cfg.ring_capacity)))
        .collect();

    std::thread::scope(|scope| {
        for ring in &rings {
            let mut worker = MatchingWorker::new(cfg, ring.clone(), stats.clone(), done.clone());
            scope.spawn(move || worker.run());
        }

        OrderGenerator::new(cfg.clone(), rings.clone(), done.clone(), stats.clone()).run();
    });

    for ring in &rings {
        assert!(ring.is_empty(), "workers must drain their rings before exit");
    }
    stats
}

#[test]
fn test_every_message_is_processed() {
    let cfg = small_config(2, 42);
    let stats = run_pipeline(&cfg);

    let generated = stats.generated.load(Ordering::Acquire);
    assert_eq!(generated, cfg.num_orders);
    assert_eq!(stats.pushed.load(Ordering::Acquire), generated);
    assert_eq!(stats.popped.load(Ordering::Acquire), generated);
}

#[test]
fn test_workload_actually_matches() {
    let cfg = small_config(2, 7);
    let stats = run_pipeline(&cfg);

    // a mid-clustered workload must cross and cancel constantly
    assert!(stats.trades.load(Ordering::Acquire) > 0);
    assert!(stats.volume.load(Ordering::Acquire) > 0);
    assert!(stats.donefill.load(Ordering::Acquire) > 0);
    assert!(stats.cancels.load(Ordering::Acquire) > 0);
    assert_eq!(stats.rejected.load(Ordering::Acquire), 0);
}

#[test]
fn test_accounting_is_consistent() {
    let cfg = small_config(3, 99);
    let stats = run_pipeline(&cfg);

    let popped = stats.popped.load(Ordering::Acquire);
    let donefill = stats.donefill.load(Ordering::Acquire);
    let rejected = stats.rejected.load(Ordering::Acquire);
    let cancels = stats.cancels.load(Ordering::Acquire);

    assert!(donefill + rejected + cancels <= popped);
    assert!(stats.volume.load(Ordering::Acquire) >= stats.trades.load(Ordering::Acquire));
}

#[test]
fn test_single_worker_runs_are_deterministic() {
    let cfg = small_config(1, 1234);

    let first = run_pipeline(&cfg);
    let second = run_pipeline(&cfg);

    // one ring, one worker: arrival order is the push order, so every
    // counter must reproduce exactly
    for (name, a, b) in [
        ("trades", &first.trades, &second.trades),
        ("volume", &first.volume, &second.volume),
        ("donefill", &first.donefill, &second.donefill),
        ("cancels", &first.cancels, &second.cancels),
        ("resting", &first.resting, &second.resting),
    ] {
        assert_eq!(
            a.load(Ordering::Acquire),
            b.load(Ordering::Acquire),
            "{} diverged between identical runs",
            name
        );
    }
}

#[test]
fn test_different_seeds_diverge() {
    let first = run_pipeline(&small_config(1, 1));
    let second = run_pipeline(&small_config(1, 2));

    assert_ne!(
        first.volume.load(Ordering::Acquire),
        second.volume.load(Ordering::Acquire),
        "different seeds should produce different workloads"
    );
}
