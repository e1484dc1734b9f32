//! Shared run statistics - atomic counters folded in by the producer and the
//! workers, plus a human-readable end-of-run report.
//!
//! Workers accumulate locally and fold in large chunks (see
//! [`crate::worker`]) so the counters never become a hot-path contention
//! point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct Stats {
    /// Messages produced by the generator
    pub generated: AtomicU64,
    /// Messages successfully pushed into a ring
    pub pushed: AtomicU64,
    /// Messages dequeued and dispatched by workers
    pub popped: AtomicU64,
    /// Engine rejects (out-of-range, pool exhausted, IOC remainders)
    pub rejected: AtomicU64,
    /// Takers that fully executed without resting
    pub donefill: AtomicU64,
    /// Cancels that hit a live order
    pub cancels: AtomicU64,
    /// Orders still resting when the run ended
    pub resting: AtomicU64,
    /// Matches executed across all engines
    pub trades: AtomicU64,
    /// Quantity traded across all engines
    pub volume: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print a run summary to stdout.
    pub fn report(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let generated = self.generated.load(Ordering::Acquire);
        let popped = self.popped.load(Ordering::Acquire);

        println!();
        println!("=== Run Report ===");
        println!("Generated:   {:>15}", format_count(generated));
        println!("Pushed:      {:>15}", format_count(self.pushed.load(Ordering::Acquire)));
        println!("Processed:   {:>15}", format_count(popped));
        println!("Rejected:    {:>15}", format_count(self.rejected.load(Ordering::Acquire)));
        println!("Done-fills:  {:>15}", format_count(self.donefill.load(Ordering::Acquire)));
        println!("Cancels:     {:>15}", format_count(self.cancels.load(Ordering::Acquire)));
        println!("Resting:     {:>15}", format_count(self.resting.load(Ordering::Acquire)));
        println!("Trades:      {:>15}", format_count(self.trades.load(Ordering::Acquire)));
        println!("Volume:      {:>15}", format_count(self.volume.load(Ordering::Acquire)));
        println!("------------------");
        println!("Elapsed:     {:>15.6} s", secs);
        println!("Gen rate:    {:>15.0} msg/s", generated as f64 / secs);
        println!("Match rate:  {:>15.0} msg/s", popped as f64 / secs);
        println!();
    }
}

/// Format a count with thousands separators (1234567 -> "1,234,567")
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
