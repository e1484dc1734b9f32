//! Benchmark configuration - engine bounds and workload knobs.

/// Knobs for a benchmark run. Engine bounds are fixed at construction; the
/// rest shapes the synthetic workload.
#[derive(Clone, Debug)]
pub struct Config {
    /// Price ticks per side
    pub max_ticks: u32,
    /// Order-pool capacity per engine
    pub max_orders: u32,
    /// Ring capacity per worker (rounded up to a power of two)
    pub ring_capacity: usize,
    /// Number of matching workers (one ring + one engine each)
    pub workers: usize,
    /// Messages the generator produces
    pub num_orders: u64,
    /// Prices cluster within `mid ± span_ticks`
    pub span_ticks: u32,
    /// Quantities are drawn from `1..=max_qty`
    pub max_qty: u32,
    /// Every n-th message becomes a cancel (0 disables cancels)
    pub cancel_every: u64,
    /// Workload RNG seed
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_ticks: 32_768,
            max_orders: 500_000,
            ring_capacity: 1 << 20,
            workers: 2,
            num_orders: 4_000_000,
            span_ticks: 50,
            max_qty: 10,
            cancel_every: 1_000,
            seed: 12,
        }
    }
}
