//! Price-level book - tick-indexed FIFO queues with a cached best price.
//!
//! Each side owns an array of [`PriceLevel`]s (one per tick), an occupancy
//! bitset mirroring which levels are non-empty, and a cached best tick.
//! Levels are doubly-linked lists threaded through the node pool, so insert,
//! head-consume, and cancel-from-the-middle are all O(1).

use crate::bitset::TickBitset;
use crate::message::Side;
use crate::pool::{NodePool, PoolIndex, NIL};

/// Sentinel tick meaning "this side is empty"
pub const NO_PRICE: u32 = u32::MAX;

/// A FIFO queue of orders resting at one tick.
///
/// Arrivals append at `tail`; fills consume from `head` (price-time
/// priority). `total_qty` tracks the sum of remaining quantity across the
/// queue.
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    /// Oldest order (first to match), NIL when empty
    pub head: PoolIndex,
    /// Newest order (last to match), NIL when empty
    pub tail: PoolIndex,
    /// Sum of remaining qty across the queue
    pub total_qty: u64,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceLevel {
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            total_qty: 0,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.head == NIL
    }

    /// Append an order at the tail (lowest time priority).
    #[inline]
    pub fn push_back(&mut self, pool: &mut NodePool, idx: PoolIndex) {
        let qty = pool.get(idx).qty;

        if self.tail == NIL {
            debug_assert!(self.head == NIL);
            self.head = idx;
            self.tail = idx;
            let node = pool.get_mut(idx);
            node.prev = NIL;
            node.next = NIL;
        } else {
            let prev_tail = self.tail;
            pool.get_mut(prev_tail).next = idx;
            let node = pool.get_mut(idx);
            node.prev = prev_tail;
            node.next = NIL;
            self.tail = idx;
        }

        self.total_qty += qty as u64;
    }

    /// Unlink an order from anywhere in the queue and subtract its remaining
    /// quantity. Returns `true` if the level is now empty. The node itself is
    /// not freed; the caller owns that.
    #[inline]
    pub fn unlink(&mut self, pool: &mut NodePool, idx: PoolIndex) -> bool {
        let (prev, next, qty) = {
            let node = pool.get(idx);
            (node.prev, node.next, node.qty)
        };

        if prev != NIL {
            pool.get_mut(prev).next = next;
        } else {
            debug_assert!(self.head == idx);
            self.head = next;
        }
        if next != NIL {
            pool.get_mut(next).prev = prev;
        } else {
            debug_assert!(self.tail == idx);
            self.tail = prev;
        }

        debug_assert!(self.total_qty >= qty as u64);
        self.total_qty -= qty as u64;

        let node = pool.get_mut(idx);
        node.prev = NIL;
        node.next = NIL;

        self.head == NIL
    }
}

/// One side of the book: tick-indexed levels + occupancy bits + best cache.
pub struct BookSide {
    side: Side,
    pub levels: Box<[PriceLevel]>,
    pub occ: TickBitset,
    /// Best tick for this side (max for bids, min for asks), NO_PRICE when
    /// the side is empty
    pub best: u32,
}

impl BookSide {
    pub fn new(side: Side, max_ticks: u32) -> Self {
        Self {
            side,
            levels: vec![PriceLevel::new(); max_ticks as usize].into_boxed_slice(),
            occ: TickBitset::new(max_ticks),
            best: NO_PRICE,
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn best(&self) -> u32 {
        self.best
    }

    #[inline]
    pub fn level(&self, tick: u32) -> &PriceLevel {
        &self.levels[tick as usize]
    }

    /// Record liquidity added at `tick`: mark occupancy and bump the best
    /// cache with a single comparison.
    #[inline]
    pub fn note_added(&mut self, tick: u32) {
        self.occ.set(tick);
        let better = match self.side {
            Side::Buy => self.best == NO_PRICE || tick > self.best,
            Side::Sell => self.best == NO_PRICE || tick < self.best,
        };
        if better {
            self.best = tick;
        }
    }

    /// Record that the level at `tick` emptied: drop its occupancy bit and,
    /// if it was the best, rescan for the new best.
    #[inline]
    pub fn note_emptied(&mut self, tick: u32) {
        debug_assert!(self.levels[tick as usize].is_empty());
        self.occ.clear(tick);
        if tick == self.best {
            self.best = match self.side {
                Side::Buy => self.occ.prev_set_from(tick).unwrap_or(NO_PRICE),
                Side::Sell => self.occ.next_set_from(tick).unwrap_or(NO_PRICE),
            };
        }
    }

    /// Clear every level and the best cache. Used by engine reset.
    pub fn reset(&mut self) {
        self.levels.fill(PriceLevel::new());
        self.occ.reset();
        self.best = NO_PRICE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc_order(pool: &mut NodePool, qty: u32) -> PoolIndex {
        let idx = pool.alloc().unwrap();
        pool.get_mut(idx).qty = qty;
        idx
    }

    #[test]
    fn test_empty_level() {
        let level = PriceLevel::new();
        assert!(level.is_empty());
        assert_eq!(level.total_qty, 0);
        assert_eq!(level.head, NIL);
        assert_eq!(level.tail, NIL);
    }

    #[test]
    fn test_push_back_fifo_linkage() {
        let mut pool = NodePool::new(10);
        let mut level = PriceLevel::new();

        let a = alloc_order(&mut pool, 10);
        let b = alloc_order(&mut pool, 20);
        let c = alloc_order(&mut pool, 30);
        level.push_back(&mut pool, a);
        level.push_back(&mut pool, b);
        level.push_back(&mut pool, c);

        assert_eq!(level.head, a);
        assert_eq!(level.tail, c);
        assert_eq!(level.total_qty, 60);
        assert_eq!(pool.get(a).next, b);
        assert_eq!(pool.get(b).prev, a);
        assert_eq!(pool.get(b).next, c);
        assert_eq!(pool.get(c).prev, b);
    }

    #[test]
    fn test_unlink_head() {
        let mut pool = NodePool::new(10);
        let mut level = PriceLevel::new();
        let a = alloc_order(&mut pool, 10);
        let b = alloc_order(&mut pool, 20);
        level.push_back(&mut pool, a);
        level.push_back(&mut pool, b);

        let emptied = level.unlink(&mut pool, a);
        assert!(!emptied);
        assert_eq!(level.head, b);
        assert_eq!(pool.get(b).prev, NIL);
        assert_eq!(level.total_qty, 20);
    }

    #[test]
    fn test_unlink_tail() {
        let mut pool = NodePool::new(10);
        let mut level = PriceLevel::new();
        let a = alloc_order(&mut pool, 10);
        let b = alloc_order(&mut pool, 20);
        level.push_back(&mut pool, a);
        level.push_back(&mut pool, b);

        let emptied = level.unlink(&mut pool, b);
        assert!(!emptied);
        assert_eq!(level.tail, a);
        assert_eq!(pool.get(a).next, NIL);
    }

    #[test]
    fn test_unlink_middle() {
        let mut pool = NodePool::new(10);
        let mut level = PriceLevel::new();
        let a = alloc_order(&mut pool, 10);
        let b = alloc_order(&mut pool, 20);
        let c = alloc_order(&mut pool, 30);
        level.push_back(&mut pool, a);
        level.push_back(&mut pool, b);
        level.push_back(&mut pool, c);

        let emptied = level.unlink(&mut pool, b);
        assert!(!emptied);
        assert_eq!(pool.get(a).next, c);
        assert_eq!(pool.get(c).prev, a);
        assert_eq!(level.total_qty, 40);
    }

    #[test]
    fn test_unlink_only_node_empties_level() {
        let mut pool = NodePool::new(10);
        let mut level = PriceLevel::new();
        let a = alloc_order(&mut pool, 10);
        level.push_back(&mut pool, a);

        let emptied = level.unlink(&mut pool, a);
        assert!(emptied);
        assert!(level.is_empty());
        assert_eq!(level.tail, NIL);
        assert_eq!(level.total_qty, 0);
    }

    #[test]
    fn test_bid_best_tracks_max() {
        let mut side = BookSide::new(Side::Buy, 256);
        assert_eq!(side.best(), NO_PRICE);

        side.note_added(100);
        assert_eq!(side.best(), 100);
        side.note_added(50);
        assert_eq!(side.best(), 100);
        side.note_added(150);
        assert_eq!(side.best(), 150);
    }

    #[test]
    fn test_ask_best_tracks_min() {
        let mut side = BookSide::new(Side::Sell, 256);
        side.note_added(100);
        side.note_added(150);
        assert_eq!(side.best(), 100);
        side.note_added(50);
        assert_eq!(side.best(), 50);
    }

    #[test]
    fn test_note_emptied_recomputes_best() {
        let mut side = BookSide::new(Side::Buy, 256);
        side.note_added(10);
        side.note_added(20);
        side.note_added(30);

        side.note_emptied(30);
        assert_eq!(side.best(), 20);
        side.note_emptied(20);
        assert_eq!(side.best(), 10);
        side.note_emptied(10);
        assert_eq!(side.best(), NO_PRICE);
    }

    #[test]
    fn test_note_emptied_below_best_keeps_best() {
        let mut side = BookSide::new(Side::Buy, 256);
        side.note_added(10);
        side.note_added(30);

        side.note_emptied(10);
        assert_eq!(side.best(), 30);
        assert!(!side.occ.test(10));
    }

    #[test]
    fn test_reset() {
        let mut pool = NodePool::new(4);
        let mut side = BookSide::new(Side::Sell, 128);
        let idx = alloc_order(&mut pool, 5);
        side.levels[7].push_back(&mut pool, idx);
        side.note_added(7);

        side.reset();
        assert_eq!(side.best(), NO_PRICE);
        assert!(side.level(7).is_empty());
        assert!(!side.occ.test(7));
    }
}
