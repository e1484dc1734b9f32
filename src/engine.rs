//! Matching engine - price-time priority crossing over tick-indexed levels.
//!
//! Implements the cross/rest algorithm:
//! 1. CROSSING: consume opposite-side liquidity from the best level inward
//!    while the taker's limit allows
//! 2. RESTING: enqueue any remainder at the tail of its own level
//!
//! The engine is single-owner: one worker drives one engine, so every
//! operation is a plain `&mut self` call and nothing here synchronizes.

use crate::book::{BookSide, NO_PRICE};
use crate::handle::HandleTable;
use crate::message::{OrderIn, Side, FLAG_IOC};
use crate::pool::{NodePool, NIL};

/// Returned by [`MatchingEngine::add_limit`] when the taker fully executed
/// and nothing rested.
pub const DONE_FILL: u32 = 0xFFFF_FFFE;

/// A price-time-priority matching engine over `[0, max_ticks)`.
///
/// `add_limit` returns a single `u32` word: values below `max_orders` are
/// handles to resting orders, [`DONE_FILL`] means the order fully executed,
/// and [`NIL`] means it was rejected (or was IOC with a remainder).
pub struct MatchingEngine {
    max_ticks: u32,
    max_orders: u32,
    pub pool: NodePool,
    pub handles: HandleTable,
    pub bids: BookSide,
    pub asks: BookSide,
    total_trades: u64,
    total_volume: u64,
}

impl MatchingEngine {
    /// Create an engine with the given tick range and order capacity.
    ///
    /// # Panics
    /// Panics if either bound is below 2, or large enough to collide with the
    /// sentinel encodings.
    pub fn new(max_ticks: u32, max_orders: u32) -> Self {
        assert!(max_ticks >= 2, "need at least two ticks");
        assert!(max_orders >= 2, "need at least two order slots");
        assert!(max_orders < DONE_FILL, "order capacity collides with sentinels");
        assert!(max_ticks < NO_PRICE, "tick range collides with sentinels");

        Self {
            max_ticks,
            max_orders,
            pool: NodePool::new(max_orders),
            handles: HandleTable::new(max_orders),
            bids: BookSide::new(Side::Buy, max_ticks),
            asks: BookSide::new(Side::Sell, max_ticks),
            total_trades: 0,
            total_volume: 0,
        }
    }

    /// Submit a limit order.
    ///
    /// Crosses against the opposite side first, then rests any remainder.
    /// Returns the resting order's handle, [`DONE_FILL`] on a complete fill,
    /// or [`NIL`] when rejected: zero quantity, tick out of range, pool
    /// exhausted, or IOC with a remainder.
    ///
    /// The all-or-nothing flag is relaxed (see
    /// [`FLAG_FOK_RELAXED`](crate::message::FLAG_FOK_RELAXED)): no liquidity
    /// pre-check runs and partial fills stand, so the flag alone never
    /// changes the outcome.
    pub fn add_limit(&mut self, order: &OrderIn) -> u32 {
        if order.qty == 0 || order.price_tick >= self.max_ticks {
            return NIL;
        }

        let limit = order.price_tick;
        let remaining = match order.side {
            Side::Buy => Self::cross(
                &mut self.asks,
                &mut self.pool,
                &mut self.handles,
                &mut self.total_trades,
                &mut self.total_volume,
                order.qty,
                |best| best <= limit,
            ),
            Side::Sell => Self::cross(
                &mut self.bids,
                &mut self.pool,
                &mut self.handles,
                &mut self.total_trades,
                &mut self.total_volume,
                order.qty,
                |best| best >= limit,
            ),
        };

        if remaining == 0 {
            return DONE_FILL;
        }
        if order.flags & FLAG_IOC != 0 {
            return NIL;
        }
        self.rest(order.side, order.price_tick, remaining)
    }

    /// Cancel a resting order by handle.
    ///
    /// Returns `true` iff the handle was live. Idempotent: a second cancel of
    /// the same handle returns `false` with no state change.
    pub fn cancel(&mut self, handle: u32) -> bool {
        if handle >= self.max_orders {
            return false;
        }
        let idx = self.handles.get(handle);
        if idx == NIL {
            return false;
        }

        let (tick, side) = {
            let node = self.pool.get(idx);
            (node.price_tick, node.side)
        };
        let book = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };

        let emptied = book.levels[tick as usize].unlink(&mut self.pool, idx);
        if emptied {
            book.note_emptied(tick);
        }

        self.handles.release(handle);
        self.pool.free(idx);
        true
    }

    /// Re-price a resting order: cancel it, then add a fresh limit order on
    /// the same side at the new tick/quantity (no IOC on the replacement).
    ///
    /// Not atomic: the replacement crosses like any new order, so a crossing
    /// new price executes against the book. Returns the new handle,
    /// [`DONE_FILL`], or [`NIL`] if the handle was dead or the new values are
    /// invalid.
    pub fn replace(&mut self, handle: u32, new_tick: u32, new_qty: u32) -> u32 {
        if handle >= self.max_orders || new_qty == 0 || new_tick >= self.max_ticks {
            return NIL;
        }
        let idx = self.handles.get(handle);
        if idx == NIL {
            return NIL;
        }
        let side = self.pool.get(idx).side;
        self.cancel(handle);
        self.add_limit(&OrderIn {
            client_id: 0,
            price_tick: new_tick,
            qty: new_qty,
            side,
            flags: 0,
            _pad: 0,
        })
    }

    /// Highest occupied bid tick, or [`NO_PRICE`]
    #[inline]
    pub fn best_bid(&self) -> u32 {
        self.bids.best()
    }

    /// Lowest occupied ask tick, or [`NO_PRICE`]
    #[inline]
    pub fn best_ask(&self) -> u32 {
        self.asks.best()
    }

    /// Number of matches executed so far
    #[inline]
    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    /// Sum of traded quantity so far
    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    /// Number of currently resting orders
    #[inline]
    pub fn resting_orders(&self) -> u32 {
        self.pool.live()
    }

    #[inline]
    pub fn max_ticks(&self) -> u32 {
        self.max_ticks
    }

    #[inline]
    pub fn max_orders(&self) -> u32 {
        self.max_orders
    }

    /// Return the engine to its initial empty state: free list rebuilt,
    /// levels and bitsets cleared, bests at [`NO_PRICE`], counters zeroed.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.handles.reset();
        self.bids.reset();
        self.asks.reset();
        self.total_trades = 0;
        self.total_volume = 0;
    }

    /// Consume liquidity from `book` (the side opposite the taker) while
    /// quantity remains and the best level satisfies `within_limit`.
    ///
    /// Within a level, makers match in FIFO order; a maker depleted to zero
    /// is unlinked, its handle released, its node freed. An emptied level
    /// drops its occupancy bit and refreshes the side's best.
    fn cross(
        book: &mut BookSide,
        pool: &mut NodePool,
        handles: &mut HandleTable,
        total_trades: &mut u64,
        total_volume: &mut u64,
        mut remaining: u32,
        within_limit: impl Fn(u32) -> bool,
    ) -> u32 {
        while remaining > 0 {
            let tick = book.best();
            if tick == NO_PRICE || !within_limit(tick) {
                break;
            }

            loop {
                let head = book.levels[tick as usize].head;
                if remaining == 0 || head == NIL {
                    break;
                }

                let (maker_qty, maker_id, maker_next) = {
                    let maker = pool.get(head);
                    (maker.qty, maker.id, maker.next)
                };

                let trade = remaining.min(maker_qty);
                pool.get_mut(head).qty = maker_qty - trade;
                remaining -= trade;
                book.levels[tick as usize].total_qty -= trade as u64;
                *total_trades += 1;
                *total_volume += trade as u64;

                if maker_qty == trade {
                    // maker fully filled: unlink from the head and retire it
                    let lvl = &mut book.levels[tick as usize];
                    lvl.head = maker_next;
                    if maker_next != NIL {
                        pool.get_mut(maker_next).prev = NIL;
                    } else {
                        lvl.tail = NIL;
                    }
                    handles.release(maker_id);
                    pool.free(head);
                }
            }

            if book.levels[tick as usize].is_empty() {
                book.note_emptied(tick);
            } else {
                // liquidity left at this tick: the taker ran out
                break;
            }
        }
        remaining
    }

    /// Enqueue a remainder as a resting order. Returns its handle, or NIL
    /// when the pool is exhausted.
    fn rest(&mut self, side: Side, tick: u32, qty: u32) -> u32 {
        let Some(idx) = self.pool.alloc() else {
            return NIL;
        };
        let handle = self.handles.claim(idx);

        {
            let node = self.pool.get_mut(idx);
            node.id = handle;
            node.price_tick = tick;
            node.qty = qty;
            node.side = side;
        }

        let book = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book.levels[tick as usize].push_back(&mut self.pool, idx);
        book.note_added(tick);

        handle
    }
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("best_bid", &self.bids.best())
            .field("best_ask", &self.asks.best())
            .field("resting", &self.pool.live())
            .field("total_trades", &self.total_trades)
            .field("total_volume", &self.total_volume)
            .finish()
    }
}
