//! Bounded lock-free queue - a cell-sequence MPMC ring.
//!
//! Each cell carries a monotone sequence number that coordinates producers
//! and consumers. A cell at slot `k` starts with `seq = k`. A producer that
//! claims position `p` requires `seq == p` and publishes `seq = p + 1`; a
//! consumer that claims `p` requires `seq == p + 1` and republishes
//! `seq = p + capacity`, handing the slot to the producer of the next lap.
//!
//! The payload is written between an acquire load of `seq` and a release
//! store of `seq`, so a consumer observing `seq == p + 1` has a
//! happens-before edge to the producer's payload write. `head` and `tail`
//! live on separate cache lines; producers race on `tail` via CAS, consumers
//! on `head`. Nothing ever blocks: `push` on a full ring and `pop` on an
//! empty ring simply return failure and leave back-pressure policy to the
//! caller.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotone position counter on its own cache line, so producers hammering
/// `tail` do not invalidate the consumers' `head` line.
#[repr(align(64))]
struct Counter(AtomicU64);

const _: () = assert!(std::mem::align_of::<Counter>() == 64);

/// One ring slot: sequence word plus payload, aligned so that slots do not
/// share cache lines.
#[repr(align(64))]
struct Cell<T> {
    seq: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity MPMC ring over trivially copyable payloads.
///
/// Capacity is rounded up to a power of two at construction; positions are
/// monotonically increasing 64-bit counters and the slot index is
/// `position & mask`. Correct for any number of producers and consumers; the
/// intended deployment (one ring per worker) degenerates to SPSC.
pub struct RingQueue<T> {
    cells: Box<[Cell<T>]>,
    mask: u64,
    /// Consumer cursor
    head: Counter,
    /// Producer cursor
    tail: Counter,
}

unsafe impl<T: Send> Send for RingQueue<T> {}
unsafe impl<T: Send> Sync for RingQueue<T> {}

impl<T: Copy> RingQueue<T> {
    /// Create a ring holding at least `min_capacity` messages (rounded up to
    /// a power of two, minimum 2).
    pub fn with_capacity(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(2).next_power_of_two();

        let cells: Box<[Cell<T>]> = (0..capacity)
            .map(|i| Cell {
                seq: AtomicU64::new(i as u64),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            cells,
            mask: capacity as u64 - 1,
            head: Counter(AtomicU64::new(0)),
            tail: Counter(AtomicU64::new(0)),
        }
    }

    /// Enqueue one message. Returns `false` iff the ring is full.
    pub fn push(&self, value: T) -> bool {
        let mut pos = self.tail.0.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[(pos & self.mask) as usize];
            let seq = cell.seq.load(Ordering::Acquire);
            let diff = seq as i64 - pos as i64;

            if diff == 0 {
                // slot is empty for this lap; race other producers for it
                match self.tail.0.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*cell.value.get()).write(value) };
                        cell.seq.store(pos + 1, Ordering::Release);
                        return true;
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // the consumer of the previous lap has not vacated the slot
                return false;
            } else {
                // another producer advanced past us; reload
                pos = self.tail.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Dequeue one message. Returns `None` iff the ring is empty.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.head.0.load(Ordering::Relaxed);
        loop {
            let cell = &self.cells[(pos & self.mask) as usize];
            let seq = cell.seq.load(Ordering::Acquire);
            let diff = seq as i64 - (pos + 1) as i64;

            if diff == 0 {
                // slot is full for this lap; race other consumers for it
                match self.head.0.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*cell.value.get()).assume_init_read() };
                        cell.seq
                            .store(pos + self.cells.len() as u64, Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // the producer for this position has not published yet
                return None;
            } else {
                pos = self.head.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Enqueue messages until the first failure. Returns how many went in.
    pub fn push_batch(&self, values: &[T]) -> usize {
        for (i, &value) in values.iter().enumerate() {
            if !self.push(value) {
                return i;
            }
        }
        values.len()
    }

    /// Dequeue up to `out.len()` messages into `out`. Returns how many came
    /// out.
    pub fn pop_batch(&self, out: &mut [T]) -> usize {
        for (i, slot) in out.iter_mut().enumerate() {
            match self.pop() {
                Some(value) => *slot = value,
                None => return i,
            }
        }
        out.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Best-effort occupancy snapshot derived from the two cursors. Exact
    /// when no producer or consumer is mid-operation.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let head = self.head.0.load(Ordering::Relaxed);
        (tail.saturating_sub(head) as usize).min(self.capacity())
    }

    /// Best-effort free-slot snapshot
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Drop every queued message. Not safe to call concurrently with
    /// producers or consumers.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl<T> std::fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingQueue")
            .field("capacity", &self.cells.len())
            .field("head", &self.head.0.load(Ordering::Relaxed))
            .field("tail", &self.tail.0.load(Ordering::Relaxed))
            .finish()
    }
}
