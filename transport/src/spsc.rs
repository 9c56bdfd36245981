//! Lock-free single-producer/single-consumer ring buffer used by the
//! single-host pipeline variant. `push` is wait-free and callable
//! from exactly one thread; `pop` is wait-free and callable from exactly one
//! (possibly different) thread. Violating that discipline — two producers,
//! or a consumer also calling `push` — silently corrupts ordering; nothing
//! here detects it.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Pads a value to its own cache line so the head and tail atomics, written
/// by different threads, never false-share.
#[repr(align(64))]
struct CachePadded<T>(T);

pub struct SpscRing<T> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    mask: usize,
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: access to `buf` slots is partitioned by the head/tail protocol —
// the producer only ever touches the slot at `head`, the consumer only the
// slot at `tail` — so concurrent access from one producer and one consumer
// thread never aliases the same slot.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Rounds `capacity` up to a power of two (minimum 4, leaving 3 usable
    /// slots — the ring always keeps one slot empty to distinguish full
    /// from empty without a separate counter).
    pub fn new(capacity: usize) -> Self {
        let cap = round_up_pow2(capacity).max(4);
        let buf = (0..cap)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
            mask: cap - 1,
            buf,
        }
    }

    /// Single-producer only. Returns `v` back on full.
    pub fn push(&self, v: T) -> Result<(), T> {
        let h = self.head.0.load(Ordering::Relaxed);
        let next = (h + 1) & self.mask;
        if next == self.tail.0.load(Ordering::Acquire) {
            return Err(v);
        }
        // SAFETY: only the producer writes slot `h`, and it is not readable
        // by the consumer until the `store` below publishes it.
        unsafe {
            (*self.buf[h].get()).write(v);
        }
        self.head.0.store(next, Ordering::Release);
        Ok(())
    }

    /// Single-producer only. Retries with `backoff` sleeps while full.
    pub fn push_spin(&self, mut v: T, backoff: Duration) {
        loop {
            match self.push(v) {
                Ok(()) => return,
                Err(back) => {
                    v = back;
                    std::thread::sleep(backoff);
                }
            }
        }
    }

    /// Single-consumer only.
    pub fn pop(&self) -> Option<T> {
        let t = self.tail.0.load(Ordering::Relaxed);
        if t == self.head.0.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: slot `t` was published by the producer's `Release` store
        // to `head` that made this `Acquire` load see it; only the
        // consumer reads or retires this slot.
        let v = unsafe { (*self.buf[t].get()).assume_init_read() };
        self.tail.0.store((t + 1) & self.mask, Ordering::Release);
        Some(v)
    }

    pub fn len(&self) -> usize {
        let h = self.head.0.load(Ordering::Acquire);
        let t = self.tail.0.load(Ordering::Acquire);
        h.wrapping_sub(t) & self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.head.0.load(Ordering::Acquire) == self.tail.0.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        let h = self.head.0.load(Ordering::Acquire);
        (h + 1) & self.mask == self.tail.0.load(Ordering::Acquire)
    }

    /// Usable capacity (one less than the backing slot count).
    pub fn capacity(&self) -> usize {
        self.mask
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        let mut t = *self.tail.0.get_mut();
        let h = *self.head.0.get_mut();
        while t != h {
            // SAFETY: every slot strictly between tail and head was written
            // by a successful `push` and never retired by `pop`.
            unsafe {
                (*self.buf[t].get()).assume_init_drop();
            }
            t = (t + 1) & self.mask;
        }
    }
}

fn round_up_pow2(x: usize) -> usize {
    let mut p = 1usize;
    while p < x {
        p <<= 1;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_preserves_order() {
        let ring: SpscRing<u32> = SpscRing::new(8);
        for i in 0..5 {
            ring.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(ring.pop(), Some(i));
        }
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn rejects_push_when_full() {
        let ring: SpscRing<u32> = SpscRing::new(4);
        assert!(ring.capacity() == 3);
        for i in 0..3 {
            ring.push(i).unwrap();
        }
        assert!(ring.is_full());
        assert_eq!(ring.push(99), Err(99));
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let ring: SpscRing<u32> = SpscRing::new(5);
        assert_eq!(ring.capacity(), 7);
    }

    #[test]
    fn producer_retries_through_a_paused_consumer() {
        let ring = Arc::new(SpscRing::<u32>::new(4));
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..10u32 {
                    ring.push_spin(i, Duration::from_micros(50));
                }
            })
        };
        thread::sleep(Duration::from_millis(50));
        let mut popped = Vec::new();
        while popped.len() < 10 {
            if let Some(v) = ring.pop() {
                popped.push(v);
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        producer.join().unwrap();
        assert_eq!(popped, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn drop_retires_remaining_elements() {
        let ring: SpscRing<String> = SpscRing::new(4);
        ring.push("a".to_string()).unwrap();
        ring.push("b".to_string()).unwrap();
        drop(ring);
    }
}
