//! Lock-Free Sample FIFO
//!
//! Single-producer/single-consumer ring of fixed-size blocks between the
//! audio thread and the analysis thread. The producer never blocks: when the
//! ring is full it drops the oldest unread block before writing.
//!
//! # Design
//!
//! `read` and `write` are monotonically increasing block counters. The ring
//! has `capacity + 1` slots so the slot being written is never one of the
//! `capacity` readable entries. Samples live in `AtomicU32` cells (f32 bits),
//! so a consumer that is still copying a block the producer has just dropped
//! and started overwriting reads stale-but-defined data; its cursor CAS then
//! fails and it retries with the new oldest block.
//!
//! SPSC is enforced by ownership: [`BlockFifo::new`] hands out exactly one
//! [`FifoProducer`] and one [`FifoConsumer`], neither of which is `Clone`,
//! and both `push` and `pull` take `&mut self`.

use std::sync::atomic::{fence, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared {
    slots: Box<[AtomicU32]>,
    capacity: usize,
    block_len: usize,
    read: AtomicUsize,
    write: AtomicUsize,
}

impl Shared {
    #[inline]
    fn slot(&self, counter: usize) -> &[AtomicU32] {
        let index = counter % (self.capacity + 1);
        &self.slots[index * self.block_len..(index + 1) * self.block_len]
    }

    #[inline]
    fn available(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.saturating_sub(read)
    }
}

/// Constructor for a producer/consumer pair
pub struct BlockFifo;

impl BlockFifo {
    /// Allocate a ring of `capacity` blocks of `block_len` samples each
    ///
    /// This is the only allocation; pushes and pulls copy into existing
    /// storage. Zero sizes are raised to 1.
    pub fn new(capacity: usize, block_len: usize) -> (FifoProducer, FifoConsumer) {
        debug_assert!(capacity > 0 && block_len > 0, "FIFO needs a non-zero size");
        let capacity = capacity.max(1);
        let block_len = block_len.max(1);

        let slots = (0..(capacity + 1) * block_len)
            .map(|_| AtomicU32::new(0.0_f32.to_bits()))
            .collect();

        let shared = Arc::new(Shared {
            slots,
            capacity,
            block_len,
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        });

        (
            FifoProducer {
                shared: Arc::clone(&shared),
            },
            FifoConsumer { shared },
        )
    }
}

/// Writing half, owned by the audio thread
pub struct FifoProducer {
    shared: Arc<Shared>,
}

impl FifoProducer {
    /// Copy one block in, dropping the oldest unread block if full
    ///
    /// `block` shorter than `block_len` is zero-padded, longer is truncated.
    /// Returns `true` when an unread block was dropped to make room.
    ///
    /// # Real-time Safety
    /// No allocation, no locks, bounded time.
    pub fn push(&mut self, block: &[f32]) -> bool {
        debug_assert_eq!(block.len(), self.shared.block_len, "FIFO block length mismatch");
        let shared = &*self.shared;

        // Only this half ever stores `write`
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);

        let mut dropped = false;
        if write - read >= shared.capacity {
            // If the CAS fails the consumer just freed a slot itself
            dropped = shared
                .read
                .compare_exchange(read, read + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        }

        // Pairs with the consumer's acquire fence before its cursor CAS
        fence(Ordering::Release);

        let slot = shared.slot(write);
        for (i, cell) in slot.iter().enumerate() {
            let sample = block.get(i).copied().unwrap_or(0.0);
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }

        shared.write.store(write + 1, Ordering::Release);
        dropped
    }

    pub fn num_available_for_reading(&self) -> usize {
        self.shared.available()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn block_len(&self) -> usize {
        self.shared.block_len
    }
}

/// Reading half, owned by the analysis thread
pub struct FifoConsumer {
    shared: Arc<Shared>,
}

impl FifoConsumer {
    /// Pop the oldest block into `out`
    ///
    /// Returns `false` without touching `out` when nothing is available.
    /// Copies `min(out.len(), block_len)` samples.
    pub fn pull(&mut self, out: &mut [f32]) -> bool {
        let shared = &*self.shared;

        loop {
            let read = shared.read.load(Ordering::Acquire);
            let write = shared.write.load(Ordering::Acquire);
            if read == write {
                return false;
            }

            for (dst, cell) in out.iter_mut().zip(shared.slot(read)) {
                *dst = f32::from_bits(cell.load(Ordering::Relaxed));
            }

            fence(Ordering::Acquire);

            if shared
                .read
                .compare_exchange(read, read + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
            // The producer dropped this block while we copied it
        }
    }

    pub fn num_available_for_reading(&self) -> usize {
        self.shared.available()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn block_len(&self) -> usize {
        self.shared.block_len
    }
}

/// Audio-side tap that turns arbitrary host block sizes into full FIFO blocks
///
/// Samples accumulate in a pre-allocated block; every time it fills it is
/// pushed into the FIFO.
pub struct SampleTap {
    producer: FifoProducer,
    block: Vec<f32>,
    filled: usize,
}

impl SampleTap {
    pub fn new(producer: FifoProducer) -> Self {
        let block = vec![0.0; producer.block_len()];
        Self {
            producer,
            block,
            filled: 0,
        }
    }

    /// Append samples; returns how many full blocks were pushed
    ///
    /// # Real-time Safety
    /// Only copies into the existing block and FIFO storage.
    pub fn push_samples(&mut self, mut samples: &[f32]) -> usize {
        let mut pushed = 0;
        while !samples.is_empty() {
            let take = (self.block.len() - self.filled).min(samples.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&samples[..take]);
            self.filled += take;
            samples = &samples[take..];

            if self.filled == self.block.len() {
                self.producer.push(&self.block);
                self.filled = 0;
                pushed += 1;
            }
        }
        pushed
    }

    /// Samples waiting for the current block to fill
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Discard a partially filled block
    pub fn clear(&mut self) {
        self.filled = 0;
    }

    pub fn producer(&self) -> &FifoProducer {
        &self.producer
    }
}
