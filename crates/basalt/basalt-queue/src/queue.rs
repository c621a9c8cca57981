//! Multi-producer, multi-consumer FIFO message queue over shared memory.
//!
//! Publishers and subscribers in unrelated processes attach to the same
//! named queue and exchange variable length byte messages with no broker
//! process in between. The ring lives in a memory-mapped region; all
//! coordination runs through three shared atomics (the queue head and tail
//! offsets and the per-frame state word) plus a best-effort wake-up signal.
//! There are no cross-process locks.
//!
//! # Enqueue protocol
//!
//! 1. Reserve a frame by CASing `tail` forward. Readers are kept out of the
//!    reserved bytes by the frame state, which is not yet ready.
//! 2. Write the message header (`LOCKED_TO_BE_ENQUEUED`, body length), then
//!    the body.
//! 3. Publish with a release-ordered CAS of the state to
//!    `READY_TO_BE_CONSUMED`; this is what makes the body visible.
//! 4. Raise the wake-up signal. Signalling is best effort and never fails
//!    the publish.
//!
//! # Dequeue protocol
//!
//! 1. If `head == tail` the queue is empty.
//! 2. Claim the head frame by CASing its state `READY_TO_BE_CONSUMED →
//!    LOCKED_TO_BE_CONSUMED`.
//! 3. Re-check that `head` did not move. The state CAS and the head CAS
//!    cannot be one atomic step, so a racing subscriber may have advanced
//!    the head after our load; in that case the frame we locked is not the
//!    queue head any more (it may even be a brand new message at the same
//!    ring index) and the speculative lock is reverted.
//! 4. Copy the body out, zero the frame, CAS `head` forward.
//!
//! A CAS that fails while we hold the frame lock is a protocol bug, not a
//! user error, and panics with a diagnostic.
//!
//! # Thread safety
//!
//! `Publisher` and `Subscriber` are `Send` but not `Sync`: use one instance
//! per thread. For several producing or consuming threads, attach to the
//! queue once per thread; all cross-instance coordination happens through
//! the shared region, within and across processes alike.

use crate::cancellation::CancellationToken;
use crate::error::QueueError;
use crate::layout::{
    MESSAGE_HEADER_SIZE, QUEUE_HEADER_SIZE, QueueHeader, frame_length, state,
};
use crate::options::QueueOptions;
use crate::ring::{CircularBuffer, safe_increment};
use basalt_mmap::MemoryFile;
use basalt_signal::{SignalReleaser, SignalWaiter};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::debug;

const MESSAGE_HEADER_I64: i64 = MESSAGE_HEADER_SIZE as i64;

/// Plumbing shared by both queue roles: the mapped region, the queue header
/// view, and the ring arithmetic over the bytes past the header.
struct QueueCore {
    /// Owns the mapping lifetime; dropped last.
    _memory: MemoryFile,
    buffer: CircularBuffer,
    header: *const QueueHeader,
    options: QueueOptions,
}

// The region is an OS mapping shared across processes; nothing in the core
// is tied to the constructing thread.
unsafe impl Send for QueueCore {}

impl QueueCore {
    fn create(options: QueueOptions) -> Result<Self, QueueError> {
        options.validate()?;
        let memory = MemoryFile::create_or_open(
            &options.path,
            &options.queue_name,
            options.bytes_capacity() as u64,
            options.create_or_override,
        )?;
        let base = memory.view().ptr();
        let header = base as *const QueueHeader;
        // SAFETY: the mapping is bytes_capacity() long, which is exactly the
        // header plus a capacity-sized ring.
        let buffer = unsafe { CircularBuffer::new(base.add(QUEUE_HEADER_SIZE), options.capacity) };
        Ok(Self {
            _memory: memory,
            buffer,
            header,
            options,
        })
    }

    /// # Safety
    /// Safe because the mapping starts with a `QueueHeader` (zero
    /// initialized at creation, which is the valid empty-queue state) and
    /// outlives `self`.
    #[inline(always)]
    fn header(&self) -> &QueueHeader {
        unsafe { &*self.header }
    }

    #[inline(always)]
    fn capacity(&self) -> i64 {
        self.options.capacity as i64
    }
}

/// The writing role of a queue.
///
/// Creates the shared region if it does not exist yet, attaches otherwise,
/// and runs the wake-up signal server for this process.
pub struct Publisher {
    // Declared before `core` so the signal is released before the mapping.
    signal: SignalReleaser,
    core: QueueCore,
}

impl Publisher {
    pub fn create(options: QueueOptions) -> Result<Self, QueueError> {
        let core = QueueCore::create(options)?;
        // A signal failure here rolls the mapping back by dropping `core`.
        let signal = SignalReleaser::create(&core.options.path, &core.options.queue_name)?;
        debug!(
            queue = %core.options.queue_name,
            capacity = core.options.capacity,
            "publisher attached"
        );
        Ok(Self { signal, core })
    }

    /// Enqueues `body` if the ring currently has room for its frame.
    ///
    /// Returns `Ok(false)` when it does not; a full queue is a normal
    /// condition, not an error.
    pub fn try_enqueue(&mut self, body: &[u8]) -> Result<bool, QueueError> {
        if body.is_empty() {
            return Err(QueueError::EmptyMessage);
        }
        let capacity = self.core.capacity();
        let frame_len = frame_length(body.len()) as i64;
        if frame_len > capacity {
            return Err(QueueError::MessageTooLarge {
                body_length: body.len(),
                capacity: capacity as usize,
            });
        }

        let header = self.core.header();
        let tail = loop {
            let tail = header.tail.load(Ordering::Acquire);
            let head = header.head.load(Ordering::Acquire);
            if tail - head + frame_len > capacity {
                return Ok(false);
            }
            let next = safe_increment(tail, frame_len, capacity);
            if header
                .tail
                .compare_exchange_weak(tail, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break tail;
            }
        };

        // SAFETY: the frame starting at `tail` was reserved by the CAS above
        // and frame starts are always 8-aligned.
        let message = unsafe { self.core.buffer.header_at(tail) };
        message.body_length.store(body.len() as i32, Ordering::Relaxed);
        message
            .state
            .store(state::LOCKED_TO_BE_ENQUEUED, Ordering::Relaxed);
        self.core.buffer.write(tail + MESSAGE_HEADER_I64, body);

        // The release ordering here is what makes the body bytes visible to
        // a subscriber that observes READY_TO_BE_CONSUMED.
        if let Err(found) = message.state.compare_exchange(
            state::LOCKED_TO_BE_ENQUEUED,
            state::READY_TO_BE_CONSUMED,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            panic!(
                "frame at offset {tail} moved to state {found} while locked for enqueue; \
                 the shared queue region is corrupt"
            );
        }

        self.signal.release();
        Ok(true)
    }

    /// Enqueues `body`, backing off and retrying while the queue is full.
    ///
    /// There is no "space available" signal to park on, so the wait is a
    /// poll: a handful of yields, then sleeps growing to 10 ms. The token is
    /// checked every round.
    pub fn enqueue(&mut self, body: &[u8], cancellation: &CancellationToken) -> Result<(), QueueError> {
        let mut attempt: u32 = 0;
        loop {
            cancellation.bail_if_cancelled()?;
            if self.try_enqueue(body)? {
                return Ok(());
            }
            if attempt < 10 {
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_millis(u64::from(attempt - 9).min(10)));
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

/// The reading role of a queue.
///
/// Attaches to the shared region and connects (lazily) to the queue's
/// wake-up signal to park on while the queue is empty.
pub struct Subscriber {
    signal: SignalWaiter,
    core: QueueCore,
}

impl Subscriber {
    pub fn create(options: QueueOptions) -> Result<Self, QueueError> {
        let core = QueueCore::create(options)?;
        let signal = SignalWaiter::create(&core.options.path, &core.options.queue_name)?;
        debug!(
            queue = %core.options.queue_name,
            capacity = core.options.capacity,
            "subscriber attached"
        );
        Ok(Self { signal, core })
    }

    /// Claims and returns the oldest message, or `None` when nothing is
    /// ready to be consumed.
    pub fn try_dequeue(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, QueueError> {
        let mut body = Vec::new();
        Ok(self.try_dequeue_into(&mut body, cancellation)?.then_some(body))
    }

    /// Like [`try_dequeue`](Self::try_dequeue), but reuses the allocation of
    /// `body`; on success its previous contents are replaced by the message.
    pub fn try_dequeue_into(
        &mut self,
        body: &mut Vec<u8>,
        cancellation: &CancellationToken,
    ) -> Result<bool, QueueError> {
        cancellation.bail_if_cancelled()?;
        let capacity = self.core.capacity();
        let header = self.core.header();

        let head = header.head.load(Ordering::Acquire);
        if head == header.tail.load(Ordering::Acquire) {
            return Ok(false);
        }

        // SAFETY: `head != tail`, so `head` is the 8-aligned start of a
        // frame inside the live range.
        let message = unsafe { self.core.buffer.header_at(head) };
        if message
            .state
            .compare_exchange(
                state::READY_TO_BE_CONSUMED,
                state::LOCKED_TO_BE_CONSUMED,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_err()
        {
            // Not yet committed by its publisher, or another subscriber owns
            // it. Either way there is nothing for us here right now.
            return Ok(false);
        }

        // Lock-then-recheck: if another subscriber advanced the head between
        // our load and our lock, the frame we locked is no longer the head.
        // Revert the speculative lock and report no message.
        if header.head.load(Ordering::Acquire) != head {
            if message
                .state
                .compare_exchange(
                    state::LOCKED_TO_BE_CONSUMED,
                    state::READY_TO_BE_CONSUMED,
                    Ordering::Release,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                panic!(
                    "frame at offset {head} changed state while this subscriber held its lock; \
                     the shared queue region is corrupt"
                );
            }
            return Ok(false);
        }

        let body_length = message.body_length.load(Ordering::Relaxed) as usize;
        let frame_len = frame_length(body_length) as i64;
        self.core
            .buffer
            .read_into(head + MESSAGE_HEADER_I64, body_length, body);

        // Hygiene: zero the body, then the header, so orphaned bytes can
        // never be misread as a live message later.
        self.core
            .buffer
            .clear(head + MESSAGE_HEADER_I64, frame_len as usize - MESSAGE_HEADER_SIZE);
        message.body_length.store(0, Ordering::Relaxed);
        message.state.store(state::EMPTY, Ordering::Release);

        let next = safe_increment(head, frame_len, capacity);
        if header
            .head
            .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            panic!(
                "head offset moved past {head} while this subscriber held the frame lock; \
                 the shared queue region is corrupt"
            );
        }
        Ok(true)
    }

    /// Dequeues the oldest message, parking on the wake-up signal while the
    /// queue is empty.
    pub fn dequeue(&mut self, cancellation: &CancellationToken) -> Result<Vec<u8>, QueueError> {
        let mut body = Vec::new();
        self.dequeue_into(&mut body, cancellation)?;
        Ok(body)
    }

    /// Blocking dequeue reusing the allocation of `body`.
    ///
    /// The wait is a bounded back-off poll: a few yields, then signal waits
    /// growing from 1 ms to a steady 10 ms. The signal is a latency hint,
    /// never load bearing; a lost wake-up delays the next poll by at most
    /// 10 ms.
    pub fn dequeue_into(
        &mut self,
        body: &mut Vec<u8>,
        cancellation: &CancellationToken,
    ) -> Result<(), QueueError> {
        let mut attempt: u32 = 0;
        loop {
            if self.try_dequeue_into(body, cancellation)? {
                return Ok(());
            }
            match attempt {
                0..=4 => thread::yield_now(),
                5..=14 => {
                    self.signal.wait(Duration::from_millis(u64::from(attempt - 4)));
                }
                _ => {
                    self.signal.wait(Duration::from_millis(10));
                }
            }
            attempt = attempt.saturating_add(1);
        }
    }
}
