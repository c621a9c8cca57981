//! On-shared-memory layout of a queue region.
//!
//! The mapped region is `[QueueHeader][ring of capacity bytes]` and the same
//! bytes are interpreted by every attached process, so everything here is
//! `#[repr(C)]`, little-endian, naturally aligned, and must never change
//! size without a protocol break.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  head (8B atomic) │ tail (8B atomic)                         │  QueueHeader
//! ├──────────────────────────────────────────────────────────────┤
//! │  frame │ frame │ ...                          (capacity B)   │  ring
//! └──────────────────────────────────────────────────────────────┘
//!
//! frame = [ state (4B atomic) │ body_length (4B) ][ body ][ pad to 8 ]
//! ```
//!
//! `head` and `tail` are monotonically growing byte offsets; their value
//! modulo the ring capacity is the ring index. The capacity is required to
//! be a multiple of 8 and frames always start 8-aligned, so a
//! [`MessageHeader`] never straddles the wrap point.

use std::mem::size_of;
use std::sync::atomic::{AtomicI32, AtomicI64};

/// Bytes occupied by [`QueueHeader`] at offset 0 of the region.
pub const QUEUE_HEADER_SIZE: usize = size_of::<QueueHeader>();

/// Bytes occupied by a [`MessageHeader`] at the start of every frame.
pub const MESSAGE_HEADER_SIZE: usize = size_of::<MessageHeader>();

/// Shared queue state at the start of the mapped region.
///
/// These two words, together with the per-message state, are the only
/// cross-process coordination points of the whole protocol.
#[repr(C)]
pub struct QueueHeader {
    /// Offset of the oldest unconsumed message header. Subscribers advance
    /// it with CAS; publishers only read it.
    pub head: AtomicI64,

    /// Offset one past the newest fully committed message. Publishers
    /// reserve frames by CASing it forward; subscribers only read it.
    pub tail: AtomicI64,
}

/// Per-message state machine values.
///
/// A frame moves `EMPTY → LOCKED_TO_BE_ENQUEUED → READY_TO_BE_CONSUMED →
/// LOCKED_TO_BE_CONSUMED → EMPTY`. Only the `READY_TO_BE_CONSUMED →
/// LOCKED_TO_BE_CONSUMED` edge is contended (subscribers racing for the
/// head); every other edge has a unique writer.
pub mod state {
    pub const EMPTY: i32 = 0;
    pub const LOCKED_TO_BE_ENQUEUED: i32 = 1;
    pub const READY_TO_BE_CONSUMED: i32 = 2;
    pub const LOCKED_TO_BE_CONSUMED: i32 = 3;
}

/// Header preceding every message body in the ring.
#[repr(C)]
pub struct MessageHeader {
    /// One of the [`state`] values.
    pub state: AtomicI32,

    /// Body byte count. Bounded by the ring capacity, so 32 bits suffice.
    /// Written before the frame becomes ready and stable while any reader
    /// can observe it; atomic only because the slot is shared memory.
    pub body_length: AtomicI32,
}

/// Rounds `n` up to the next multiple of 8.
#[inline(always)]
pub const fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Total frame length for a body of `body_length` bytes: header plus body,
/// padded to the 8-byte boundary the next frame starts on.
#[inline(always)]
pub const fn frame_length(body_length: usize) -> usize {
    align8(MESSAGE_HEADER_SIZE + body_length)
}
