//! Cross-process receiver wake-up signal for basalt queues.
//!
//! Publishers raise the signal after committing a message so that parked
//! subscribers in other processes retry immediately instead of waiting out
//! their poll interval. The signal is a latency hint only: it may be lost or
//! coalesced, and no correctness argument depends on delivery. A subscriber
//! that never hears a signal still makes progress through its bounded
//! back-off poll.
//!
//! # Contract
//!
//! - [`SignalReleaser::release`] wakes at least one waiter that is parked at
//!   the moment of release, if any is.
//! - [`SignalWaiter::wait`] returns `true` when a release arrived and `false`
//!   when the timeout elapsed.
//!
//! # Transports
//!
//! There is no portable, leak-free named semaphore on POSIX, so the signal
//! is carried over a unix domain socket fan-out: each publishing process
//! runs a tiny server at `<root>/.cloudtoid/interprocess/sock/<queue><N>.sock`
//! (`N` random, retried on collision) and every subscriber process connects
//! as a client and blocks on a one-byte read. A client that cannot reach any
//! server degrades to a plain timer, still correct, only slower.
//!
//! On Windows both sides share one named kernel semaphore.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{SignalReleaser, SignalWaiter};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{SignalReleaser, SignalWaiter};
