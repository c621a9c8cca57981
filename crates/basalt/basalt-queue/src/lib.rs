//! `basalt-queue`: a brokerless FIFO message queue between processes.
//!
//! Processes on one host attach to a named queue backed by a fixed-size
//! shared memory ring and exchange variable length byte messages. Any number
//! of publishers and subscribers may coexist, within one process or across
//! many; delivery is FIFO in commit order and each message is consumed by
//! exactly one subscriber.
//!
//! # Core types
//!
//! - [`Publisher`]: reserves ring space, writes a frame, commits it.
//! - [`Subscriber`]: claims the head frame, copies the body out, advances.
//! - [`QueueOptions`]: name, directory, and ring capacity of a queue.
//! - [`CancellationToken`]: cooperative cancellation for the blocking calls.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐    shared memory region     ┌────────────┐
//! │ Publisher │ ─────────────────────────── │ Subscriber │
//! │(Process A)│   [header][circular ring]   │ (Process B)│
//! └───────────┘                             └────────────┘
//!       │          wake-up signal (hint)    ┌────────────┐
//!       └───────────────────────────────────│ Subscriber │
//!                                           │ (Process C)│
//!                                           └────────────┘
//! ```
//!
//! Coordination is lock free: a head offset, a tail offset, and a per-frame
//! state word, all CAS-updated with acquire/release ordering. An out-of-band
//! wake-up signal lets idle subscribers park instead of spinning; it is a
//! latency hint only and may be lost or coalesced without affecting
//! correctness.
//!
//! # Example
//!
//! ```ignore
//! use basalt_queue::{CancellationToken, Publisher, QueueOptions, Subscriber};
//!
//! let options = QueueOptions::new("telemetry", "/tmp", 64 * 1024);
//! let mut publisher = Publisher::create(options.clone())?;
//! let mut subscriber = Subscriber::create(options)?;
//!
//! publisher.try_enqueue(b"hello")?;
//! let token = CancellationToken::default();
//! let body = subscriber.dequeue(&token)?;
//! assert_eq!(body, b"hello");
//! ```
//!
//! # Internal modules
//!
//! - `layout`: the on-shared-memory header and frame layout
//! - `ring`: wrap-aware byte access and overflow-safe offset arithmetic
//! - `queue`: the publisher and subscriber protocol
//! - `options`, `error`, `cancellation`: construction surface

mod cancellation;
mod error;
mod layout;
mod options;
mod queue;
mod ring;

pub use cancellation::{CancellationSource, CancellationToken};
pub use error::QueueError;
pub use layout::{MESSAGE_HEADER_SIZE, QUEUE_HEADER_SIZE, frame_length};
pub use options::QueueOptions;
pub use queue::{Publisher, Subscriber};
