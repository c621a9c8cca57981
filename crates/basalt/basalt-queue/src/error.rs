use thiserror::Error;

/// Failures surfaced by queue construction and messaging calls.
///
/// A full queue is deliberately absent: `try_enqueue` reports it as
/// `Ok(false)` and the blocking `enqueue` retries, because running out of
/// ring space is a normal operating condition rather than a fault.
#[derive(Debug, Error)]
pub enum QueueError {
    /// An option was out of range at construction time.
    #[error("invalid queue option: {0}")]
    InvalidOption(&'static str),

    /// A zero-length body was handed to a publish call.
    #[error("message body must not be empty")]
    EmptyMessage,

    /// The framed message cannot fit in the ring even when it is empty.
    #[error("a message of {body_length} bytes cannot fit in a queue of {capacity} bytes")]
    MessageTooLarge { body_length: usize, capacity: usize },

    /// Cancellation tripped at a suspension point. The queue state is
    /// unchanged.
    #[error("the operation was cancelled")]
    Cancelled,

    /// The backing file, the mapping, or the signal transport failed.
    #[error("queue storage failure")]
    Io(#[from] std::io::Error),
}
