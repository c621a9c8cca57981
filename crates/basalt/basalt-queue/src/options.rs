use crate::error::QueueError;
use crate::layout::QUEUE_HEADER_SIZE;
use serde::Deserialize;
use std::path::PathBuf;

/// Identity and sizing of a shared queue.
///
/// Every process attaching to the same queue must use the same `queue_name`,
/// `path`, and `capacity`; the mapped region is sized once at creation and
/// never resized.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueOptions {
    /// Queue name, used in OS object names and file names.
    pub queue_name: String,

    /// Directory under which the backing file and the signal sockets live.
    /// Ignored on Windows, where the region is a named section.
    pub path: PathBuf,

    /// Ring size in bytes. Must be positive and a multiple of 8 so that
    /// frames always start 8-aligned.
    pub capacity: usize,

    /// When the backing file already exists, re-create it destructively and
    /// take over the delete-on-drop responsibility. When false, attach
    /// non-destructively. Racing re-creators are resolved last-writer-wins;
    /// holders of a prior mapping keep it until they re-open.
    #[serde(default)]
    pub create_or_override: bool,
}

impl QueueOptions {
    pub fn new(queue_name: impl Into<String>, path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            queue_name: queue_name.into(),
            path: path.into(),
            capacity,
            create_or_override: false,
        }
    }

    /// Total size of the mapped region: queue header plus ring.
    pub fn bytes_capacity(&self) -> usize {
        QUEUE_HEADER_SIZE + self.capacity
    }

    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.queue_name.is_empty() {
            return Err(QueueError::InvalidOption("queue_name must not be empty"));
        }
        if self.capacity == 0 {
            return Err(QueueError::InvalidOption("capacity must be positive"));
        }
        if self.capacity % 8 != 0 {
            return Err(QueueError::InvalidOption("capacity must be a multiple of 8"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_options() {
        let ok = QueueOptions::new("q", "/tmp", 128);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.bytes_capacity(), 144);

        assert!(QueueOptions::new("", "/tmp", 128).validate().is_err());
        assert!(QueueOptions::new("q", "/tmp", 0).validate().is_err());
        assert!(QueueOptions::new("q", "/tmp", 100).validate().is_err());
    }
}
