//! Shared memory backing storage for basalt queues.
//!
//! A queue lives in a single contiguous region shared by every process that
//! attaches to it. This crate owns the lifetime of that region:
//!
//! - [`MemoryFile`] creates or opens the backing OS object and decides who is
//!   responsible for deleting it again.
//! - [`MemoryView`] is the mapping itself: a stable base pointer plus length,
//!   valid for as long as the value is alive.
//!
//! On POSIX hosts the region is a regular file under
//! `<root>/.cloudtoid/interprocess/mmf/<queue>.qu`, mapped read/write with
//! `mmap`. The first process to create the file owns it and unlinks it on
//! drop; late joiners attach without taking ownership. Unlinking while
//! another process still maps the file is safe, its mapping survives until it
//! is dropped.
//!
//! On Windows the region is a pagefile-backed named section (`CT_IP_<queue>`)
//! and the kernel reference count handles deletion, so there is no filesystem
//! artifact and no ownership flag to track.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{MemoryFile, MemoryView, queue_file_path};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{MemoryFile, MemoryView, section_name};
