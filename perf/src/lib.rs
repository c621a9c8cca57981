//! Shared helpers for basalt benchmarks.

use basalt_queue::QueueOptions;

/// Queue options rooted at a unique `/tmp` directory so parallel bench runs
/// never collide.
pub fn temp_queue_options(tag: &str, capacity: usize) -> QueueOptions {
    let pid = std::process::id();
    QueueOptions::new("bench", format!("/tmp/basalt_perf_{tag}_{pid}"), capacity)
}

/// Removes a bench queue's on-disk artifacts.
pub fn cleanup(options: &QueueOptions) {
    let _ = std::fs::remove_dir_all(&options.path);
}
