use anyhow::Context;
use basalt_config::config::BasaltConfig;
use basalt_queue::{CancellationToken, Publisher, QueueOptions};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => BasaltConfig::load(&path)?,
        None => BasaltConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")),
        )
        .init();

    let mut options = QueueOptions::new(&config.queue_name, &config.path, config.capacity);
    options.create_or_override = true;
    let mut publisher = Publisher::create(options).context("unable to create queue publisher")?;

    info!(
        "PUMICE: publishing {count} messages of {size} B to '{name}' under {path} (cap={capacity})",
        count = config.message_count,
        size = config.message_size,
        name = &config.queue_name,
        path = &config.path,
        capacity = config.capacity
    );

    let token = CancellationToken::default();
    let mut body = vec![0u8; config.message_size.max(8)];
    let start = Instant::now();

    for i in 0..config.message_count {
        body[..8].copy_from_slice(&i.to_le_bytes());
        publisher.enqueue(&body, &token)?;
    }

    let elapsed = start.elapsed();
    let rate = config.message_count as f64 / elapsed.as_secs_f64();
    info!(
        "PUMICE: published {count} messages in {elapsed:?} ({rate:.0} msg/s)",
        count = config.message_count
    );

    Ok(())
}
