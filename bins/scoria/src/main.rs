use anyhow::Context;
use basalt_config::config::BasaltConfig;
use basalt_queue::{CancellationToken, QueueOptions, Subscriber};
use std::time::{Duration, Instant};
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

    let options = QueueOptions::new(&config.queue_name, &config.path, config.capacity);
    let mut subscriber =
        Subscriber::create(options).context("unable to attach to queue (start pumice first)")?;

    info!(
        "SCORIA: attached to '{name}' under {path}. Reading...",
        name = &config.queue_name,
        path = &config.path
    );

    let token = CancellationToken::default();
    let mut body = Vec::new();
    let mut last = Instant::now();
    let mut count: u64 = 0;
    let mut last_seq: u64 = 0;

    loop {
        while subscriber.try_dequeue_into(&mut body, &token)? {
            if body.len() >= 8 {
                last_seq = u64::from_le_bytes(body[..8].try_into()?);
            }
            count += 1;
        }

        if last.elapsed() >= Duration::from_secs(1) {
            info!("SCORIA: read rate ~ {count} msg/s | last_seq={last_seq}");
            count = 0;
            last = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}
