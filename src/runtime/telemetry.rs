use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls
/// back to `info`. Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Lightweight rolling counters for the ingestion stages.
#[derive(Default, Debug)]
pub struct Telemetry {
    blocks_received: AtomicU64,
    blocks_decoded: AtomicU64,
    blocks_persisted: AtomicU64,
    stream_reconnects: AtomicU64,
}

impl Telemetry {
    pub fn record_block_received(&self) {
        self.blocks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block_decoded(&self) {
        self.blocks_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block_persisted(&self) {
        self.blocks_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_reconnect(&self) {
        self.stream_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blocks_received(&self) -> u64 {
        self.blocks_received.load(Ordering::Relaxed)
    }

    pub fn blocks_decoded(&self) -> u64 {
        self.blocks_decoded.load(Ordering::Relaxed)
    }

    pub fn blocks_persisted(&self) -> u64 {
        self.blocks_persisted.load(Ordering::Relaxed)
    }

    pub fn stream_reconnects(&self) -> u64 {
        self.stream_reconnects.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            blocks_received: self.blocks_received(),
            blocks_decoded: self.blocks_decoded(),
            blocks_persisted: self.blocks_persisted(),
            stream_reconnects: self.stream_reconnects(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub blocks_received: u64,
    pub blocks_decoded: u64,
    pub blocks_persisted: u64,
    pub stream_reconnects: u64,
}

/// Spawns a background task that periodically logs throughput and stage
/// counters until the shutdown token fires.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "ledgersink::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    let persisted_delta = current
                        .blocks_persisted
                        .saturating_sub(last_snapshot.blocks_persisted);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        persisted_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "ledgersink::metrics",
                        throughput = format!("{throughput:.2}"),
                        received = current.blocks_received,
                        decoded = current.blocks_decoded,
                        persisted = current.blocks_persisted,
                        reconnects = current.stream_reconnects,
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
