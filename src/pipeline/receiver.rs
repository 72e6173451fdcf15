use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::pipeline::Backoff;
use crate::runtime::telemetry::Telemetry;
use crate::source::{BlockSource, RawBlock};

/// Owns the live stream subscription and the resubscribe loop.
///
/// Each delivery attempt gets its own short-lived bounded channel so a
/// failing attempt's buffered blocks die with it instead of leaking into
/// the next attempt. Blocks are forwarded to the raw queue in source
/// order; the receiver holds the queue's only sender, so dropping it on
/// exit is what closes the queue.
pub struct Receiver {
    source: Arc<dyn BlockSource>,
    backoff: Backoff,
    attempt_buffer: usize,
    start_block: u64,
    telemetry: Arc<Telemetry>,
}

enum StreamExit {
    /// Scope cancelled; terminal.
    Cancelled,
    /// Per-attempt channel closed; reconnect with backoff.
    Disconnected,
    /// The raw queue's consumers are gone; terminal.
    DownstreamClosed,
}

impl Receiver {
    pub fn new(
        source: Arc<dyn BlockSource>,
        backoff: Backoff,
        attempt_buffer: usize,
        start_block: u64,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            source,
            backoff,
            attempt_buffer,
            start_block,
            telemetry,
        }
    }

    #[tracing::instrument(name = "receiver", skip_all, fields(start_block = self.start_block))]
    pub async fn run(mut self, scope: CancellationToken, out: mpsc::Sender<RawBlock>) {
        tracing::info!("receiver started");

        loop {
            if scope.is_cancelled() {
                break;
            }

            let (attempt_tx, mut attempt_rx) = mpsc::channel(self.attempt_buffer.max(1));
            match self
                .source
                .start_deliver(scope.clone(), self.start_block, attempt_tx)
            {
                Ok(()) => {
                    self.backoff.reset();
                    match self.consume(&scope, &mut attempt_rx, &out).await {
                        StreamExit::Cancelled | StreamExit::DownstreamClosed => break,
                        StreamExit::Disconnected => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to initiate block delivery");
                }
            }

            self.telemetry.record_stream_reconnect();
            let delay = self.backoff.next();
            tracing::info!(delay_ms = delay.as_millis() as u64, "stream closed; reconnecting");
            tokio::select! {
                _ = scope.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        tracing::info!("receiver stopped");
    }

    async fn consume(
        &self,
        scope: &CancellationToken,
        attempt_rx: &mut mpsc::Receiver<RawBlock>,
        out: &mpsc::Sender<RawBlock>,
    ) -> StreamExit {
        loop {
            let raw = tokio::select! {
                _ = scope.cancelled() => return StreamExit::Cancelled,
                raw = attempt_rx.recv() => match raw {
                    None => return StreamExit::Disconnected,
                    Some(raw) => raw,
                },
            };

            if raw.is_empty() {
                continue;
            }

            self.telemetry.record_block_received();
            tokio::select! {
                _ = scope.cancelled() => return StreamExit::Cancelled,
                sent = out.send(raw) => {
                    if sent.is_err() {
                        tracing::warn!("raw queue closed; receiver exiting");
                        return StreamExit::DownstreamClosed;
                    }
                }
            }
        }
    }
}
