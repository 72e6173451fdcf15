//! Pipeline wiring and lifecycle.
//!
//! The orchestrator consults the store tip, asks the source to deliver
//! from the next block, and wires receiver → raw queue → processor pool →
//! parsed queue → writer pool. Queues close by ownership: the receiver
//! holds the only raw sender and the processors jointly hold the parsed
//! senders, so each queue closes exactly once when its producer side is
//! done. A single fatal sink remembers the first terminal error and
//! cancels the run.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::receiver::Receiver;
use crate::pipeline::{processor, writer, Backoff, PipelineError, PipelineStage};
use crate::runtime::config::IngestConfig;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::{self, Telemetry};
use crate::source::BlockSource;
use crate::store::IngestStore;

pub struct BlockPipeline {
    config: IngestConfig,
    store: Arc<dyn IngestStore>,
    source: Arc<dyn BlockSource>,
    telemetry: Arc<Telemetry>,
    shutdown_root: CancellationToken,
}

impl BlockPipeline {
    /// Creates a pipeline with its own root cancellation token. Use
    /// [`Self::with_cancellation_token`] to integrate with an existing
    /// shutdown mechanism.
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn IngestStore>,
        source: Arc<dyn BlockSource>,
    ) -> Self {
        Self::with_cancellation_token(config, store, source, CancellationToken::new())
    }

    pub fn with_cancellation_token(
        config: IngestConfig,
        store: Arc<dyn IngestStore>,
        source: Arc<dyn BlockSource>,
        shutdown_root: CancellationToken,
    ) -> Self {
        Self {
            config: config.normalized(),
            store,
            source,
            telemetry: Arc::new(Telemetry::default()),
            shutdown_root,
        }
    }

    /// Returns a clone of the telemetry handle for observability.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Replaces the root shutdown token. Must only be called between runs.
    pub fn replace_shutdown_root(&mut self, shutdown: CancellationToken) {
        self.shutdown_root = shutdown;
    }

    /// Releases the upstream source's resources.
    pub fn close_source(&self) {
        self.source.close();
    }

    /// Spawns all pipeline stages and returns a handle that yields the
    /// first fatal error (or `Ok` after a clean cancellation) when
    /// awaited.
    pub async fn start(&self) -> Result<PipelineHandle> {
        let tip = self
            .store
            .tip()
            .await
            .context("failed to query store tip")?;
        let start_block = match tip {
            Some(tip) => tip + 1,
            None => self.config.stream.start_block,
        };
        tracing::info!(
            ?tip,
            start_block,
            processors = self.config.pipeline.processor_count,
            writers = self.config.pipeline.writer_count,
            "starting ingestion pipeline"
        );

        let run_token = self.shutdown_root.child_token();
        let fatal = Arc::new(FatalErrorHandler::new(
            self.shutdown_root.clone(),
            run_token.clone(),
        ));

        let (raw_tx, raw_rx) = mpsc::channel(self.config.pipeline.raw_buffer.max(1));
        let (parsed_tx, parsed_rx) = mpsc::channel(self.config.pipeline.parsed_buffer.max(1));

        let mut tasks: Vec<(PipelineStage, JoinHandle<()>)> = Vec::new();

        let receiver = Receiver::new(
            self.source.clone(),
            Backoff::from_config(&self.config.backoff),
            self.config.pipeline.attempt_buffer,
            start_block,
            self.telemetry.clone(),
        );
        tasks.push((
            PipelineStage::Receive,
            tokio::spawn(receiver.run(run_token.clone(), raw_tx)),
        ));

        let raw_shared = Arc::new(Mutex::new(raw_rx));
        for id in 0..self.config.pipeline.processor_count {
            let ctx = processor::ProcessorContext {
                raw: raw_shared.clone(),
                parsed: parsed_tx.clone(),
                fatal: fatal.clone(),
                telemetry: self.telemetry.clone(),
            };
            tasks.push((
                PipelineStage::Decode,
                tokio::spawn(processor::run(id, run_token.clone(), ctx)),
            ));
        }
        // The processor tasks hold the remaining parsed senders; the queue
        // closes when the last of them exits.
        drop(parsed_tx);

        let parsed_shared = Arc::new(Mutex::new(parsed_rx));
        for id in 0..self.config.pipeline.writer_count {
            let sink = self
                .store
                .dedicated_sink()
                .await
                .context("failed to open dedicated writer connection")?;
            let ctx = writer::WriterContext {
                parsed: parsed_shared.clone(),
                fatal: fatal.clone(),
                telemetry: self.telemetry.clone(),
                drain_timeout: self.config.pipeline.drain_timeout,
            };
            tasks.push((
                PipelineStage::Persist,
                tokio::spawn(writer::run(id, run_token.clone(), sink, ctx)),
            ));
        }

        let metrics = telemetry::spawn_metrics_reporter(
            self.telemetry.clone(),
            run_token.clone(),
            self.config.pipeline.metrics_interval,
        );

        Ok(PipelineHandle {
            tasks,
            metrics,
            fatal,
            run_token,
        })
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    tasks: Vec<(PipelineStage, JoinHandle<()>)>,
    metrics: JoinHandle<()>,
    fatal: Arc<FatalErrorHandler>,
    run_token: CancellationToken,
}

impl PipelineHandle {
    /// Requests a graceful stop of this run.
    pub fn cancel(&self) {
        self.run_token.cancel();
    }

    /// Waits for every stage to settle and returns the first fatal error
    /// reported by any task, or `Ok` if all completed cleanly.
    pub async fn join(self) -> Result<()> {
        for (stage, handle) in self.tasks {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    self.fatal.trigger(PipelineError::new(
                        stage,
                        anyhow!("{stage:?} task panicked"),
                    ));
                } else {
                    tracing::warn!(stage = ?stage, error = %err, "stage task aborted");
                }
            }
        }

        // All stages are done; stop the metrics reporter as well.
        self.run_token.cancel();
        if let Err(err) = self.metrics.await {
            tracing::warn!(error = %err, "metrics reporter task panicked");
        }

        match self.fatal.error() {
            Some(err) => Err(err).context("ingestion pipeline aborted"),
            None => Ok(()),
        }
    }
}
