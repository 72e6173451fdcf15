use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{BlockPipeline, PipelineHandle};

/// Coordinates the pipeline lifecycle and handles OS signals for graceful
/// shutdowns.
pub struct Runner {
    pipeline: BlockPipeline,
    shutdown: CancellationToken,
    handle: Option<PipelineHandle>,
}

impl Runner {
    /// Creates a new runner and wires a root [`CancellationToken`] that
    /// propagates through the entire pipeline (receiver, processors,
    /// writers, metrics reporter).
    pub fn new(mut pipeline: BlockPipeline) -> Self {
        let shutdown = CancellationToken::new();
        pipeline.replace_shutdown_root(shutdown.clone());
        Self {
            pipeline,
            shutdown,
            handle: None,
        }
    }

    /// Returns a clone of the root shutdown token so external callers can
    /// integrate with their own signal handlers or cancellation
    /// strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts the pipeline if it is not already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        self.handle = Some(self.pipeline.start().await?);
        Ok(())
    }

    /// Stops the pipeline gracefully and returns the first fatal error of
    /// the run, if any.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.shutdown.cancel();
        handle.cancel();
        let result = handle.join().await;
        self.pipeline.close_source();
        self.reinitialize_shutdown_token();
        result
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is
    /// cancelled elsewhere (including by a fatal pipeline error).
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.start().await?;
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }

    fn reinitialize_shutdown_token(&mut self) {
        self.shutdown = CancellationToken::new();
        self.pipeline.replace_shutdown_root(self.shutdown.clone());
    }
}
