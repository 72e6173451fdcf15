use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::decode::{self, ProcessedBlock};
use crate::pipeline::{PipelineError, PipelineStage};
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::Telemetry;
use crate::source::RawBlock;

/// Shared handles of one processor task. The raw receiver sits behind an
/// async mutex so the pool can fan out over a single queue.
pub(crate) struct ProcessorContext {
    pub raw: Arc<Mutex<mpsc::Receiver<RawBlock>>>,
    pub parsed: mpsc::Sender<ProcessedBlock>,
    pub fatal: Arc<FatalErrorHandler>,
    pub telemetry: Arc<Telemetry>,
}

/// Decode-stage worker: pops raw blocks, decodes them, forwards the
/// result. A decoder error is structural corruption and fatal for the
/// whole pipeline; the task reports it and exits.
#[tracing::instrument(name = "processor", skip_all, fields(processor = id))]
pub(crate) async fn run(id: usize, scope: CancellationToken, ctx: ProcessorContext) {
    tracing::info!("processor started");

    loop {
        let raw = {
            let mut raw_rx = ctx.raw.lock().await;
            tokio::select! {
                _ = scope.cancelled() => {
                    tracing::info!("processor stopping");
                    return;
                }
                raw = raw_rx.recv() => raw,
            }
        };

        let Some(raw) = raw else {
            tracing::info!("raw queue closed; processor finished");
            return;
        };
        if raw.is_empty() {
            continue;
        }

        let block = match decode::decode(&raw) {
            Ok(block) => block,
            Err(err) => {
                ctx.fatal
                    .trigger(PipelineError::new(PipelineStage::Decode, err.into()));
                return;
            }
        };
        ctx.telemetry.record_block_decoded();

        tokio::select! {
            _ = scope.cancelled() => {
                tracing::info!("processor stopping before send");
                return;
            }
            sent = ctx.parsed.send(block) => {
                if sent.is_err() {
                    tracing::warn!("parsed queue closed; processor exiting");
                    return;
                }
            }
        }
    }
}
