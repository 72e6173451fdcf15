use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::decode::ProcessedBlock;
use crate::pipeline::{PipelineError, PipelineStage};
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::Telemetry;
use crate::store::BlockSink;

pub(crate) struct WriterContext {
    pub parsed: Arc<Mutex<mpsc::Receiver<ProcessedBlock>>>,
    pub fatal: Arc<FatalErrorHandler>,
    pub telemetry: Arc<Telemetry>,
    pub drain_timeout: Duration,
}

enum Next {
    Item(Box<ProcessedBlock>),
    Closed,
    Cancelled,
}

/// Persist-stage worker. The sink is bound to a dedicated connection for
/// the task's lifetime; the connection is released when the task drops
/// the sink on exit.
#[tracing::instrument(name = "writer", skip_all, fields(writer = id))]
pub(crate) async fn run(
    id: usize,
    scope: CancellationToken,
    mut sink: Box<dyn BlockSink>,
    ctx: WriterContext,
) {
    tracing::info!("writer started");

    loop {
        let next = {
            let mut parsed_rx = ctx.parsed.lock().await;
            tokio::select! {
                _ = scope.cancelled() => Next::Cancelled,
                item = parsed_rx.recv() => match item {
                    Some(block) => Next::Item(Box::new(block)),
                    None => Next::Closed,
                },
            }
        };

        match next {
            Next::Cancelled => {
                drain(&mut sink, &ctx).await;
                tracing::info!("writer stopped after cancellation");
                return;
            }
            Next::Closed => {
                tracing::info!("parsed queue closed; writer finished");
                return;
            }
            Next::Item(block) => {
                if let Err(err) = sink.persist(&block).await {
                    ctx.fatal
                        .trigger(PipelineError::new(PipelineStage::Persist, err.into()));
                    return;
                }
                ctx.telemetry.record_block_persisted();
            }
        }
    }
}

/// Best-effort drain after cancellation: persist blocks already buffered
/// in the parsed queue, bounded by the drain deadline. Items still in
/// flight upstream are dropped; idempotent re-delivery covers them on the
/// next run.
async fn drain(sink: &mut Box<dyn BlockSink>, ctx: &WriterContext) {
    let deadline = Instant::now() + ctx.drain_timeout;
    let mut drained = 0usize;

    loop {
        let item = {
            let mut parsed_rx = ctx.parsed.lock().await;
            parsed_rx.try_recv()
        };
        let block = match item {
            Ok(block) => block,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        };

        match timeout_at(deadline, sink.persist(&block)).await {
            Ok(Ok(())) => {
                drained += 1;
                ctx.telemetry.record_block_persisted();
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    block = block.info.number,
                    error = %err,
                    "failed to persist block during drain"
                );
                break;
            }
            Err(_) => {
                tracing::warn!(block = block.info.number, "drain deadline reached");
                break;
            }
        }
    }

    if drained > 0 {
        tracing::info!(drained, "drained buffered blocks after cancellation");
    }
}
