//! Scripted [`BlockSource`] implementation driving the real pipeline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use ledgersink::{BlockSource, RawBlock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Delivers one scripted batch per subscription attempt. After a batch is
/// sent the per-attempt channel closes (dropping the sender), which makes
/// the receiver reconnect and pick up the next batch. When the script is
/// exhausted the channel is held open until the scope cancels, so the
/// pipeline idles instead of spinning through reconnects.
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<RawBlock>>>,
    starts: Mutex<Vec<u64>>,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<RawBlock>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches.into()),
            starts: Mutex::new(Vec::new()),
        })
    }

    pub fn single_batch(blocks: Vec<RawBlock>) -> Arc<Self> {
        Self::new(vec![blocks])
    }

    /// Start blocks requested so far, one per subscription attempt.
    pub fn requested_starts(&self) -> Vec<u64> {
        self.starts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.starts.lock().unwrap().len()
    }
}

impl BlockSource for ScriptedSource {
    fn start_deliver(
        &self,
        scope: CancellationToken,
        start_block: u64,
        out: mpsc::Sender<RawBlock>,
    ) -> Result<()> {
        self.starts.lock().unwrap().push(start_block);

        let batch = self.batches.lock().unwrap().pop_front();
        tokio::spawn(async move {
            match batch {
                Some(blocks) => {
                    for block in blocks {
                        if out.send(block).await.is_err() {
                            return;
                        }
                    }
                    // Sender drops here; the attempt channel closes.
                }
                None => {
                    // Script exhausted: keep the stream open until shutdown.
                    scope.cancelled().await;
                    drop(out);
                }
            }
        });

        Ok(())
    }
}
