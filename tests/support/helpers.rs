//! Recording store/sink doubles and small async test utilities.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use ledgersink::store;
use ledgersink::{BlockSink, IngestStore, ProcessedBlock};
use tokio::time::{sleep, Instant};

pub fn init_tracing() {
    ledgersink::init_tracing();
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// In-memory [`IngestStore`] that records every persisted block.
pub struct RecordingStore {
    tip: Option<u64>,
    persist_delay: Duration,
    blocks: Arc<Mutex<Vec<ProcessedBlock>>>,
}

impl RecordingStore {
    pub fn new(tip: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            tip,
            persist_delay: Duration::ZERO,
            blocks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn with_persist_delay(tip: Option<u64>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            tip,
            persist_delay: delay,
            blocks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn persisted(&self) -> Vec<ProcessedBlock> {
        self.blocks.lock().unwrap().clone()
    }

    pub fn persisted_numbers(&self) -> Vec<u64> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .map(|block| block.info.number)
            .collect()
    }

    pub fn persisted_count(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }
}

impl IngestStore for RecordingStore {
    fn tip(&self) -> BoxFuture<'_, store::Result<Option<u64>>> {
        let tip = self.tip;
        Box::pin(async move { Ok(tip) })
    }

    fn dedicated_sink(&self) -> BoxFuture<'_, store::Result<Box<dyn BlockSink>>> {
        let blocks = self.blocks.clone();
        let delay = self.persist_delay;
        Box::pin(async move { Ok(Box::new(RecordingSink { blocks, delay }) as Box<dyn BlockSink>) })
    }
}

struct RecordingSink {
    blocks: Arc<Mutex<Vec<ProcessedBlock>>>,
    delay: Duration,
}

impl BlockSink for RecordingSink {
    fn persist<'a>(&'a mut self, block: &'a ProcessedBlock) -> BoxFuture<'a, store::Result<()>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.blocks.lock().unwrap().push(block.clone());
            Ok(())
        })
    }
}
