//! Upstream delivery seam.
//!
//! The concrete delivery client lives outside this crate; the pipeline
//! only assumes something that can push ordered raw blocks into a channel.
//! Implementations initiate delivery from their own task and signal
//! termination (error or exhaustion) by dropping the sender, which closes
//! the per-attempt channel and triggers the receiver's resubscribe loop.

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One serialized block as pushed by the delivery stream. Empty payloads
/// are treated as absent and dropped by the receiver.
pub type RawBlock = Bytes;

/// Handle to an upstream block delivery endpoint.
pub trait BlockSource: Send + Sync + 'static {
    /// Begins pushing ordered raw blocks into `out`, starting at
    /// `start_block`, until `scope` is cancelled or the stream is
    /// exhausted. Returns an error only when delivery could not be
    /// initiated at all; failures after initiation close the channel.
    fn start_deliver(
        &self,
        scope: CancellationToken,
        start_block: u64,
        out: mpsc::Sender<RawBlock>,
    ) -> Result<()>;

    /// Releases any underlying connections.
    fn close(&self) {}
}
