//! Relational persistence: connection factory, schema, and the atomic
//! per-block writer.

pub mod postgres;
pub mod writer;

use futures::future::BoxFuture;

pub use postgres::Store;
pub use writer::BlockWriter;

use crate::decode::ProcessedBlock;

/// Errors produced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A transaction id could not be decoded from its hexadecimal wire
    /// form into bytes.
    #[error("transaction id is not valid hex: {0}")]
    Encoding(#[from] hex::FromHexError),

    /// Underlying driver or transactional failure.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// A child record referenced a `(block, tx, namespace)` coordinate no
    /// parent record declared. Indicates a decoder defect upstream.
    #[error("block {block} tx {tx_index} references undeclared namespace {ns_id}")]
    MissingParent {
        block: u64,
        tx_index: u64,
        ns_id: String,
    },
}

/// Convenience alias used throughout this module.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Sink for decoded blocks, bound to one dedicated connection.
pub trait BlockSink: Send + 'static {
    /// Persists one block atomically: commit on success, rollback on any
    /// error, replay of an already-persisted block is a silent no-op.
    fn persist<'a>(&'a mut self, block: &'a ProcessedBlock) -> BoxFuture<'a, Result<()>>;
}

/// The store surface the pipeline orchestrator depends on: the current
/// tip for resume computation and a factory handing out dedicated sinks,
/// one per writer task.
pub trait IngestStore: Send + Sync + 'static {
    /// Highest persisted block number, or `None` when the store is empty.
    fn tip(&self) -> BoxFuture<'_, Result<Option<u64>>>;

    /// Opens a dedicated connection and returns a sink bound to it.
    fn dedicated_sink(&self) -> BoxFuture<'_, Result<Box<dyn BlockSink>>>;
}
