//! Ingests committed ledger blocks from an upstream delivery stream and
//! persists them atomically into PostgreSQL.
//!
//! The crate is built around a three-stage pipeline: a [`Receiver`] owns
//! the stream subscription and resubscribes with backoff, a pool of
//! processors decodes raw blocks into normalized records, and a pool of
//! writers persists each block in a single store transaction over a
//! dedicated connection. On restart the pipeline resumes at the block
//! after the highest one already persisted.

pub mod decode;
pub mod pipeline;
pub mod runtime;
pub mod source;
pub mod store;
pub mod wire;

pub use decode::{decode, DecodeError, ParsedBlock, ProcessedBlock};
pub use pipeline::{Backoff, BlockPipeline, PipelineError, PipelineHandle, PipelineStage, Receiver};
pub use runtime::config::{BackoffConfig, IngestConfig, PipelineConfig, StoreConfig, StreamConfig};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use source::{BlockSource, RawBlock};
pub use store::{BlockSink, BlockWriter, IngestStore, Store, StoreError};
