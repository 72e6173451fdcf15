//! The three-stage ingestion pipeline: receiver, processor pool, writer
//! pool, wired by bounded queues and cancelled through one token
//! hierarchy.

pub mod backoff;
pub mod orchestrator;
pub(crate) mod processor;
pub mod receiver;
pub(crate) mod writer;

pub use backoff::Backoff;
pub use orchestrator::{BlockPipeline, PipelineHandle};
pub use receiver::Receiver;

use anyhow::Error as AnyError;

/// Pipeline stage a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Receive,
    Decode,
    Persist,
}

/// Fatal pipeline error. Every instance terminates the run.
#[derive(Debug)]
pub struct PipelineError {
    stage: PipelineStage,
    source: AnyError,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: AnyError) -> Self {
        Self { stage, source }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn into_source(self) -> AnyError {
        self.source
    }
}

impl core::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?} stage error: {}", self.stage, self.source)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
