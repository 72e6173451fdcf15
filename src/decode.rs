//! Decoding of delivered block bytes into normalized ingestion records.
//!
//! [`decode`] is a pure function: it never touches the store and carries no
//! state between blocks. Structural defects of the block itself are fatal;
//! defects confined to a single transaction are logged and skipped so the
//! rest of the block still lands.

mod parser;
pub mod records;

pub use parser::decode;
pub use records::{
    BlockInfo, EndorsementRecord, NamespacePolicyRecord, ParsedBlock, ProcessedBlock, ReadRecord,
    TxNamespaceRecord, WriteRecord,
};

/// Block-fatal decoding failures. Anything recoverable is handled inside
/// the parser and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The outer block envelope does not decode at all.
    #[error("block does not decode: {0}")]
    Wire(#[from] prost::DecodeError),

    /// The block carries no header.
    #[error("block header missing")]
    MissingHeader,

    /// The metadata vector is absent or too short to contain the
    /// transactions filter.
    #[error("block metadata missing transactions filter")]
    MissingTransactionsFilter,
}
