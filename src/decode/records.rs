//! Domain records emitted by the decoder and consumed by the persistence
//! writer. Every child record carries its `(block_number, tx_index, ns_id)`
//! coordinates so the writer can resolve surrogate ids without re-querying.

use serde::Serialize;

/// Header facts of one decoded block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    pub number: u64,
    pub previous_hash: Vec<u8>,
    pub data_hash: Vec<u8>,
}

/// A fully decoded block ready for persistence. `tx_count` counts the
/// transaction envelopes the block carried, committed or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedBlock {
    pub info: BlockInfo,
    pub tx_count: usize,
    pub data: ParsedBlock,
}

/// The normalized record sets of one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedBlock {
    pub writes: Vec<WriteRecord>,
    pub reads: Vec<ReadRecord>,
    pub tx_namespaces: Vec<TxNamespaceRecord>,
    pub endorsements: Vec<EndorsementRecord>,
    pub policies: Vec<NamespacePolicyRecord>,
}

/// One namespace touched by one committed transaction. `tx_id` stays in
/// its hexadecimal wire form until the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxNamespaceRecord {
    pub block_number: u64,
    pub tx_index: u64,
    pub tx_id: String,
    pub ns_id: String,
    pub ns_version: u64,
    pub validation_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadRecord {
    pub block_number: u64,
    pub tx_index: u64,
    pub ns_id: String,
    pub key: Vec<u8>,
    /// Recorded only when the wire version is strictly positive.
    pub version: Option<u64>,
    pub is_read_write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteRecord {
    pub block_number: u64,
    pub tx_index: u64,
    pub ns_id: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub is_blind_write: bool,
    /// Version of the paired read; always `None` for blind writes.
    pub read_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndorsementRecord {
    pub block_number: u64,
    pub tx_index: u64,
    pub ns_id: String,
    pub endorsement: Vec<u8>,
    pub msp_id: Option<String>,
    pub identity: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespacePolicyRecord {
    pub namespace: String,
    pub version: u64,
    pub policy: serde_json::Value,
}
