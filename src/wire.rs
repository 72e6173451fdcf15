//! Layered wire format for delivered blocks.
//!
//! A delivered block is a three-layer protobuf structure: the outer
//! [`block::Block`] envelope (header, transaction envelopes, metadata
//! vector), per-transaction [`block::Envelope`]/[`block::Payload`] layers,
//! and the innermost transaction or configuration payloads defined in
//! [`tx`]. The messages are written by hand so the crate carries no build
//! script and no vendored schema files.

pub mod block;
pub mod tx;

pub use block::{Block, BlockData, BlockHeader, BlockMetadata, ChannelHeader, Envelope, Header, Payload};
pub use tx::{
    ConfigTransaction, Endorsement, NamespacePolicies, PolicyItem, Read, ReadWrite,
    SerializedIdentity, Tx, TxNamespace, Write,
};

/// Channel header type of a configuration block.
pub const HEADER_TYPE_CONFIG: i32 = 1;
/// Channel header type of a configuration update.
pub const HEADER_TYPE_CONFIG_UPDATE: i32 = 2;
/// Channel header type of a standard endorser transaction.
pub const HEADER_TYPE_ENDORSER_TRANSACTION: i32 = 3;

/// Slot of the block metadata vector holding the transactions filter,
/// one validation-code byte per transaction.
pub const TRANSACTIONS_FILTER_INDEX: usize = 2;

/// Validation code stamped on transactions accepted by the commit path.
pub const VALIDATION_CODE_COMMITTED: i32 = 0;

/// Reserved namespace identifier for configuration records that do not
/// carry a namespace of their own.
pub const META_NAMESPACE_ID: &str = "_meta";
