//! Innermost transaction, endorsement, and policy payloads.

use prost::Message;

/// A standard transaction: per-namespace read/write sets plus an optional
/// parallel vector of per-namespace endorsement signatures.
#[derive(Clone, PartialEq, Message)]
pub struct Tx {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, repeated, tag = "2")]
    pub namespaces: Vec<TxNamespace>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxNamespace {
    #[prost(string, tag = "1")]
    pub ns_id: String,
    #[prost(uint64, tag = "2")]
    pub ns_version: u64,
    #[prost(message, repeated, tag = "3")]
    pub reads_only: Vec<Read>,
    #[prost(message, repeated, tag = "4")]
    pub read_writes: Vec<ReadWrite>,
    #[prost(message, repeated, tag = "5")]
    pub blind_writes: Vec<Write>,
}

/// A read without a paired write.
#[derive(Clone, PartialEq, Message)]
pub struct Read {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(uint64, optional, tag = "2")]
    pub version: Option<u64>,
}

/// A read paired with a write to the same key.
#[derive(Clone, PartialEq, Message)]
pub struct ReadWrite {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
    #[prost(uint64, optional, tag = "3")]
    pub version: Option<u64>,
}

/// A blind write: no read at the same key justified it.
#[derive(Clone, PartialEq, Message)]
pub struct Write {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// First configuration payload schema: explicit per-namespace policies.
#[derive(Clone, PartialEq, Message)]
pub struct NamespacePolicies {
    #[prost(message, repeated, tag = "1")]
    pub policies: Vec<PolicyItem>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PolicyItem {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(uint64, tag = "2")]
    pub version: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub policy: Vec<u8>,
}

/// Second configuration payload schema: a versioned embedded envelope
/// attributed to the meta-namespace.
#[derive(Clone, PartialEq, Message)]
pub struct ConfigTransaction {
    #[prost(uint64, tag = "1")]
    pub version: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub envelope: Vec<u8>,
}

/// An endorsement signature together with the serialized endorser identity.
#[derive(Clone, PartialEq, Message)]
pub struct Endorsement {
    #[prost(bytes = "vec", tag = "1")]
    pub endorser: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SerializedIdentity {
    #[prost(string, tag = "1")]
    pub msp_id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub id_bytes: Vec<u8>,
}
