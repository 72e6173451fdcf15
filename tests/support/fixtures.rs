//! Encoded-block builders shared by the integration tests.

// Shared across test targets; not every target uses every builder.
#![allow(dead_code)]

use bytes::Bytes;
use ledgersink::wire;
use prost::Message;

/// Metadata vector whose transactions-filter slot marks `len` committed
/// transactions.
pub fn committed_filter(len: usize) -> Vec<Vec<u8>> {
    vec![Vec::new(), Vec::new(), vec![0u8; len]]
}

/// Encodes a block with the given envelopes and metadata vector.
pub fn block_with_metadata(number: u64, envelopes: Vec<Vec<u8>>, metadata: Vec<Vec<u8>>) -> Bytes {
    wire::Block {
        header: Some(wire::BlockHeader {
            number,
            previous_hash: b"prev".to_vec(),
            data_hash: b"data".to_vec(),
        }),
        data: Some(wire::BlockData { data: envelopes }),
        metadata: Some(wire::BlockMetadata { metadata }),
    }
    .encode_to_vec()
    .into()
}

/// Encodes a block whose transactions are all marked committed.
pub fn block(number: u64, envelopes: Vec<Vec<u8>>) -> Bytes {
    let filter = committed_filter(envelopes.len());
    block_with_metadata(number, envelopes, filter)
}

/// Encodes an empty committed block.
pub fn empty_block(number: u64) -> Bytes {
    block(number, Vec::new())
}

/// A block without a header; decoding it is a structural failure.
pub fn headerless_block() -> Bytes {
    wire::Block {
        header: None,
        data: Some(wire::BlockData { data: Vec::new() }),
        metadata: Some(wire::BlockMetadata {
            metadata: committed_filter(0),
        }),
    }
    .encode_to_vec()
    .into()
}

/// Wraps a payload in an envelope with the given channel-header type.
pub fn envelope(header_type: i32, tx_id: &str, data: Vec<u8>) -> Vec<u8> {
    let channel_header = wire::ChannelHeader {
        r#type: header_type,
        channel_id: "mychannel".to_owned(),
        tx_id: tx_id.to_owned(),
    }
    .encode_to_vec();
    wire::Envelope {
        payload: wire::Payload {
            header: Some(wire::Header {
                channel_header,
                signature_header: Vec::new(),
            }),
            data,
        }
        .encode_to_vec(),
        signature: Vec::new(),
    }
    .encode_to_vec()
}

/// A standard-transaction envelope with one namespace holding one
/// read-write of `(key, value, version)`.
pub fn read_write_envelope(
    tx_id: &str,
    ns_id: &str,
    key: &[u8],
    value: &[u8],
    version: u64,
) -> Vec<u8> {
    let tx = wire::Tx {
        id: String::new(),
        namespaces: vec![wire::TxNamespace {
            ns_id: ns_id.to_owned(),
            ns_version: 1,
            reads_only: Vec::new(),
            read_writes: vec![wire::ReadWrite {
                key: key.to_vec(),
                value: value.to_vec(),
                version: Some(version),
            }],
            blind_writes: Vec::new(),
        }],
        signatures: Vec::new(),
    };
    envelope(
        wire::HEADER_TYPE_ENDORSER_TRANSACTION,
        tx_id,
        tx.encode_to_vec(),
    )
}

/// A configuration envelope carrying one namespace policy.
pub fn policy_envelope(namespace: &str, version: u64, policy: &[u8]) -> Vec<u8> {
    let policies = wire::NamespacePolicies {
        policies: vec![wire::PolicyItem {
            namespace: namespace.to_owned(),
            version,
            policy: policy.to_vec(),
        }],
    };
    envelope(wire::HEADER_TYPE_CONFIG, "", policies.encode_to_vec())
}
