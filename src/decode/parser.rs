use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use prost::Message as _;
use serde_json::json;

use crate::decode::records::{
    BlockInfo, EndorsementRecord, NamespacePolicyRecord, ParsedBlock, ProcessedBlock, ReadRecord,
    TxNamespaceRecord, WriteRecord,
};
use crate::decode::DecodeError;
use crate::wire;

/// Decodes one delivered block into its normalized record sets.
///
/// A missing header or a metadata vector without the transactions filter
/// fails the whole block. Individual transactions that do not decode are
/// logged and skipped; the block itself still succeeds.
pub fn decode(raw: &[u8]) -> Result<ProcessedBlock, DecodeError> {
    let block = wire::Block::decode(raw)?;

    let header = block.header.as_ref().ok_or(DecodeError::MissingHeader)?;
    let info = BlockInfo {
        number: header.number,
        previous_hash: header.previous_hash.clone(),
        data_hash: header.data_hash.clone(),
    };

    let filter = block
        .metadata
        .as_ref()
        .and_then(|m| m.metadata.get(wire::TRANSACTIONS_FILTER_INDEX))
        .ok_or(DecodeError::MissingTransactionsFilter)?;

    let envelopes: &[Vec<u8>] = block.data.as_ref().map(|d| d.data.as_slice()).unwrap_or(&[]);
    let mut parsed = ParsedBlock::default();

    for (tx_index, env_bytes) in envelopes.iter().enumerate() {
        if tx_index >= filter.len() {
            continue;
        }
        let validation_code = i32::from(filter[tx_index]);
        if validation_code != wire::VALIDATION_CODE_COMMITTED {
            continue;
        }

        let envelope = match wire::Envelope::decode(env_bytes.as_slice()) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(
                    block = info.number,
                    tx = tx_index,
                    error = %err,
                    "skipping transaction with invalid envelope"
                );
                continue;
            }
        };

        // Configuration payloads win outright: a transaction that yields
        // policy records contributes nothing else to the block.
        if let Some(policies) = extract_policies(&envelope) {
            parsed.policies.extend(policies);
            continue;
        }

        if let Err(err) = append_standard(
            &mut parsed,
            &envelope,
            info.number,
            tx_index as u64,
            validation_code,
        ) {
            tracing::warn!(
                block = info.number,
                tx = tx_index,
                error = %err,
                "skipping transaction with invalid payload"
            );
        }
    }

    Ok(ProcessedBlock {
        info,
        tx_count: envelopes.len(),
        data: parsed,
    })
}

/// Probes an envelope for configuration-payload content.
///
/// Returns `Some` only when the channel header marks a configuration type
/// and one of the two payload schemas yields at least one policy record.
/// The namespace-policy list takes precedence; the single
/// config-transaction form is consulted only when the list yields nothing.
fn extract_policies(envelope: &wire::Envelope) -> Option<Vec<NamespacePolicyRecord>> {
    let payload = wire::Payload::decode(envelope.payload.as_slice()).ok()?;
    let header = payload.header.as_ref()?;
    let channel_header = wire::ChannelHeader::decode(header.channel_header.as_slice()).ok()?;
    if channel_header.r#type != wire::HEADER_TYPE_CONFIG
        && channel_header.r#type != wire::HEADER_TYPE_CONFIG_UPDATE
    {
        return None;
    }

    if let Ok(policies) = wire::NamespacePolicies::decode(payload.data.as_slice()) {
        let items: Vec<NamespacePolicyRecord> = policies
            .policies
            .iter()
            .filter(|item| !item.policy.is_empty())
            .map(|item| {
                let namespace = if item.namespace.is_empty() {
                    wire::META_NAMESPACE_ID.to_owned()
                } else {
                    item.namespace.clone()
                };
                NamespacePolicyRecord {
                    namespace,
                    version: item.version,
                    policy: policy_json(&item.policy),
                }
            })
            .collect();
        if !items.is_empty() {
            return Some(items);
        }
    }

    if let Ok(config) = wire::ConfigTransaction::decode(payload.data.as_slice()) {
        if !config.envelope.is_empty() {
            return Some(vec![NamespacePolicyRecord {
                namespace: wire::META_NAMESPACE_ID.to_owned(),
                version: config.version,
                policy: policy_json(&config.envelope),
            }]);
        }
    }

    None
}

/// Decodes a standard transaction and appends its namespace, read, write,
/// and endorsement records.
fn append_standard(
    parsed: &mut ParsedBlock,
    envelope: &wire::Envelope,
    block_number: u64,
    tx_index: u64,
    validation_code: i32,
) -> Result<(), prost::DecodeError> {
    let payload = wire::Payload::decode(envelope.payload.as_slice())?;
    let header = payload
        .header
        .as_ref()
        .ok_or_else(|| prost::DecodeError::new("payload header missing"))?;
    let channel_header = wire::ChannelHeader::decode(header.channel_header.as_slice())?;
    let tx_id = channel_header.tx_id;

    let tx = wire::Tx::decode(payload.data.as_slice())?;
    if !tx.signatures.is_empty() && tx.signatures.len() != tx.namespaces.len() {
        tracing::warn!(
            tx_id = %tx_id,
            signatures = tx.signatures.len(),
            namespaces = tx.namespaces.len(),
            "signature count does not match namespace count"
        );
    }

    for (ns_index, ns) in tx.namespaces.iter().enumerate() {
        parsed.tx_namespaces.push(TxNamespaceRecord {
            block_number,
            tx_index,
            tx_id: tx_id.clone(),
            ns_id: ns.ns_id.clone(),
            ns_version: ns.ns_version,
            validation_code,
        });

        if let Some(signature) = tx.signatures.get(ns_index).filter(|s| !s.is_empty()) {
            let identity = endorsement_identity(signature);
            parsed.endorsements.push(EndorsementRecord {
                block_number,
                tx_index,
                ns_id: ns.ns_id.clone(),
                endorsement: signature.clone(),
                msp_id: identity.as_ref().map(|(msp_id, _)| msp_id.clone()),
                identity: identity.map(|(_, value)| value),
            });
        }

        for read in &ns.reads_only {
            parsed.reads.push(ReadRecord {
                block_number,
                tx_index,
                ns_id: ns.ns_id.clone(),
                key: read.key.clone(),
                version: positive_version(read.version),
                is_read_write: false,
            });
        }

        for read_write in &ns.read_writes {
            let version = positive_version(read_write.version);
            parsed.reads.push(ReadRecord {
                block_number,
                tx_index,
                ns_id: ns.ns_id.clone(),
                key: read_write.key.clone(),
                version,
                is_read_write: true,
            });
            parsed.writes.push(WriteRecord {
                block_number,
                tx_index,
                ns_id: ns.ns_id.clone(),
                key: read_write.key.clone(),
                value: read_write.value.clone(),
                is_blind_write: false,
                read_version: version,
            });
        }

        for write in &ns.blind_writes {
            parsed.writes.push(WriteRecord {
                block_number,
                tx_index,
                ns_id: ns.ns_id.clone(),
                key: write.key.clone(),
                value: write.value.clone(),
                is_blind_write: true,
                read_version: None,
            });
        }
    }

    Ok(())
}

/// Secondary probe: extract the endorser identity from a signature blob.
/// Failure leaves the endorsement record with the raw signature only.
fn endorsement_identity(signature: &[u8]) -> Option<(String, serde_json::Value)> {
    let endorsement = wire::Endorsement::decode(signature).ok()?;
    let identity = wire::SerializedIdentity::decode(endorsement.endorser.as_slice()).ok()?;
    if identity.msp_id.is_empty() {
        return None;
    }
    let value = json!({
        "mspid": identity.msp_id,
        "id_bytes": BASE64_STANDARD.encode(&identity.id_bytes),
    });
    Some((identity.msp_id, value))
}

fn policy_json(policy: &[u8]) -> serde_json::Value {
    json!({ "policy_bytes": BASE64_STANDARD.encode(policy) })
}

fn positive_version(version: Option<u64>) -> Option<u64> {
    version.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn committed_filter(len: usize) -> Vec<Vec<u8>> {
        vec![Vec::new(), Vec::new(), vec![0u8; len]]
    }

    fn block(number: u64, envelopes: Vec<Vec<u8>>, filter: Vec<Vec<u8>>) -> Vec<u8> {
        wire::Block {
            header: Some(wire::BlockHeader {
                number,
                previous_hash: b"prev".to_vec(),
                data_hash: b"data".to_vec(),
            }),
            data: Some(wire::BlockData { data: envelopes }),
            metadata: Some(wire::BlockMetadata { metadata: filter }),
        }
        .encode_to_vec()
    }

    fn envelope(header_type: i32, tx_id: &str, data: Vec<u8>) -> Vec<u8> {
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

    fn standard_tx(namespaces: Vec<wire::TxNamespace>, signatures: Vec<Vec<u8>>) -> Vec<u8> {
        wire::Tx {
            id: String::new(),
            namespaces,
            signatures,
        }
        .encode_to_vec()
    }

    #[test]
    fn empty_block_decodes_to_header_only() {
        let raw = block(5, Vec::new(), committed_filter(0));
        let processed = decode(&raw).unwrap();

        assert_eq!(processed.info.number, 5);
        assert_eq!(processed.info.previous_hash, b"prev");
        assert_eq!(processed.info.data_hash, b"data");
        assert_eq!(processed.tx_count, 0);
        assert!(processed.data.tx_namespaces.is_empty());
        assert!(processed.data.reads.is_empty());
        assert!(processed.data.writes.is_empty());
    }

    #[test]
    fn missing_header_is_fatal() {
        let raw = wire::Block {
            header: None,
            data: Some(wire::BlockData { data: Vec::new() }),
            metadata: Some(wire::BlockMetadata {
                metadata: committed_filter(0),
            }),
        }
        .encode_to_vec();

        assert!(matches!(decode(&raw), Err(DecodeError::MissingHeader)));
    }

    #[test]
    fn short_metadata_vector_is_fatal() {
        let raw = wire::Block {
            header: Some(wire::BlockHeader {
                number: 1,
                previous_hash: Vec::new(),
                data_hash: Vec::new(),
            }),
            data: Some(wire::BlockData { data: Vec::new() }),
            metadata: Some(wire::BlockMetadata {
                metadata: vec![Vec::new()],
            }),
        }
        .encode_to_vec();

        assert!(matches!(
            decode(&raw),
            Err(DecodeError::MissingTransactionsFilter)
        ));
    }

    #[test]
    fn read_write_emits_paired_read_and_write() {
        let ns = wire::TxNamespace {
            ns_id: "mycc".to_owned(),
            ns_version: 1,
            reads_only: Vec::new(),
            read_writes: vec![wire::ReadWrite {
                key: b"k1".to_vec(),
                value: b"v1".to_vec(),
                version: Some(10),
            }],
            blind_writes: Vec::new(),
        };
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "abc123",
            standard_tx(vec![ns], Vec::new()),
        );
        let raw = block(10, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.tx_count, 1);
        assert_eq!(processed.data.tx_namespaces.len(), 1);

        let ns_record = &processed.data.tx_namespaces[0];
        assert_eq!(ns_record.tx_id, "abc123");
        assert_eq!(ns_record.ns_id, "mycc");
        assert_eq!(ns_record.ns_version, 1);
        assert_eq!(ns_record.validation_code, wire::VALIDATION_CODE_COMMITTED);

        assert_eq!(processed.data.reads.len(), 1);
        let read = &processed.data.reads[0];
        assert!(read.is_read_write);
        assert_eq!(read.version, Some(10));

        assert_eq!(processed.data.writes.len(), 1);
        let write = &processed.data.writes[0];
        assert!(!write.is_blind_write);
        assert_eq!(write.read_version, Some(10));
        assert_eq!(write.value, b"v1");

        assert!(processed.data.endorsements.is_empty());
    }

    #[test]
    fn blind_write_has_no_read_and_no_read_version() {
        let ns = wire::TxNamespace {
            ns_id: "mycc".to_owned(),
            ns_version: 0,
            reads_only: Vec::new(),
            read_writes: Vec::new(),
            blind_writes: vec![wire::Write {
                key: b"bk".to_vec(),
                value: b"bv".to_vec(),
            }],
        };
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "ff01",
            standard_tx(vec![ns], Vec::new()),
        );
        let raw = block(1, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert!(processed.data.reads.is_empty());
        assert_eq!(processed.data.writes.len(), 1);
        assert!(processed.data.writes[0].is_blind_write);
        assert_eq!(processed.data.writes[0].read_version, None);
    }

    #[test]
    fn zero_version_collapses_to_none() {
        let ns = wire::TxNamespace {
            ns_id: "mycc".to_owned(),
            ns_version: 2,
            reads_only: vec![wire::Read {
                key: b"r0".to_vec(),
                version: Some(0),
            }],
            read_writes: vec![wire::ReadWrite {
                key: b"rw0".to_vec(),
                value: b"v".to_vec(),
                version: Some(0),
            }],
            blind_writes: Vec::new(),
        };
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "aa",
            standard_tx(vec![ns], Vec::new()),
        );
        let raw = block(3, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert!(processed.data.reads.iter().all(|r| r.version.is_none()));
        assert_eq!(processed.data.writes[0].read_version, None);
    }

    #[test]
    fn invalid_envelope_is_skipped_not_fatal() {
        let raw = block(1, vec![vec![0xff, 0xff, 0xff, 0xff]], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.tx_count, 1);
        assert!(processed.data.tx_namespaces.is_empty());
        assert!(processed.data.reads.is_empty());
        assert!(processed.data.writes.is_empty());
    }

    #[test]
    fn non_committed_transaction_is_skipped() {
        let ns = wire::TxNamespace {
            ns_id: "mycc".to_owned(),
            ns_version: 1,
            reads_only: Vec::new(),
            read_writes: Vec::new(),
            blind_writes: vec![wire::Write {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            }],
        };
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "bb",
            standard_tx(vec![ns], Vec::new()),
        );
        let raw = block(2, vec![env], vec![Vec::new(), Vec::new(), vec![9u8]]);

        let processed = decode(&raw).unwrap();
        assert!(processed.data.tx_namespaces.is_empty());
        assert!(processed.data.writes.is_empty());
    }

    #[test]
    fn transaction_beyond_filter_is_skipped() {
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "cc",
            standard_tx(Vec::new(), Vec::new()),
        );
        let raw = block(4, vec![env], vec![Vec::new(), Vec::new(), Vec::new()]);

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.tx_count, 1);
        assert!(processed.data.tx_namespaces.is_empty());
    }

    #[test]
    fn config_transaction_yields_policy_and_nothing_else() {
        let policies = wire::NamespacePolicies {
            policies: vec![wire::PolicyItem {
                namespace: "mycc".to_owned(),
                version: 1,
                policy: b"policy-bytes".to_vec(),
            }],
        }
        .encode_to_vec();
        let env = envelope(wire::HEADER_TYPE_CONFIG, "", policies);
        let raw = block(0, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert!(processed.data.tx_namespaces.is_empty());
        assert!(processed.data.reads.is_empty());
        assert!(processed.data.writes.is_empty());
        assert!(processed.data.endorsements.is_empty());

        assert_eq!(processed.data.policies.len(), 1);
        let policy = &processed.data.policies[0];
        assert_eq!(policy.namespace, "mycc");
        assert_eq!(policy.version, 1);
        assert_eq!(
            policy.policy,
            json!({ "policy_bytes": BASE64_STANDARD.encode(b"policy-bytes") })
        );
    }

    #[test]
    fn empty_policy_namespace_maps_to_meta() {
        let policies = wire::NamespacePolicies {
            policies: vec![wire::PolicyItem {
                namespace: String::new(),
                version: 3,
                policy: b"p".to_vec(),
            }],
        }
        .encode_to_vec();
        let env = envelope(wire::HEADER_TYPE_CONFIG_UPDATE, "", policies);
        let raw = block(7, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.data.policies.len(), 1);
        assert_eq!(processed.data.policies[0].namespace, wire::META_NAMESPACE_ID);
    }

    #[test]
    fn config_transaction_fallback_uses_meta_namespace() {
        let config = wire::ConfigTransaction {
            version: 9,
            envelope: b"embedded".to_vec(),
        }
        .encode_to_vec();
        let env = envelope(wire::HEADER_TYPE_CONFIG, "", config);
        let raw = block(0, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.data.policies.len(), 1);
        assert_eq!(processed.data.policies[0].namespace, wire::META_NAMESPACE_ID);
        assert_eq!(processed.data.policies[0].version, 9);
    }

    #[test]
    fn endorsement_identity_attaches_msp_and_blob() {
        let identity = wire::SerializedIdentity {
            msp_id: "Org1MSP".to_owned(),
            id_bytes: b"cert".to_vec(),
        }
        .encode_to_vec();
        let signature = wire::Endorsement {
            endorser: identity,
            signature: b"sig".to_vec(),
        }
        .encode_to_vec();

        let ns = wire::TxNamespace {
            ns_id: "mycc".to_owned(),
            ns_version: 1,
            reads_only: Vec::new(),
            read_writes: Vec::new(),
            blind_writes: vec![wire::Write {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            }],
        };
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "dd",
            standard_tx(vec![ns], vec![signature.clone()]),
        );
        let raw = block(6, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.data.endorsements.len(), 1);
        let record = &processed.data.endorsements[0];
        assert_eq!(record.endorsement, signature);
        assert_eq!(record.msp_id.as_deref(), Some("Org1MSP"));
        assert_eq!(
            record.identity,
            Some(json!({
                "mspid": "Org1MSP",
                "id_bytes": BASE64_STANDARD.encode(b"cert"),
            }))
        );
    }

    #[test]
    fn undecodable_endorsement_keeps_signature_only() {
        let ns = wire::TxNamespace {
            ns_id: "mycc".to_owned(),
            ns_version: 1,
            reads_only: Vec::new(),
            read_writes: Vec::new(),
            blind_writes: vec![wire::Write {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            }],
        };
        let garbage = vec![0xff, 0xff, 0x01];
        let env = envelope(
            wire::HEADER_TYPE_ENDORSER_TRANSACTION,
            "ee",
            standard_tx(vec![ns], vec![garbage.clone()]),
        );
        let raw = block(8, vec![env], committed_filter(1));

        let processed = decode(&raw).unwrap();
        assert_eq!(processed.data.endorsements.len(), 1);
        assert_eq!(processed.data.endorsements[0].endorsement, garbage);
        assert!(processed.data.endorsements[0].msp_id.is_none());
        assert!(processed.data.endorsements[0].identity.is_none());
    }
}
