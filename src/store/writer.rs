//! Atomic persistence of one decoded block.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio_postgres::Client;

use crate::decode::ProcessedBlock;
use crate::store::{BlockSink, Result, StoreError};

const INSERT_BLOCK: &str = "INSERT INTO blocks (block_number, tx_count, previous_hash, data_hash) \
     VALUES ($1, $2, $3, $4) ON CONFLICT (block_number) DO NOTHING";

const INSERT_TRANSACTION: &str = "INSERT INTO transactions (block_number, tx_index, tx_id, validation_code) \
     VALUES ($1, $2, $3, $4) \
     ON CONFLICT (block_number, tx_index) DO UPDATE SET tx_id = EXCLUDED.tx_id \
     RETURNING id";

const INSERT_TX_NAMESPACE: &str = "INSERT INTO tx_namespaces (transaction_id, ns_id, ns_version) \
     VALUES ($1, $2, $3) \
     ON CONFLICT (transaction_id, ns_id) DO UPDATE SET ns_version = EXCLUDED.ns_version \
     RETURNING id";

const INSERT_READ: &str = "INSERT INTO tx_reads (tx_namespace_id, key, version, is_read_write) \
     VALUES ($1, $2, $3, $4)";

const INSERT_ENDORSEMENT: &str = "INSERT INTO tx_endorsements (tx_namespace_id, endorsement, msp_id, identity) \
     VALUES ($1, $2, $3, $4)";

const UPSERT_POLICY: &str = "INSERT INTO namespace_policies (namespace, version, policy) \
     VALUES ($1, $2, $3) \
     ON CONFLICT (namespace, version) DO UPDATE SET policy = EXCLUDED.policy";

const INSERT_WRITE: &str = "INSERT INTO tx_writes (tx_namespace_id, key, value, is_blind_write, read_version) \
     VALUES ($1, $2, $3, $4, $5)";

/// Persists decoded blocks over one dedicated connection.
///
/// Each [`BlockWriter::write`] call is a single store transaction issuing
/// the inserts in dependency order: block, transactions, namespaces,
/// reads, endorsements, policies, writes. Two transaction-local caches
/// resolve surrogate ids for dependent inserts without re-querying.
pub struct BlockWriter {
    client: Client,
}

impl BlockWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Persists one block atomically. Replaying a block whose number is
    /// already present is a silent no-op: the primary-key conflict on the
    /// block insert short-circuits before any child row is written, which
    /// is what keeps re-delivery idempotent across all seven tables.
    pub async fn write(&mut self, block: &ProcessedBlock) -> Result<()> {
        let info = &block.info;
        let data = &block.data;
        let tx = self.client.transaction().await?;

        let inserted = tx
            .execute(
                INSERT_BLOCK,
                &[
                    &(info.number as i64),
                    &(block.tx_count as i32),
                    &info.previous_hash,
                    &info.data_hash,
                ],
            )
            .await?;
        if inserted == 0 {
            tx.commit().await?;
            tracing::debug!(block = info.number, "block already persisted; skipping");
            return Ok(());
        }

        let mut transaction_ids: HashMap<(u64, u64), i64> = HashMap::new();
        let mut namespace_ids: HashMap<(u64, u64, String), i64> = HashMap::new();

        if !data.tx_namespaces.is_empty() {
            let insert_transaction = tx.prepare(INSERT_TRANSACTION).await?;
            for record in &data.tx_namespaces {
                let key = (record.block_number, record.tx_index);
                if transaction_ids.contains_key(&key) {
                    continue;
                }
                let tx_id = hex::decode(&record.tx_id)?;
                let row = tx
                    .query_one(
                        &insert_transaction,
                        &[
                            &(record.block_number as i64),
                            &(record.tx_index as i64),
                            &tx_id,
                            &record.validation_code,
                        ],
                    )
                    .await?;
                transaction_ids.insert(key, row.get(0));
            }

            let insert_namespace = tx.prepare(INSERT_TX_NAMESPACE).await?;
            for record in &data.tx_namespaces {
                let transaction_id = transaction_ids[&(record.block_number, record.tx_index)];
                let row = tx
                    .query_one(
                        &insert_namespace,
                        &[
                            &transaction_id,
                            &record.ns_id,
                            &(record.ns_version as i64),
                        ],
                    )
                    .await?;
                namespace_ids.insert(
                    (record.block_number, record.tx_index, record.ns_id.clone()),
                    row.get(0),
                );
            }
        }

        if !data.reads.is_empty() {
            let insert_read = tx.prepare(INSERT_READ).await?;
            for record in &data.reads {
                let namespace_id = resolve_namespace(
                    &namespace_ids,
                    record.block_number,
                    record.tx_index,
                    &record.ns_id,
                )?;
                tx.execute(
                    &insert_read,
                    &[
                        &namespace_id,
                        &record.key,
                        &record.version.map(|v| v as i64),
                        &record.is_read_write,
                    ],
                )
                .await?;
            }
        }

        if !data.endorsements.is_empty() {
            let insert_endorsement = tx.prepare(INSERT_ENDORSEMENT).await?;
            for record in &data.endorsements {
                let namespace_id = resolve_namespace(
                    &namespace_ids,
                    record.block_number,
                    record.tx_index,
                    &record.ns_id,
                )?;
                tx.execute(
                    &insert_endorsement,
                    &[
                        &namespace_id,
                        &record.endorsement,
                        &record.msp_id,
                        &record.identity,
                    ],
                )
                .await?;
            }
        }

        if !data.policies.is_empty() {
            let upsert_policy = tx.prepare(UPSERT_POLICY).await?;
            for record in &data.policies {
                tx.execute(
                    &upsert_policy,
                    &[
                        &record.namespace,
                        &(record.version as i64),
                        &record.policy,
                    ],
                )
                .await?;
            }
        }

        if !data.writes.is_empty() {
            let insert_write = tx.prepare(INSERT_WRITE).await?;
            for record in &data.writes {
                let namespace_id = resolve_namespace(
                    &namespace_ids,
                    record.block_number,
                    record.tx_index,
                    &record.ns_id,
                )?;
                tx.execute(
                    &insert_write,
                    &[
                        &namespace_id,
                        &record.key,
                        &record.value,
                        &record.is_blind_write,
                        &record.read_version.map(|v| v as i64),
                    ],
                )
                .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            block = info.number,
            transactions = transaction_ids.len(),
            writes = data.writes.len(),
            reads = data.reads.len(),
            policies = data.policies.len(),
            "stored block"
        );
        Ok(())
    }
}

impl BlockSink for BlockWriter {
    fn persist<'a>(&'a mut self, block: &'a ProcessedBlock) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.write(block))
    }
}

fn resolve_namespace(
    namespace_ids: &HashMap<(u64, u64, String), i64>,
    block: u64,
    tx_index: u64,
    ns_id: &str,
) -> Result<i64> {
    namespace_ids
        .get(&(block, tx_index, ns_id.to_owned()))
        .copied()
        .ok_or_else(|| StoreError::MissingParent {
            block,
            tx_index,
            ns_id: ns_id.to_owned(),
        })
}
