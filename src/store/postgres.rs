//! PostgreSQL connection factory and schema management.

use futures::future::BoxFuture;
use tokio_postgres::{Client, NoTls};

use crate::runtime::config::StoreConfig;
use crate::store::{BlockSink, BlockWriter, IngestStore, Result};

/// Idempotent DDL for the seven ingestion tables.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS blocks (
    block_number BIGINT PRIMARY KEY,
    tx_count INT NOT NULL,
    previous_hash BYTEA,
    data_hash BYTEA
);

CREATE TABLE IF NOT EXISTS transactions (
    id BIGSERIAL PRIMARY KEY,
    block_number BIGINT NOT NULL,
    tx_index BIGINT NOT NULL,
    tx_id BYTEA NOT NULL,
    validation_code INT NOT NULL,
    UNIQUE (block_number, tx_index)
);

CREATE INDEX IF NOT EXISTS idx_transactions_tx_id ON transactions (tx_id);

CREATE TABLE IF NOT EXISTS tx_namespaces (
    id BIGSERIAL PRIMARY KEY,
    transaction_id BIGINT NOT NULL REFERENCES transactions(id),
    ns_id TEXT NOT NULL,
    ns_version BIGINT NOT NULL,
    UNIQUE (transaction_id, ns_id)
);

CREATE INDEX IF NOT EXISTS idx_tx_namespaces_transaction_id
    ON tx_namespaces (transaction_id);

CREATE TABLE IF NOT EXISTS tx_reads (
    id BIGSERIAL PRIMARY KEY,
    tx_namespace_id BIGINT NOT NULL REFERENCES tx_namespaces(id),
    key BYTEA NOT NULL,
    version BIGINT,
    is_read_write BOOLEAN NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tx_reads_tx_namespace_id
    ON tx_reads (tx_namespace_id);

CREATE TABLE IF NOT EXISTS tx_writes (
    id BIGSERIAL PRIMARY KEY,
    tx_namespace_id BIGINT NOT NULL REFERENCES tx_namespaces(id),
    key BYTEA NOT NULL,
    value BYTEA NOT NULL,
    is_blind_write BOOLEAN NOT NULL,
    read_version BIGINT
);

CREATE INDEX IF NOT EXISTS idx_tx_writes_tx_namespace_id
    ON tx_writes (tx_namespace_id);

CREATE TABLE IF NOT EXISTS tx_endorsements (
    id BIGSERIAL PRIMARY KEY,
    tx_namespace_id BIGINT NOT NULL REFERENCES tx_namespaces(id),
    endorsement BYTEA NOT NULL,
    msp_id TEXT,
    identity JSONB
);

CREATE INDEX IF NOT EXISTS idx_tx_endorsements_tx_namespace_id
    ON tx_endorsements (tx_namespace_id);

CREATE TABLE IF NOT EXISTS namespace_policies (
    id BIGSERIAL PRIMARY KEY,
    namespace TEXT NOT NULL,
    version BIGINT NOT NULL,
    policy JSONB NOT NULL,
    UNIQUE (namespace, version)
);
";

/// Connection factory for the ingestion store.
///
/// Owns one bootstrap client used for liveness checks, schema DDL, and the
/// tip query. Writer tasks get their own dedicated connections via
/// [`Store::dedicated_writer`]; connections are never shared across tasks
/// because each writer runs long-lived transactions.
pub struct Store {
    client: Client,
    config: StoreConfig,
}

impl Store {
    /// Connects the bootstrap client and verifies liveness.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let client = spawn_connection(&config).await?;
        let store = Self { client, config };
        store.ping().await?;
        Ok(store)
    }

    /// Liveness check against the bootstrap connection.
    pub async fn ping(&self) -> Result<()> {
        self.client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Applies the ingestion schema. Safe to call on every startup.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    /// Highest persisted block number, or `None` when no block has been
    /// persisted yet.
    pub async fn tip(&self) -> Result<Option<u64>> {
        let row = self
            .client
            .query_one("SELECT MAX(block_number) FROM blocks", &[])
            .await?;
        let max: Option<i64> = row.get(0);
        Ok(max.map(|n| n as u64))
    }

    /// Opens a dedicated connection and returns a writer bound to it. The
    /// connection lives as long as the returned writer.
    pub async fn dedicated_writer(&self) -> Result<BlockWriter> {
        let client = spawn_connection(&self.config).await?;
        Ok(BlockWriter::new(client))
    }
}

impl IngestStore for Store {
    fn tip(&self) -> BoxFuture<'_, Result<Option<u64>>> {
        Box::pin(Store::tip(self))
    }

    fn dedicated_sink(&self) -> BoxFuture<'_, Result<Box<dyn BlockSink>>> {
        Box::pin(async {
            let writer = self.dedicated_writer().await?;
            Ok(Box::new(writer) as Box<dyn BlockSink>)
        })
    }
}

async fn spawn_connection(config: &StoreConfig) -> Result<Client> {
    let (client, connection) = config.pg_config().connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "postgres connection terminated");
        }
    });
    Ok(client)
}
