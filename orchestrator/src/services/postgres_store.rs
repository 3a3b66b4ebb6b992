//! Authoritative row counts and server identity from PostgreSQL

use async_trait::async_trait;
use loadgen::PgConnector;
use shared::{validate_identifier, RunId};
use std::time::Duration;
use tokio_postgres::Client;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::AuthoritativeStore;
use crate::types::ServerIdentity;

/// Opens a fresh connection per query: after a failover, a pooled
/// connection would still point at the old primary.
pub struct PostgresStore {
    connector: PgConnector,
    count_sql: String,
    query_timeout: Duration,
}

impl PostgresStore {
    pub fn new(connector: PgConnector, table: &str, query_timeout: Duration) -> OrchestratorResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            connector,
            count_sql: format!("SELECT COUNT(*) FROM {table} WHERE run_id = $1"),
            query_timeout,
        })
    }

    async fn client(&self) -> OrchestratorResult<Client> {
        Ok(self.connector.connect().await?)
    }

    async fn bounded<T, F>(&self, what: &str, query: F) -> OrchestratorResult<T>
    where
        F: std::future::Future<Output = OrchestratorResult<T>>,
    {
        tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| {
                OrchestratorError::database(format!(
                    "{what} timed out after {}ms",
                    self.query_timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl AuthoritativeStore for PostgresStore {
    async fn count_rows(&self, run_id: &RunId) -> OrchestratorResult<u64> {
        let run_id = run_id.to_string();
        self.bounded("row count", async {
            let client = self.client().await?;
            let row = client.query_one(self.count_sql.as_str(), &[&run_id]).await?;
            let count: i64 = row.try_get(0)?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn server_identity(&self) -> OrchestratorResult<ServerIdentity> {
        self.bounded("server identity", async {
            let client = self.client().await?;
            let row = client
                .query_one(
                    "SELECT host(inet_server_addr()), inet_server_port(), current_database(), version()",
                    &[],
                )
                .await?;
            Ok(ServerIdentity {
                address: row.try_get(0)?,
                port: row.try_get(1)?,
                database: row.try_get(2)?,
                version: row.try_get(3)?,
            })
        })
        .await
    }
}
