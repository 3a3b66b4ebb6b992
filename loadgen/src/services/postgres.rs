//! PostgreSQL probe backed by tokio-postgres

use async_trait::async_trait;
use shared::{
    harness_debug, harness_info, Component, DatabaseTarget, FailureKind, ProbeMode, ProbeOutcome,
    RunId,
};
use std::io;
use std::str::FromStr;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, Config, NoTls};

use crate::error::{LoadgenError, LoadgenResult};
use crate::traits::Prober;

/// Opens client connections to the target database
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: Config,
    description: String,
}

impl PgConnector {
    pub fn from_target(target: &DatabaseTarget) -> LoadgenResult<Self> {
        if target.ssl_mode.as_deref() == Some("require") {
            return Err(LoadgenError::config(
                "sslmode=require is not supported; connections are made without TLS",
            ));
        }

        let mut config = Config::from_str(target.connection_string())
            .map_err(|e| LoadgenError::config(format!("invalid connection settings: {e}")))?;
        config.connect_timeout(target.connect_timeout);

        Ok(Self {
            config,
            description: target.describe(),
        })
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Connect and drive the connection on a background task
    pub async fn connect(&self) -> Result<Client, tokio_postgres::Error> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                harness_debug!(Component::Prober, error = %e, "Connection closed");
            }
        });
        Ok(client)
    }
}

/// Probe issuing one insert (or `SELECT 1`) per attempt
///
/// Each worker owns one client slot. A failed attempt drops that worker's
/// client and the next attempt reconnects, so recovery is observed as soon as
/// the database accepts new connections.
pub struct PostgresProber {
    connector: PgConnector,
    table: String,
    insert_sql: String,
    run_id: String,
    mode: ProbeMode,
    slots: Vec<Mutex<Option<Client>>>,
}

impl PostgresProber {
    pub fn new(
        connector: PgConnector,
        target: &DatabaseTarget,
        run_id: &RunId,
        mode: ProbeMode,
        worker_count: u32,
    ) -> Self {
        Self {
            connector,
            table: target.table.clone(),
            insert_sql: format!(
                "INSERT INTO {} (run_id, worker_id) VALUES ($1, $2)",
                target.table
            ),
            run_id: run_id.to_string(),
            mode,
            slots: (0..worker_count).map(|_| Mutex::new(None)).collect(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn execute(&self, client: &Client, worker: u32) -> Result<(), tokio_postgres::Error> {
        match self.mode {
            ProbeMode::Insert => {
                let worker_id = worker as i32;
                client
                    .execute(self.insert_sql.as_str(), &[&self.run_id, &worker_id])
                    .await?;
            }
            ProbeMode::Connectivity => {
                client.query_one("SELECT 1", &[]).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Prober for PostgresProber {
    async fn prepare(&self) -> LoadgenResult<()> {
        let client = self.connector.connect().await.map_err(|e| {
            LoadgenError::setup(format!(
                "cannot connect to {}: {e}",
                self.connector.describe()
            ))
        })?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| LoadgenError::setup(format!("connectivity check failed: {e}")))?;

        if self.mode.writes_rows() {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    id BIGSERIAL PRIMARY KEY,
                    run_id TEXT NOT NULL,
                    worker_id INTEGER NOT NULL,
                    written_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS {t}_run_id_idx ON {t} (run_id);",
                t = self.table
            );
            client
                .batch_execute(&ddl)
                .await
                .map_err(|e| LoadgenError::setup(format!("cannot create table {}: {e}", self.table)))?;
        }

        harness_info!(
            Component::Prober,
            target = %self.connector.describe(),
            mode = %self.mode,
            "✅ Database ready"
        );
        Ok(())
    }

    async fn attempt(&self, worker: u32) -> ProbeOutcome {
        let Some(slot) = self.slots.get(worker as usize) else {
            return ProbeOutcome::failure(FailureKind::Other, format!("no client slot for worker {worker}"));
        };
        let mut slot = slot.lock().await;

        // Taken out for the duration of the call; only put back after a success
        let client = match slot.take() {
            Some(client) if !client.is_closed() => client,
            _ => match self.connector.connect().await {
                Ok(client) => client,
                Err(e) => return ProbeOutcome::failure(classify_error(&e), e.to_string()),
            },
        };

        match self.execute(&client, worker).await {
            Ok(()) => {
                *slot = Some(client);
                ProbeOutcome::Success
            }
            Err(e) => ProbeOutcome::failure(classify_error(&e), e.to_string()),
        }
    }

    fn mode(&self) -> ProbeMode {
        self.mode
    }
}

/// Map a driver error onto the failure taxonomy
pub fn classify_error(err: &tokio_postgres::Error) -> FailureKind {
    let io_kind = std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(io::Error::kind);
    classify_parts(err.code(), io_kind, &err.to_string())
}

/// Classification from the pieces of an error: SQLSTATE first, then the
/// underlying socket error, then the message text
pub fn classify_parts(
    code: Option<&SqlState>,
    io_kind: Option<io::ErrorKind>,
    message: &str,
) -> FailureKind {
    if let Some(code) = code {
        return if code.code().starts_with("28") || *code == SqlState::PROTOCOL_VIOLATION {
            FailureKind::AuthOrProtocolError
        } else if *code == SqlState::QUERY_CANCELED {
            FailureKind::Timeout
        } else if *code == SqlState::ADMIN_SHUTDOWN
            || *code == SqlState::CRASH_SHUTDOWN
            || *code == SqlState::CANNOT_CONNECT_NOW
        {
            FailureKind::ConnectionRefused
        } else {
            FailureKind::Other
        };
    }

    match io_kind {
        Some(
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof,
        ) => return FailureKind::ConnectionRefused,
        Some(io::ErrorKind::TimedOut) => return FailureKind::Timeout,
        _ => {}
    }

    let message = message.to_ascii_lowercase();
    if message.contains("timed out") || message.contains("timeout") {
        FailureKind::Timeout
    } else if message.contains("refused") || message.contains("closed") || message.contains("reset") {
        FailureKind::ConnectionRefused
    } else if message.contains("password") || message.contains("authentication") || message.contains("tls") {
        FailureKind::AuthOrProtocolError
    } else {
        FailureKind::Other
    }
}
