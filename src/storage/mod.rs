//! Persistence layer.
//!
//! Defines the `Store` trait — the formal contract every component uses
//! for persisted state — and a SQLite implementation on sqlx. All writes
//! are keyed by natural identity and safe under crash-and-restart:
//! opportunity inserts are first-write-wins, worker rows are created
//! once and updated in place, system logs are append-only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{debug, info};

use crate::types::{
    LogLevel, OpportunityCandidate, OpportunityStatus, SystemLogEntry, WorkerOperation,
    WorkerStats, WorkerStatus,
};

/// Formal contract for persistent operational state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a candidate if its natural key (source, contract, token)
    /// is absent. Existing rows are left untouched — no rescoring, no
    /// overwrite. Returns true if a row was inserted.
    async fn upsert_opportunity(&self, candidate: &OpportunityCandidate) -> Result<bool>;

    /// Up to `limit` discovered opportunities, score descending, ties
    /// broken by discovery time ascending.
    async fn top_opportunities(&self, limit: i64) -> Result<Vec<OpportunityCandidate>>;

    /// Create the persisted row for a coin if absent (status inactive).
    async fn ensure_worker_operation(
        &self,
        coin: &str,
        pool_endpoint: &str,
        wallet_address: &str,
    ) -> Result<()>;

    /// Update a worker operation's lifecycle status.
    async fn update_worker_status(
        &self,
        coin: &str,
        status: WorkerStatus,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Persist the latest stats snapshot for a coin.
    /// `earnings_total` never decreases.
    async fn update_worker_stats(&self, coin: &str, stats: &WorkerStats) -> Result<()>;

    async fn list_worker_operations(&self) -> Result<Vec<WorkerOperation>>;

    /// Append an audit-trail entry.
    async fn append_log(&self, entry: &SystemLogEntry) -> Result<()>;

    /// Most recent log entries, newest first, optionally filtered by level.
    async fn recent_logs(&self, limit: i64, level: Option<LogLevel>) -> Result<Vec<SystemLogEntry>>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Row types (SQLite → Rust)
// ---------------------------------------------------------------------------

#[derive(FromRow)]
struct OpportunityRow {
    source: String,
    contract_address: String,
    token_id: String,
    name: Option<String>,
    collection_name: Option<String>,
    price_native: f64,
    score: f64,
    marketplace_url: Option<String>,
    image_url: Option<String>,
    metadata: String,
    discovered_at: DateTime<Utc>,
    status: String,
}

impl OpportunityRow {
    fn into_candidate(self) -> OpportunityCandidate {
        OpportunityCandidate {
            source: self.source,
            contract_address: self.contract_address,
            token_id: self.token_id,
            name: self.name,
            collection_name: self.collection_name,
            price_native: self.price_native,
            score: self.score,
            marketplace_url: self.marketplace_url,
            image_url: self.image_url,
            metadata: serde_json::from_str(&self.metadata).unwrap_or(serde_json::Value::Null),
            discovered_at: self.discovered_at,
            status: OpportunityStatus::parse(&self.status),
        }
    }
}

#[derive(FromRow)]
struct WorkerOperationRow {
    coin: String,
    pool_endpoint: String,
    wallet_address: String,
    hashrate: f64,
    shares_accepted: i64,
    shares_rejected: i64,
    earnings_today: f64,
    earnings_total: f64,
    status: String,
    started_at: Option<DateTime<Utc>>,
    last_update: DateTime<Utc>,
}

impl WorkerOperationRow {
    fn into_operation(self) -> WorkerOperation {
        WorkerOperation {
            coin: self.coin,
            pool_endpoint: self.pool_endpoint,
            wallet_address: self.wallet_address,
            hashrate: self.hashrate,
            shares_accepted: self.shares_accepted,
            shares_rejected: self.shares_rejected,
            earnings_today: self.earnings_today,
            earnings_total: self.earnings_total,
            status: WorkerStatus::parse(&self.status),
            started_at: self.started_at,
            last_update: self.last_update,
        }
    }
}

#[derive(FromRow)]
struct SystemLogRow {
    level: String,
    module: String,
    message: String,
    details: Option<String>,
    timestamp: DateTime<Utc>,
}

impl SystemLogRow {
    fn into_entry(self) -> SystemLogEntry {
        SystemLogEntry {
            level: LogLevel::parse(&self.level),
            module: self.module,
            message: self.message,
            details: self
                .details
                .and_then(|d| serde_json::from_str(&d).ok()),
            timestamp: self.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a file-backed store.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{db_path}?mode=rwc"))
            .await
            .context("Failed to connect to SQLite database")?;
        let store = Self { pool };
        store.migrate().await?;
        info!(db_path, "SQLite store initialized");
        Ok(store)
    }

    /// In-memory store for tests. A single connection keeps all queries
    /// on the same database.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS opportunities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                contract_address TEXT NOT NULL,
                token_id TEXT NOT NULL,
                name TEXT,
                collection_name TEXT,
                price_native REAL NOT NULL DEFAULT 0,
                score REAL NOT NULL,
                marketplace_url TEXT,
                image_url TEXT,
                metadata TEXT NOT NULL DEFAULT 'null',
                discovered_at TIMESTAMP NOT NULL,
                status TEXT NOT NULL DEFAULT 'discovered',
                UNIQUE(source, contract_address, token_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create opportunities table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS worker_operations (
                coin TEXT PRIMARY KEY,
                pool_endpoint TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                hashrate REAL NOT NULL DEFAULT 0,
                shares_accepted INTEGER NOT NULL DEFAULT 0,
                shares_rejected INTEGER NOT NULL DEFAULT 0,
                earnings_today REAL NOT NULL DEFAULT 0,
                earnings_total REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'inactive',
                started_at TIMESTAMP,
                last_update TIMESTAMP NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create worker_operations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL,
                module TEXT NOT NULL,
                message TEXT NOT NULL,
                details TEXT,
                timestamp TIMESTAMP NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create system_logs table")?;

        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_opportunity(&self, candidate: &OpportunityCandidate) -> Result<bool> {
        let metadata = serde_json::to_string(&candidate.metadata)?;
        let result = sqlx::query(
            r#"
            INSERT INTO opportunities (
                source, contract_address, token_id, name, collection_name,
                price_native, score, marketplace_url, image_url, metadata,
                discovered_at, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, contract_address, token_id) DO NOTHING;
            "#,
        )
        .bind(&candidate.source)
        .bind(&candidate.contract_address)
        .bind(&candidate.token_id)
        .bind(&candidate.name)
        .bind(&candidate.collection_name)
        .bind(candidate.price_native)
        .bind(candidate.score)
        .bind(&candidate.marketplace_url)
        .bind(&candidate.image_url)
        .bind(metadata)
        .bind(candidate.discovered_at)
        .bind(candidate.status.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to upsert opportunity")?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(
                source = %candidate.source,
                token = %candidate.token_id,
                score = candidate.score,
                "Opportunity persisted"
            );
        }
        Ok(inserted)
    }

    async fn top_opportunities(&self, limit: i64) -> Result<Vec<OpportunityCandidate>> {
        let rows: Vec<OpportunityRow> = sqlx::query_as(
            r#"
            SELECT source, contract_address, token_id, name, collection_name,
                   price_native, score, marketplace_url, image_url, metadata,
                   discovered_at, status
            FROM opportunities
            WHERE status = 'discovered'
            ORDER BY score DESC, discovered_at ASC
            LIMIT ?;
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query top opportunities")?;

        Ok(rows.into_iter().map(OpportunityRow::into_candidate).collect())
    }

    async fn ensure_worker_operation(
        &self,
        coin: &str,
        pool_endpoint: &str,
        wallet_address: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO worker_operations (coin, pool_endpoint, wallet_address, last_update)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(coin) DO NOTHING;
            "#,
        )
        .bind(coin)
        .bind(pool_endpoint)
        .bind(wallet_address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to ensure worker operation row")?;
        Ok(())
    }

    async fn update_worker_status(
        &self,
        coin: &str,
        status: WorkerStatus,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE worker_operations
            SET status = ?, started_at = ?, last_update = ?
            WHERE coin = ?;
            "#,
        )
        .bind(status.to_string())
        .bind(started_at)
        .bind(Utc::now())
        .bind(coin)
        .execute(&self.pool)
        .await
        .context("Failed to update worker status")?;
        Ok(())
    }

    async fn update_worker_stats(&self, coin: &str, stats: &WorkerStats) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE worker_operations
            SET hashrate = ?,
                shares_accepted = ?,
                shares_rejected = ?,
                earnings_today = ?,
                earnings_total = MAX(earnings_total, ?),
                last_update = ?
            WHERE coin = ?;
            "#,
        )
        .bind(stats.hashrate)
        .bind(stats.shares_accepted)
        .bind(stats.shares_rejected)
        .bind(stats.earnings_today)
        .bind(stats.earnings_total)
        .bind(Utc::now())
        .bind(coin)
        .execute(&self.pool)
        .await
        .context("Failed to update worker stats")?;
        Ok(())
    }

    async fn list_worker_operations(&self) -> Result<Vec<WorkerOperation>> {
        let rows: Vec<WorkerOperationRow> = sqlx::query_as(
            r#"
            SELECT coin, pool_endpoint, wallet_address, hashrate,
                   shares_accepted, shares_rejected, earnings_today,
                   earnings_total, status, started_at, last_update
            FROM worker_operations
            ORDER BY coin ASC;
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list worker operations")?;

        Ok(rows.into_iter().map(WorkerOperationRow::into_operation).collect())
    }

    async fn append_log(&self, entry: &SystemLogEntry) -> Result<()> {
        let details = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO system_logs (level, module, message, details, timestamp)
            VALUES (?, ?, ?, ?, ?);
            "#,
        )
        .bind(entry.level.to_string())
        .bind(&entry.module)
        .bind(&entry.message)
        .bind(details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to append system log")?;
        Ok(())
    }

    async fn recent_logs(&self, limit: i64, level: Option<LogLevel>) -> Result<Vec<SystemLogEntry>> {
        let rows: Vec<SystemLogRow> = match level {
            Some(level) => {
                sqlx::query_as(
                    r#"
                    SELECT level, module, message, details, timestamp
                    FROM system_logs
                    WHERE level = ?
                    ORDER BY timestamp DESC, id DESC
                    LIMIT ?;
                    "#,
                )
                .bind(level.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT level, module, message, details, timestamp
                    FROM system_logs
                    ORDER BY timestamp DESC, id DESC
                    LIMIT ?;
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to query system logs")?;

        Ok(rows.into_iter().map(SystemLogRow::into_entry).collect())
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Store health check failed")?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
