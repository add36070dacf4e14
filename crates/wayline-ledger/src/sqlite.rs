use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use wayline_message::QueueMessage;

use crate::types::LedgerRecord;
use crate::{Error, Ledger};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS ledger_records (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  reference_id TEXT NOT NULL,
  workflow_group TEXT NOT NULL,
  stage TEXT NOT NULL,
  request TEXT NOT NULL,
  response TEXT,
  obsolete INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
)";

const CREATE_INDEX: &str = "
CREATE INDEX IF NOT EXISTS idx_ledger_run
ON ledger_records (reference_id, workflow_group, obsolete)";

const RECORD_COLUMNS: &str =
  "reference_id, workflow_group, stage, request, response, obsolete, created_at, updated_at";

/// SQLite-backed ledger.
pub struct SqliteLedger {
  pool: SqlitePool,
}

impl SqliteLedger {
  /// Wrap an existing pool. Call [`SqliteLedger::migrate`] before use.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Connect to a database URL and run migrations.
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let pool = SqlitePool::connect(url).await?;
    let ledger = Self::new(pool);
    ledger.migrate().await?;
    Ok(ledger)
  }

  /// A fresh in-memory ledger, for tests and local runs.
  ///
  /// The pool is pinned to a single connection; each SQLite in-memory
  /// connection is its own database.
  pub async fn in_memory() -> Result<Self, Error> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await?;
    let ledger = Self::new(pool);
    ledger.migrate().await?;
    Ok(ledger)
  }

  /// Create the ledger schema if it does not exist.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
    sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
    Ok(())
  }

  async fn find_open_record_id(
    &self,
    reference_id: &str,
    group: &str,
    stage: &str,
  ) -> Result<Option<i64>, Error> {
    let row: Option<(i64,)> = sqlx::query_as(
      "SELECT id FROM ledger_records
       WHERE reference_id = ? AND workflow_group = ? AND stage = ? AND obsolete = 0",
    )
    .bind(reference_id)
    .bind(group)
    .bind(stage)
    .fetch_optional(&self.pool)
    .await?;
    Ok(row.map(|(id,)| id))
  }
}

#[async_trait]
impl Ledger for SqliteLedger {
  async fn log_request(
    &self,
    group: &str,
    stage: &str,
    message: &QueueMessage,
  ) -> Result<(), Error> {
    let now = Utc::now();

    match self
      .find_open_record_id(&message.reference_id, group, stage)
      .await?
    {
      Some(id) => {
        // Redelivered trigger: the latest request payload wins.
        sqlx::query("UPDATE ledger_records SET request = ?, updated_at = ? WHERE id = ?")
          .bind(Json(&message.data))
          .bind(now)
          .bind(id)
          .execute(&self.pool)
          .await?;
      }
      None => {
        sqlx::query(
          "INSERT INTO ledger_records
             (reference_id, workflow_group, stage, request, response, obsolete, created_at, updated_at)
           VALUES (?, ?, ?, ?, NULL, 0, ?, ?)",
        )
        .bind(&message.reference_id)
        .bind(group)
        .bind(stage)
        .bind(Json(&message.data))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
      }
    }

    Ok(())
  }

  async fn log_response(&self, stage: &str, message: &QueueMessage) -> Result<(), Error> {
    // No matching request row means the reply is dropped, not an error; the
    // bus will redeliver it once the request side is durable.
    sqlx::query(
      "UPDATE ledger_records SET response = ?, updated_at = ?
       WHERE reference_id = ? AND stage = ? AND obsolete = 0",
    )
    .bind(Json(&message.data))
    .bind(Utc::now())
    .bind(&message.reference_id)
    .bind(stage)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn obsolete(&self, reference_id: &str, group: &str) -> Result<(), Error> {
    sqlx::query(
      "UPDATE ledger_records SET obsolete = 1, updated_at = ?
       WHERE reference_id = ? AND workflow_group = ? AND obsolete = 0",
    )
    .bind(Utc::now())
    .bind(reference_id)
    .bind(group)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn latest(
    &self,
    reference_id: &str,
    group: &str,
  ) -> Result<Option<LedgerRecord>, Error> {
    let record = sqlx::query_as::<_, LedgerRecord>(&format!(
      "SELECT {RECORD_COLUMNS} FROM ledger_records
       WHERE reference_id = ? AND workflow_group = ? AND obsolete = 0
       ORDER BY updated_at DESC, id DESC
       LIMIT 1"
    ))
    .bind(reference_id)
    .bind(group)
    .fetch_optional(&self.pool)
    .await?;

    Ok(record)
  }
}
