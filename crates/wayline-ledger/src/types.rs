use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// A ledger record as stored in the database.
///
/// At most one non-obsolete record exists per
/// (reference_id, group, stage) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LedgerRecord {
  pub reference_id: String,

  #[sqlx(rename = "workflow_group")]
  pub group: String,

  pub stage: String,

  pub request: Json<serde_json::Value>,

  /// Null until the stage's reply arrives.
  pub response: Option<Json<serde_json::Value>>,

  pub obsolete: bool,

  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
