use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::transaction::{Transaction, TransactionError};

/// Outcome of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// One record in the append-only admission log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub status: AuditStatus,
    pub reason: String,
    #[serde(rename = "tx")]
    pub transaction: Transaction,
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn accepted(transaction: Transaction) -> Self {
        AuditEntry {
            status: AuditStatus::Success,
            reason: "Added to mempool".to_string(),
            transaction,
            timestamp: Utc::now(),
        }
    }

    pub fn rejected(transaction: Transaction, error: &TransactionError) -> Self {
        AuditEntry {
            status: AuditStatus::Failed,
            reason: error.reason().to_string(),
            transaction,
            timestamp: Utc::now(),
        }
    }
}
