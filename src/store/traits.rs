//! Storage collaborators consumed by the wizard.
//!
//! The controller only sees these traits; `LibSqlBackend` implements all of
//! them, tests supply in-memory stubs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::wizard::catalog::{self, EMAIL_KEY};
use crate::wizard::state::WizardSession;

/// Identifier of a created account.
pub type AccountId = Uuid;

/// Row id of an archived submission.
pub type RecordId = i64;

/// Snapshot of the collected values at finish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRecord {
    pub values: BTreeMap<String, String>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            submitted_at: Utc::now(),
        }
    }

    pub fn email(&self) -> &str {
        self.get(EMAIL_KEY).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value stored under a `registration_records` column, if collected.
    pub fn value_for_column(&self, column: &str) -> Option<&str> {
        catalog::CATALOG
            .iter()
            .find(|f| f.column == column)
            .and_then(|f| self.get(f.key))
    }
}

/// User-account subsystem: uniqueness checks and account creation.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether an account already uses `email` (case-insensitive).
    async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError>;

    /// Create an account for `email`.
    async fn create_account(&self, email: &str) -> Result<AccountId, DatabaseError>;
}

/// Side table that archives raw submitted values.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one submission inside a single transaction. Single attempt.
    async fn insert(&self, record: &SubmissionRecord) -> Result<RecordId, DatabaseError>;
}

/// Persistence for in-progress wizard sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, id: Uuid) -> Result<Option<WizardSession>, DatabaseError>;

    /// Insert or replace the stored state for `id`.
    async fn save_session(&self, id: Uuid, session: &WizardSession) -> Result<(), DatabaseError>;

    /// Returns true if a session was deleted.
    async fn delete_session(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Delete sessions last saved before `older_than`. Returns the number removed.
    async fn purge_sessions(&self, older_than: DateTime<Utc>) -> Result<u64, DatabaseError>;
}
