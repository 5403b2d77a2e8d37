//! libSQL backend — implements the identity, record and session stores.
//!
//! Supports local file and in-memory databases. All statements go through one
//! connection behind a mutex, so a transaction never interleaves with another
//! request's statements.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    AccountId, IdentityStore, RecordId, RecordStore, SessionStore, SubmissionRecord,
};
use crate::wizard::email;
use crate::wizard::state::WizardSession;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Access is
/// serialized: SQLite transaction state belongs to the connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Mutex<Connection>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn: Mutex::new(conn),
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn: Mutex::new(conn),
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await;
        migrations::run_migrations(&conn).await
    }

    /// Lock the connection for the duration of one operation.
    async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Fixed-width UTC timestamp, so stored values compare correctly as text.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

// ── Identity ────────────────────────────────────────────────────────

#[async_trait]
impl IdentityStore for LibSqlBackend {
    async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT 1 FROM users WHERE email = ?1 LIMIT 1",
                params![email::normalize(email)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("email_exists: {e}")))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DatabaseError::Query(format!("email_exists: {e}"))),
        }
    }

    async fn create_account(&self, email: &str) -> Result<AccountId, DatabaseError> {
        let id = Uuid::new_v4();
        let email = email::normalize(email);

        self.conn()
            .await
            .execute(
                "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                params![id.to_string(), email.as_str(), timestamp(Utc::now())],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DatabaseError::Constraint(format!("email {email} already registered"))
                } else {
                    DatabaseError::Query(format!("create_account: {e}"))
                }
            })?;

        debug!(account_id = %id, "Account row inserted");
        Ok(id)
    }
}

// ── Records ─────────────────────────────────────────────────────────

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn insert(&self, record: &SubmissionRecord) -> Result<RecordId, DatabaseError> {
        let conn = self.conn().await;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert record: begin: {e}")))?;

        let result = tx
            .execute(
                "INSERT INTO registration_records (email, first_name, last_name, gender, city, phone, address, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    email::normalize(record.email()),
                    opt_text(record.value_for_column("first_name")),
                    opt_text(record.value_for_column("last_name")),
                    opt_text(record.value_for_column("gender")),
                    opt_text(record.value_for_column("city")),
                    opt_text(record.value_for_column("phone")),
                    opt_text(record.value_for_column("address")),
                    timestamp(record.submitted_at),
                ],
            )
            .await;

        match result {
            Ok(_) => {
                let id = tx.last_insert_rowid();
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("insert record: commit: {e}")))?;
                Ok(id)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Failed to roll back record insert: {}", rb);
                }
                Err(DatabaseError::Query(format!("insert record: {e}")))
            }
        }
    }
}

// ── Sessions ────────────────────────────────────────────────────────

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn load_session(&self, id: Uuid) -> Result<Option<WizardSession>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT state FROM wizard_sessions WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let state: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_session: {e}")))?;
                let session = serde_json::from_str(&state)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                Ok(Some(session))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_session: {e}"))),
        }
    }

    async fn save_session(&self, id: Uuid, session: &WizardSession) -> Result<(), DatabaseError> {
        let state = serde_json::to_string(session)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = timestamp(Utc::now());

        self.conn()
            .await
            .execute(
                "INSERT INTO wizard_sessions (id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO UPDATE SET state = ?2, updated_at = ?3",
                params![id.to_string(), state, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_session: {e}")))?;

        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .await
            .execute(
                "DELETE FROM wizard_sessions WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(count > 0)
    }

    async fn purge_sessions(&self, older_than: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let count = self
            .conn()
            .await
            .execute(
                "DELETE FROM wizard_sessions WHERE updated_at < ?1",
                params![timestamp(older_than)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("purge_sessions: {e}")))?;
        if count > 0 {
            debug!(count, "Purged stale wizard sessions");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::wizard::state::WizardStep;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    async fn count_records(db: &LibSqlBackend, email: &str) -> i64 {
        let conn = db.conn().await;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM registration_records WHERE email = ?1",
                params![email],
            )
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    fn make_record(email: &str) -> SubmissionRecord {
        let values: BTreeMap<String, String> = [
            ("email", email),
            ("firstName", "Ada"),
            ("lastName", "Lovelace"),
            ("gender", "F"),
            ("city", "London"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        SubmissionRecord::new(values)
    }

    // ── Identity tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn email_exists_after_account_created() {
        let db = test_db().await;
        assert!(!db.email_exists("ada@example.com").await.unwrap());

        db.create_account("ada@example.com").await.unwrap();
        assert!(db.email_exists("ada@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn email_exists_ignores_case() {
        let db = test_db().await;
        db.create_account("Ada@Example.com").await.unwrap();
        assert!(db.email_exists("ADA@example.COM").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_account_is_constraint_error() {
        let db = test_db().await;
        db.create_account("ada@example.com").await.unwrap();

        let err = db.create_account("ADA@example.com").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn account_ids_are_unique() {
        let db = test_db().await;
        let a = db.create_account("a@example.com").await.unwrap();
        let b = db.create_account("b@example.com").await.unwrap();
        assert_ne!(a, b);
    }

    // ── Record tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_record_returns_increasing_ids() {
        let db = test_db().await;
        let first = db.insert(&make_record("ada@example.com")).await.unwrap();
        let second = db.insert(&make_record("bob@example.com")).await.unwrap();
        assert!(second > first);
        assert_eq!(count_records(&db, "ada@example.com").await, 1);
    }

    #[tokio::test]
    async fn insert_record_stores_columns() {
        let db = test_db().await;
        let mut record = make_record("Ada@Example.com");
        record
            .values
            .insert("phone".to_string(), "+44 20 7946 0000".to_string());
        let id = db.insert(&record).await.unwrap();

        let conn = db.conn().await;
        let mut rows = conn
            .query(
                "SELECT email, first_name, gender, phone, address FROM registration_records WHERE id = ?1",
                params![id],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "ada@example.com");
        assert_eq!(row.get::<String>(1).unwrap(), "Ada");
        assert_eq!(row.get::<String>(2).unwrap(), "F");
        assert_eq!(row.get::<String>(3).unwrap(), "+44 20 7946 0000");
        assert_eq!(row.get::<Option<String>>(4).unwrap(), None);
    }

    #[tokio::test]
    async fn records_do_not_create_accounts() {
        let db = test_db().await;
        db.insert(&make_record("ada@example.com")).await.unwrap();
        assert!(!db.email_exists("ada@example.com").await.unwrap());
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn session_save_and_load() {
        let db = test_db().await;
        let id = Uuid::new_v4();
        let mut session = WizardSession::new();
        session.merge_values([("email", "ada@example.com"), ("city", "London")]);
        session.step_forward();

        db.save_session(id, &session).await.unwrap();
        let loaded = db.load_session(id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.current_step, WizardStep::Contact);
    }

    #[tokio::test]
    async fn session_save_overwrites() {
        let db = test_db().await;
        let id = Uuid::new_v4();
        let mut session = WizardSession::new();
        db.save_session(id, &session).await.unwrap();

        session.step_forward();
        session.step_forward();
        db.save_session(id, &session).await.unwrap();

        let loaded = db.load_session(id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, WizardStep::Confirmation);
    }

    #[tokio::test]
    async fn session_missing_is_none() {
        let db = test_db().await;
        assert!(db.load_session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_delete() {
        let db = test_db().await;
        let id = Uuid::new_v4();
        db.save_session(id, &WizardSession::new()).await.unwrap();

        assert!(db.delete_session(id).await.unwrap());
        assert!(db.load_session(id).await.unwrap().is_none());
        assert!(!db.delete_session(id).await.unwrap());
    }

    #[tokio::test]
    async fn sessions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("register.db");
        let id = Uuid::new_v4();

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            let mut session = WizardSession::new();
            session.merge_values([("firstName", "Ada")]);
            session.step_forward();
            db.save_session(id, &session).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let loaded = db.load_session(id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, WizardStep::Contact);
        assert_eq!(loaded.value("firstName"), Some("Ada"));
    }

    #[tokio::test]
    async fn purge_removes_only_stale_sessions() {
        let db = test_db().await;
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        db.save_session(stale, &WizardSession::new()).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        db.save_session(fresh, &WizardSession::new()).await.unwrap();

        assert_eq!(db.purge_sessions(cutoff).await.unwrap(), 1);
        assert!(db.load_session(stale).await.unwrap().is_none());
        assert!(db.load_session(fresh).await.unwrap().is_some());
        assert_eq!(db.purge_sessions(cutoff).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writes_on_shared_backend_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(
            LibSqlBackend::new_local(&dir.path().join("register.db"))
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..64 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                let email = format!("user{i}@example.com");
                let session_id = Uuid::new_v4();
                db.insert(&make_record(&email)).await?;
                db.save_session(session_id, &WizardSession::new()).await?;
                db.create_account(&email).await?;
                Ok::<Uuid, DatabaseError>(session_id)
            }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }

        let conn = db.conn().await;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM registration_records", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 64);
        drop(rows);
        drop(conn);

        for id in sessions {
            assert!(db.load_session(id).await.unwrap().is_some());
        }
    }
}
