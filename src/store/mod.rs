//! Persistence layer — accounts, archived submissions and wizard sessions.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    AccountId, IdentityStore, RecordId, RecordStore, SessionStore, SubmissionRecord,
};
