//! Registration wizard — three-step form with live email validation.
//!
//! Step 1 collects identity fields, step 2 contact fields, step 3 asks for
//! confirmation. Values are carried between steps in a `WizardSession`;
//! finishing creates the account and archives the submitted values.

pub mod catalog;
pub mod controller;
pub mod email;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod view;

pub use catalog::{CATALOG, FieldDefinition, FieldKind};
pub use controller::{Registration, WizardController};
pub use routes::{RegisterRouteState, register_routes};
pub use sessions::spawn_purge_task;
pub use state::{WizardSession, WizardStep};
pub use view::{ActionKind, FieldView, FormAction, FormView, ValidationFeedback};
