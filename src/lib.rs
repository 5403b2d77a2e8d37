//! Multi-step user registration wizard.

pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod wizard;
