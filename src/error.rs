//! Error types for the registration wizard.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by wizard transitions.
///
/// Every variant except `Store` is recoverable and concerns one field; the
/// form is redisplayed at the same step with the message attached.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("The email {email} is not valid.")]
    EmailInvalid { email: String },

    #[error("The email {email} is already taken.")]
    EmailTaken { email: String },

    #[error("{label} field is required.")]
    MissingField { key: String, label: String },

    #[error("The value {value} is not a valid choice for {label}.")]
    InvalidChoice {
        key: String,
        label: String,
        value: String,
    },

    #[error("The registration can only be finished from the last step.")]
    NotAtFinalStep,

    #[error("The user {email} could not be created: {reason}")]
    AccountCreation { email: String, reason: String },

    #[error("Storage unavailable: {0}")]
    Store(#[from] DatabaseError),
}

impl WizardError {
    /// Catalog key of the field this error is attached to, if any.
    pub fn field_key(&self) -> Option<&str> {
        match self {
            Self::EmailInvalid { .. } | Self::EmailTaken { .. } | Self::AccountCreation { .. } => {
                Some(crate::wizard::catalog::EMAIL_KEY)
            }
            Self::MissingField { key, .. } | Self::InvalidChoice { key, .. } => Some(key.as_str()),
            Self::NotAtFinalStep | Self::Store(_) => None,
        }
    }

    /// Short machine-readable code for the error, used by the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmailInvalid { .. } => "invalid",
            Self::EmailTaken { .. } => "taken",
            Self::MissingField { .. } => "required",
            Self::InvalidChoice { .. } => "invalid_choice",
            Self::NotAtFinalStep => "not_at_final_step",
            Self::AccountCreation { .. } => "account_creation",
            Self::Store(_) => "store",
        }
    }
}
