//! WizardController — step transitions, field projection and final submission.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DatabaseError, WizardError};
use crate::store::traits::{AccountId, IdentityStore, RecordId, RecordStore, SubmissionRecord};

use super::catalog::{self, EMAIL_KEY, FieldDefinition};
use super::email;
use super::state::{WizardSession, WizardStep};
use super::view::{ActionKind, FieldView, FormAction, FormView, ValidationFeedback};

/// Text shown on the confirmation step.
pub const CONFIRMATION_NOTICE: &str = "We are ready. Click on finish to create the new user.";

/// Outcome of a successful `finish`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub account_id: AccountId,
    /// Archived submission row, if the record store accepted it.
    pub record_id: Option<RecordId>,
    pub email: String,
    pub message: String,
    /// Non-blocking problem to show next to the success message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Drives the registration wizard.
///
/// Holds no per-visitor state; every operation takes the visitor's
/// `WizardSession` explicitly.
pub struct WizardController {
    identity: Arc<dyn IdentityStore>,
    records: Option<Arc<dyn RecordStore>>,
}

impl WizardController {
    pub fn new(identity: Arc<dyn IdentityStore>) -> Self {
        Self {
            identity,
            records: None,
        }
    }

    /// Archive every successful submission in `records`.
    pub fn with_record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn total_steps(&self) -> u8 {
        WizardStep::COUNT
    }

    /// Project the catalog onto the session's current step.
    pub fn render(&self, session: &WizardSession) -> FormView {
        let current = session.current_step;
        let fields = catalog::CATALOG
            .iter()
            .map(|f| FieldView {
                key: f.key,
                label: f.label,
                kind: f.kind,
                step: f.step.number(),
                visible: f.step == current,
                required: f.required,
                default_value: session.value(f.key).map(str::to_string),
                options: f.options,
                error: None,
            })
            .collect();

        let mut actions: Vec<FormAction> = Vec::new();
        if current.number() > 1 {
            actions.push(ActionKind::Reset.into());
            actions.push(ActionKind::Back.into());
        }
        if current.is_final() {
            actions.push(ActionKind::Finish.into());
        } else {
            actions.push(ActionKind::Forward.into());
        }

        FormView {
            current_step: current.number(),
            total_steps: self.total_steps(),
            progress: format!("Step {} of {}", current.number(), self.total_steps()),
            fields,
            actions,
            notice: current.is_final().then(|| CONFIRMATION_NOTICE.to_string()),
            message: None,
        }
    }

    /// Render and attach `error` to the field it concerns.
    pub fn render_with_error(&self, session: &WizardSession, error: &WizardError) -> FormView {
        let mut view = self.render(session);
        if let Some(key) = error.field_key() {
            if let Some(field) = view.fields.iter_mut().find(|f| f.key == key) {
                field.error = Some(error.code().to_string());
            }
        }
        view.message = Some(error.to_string());
        view
    }

    /// Live validation for a single changed field.
    ///
    /// Only the email field is checked; the session is never modified.
    pub async fn on_field_changed(
        &self,
        session: &WizardSession,
        key: &str,
        value: &str,
    ) -> ValidationFeedback {
        if key != EMAIL_KEY || value.trim().is_empty() {
            return ValidationFeedback::ok();
        }
        debug!(step = %session.current_step, "Live email validation");

        match self.check_email(value).await {
            Ok(()) => ValidationFeedback::ok(),
            Err(WizardError::Store(e)) => {
                warn!("Email uniqueness check failed: {}", e);
                ValidationFeedback {
                    field_error: None,
                    message: Some("The email could not be verified right now.".to_string()),
                }
            }
            Err(e) => ValidationFeedback::error(e.code(), e.to_string()),
        }
    }

    /// Merge `submitted` and move to the next step.
    ///
    /// Required and choice fields of the step being left are checked first;
    /// on error the session is left untouched. At the last step the values
    /// are merged but the step does not move.
    pub fn advance<I>(&self, session: &mut WizardSession, submitted: I) -> Result<(), WizardError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut candidate = session.clone();
        let dropped = candidate.merge_values(submitted);
        if !dropped.is_empty() {
            debug!(?dropped, "Ignoring keys outside the field catalog");
        }
        validate_fields(&candidate, catalog::fields_for_step(candidate.current_step))?;

        let from = candidate.current_step;
        if !candidate.step_forward() {
            debug!(step = %from, "Already at last step, not advancing");
        }
        debug!(from = %from, to = %candidate.current_step, "Wizard advanced");
        *session = candidate;
        Ok(())
    }

    /// Go back one step, keeping collected values. Stays at the first step.
    pub fn retreat(&self, session: &mut WizardSession) {
        let from = session.current_step;
        session.step_back();
        debug!(from = %from, to = %session.current_step, "Wizard retreated");
    }

    /// Discard all collected values and return to the first step.
    pub fn reset(&self, session: &mut WizardSession) {
        session.reset();
        debug!("Wizard reset");
    }

    /// Validate and submit the whole form.
    ///
    /// On success the account is created, the values are archived
    /// (best-effort) and the session goes back to its initial state. On any
    /// error the session is left as it was.
    pub async fn finish<I>(
        &self,
        session: &mut WizardSession,
        submitted: I,
    ) -> Result<Registration, WizardError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if !session.current_step.is_final() {
            return Err(WizardError::NotAtFinalStep);
        }

        let mut candidate = session.clone();
        candidate.merge_values(submitted);

        let email = candidate.value(EMAIL_KEY).unwrap_or_default().trim().to_string();
        self.check_email(&email).await?;
        validate_fields(&candidate, catalog::CATALOG.iter())?;

        let record = SubmissionRecord::new(candidate.values.clone());

        let account_id = self
            .identity
            .create_account(&email)
            .await
            .map_err(|e| match e {
                DatabaseError::Constraint(_) => WizardError::EmailTaken {
                    email: email.clone(),
                },
                other => WizardError::AccountCreation {
                    email: email.clone(),
                    reason: other.to_string(),
                },
            })?;
        info!(account_id = %account_id, "New user registered");

        let (record_id, warning) = match &self.records {
            Some(records) => match records.insert(&record).await {
                Ok(id) => (Some(id), None),
                Err(e) => {
                    warn!("Failed to archive registration values: {}", e);
                    (
                        None,
                        Some(format!("The registration details could not be stored: {e}")),
                    )
                }
            },
            None => (None, None),
        };

        session.reset();

        Ok(Registration {
            account_id,
            record_id,
            message: format!("The new user {email} has been created."),
            email,
            warning,
        })
    }

    /// Syntax check, then uniqueness.
    async fn check_email(&self, value: &str) -> Result<(), WizardError> {
        let value = value.trim();
        if !email::is_valid(value) {
            return Err(WizardError::EmailInvalid {
                email: value.to_string(),
            });
        }
        if self.identity.email_exists(value).await? {
            return Err(WizardError::EmailTaken {
                email: value.to_string(),
            });
        }
        Ok(())
    }
}

/// Required-field and choice checks for `fields` against the session values.
fn validate_fields<'a>(
    session: &WizardSession,
    fields: impl IntoIterator<Item = &'a FieldDefinition>,
) -> Result<(), WizardError> {
    for field in fields {
        let value = session.value(field.key).map(str::trim).unwrap_or_default();
        if field.required && value.is_empty() {
            return Err(WizardError::MissingField {
                key: field.key.to_string(),
                label: field.label.to_string(),
            });
        }
        if !field.accepts(value) {
            return Err(WizardError::InvalidChoice {
                key: field.key.to_string(),
                label: field.label.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}
