//! Render output handed to the UI layer.

use serde::Serialize;

use super::catalog::FieldKind;

/// Kind of a form button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Forward,
    Finish,
    Back,
    Reset,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forward => "Forward",
            Self::Finish => "Finish",
            Self::Back => "Back",
            Self::Reset => "Reset",
        }
    }
}

/// A button on the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormAction {
    pub kind: ActionKind,
    pub label: &'static str,
}

impl From<ActionKind> for FormAction {
    fn from(kind: ActionKind) -> Self {
        Self {
            kind,
            label: kind.label(),
        }
    }
}

/// One field of the rendered form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub step: u8,
    pub visible: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    /// Error code attached by the last validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn no_options(options: &&[&str]) -> bool {
    options.is_empty()
}

/// The whole form for the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormView {
    pub current_step: u8,
    pub total_steps: u8,
    /// "Step {current} of {total}".
    pub progress: String,
    pub fields: Vec<FieldView>,
    pub actions: Vec<FormAction>,
    /// Informational text for steps without inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// Form-level error message from the last validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FormView {
    /// Fields shown on the current step.
    pub fn visible_fields(&self) -> impl Iterator<Item = &FieldView> {
        self.fields.iter().filter(|f| f.visible)
    }

    pub fn field(&self, key: &str) -> Option<&FieldView> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn has_action(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| a.kind == kind)
    }
}

/// Result of live validation on a single field.
///
/// Both parts are `None` when there is nothing to report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationFeedback {
    /// Error code to attach to the field, e.g. `"invalid"` or `"taken"`.
    pub field_error: Option<String>,
    /// Text for the message area next to the field.
    pub message: Option<String>,
}

impl ValidationFeedback {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            field_error: Some(code.to_string()),
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.field_error.is_none()
    }
}
