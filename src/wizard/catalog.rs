//! Static field catalog for the registration form.

use serde::Serialize;

use super::state::WizardStep;

/// Catalog key of the email field, the only field with live validation.
pub const EMAIL_KEY: &str = "email";

/// Input widget kind of a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Email,
    Text,
    Choice,
    Phone,
}

/// One entry of the field catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Key used in submitted values and session storage.
    pub key: &'static str,
    /// Human-readable title.
    pub label: &'static str,
    /// Step on which the field is shown.
    pub step: WizardStep,
    pub required: bool,
    pub kind: FieldKind,
    /// Column in the `registration_records` table.
    pub column: &'static str,
    /// Allowed values for `Choice` fields; empty otherwise.
    pub options: &'static [&'static str],
}

impl FieldDefinition {
    /// Whether `value` is acceptable for this field's options.
    ///
    /// Non-choice fields and empty values always pass.
    pub fn accepts(&self, value: &str) -> bool {
        self.kind != FieldKind::Choice || value.is_empty() || self.options.contains(&value)
    }
}

/// The registration form, in display order.
pub static CATALOG: &[FieldDefinition] = &[
    FieldDefinition {
        key: EMAIL_KEY,
        label: "Email",
        step: WizardStep::Identity,
        required: true,
        kind: FieldKind::Email,
        column: "email",
        options: &[],
    },
    FieldDefinition {
        key: "firstName",
        label: "First Name",
        step: WizardStep::Identity,
        required: true,
        kind: FieldKind::Text,
        column: "first_name",
        options: &[],
    },
    FieldDefinition {
        key: "lastName",
        label: "Last Name",
        step: WizardStep::Identity,
        required: true,
        kind: FieldKind::Text,
        column: "last_name",
        options: &[],
    },
    FieldDefinition {
        key: "gender",
        label: "Gender",
        step: WizardStep::Identity,
        required: true,
        kind: FieldKind::Choice,
        column: "gender",
        options: &["M", "F"],
    },
    FieldDefinition {
        key: "city",
        label: "City",
        step: WizardStep::Contact,
        required: true,
        kind: FieldKind::Text,
        column: "city",
        options: &[],
    },
    FieldDefinition {
        key: "phone",
        label: "Phone Number",
        step: WizardStep::Contact,
        required: false,
        kind: FieldKind::Phone,
        column: "phone",
        options: &[],
    },
    FieldDefinition {
        key: "address",
        label: "Address",
        step: WizardStep::Contact,
        required: false,
        kind: FieldKind::Text,
        column: "address",
        options: &[],
    },
];

/// Look up a catalog entry by key.
pub fn field(key: &str) -> Option<&'static FieldDefinition> {
    CATALOG.iter().find(|f| f.key == key)
}

/// Catalog entries shown on `step`.
pub fn fields_for_step(step: WizardStep) -> impl Iterator<Item = &'static FieldDefinition> {
    CATALOG.iter().filter(move |f| f.step == step)
}
