//! Wizard state machine: which step the user is on and what they entered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog;

/// The steps of the registration form.
///
/// Progresses linearly: Identity → Contact → Confirmation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Identity,
    Contact,
    Confirmation,
}

impl WizardStep {
    /// Total number of steps.
    pub const COUNT: u8 = 3;

    /// Check if a single forward or backward move from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: WizardStep) -> bool {
        use WizardStep::*;
        matches!(
            (self, target),
            (Identity, Contact)
                | (Contact, Confirmation)
                | (Confirmation, Contact)
                | (Contact, Identity)
        )
    }

    /// Whether this is the step the form is finished from.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmation)
    }

    /// The next step, if any.
    pub fn next(&self) -> Option<WizardStep> {
        match self {
            Self::Identity => Some(Self::Contact),
            Self::Contact => Some(Self::Confirmation),
            Self::Confirmation => None,
        }
    }

    /// The previous step, if any.
    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            Self::Identity => None,
            Self::Contact => Some(Self::Identity),
            Self::Confirmation => Some(Self::Contact),
        }
    }

    /// 1-based position of the step.
    pub fn number(&self) -> u8 {
        match self {
            Self::Identity => 1,
            Self::Contact => 2,
            Self::Confirmation => 3,
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::Contact => "contact",
            Self::Confirmation => "confirmation",
        };
        write!(f, "{s}")
    }
}

/// Per-visitor wizard state.
///
/// Persisted as JSON between requests so a page reload rehydrates the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSession {
    pub current_step: WizardStep,
    /// Values collected so far, keyed by catalog key.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Set by navigation; the UI should redraw the whole form.
    #[serde(default)]
    pub rebuild_pending: bool,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge submitted values. New keys overwrite old ones; keys that are
    /// not in the catalog are dropped. Returns the dropped keys.
    pub fn merge_values<I, K, V>(&mut self, submitted: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut dropped = Vec::new();
        for (key, value) in submitted {
            let key = key.into();
            if catalog::field(&key).is_some() {
                self.values.insert(key, value.into());
            } else {
                dropped.push(key);
            }
        }
        dropped
    }

    /// Move one step forward. Stays put at the last step.
    pub fn step_forward(&mut self) -> bool {
        self.rebuild_pending = true;
        match self.current_step.next() {
            Some(next) => {
                debug_assert!(self.current_step.can_transition_to(next));
                self.current_step = next;
                true
            }
            None => false,
        }
    }

    /// Move one step back. Stays put at the first step.
    pub fn step_back(&mut self) -> bool {
        self.rebuild_pending = true;
        match self.current_step.previous() {
            Some(prev) => {
                debug_assert!(self.current_step.can_transition_to(prev));
                self.current_step = prev;
                true
            }
            None => false,
        }
    }

    /// Clear all values and return to the first step.
    pub fn reset(&mut self) {
        self.values.clear();
        self.current_step = WizardStep::Identity;
        self.rebuild_pending = true;
    }

    /// Value for `key`, if one was collected.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Read and clear the rebuild flag.
    pub fn take_rebuild(&mut self) -> bool {
        std::mem::take(&mut self.rebuild_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use WizardStep::*;
        for (from, to) in [
            (Identity, Contact),
            (Contact, Confirmation),
            (Confirmation, Contact),
            (Contact, Identity),
        ] {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use WizardStep::*;
        assert!(!Identity.can_transition_to(Confirmation));
        assert!(!Confirmation.can_transition_to(Identity));
        assert!(!Contact.can_transition_to(Contact));
    }

    #[test]
    fn next_and_previous_walk_all_steps() {
        let mut current = WizardStep::Identity;
        let mut seen = vec![current];
        while let Some(next) = current.next() {
            assert!(current.can_transition_to(next));
            current = next;
            seen.push(current);
        }
        assert_eq!(seen.len(), WizardStep::COUNT as usize);
        assert!(current.is_final());

        while let Some(prev) = current.previous() {
            current = prev;
        }
        assert_eq!(current, WizardStep::Identity);
    }

    #[test]
    fn numbers_are_one_based_and_contiguous() {
        let numbers: Vec<u8> = [
            WizardStep::Identity,
            WizardStep::Contact,
            WizardStep::Confirmation,
        ]
        .iter()
        .map(WizardStep::number)
        .collect();
        assert_eq!(numbers, vec![1, 2, WizardStep::COUNT]);
    }

    #[test]
    fn display_matches_serde() {
        for step in [
            WizardStep::Identity,
            WizardStep::Contact,
            WizardStep::Confirmation,
        ] {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json);
        }
    }

    #[test]
    fn forward_is_clamped_at_last_step() {
        let mut session = WizardSession::new();
        assert!(session.step_forward());
        assert!(session.step_forward());
        assert!(!session.step_forward());
        assert_eq!(session.current_step, WizardStep::Confirmation);
    }

    #[test]
    fn back_is_clamped_at_first_step() {
        let mut session = WizardSession::new();
        assert!(!session.step_back());
        assert_eq!(session.current_step, WizardStep::Identity);
        assert!(session.rebuild_pending);
    }

    #[test]
    fn merge_drops_unknown_keys_and_overwrites() {
        let mut session = WizardSession::new();
        let dropped = session.merge_values([("email", "a@b.com"), ("form_token", "xyz")]);
        assert_eq!(dropped, vec!["form_token".to_string()]);
        session.merge_values([("email", "c@d.com")]);
        assert_eq!(session.value("email"), Some("c@d.com"));
        assert_eq!(session.values.len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = WizardSession::new();
        session.merge_values([("city", "Lyon")]);
        session.step_forward();
        session.reset();
        assert_eq!(session.current_step, WizardStep::Identity);
        assert!(session.values.is_empty());
    }

    #[test]
    fn take_rebuild_clears_flag() {
        let mut session = WizardSession::new();
        session.step_forward();
        assert!(session.take_rebuild());
        assert!(!session.take_rebuild());
    }

    #[test]
    fn session_serde_roundtrip() {
        let mut session = WizardSession::new();
        session.merge_values([("firstName", "Alice")]);
        session.step_forward();

        let json = serde_json::to_string(&session).unwrap();
        let parsed: WizardSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
        assert_eq!(parsed.current_step, WizardStep::Contact);
    }

    #[test]
    fn session_deserializes_without_optional_fields() {
        let parsed: WizardSession =
            serde_json::from_str(r#"{"current_step":"confirmation"}"#).unwrap();
        assert_eq!(parsed.current_step, WizardStep::Confirmation);
        assert!(parsed.values.is_empty());
        assert!(!parsed.rebuild_pending);
    }
}
