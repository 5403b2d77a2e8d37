//! Email syntax checks.

use std::sync::LazyLock;

use regex::Regex;

/// Longest address accepted (RFC 5321 path limit minus the brackets).
const MAX_EMAIL_LEN: usize = 254;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// Whether `email` is a syntactically valid address.
pub fn is_valid(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return false;
    }
    let Some((local, _)) = email.split_once('@') else {
        return false;
    };
    if local.len() > 64 || local.starts_with('.') || local.ends_with('.') || local.contains("..")
    {
        return false;
    }
    EMAIL_PATTERN.is_match(email)
}

/// Canonical form used for uniqueness checks and storage.
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
