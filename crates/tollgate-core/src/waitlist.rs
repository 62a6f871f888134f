//! Waitlist signups.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A pre-launch email signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Normalized (trimmed, lower-cased) email address.
    pub email: String,

    /// When the signup happened.
    pub created_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Validate and normalize an email into a new entry.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEmail` if the address is malformed.
    pub fn new(raw_email: &str) -> Result<Self, CoreError> {
        Ok(Self {
            email: normalize_email(raw_email)?,
            created_at: Utc::now(),
        })
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    // INVARIANT: the pattern is a literal and known to compile.
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

/// Trim, lower-case and validate an email address.
///
/// # Errors
///
/// Returns `CoreError::InvalidEmail` unless the address matches `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    if email_regex().is_match(&email) {
        Ok(email)
    } else {
        Err(CoreError::InvalidEmail)
    }
}
