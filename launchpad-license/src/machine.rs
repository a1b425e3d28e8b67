//! Client-supplied identifiers: machine ids and owner emails.
//!
//! Both end up in `VARCHAR(120)` columns, so both are length-capped here
//! before any store round trip.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest machine id or email the store accepts.
pub const MAX_FIELD_LEN: usize = 120;

/// An opaque machine identifier, length-checked and otherwise kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(String);

impl MachineId {
    /// Parses a raw machine id. Surrounding whitespace is part of the id.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::MissingField`] for an empty id and
    /// [`LicenseError::InvalidMachineId`] if it is too long.
    pub fn parse(raw: &str) -> LicenseResult<Self> {
        if raw.is_empty() {
            return Err(LicenseError::MissingField("machine_id"));
        }
        if raw.chars().count() > MAX_FIELD_LEN {
            return Err(LicenseError::InvalidMachineId(format!(
                "longer than {MAX_FIELD_LEN} characters"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that `raw` has the basic shape of an email address and returns it
/// trimmed. Deliverability is not checked.
///
/// # Errors
///
/// Returns [`LicenseError::MissingField`] for a blank address and
/// [`LicenseError::InvalidEmail`] otherwise.
pub fn validate_email(raw: &str) -> LicenseResult<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(LicenseError::MissingField("email"));
    }
    let invalid = |reason: &str| Err(LicenseError::InvalidEmail(format!("{email}: {reason}")));

    if email.chars().count() > MAX_FIELD_LEN {
        return invalid("too long");
    }
    if email.chars().any(char::is_whitespace) {
        return invalid("contains whitespace");
    }
    let Some((local, domain)) = email.split_once('@') else {
        return invalid("missing '@'");
    };
    if local.is_empty() || domain.contains('@') {
        return invalid("malformed local part");
    }
    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return invalid("malformed domain");
    }
    Ok(email.to_string())
}
