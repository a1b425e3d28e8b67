//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// A required request field was missing or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Email address does not look like an email address.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// Machine identifier is unusable.
    #[error("invalid machine id: {0}")]
    InvalidMachineId(String),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate {0}")]
    Duplicate(String),

    /// Every generated key collided with an existing license.
    #[error("could not generate a unique license key after {0} attempts")]
    KeySpaceExhausted(u32),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LicenseError {
    /// Returns true if the caller sent something we refuse to process.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::InvalidEmail(_) | Self::InvalidMachineId(_)
        )
    }

    /// Returns true if this error came from a uniqueness constraint.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
