//! License and activation records, plus the outcomes of the admission rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of seats a freshly registered license starts with.
pub const DEFAULT_SEATS: i32 = 5;

/// A stored license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Store-generated identifier.
    pub id: i64,
    /// Owner email.
    pub email: String,
    /// Opaque key handed to the customer.
    pub license_key: String,
    /// Seats still available. Decremented once per newly activated machine.
    pub remaining: i32,
    /// Free-form purchase metadata.
    pub purchase_info: Option<String>,
    /// When the license was created.
    pub purchase_date: DateTime<Utc>,
}

/// A machine bound to a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    /// Store-generated identifier.
    pub id: i64,
    /// Owning license.
    pub license_id: i64,
    /// Opaque machine identifier supplied by the client.
    pub machine_id: String,
    /// When the machine was first activated.
    pub created: DateTime<Utc>,
}

/// Input for creating a license row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLicense {
    pub email: String,
    pub license_key: String,
    pub remaining: i32,
    pub purchase_info: Option<String>,
}

impl NewLicense {
    /// A license with the default seat allocation and no purchase metadata.
    #[must_use]
    pub fn new(email: impl Into<String>, license_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            license_key: license_key.into(),
            remaining: DEFAULT_SEATS,
            purchase_info: None,
        }
    }

    /// Overrides the initial seat count.
    #[must_use]
    pub fn with_seats(mut self, remaining: i32) -> Self {
        self.remaining = remaining;
        self
    }

    /// Attaches purchase metadata.
    #[must_use]
    pub fn with_purchase_info(mut self, purchase_info: Option<String>) -> Self {
        self.purchase_info = purchase_info;
        self
    }
}

/// Outcome of validating a (license key, machine) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No license has this key.
    InvalidKey,
    /// The license's seat counter is exhausted.
    NoRemainingUses,
    /// The machine was activated earlier; no seat consumed.
    AlreadyActivated,
    /// A new machine was refused because the license is full.
    MachineLimitReached,
    /// A new machine was bound and one seat consumed.
    Activated,
}

impl Verdict {
    /// Returns true if the machine may use the licensed software.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::AlreadyActivated | Self::Activated)
    }

    /// Client-facing message. Clients may match on these strings.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidKey => "Invalid license key",
            Self::NoRemainingUses => "License has no remaining uses",
            Self::AlreadyActivated => "License is valid for this machine",
            Self::MachineLimitReached => "License has reached maximum number of machines",
            Self::Activated => "License is valid and machine registered",
        }
    }
}

/// How the admission rule interacts with the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum AdmissionMode {
    /// The check-insert-decrement sequence runs in one store transaction
    /// holding the license row lock.
    #[default]
    Transactional,
    /// Every store operation commits on its own. Two new machines racing
    /// for the last seat may both be admitted.
    Unguarded,
}
