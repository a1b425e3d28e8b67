//! License validation and registration.
//!
//! The service is stateless apart from the injected store handle, so any
//! number of instances can run against one database.

use tracing::{debug, info, warn};

use crate::error::{LicenseError, LicenseResult};
use crate::key::generate_license_key;
use crate::machine::{MachineId, validate_email};
use crate::model::{AdmissionMode, License, NewLicense, Verdict};
use crate::store::{LicenseStore, StoreSession};

/// Attempts at finding an unused license key before giving up.
pub const MAX_KEY_ATTEMPTS: u32 = 5;

/// Validates machines against licenses and issues new licenses.
#[derive(Debug, Clone)]
pub struct ActivationService<S> {
    store: S,
    admission: AdmissionMode,
    generate_key: fn() -> String,
}

impl<S: LicenseStore> ActivationService<S> {
    /// Creates a service over `store` using transactional admission.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            admission: AdmissionMode::default(),
            generate_key: generate_license_key,
        }
    }

    /// Selects how admission interacts with the store.
    #[must_use]
    pub fn with_admission(mut self, admission: AdmissionMode) -> Self {
        self.admission = admission;
        self
    }

    /// Replaces the license key generator.
    #[must_use]
    pub fn with_key_generator(mut self, generate_key: fn() -> String) -> Self {
        self.generate_key = generate_key;
        self
    }

    /// Returns the underlying store handle.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the configured admission mode.
    pub fn admission(&self) -> AdmissionMode {
        self.admission
    }

    /// Decides whether `machine_id` may use the license identified by
    /// `license_key`, binding the machine if it is new and a seat is free.
    ///
    /// Business-rule rejections are returned as a [`Verdict`], not an error.
    ///
    /// # Errors
    ///
    /// Returns a client error for empty or oversized input, and
    /// [`LicenseError::Storage`] if the store fails. Both values are matched
    /// verbatim, so a whitespace-only key is simply an unknown key.
    pub async fn validate(&self, license_key: &str, machine_id: &str) -> LicenseResult<Verdict> {
        if license_key.is_empty() {
            return Err(LicenseError::MissingField("licensekey"));
        }
        let machine_id = MachineId::parse(machine_id)?;

        let verdict = match self.admission {
            AdmissionMode::Transactional => {
                let mut tx = self.store.transaction().await?;
                let verdict = admit(&mut tx, license_key, &machine_id).await?;
                tx.commit().await?;
                verdict
            }
            AdmissionMode::Unguarded => {
                let mut session = self.store.session().await?;
                admit(&mut session, license_key, &machine_id).await?
            }
        };

        debug!(machine_id = %machine_id, ?verdict, "license validated");
        Ok(verdict)
    }

    /// Issues a new license with the default seat allocation to `email`.
    ///
    /// # Errors
    ///
    /// Returns a client error if `email` does not look like an address,
    /// [`LicenseError::KeySpaceExhausted`] if every generated key collided,
    /// and [`LicenseError::Storage`] if the store fails.
    pub async fn register(
        &self,
        email: &str,
        purchase_info: Option<String>,
    ) -> LicenseResult<License> {
        let email = validate_email(email)?;
        let purchase_info = purchase_info.filter(|info| !info.trim().is_empty());

        let mut session = self.store.session().await?;
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let new = NewLicense::new(email.clone(), (self.generate_key)())
                .with_purchase_info(purchase_info.clone());
            match session.create_license(new).await {
                Ok(license) => {
                    info!(license_id = license.id, email = %license.email, "license registered");
                    return Ok(license);
                }
                Err(err) if err.is_duplicate() => {
                    warn!(attempt, "generated license key already taken, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(LicenseError::KeySpaceExhausted(MAX_KEY_ATTEMPTS))
    }
}

/// The admission rule, run against whatever session the caller opened.
///
/// The capacity check compares the live activation count with the *current*
/// remaining counter, not with the initial allocation. Each admitted machine both adds
/// an activation and removes a seat, so the effective capacity shrinks from
/// both ends.
async fn admit<T: StoreSession>(
    session: &mut T,
    license_key: &str,
    machine_id: &MachineId,
) -> LicenseResult<Verdict> {
    let Some(license) = session.find_license_by_key(license_key).await? else {
        return Ok(Verdict::InvalidKey);
    };

    if license.remaining <= 0 {
        return Ok(Verdict::NoRemainingUses);
    }

    if session
        .find_activation(license.id, machine_id.as_str())
        .await?
        .is_some()
    {
        return Ok(Verdict::AlreadyActivated);
    }

    let activations = session.count_activations(license.id).await?;
    if activations >= i64::from(license.remaining) {
        return Ok(Verdict::MachineLimitReached);
    }

    match session.create_activation(license.id, machine_id.as_str()).await {
        Ok(activation) => {
            info!(
                license_id = license.id,
                activation_id = activation.id,
                machine_id = %machine_id,
                "machine activated"
            );
        }
        // Another request bound the same machine between our lookup and insert.
        Err(err) if err.is_duplicate() => return Ok(Verdict::AlreadyActivated),
        Err(err) => return Err(err),
    }

    session.decrement_remaining(license.id, 1).await?;
    Ok(Verdict::Activated)
}
