//! Data-access traits the activation service runs against.
//!
//! A [`LicenseStore`] is a cheap, cloneable handle to durable state. Work
//! happens on a [`StoreSession`] opened from it: either an autocommit
//! session, where each operation commits on its own, or a transaction,
//! where everything commits together on [`StoreSession::commit`] and an
//! uncommitted session rolls back when dropped.
//!
//! Implementations must enforce two uniqueness constraints and report
//! violations as [`LicenseError::Duplicate`](crate::LicenseError::Duplicate):
//! one license per key, and one activation per (license, machine) pair.

use crate::error::LicenseResult;
use crate::model::{Activation, License, NewLicense};

/// Handle to the license store.
pub trait LicenseStore: Clone + Send + Sync + 'static {
    /// Session type produced by this store.
    type Session: StoreSession;

    /// Opens a session whose operations commit individually.
    fn session(&self) -> impl Future<Output = LicenseResult<Self::Session>> + Send;

    /// Opens a transaction. License rows read through it stay locked
    /// against other transactions until it commits or rolls back.
    fn transaction(&self) -> impl Future<Output = LicenseResult<Self::Session>> + Send;
}

/// Operations available within one session.
pub trait StoreSession: Send {
    /// Looks up a license by its key.
    fn find_license_by_key(
        &mut self,
        license_key: &str,
    ) -> impl Future<Output = LicenseResult<Option<License>>> + Send;

    /// Looks up the activation binding `machine_id` to `license_id`.
    fn find_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> impl Future<Output = LicenseResult<Option<Activation>>> + Send;

    /// Counts machines bound to a license.
    fn count_activations(
        &mut self,
        license_id: i64,
    ) -> impl Future<Output = LicenseResult<i64>> + Send;

    /// Binds a machine to a license. Fails with `Duplicate` if the pair exists.
    fn create_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> impl Future<Output = LicenseResult<Activation>> + Send;

    /// Subtracts `by` from the license's remaining seats.
    fn decrement_remaining(
        &mut self,
        license_id: i64,
        by: i32,
    ) -> impl Future<Output = LicenseResult<()>> + Send;

    /// Inserts a license. Fails with `Duplicate` if the key is taken.
    fn create_license(
        &mut self,
        license: NewLicense,
    ) -> impl Future<Output = LicenseResult<License>> + Send;

    /// Commits the session. A no-op for autocommit sessions.
    fn commit(self) -> impl Future<Output = LicenseResult<()>> + Send;
}
