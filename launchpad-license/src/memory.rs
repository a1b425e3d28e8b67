//! In-process [`LicenseStore`] for tests and throwaway local runs.
//!
//! All state sits behind one async mutex. Autocommit sessions take the lock
//! per operation; a transaction holds it for its whole lifetime and restores
//! a snapshot if dropped without committing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{LicenseError, LicenseResult};
use crate::model::{Activation, License, NewLicense};
use crate::store::{LicenseStore, StoreSession};

#[derive(Debug, Clone, Default)]
struct State {
    licenses: BTreeMap<i64, License>,
    activations: BTreeMap<i64, Activation>,
    last_license_id: i64,
    last_activation_id: i64,
}

impl State {
    fn license_by_key(&self, license_key: &str) -> Option<&License> {
        self.licenses.values().find(|l| l.license_key == license_key)
    }

    fn activation(&self, license_id: i64, machine_id: &str) -> Option<&Activation> {
        self.activations
            .values()
            .find(|a| a.license_id == license_id && a.machine_id == machine_id)
    }
}

/// Mutex-guarded in-memory license store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLicenseStore {
    state: Arc<Mutex<State>>,
}

impl MemoryLicenseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LicenseStore for MemoryLicenseStore {
    type Session = MemorySession;

    async fn session(&self) -> LicenseResult<MemorySession> {
        Ok(MemorySession {
            inner: Inner::Autocommit(Arc::clone(&self.state)),
        })
    }

    async fn transaction(&self) -> LicenseResult<MemorySession> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(MemorySession {
            inner: Inner::Transaction {
                guard,
                snapshot: Some(snapshot),
            },
        })
    }
}

enum Inner {
    Autocommit(Arc<Mutex<State>>),
    Transaction {
        guard: OwnedMutexGuard<State>,
        // Restored on drop unless the transaction commits.
        snapshot: Option<State>,
    },
}

/// Session over a [`MemoryLicenseStore`].
pub struct MemorySession {
    inner: Inner,
}

impl MemorySession {
    async fn with_state<T>(
        &mut self,
        f: impl FnOnce(&mut State) -> LicenseResult<T> + Send,
    ) -> LicenseResult<T> {
        match &mut self.inner {
            Inner::Autocommit(state) => {
                let mut state = state.lock().await;
                f(&mut *state)
            }
            Inner::Transaction { guard, .. } => f(&mut **guard),
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if let Inner::Transaction { guard, snapshot } = &mut self.inner {
            if let Some(snapshot) = snapshot.take() {
                **guard = snapshot;
            }
        }
    }
}

impl StoreSession for MemorySession {
    async fn find_license_by_key(&mut self, license_key: &str) -> LicenseResult<Option<License>> {
        self.with_state(|s| Ok(s.license_by_key(license_key).cloned()))
            .await
    }

    async fn find_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Option<Activation>> {
        self.with_state(|s| Ok(s.activation(license_id, machine_id).cloned()))
            .await
    }

    async fn count_activations(&mut self, license_id: i64) -> LicenseResult<i64> {
        self.with_state(|s| {
            let count = s
                .activations
                .values()
                .filter(|a| a.license_id == license_id)
                .count();
            Ok(count as i64)
        })
        .await
    }

    async fn create_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Activation> {
        self.with_state(|s| {
            if !s.licenses.contains_key(&license_id) {
                return Err(LicenseError::Storage(format!(
                    "license {license_id} does not exist"
                )));
            }
            if s.activation(license_id, machine_id).is_some() {
                return Err(LicenseError::Duplicate(format!(
                    "activation of {machine_id} on license {license_id}"
                )));
            }
            s.last_activation_id += 1;
            let activation = Activation {
                id: s.last_activation_id,
                license_id,
                machine_id: machine_id.to_string(),
                created: Utc::now(),
            };
            s.activations.insert(activation.id, activation.clone());
            Ok(activation)
        })
        .await
    }

    async fn decrement_remaining(&mut self, license_id: i64, by: i32) -> LicenseResult<()> {
        self.with_state(|s| {
            if let Some(license) = s.licenses.get_mut(&license_id) {
                license.remaining -= by;
            }
            Ok(())
        })
        .await
    }

    async fn create_license(&mut self, new: NewLicense) -> LicenseResult<License> {
        self.with_state(|s| {
            if s.license_by_key(&new.license_key).is_some() {
                return Err(LicenseError::Duplicate("license key".to_string()));
            }
            s.last_license_id += 1;
            let license = License {
                id: s.last_license_id,
                email: new.email,
                license_key: new.license_key,
                remaining: new.remaining,
                purchase_info: new.purchase_info,
                purchase_date: Utc::now(),
            };
            s.licenses.insert(license.id, license.clone());
            Ok(license)
        })
        .await
    }

    async fn commit(mut self) -> LicenseResult<()> {
        if let Inner::Transaction { snapshot, .. } = &mut self.inner {
            *snapshot = None;
        }
        Ok(())
    }
}
