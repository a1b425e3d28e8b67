//! Shared test helpers for license tests.

#![allow(dead_code)]

use std::sync::Arc;

use launchpad_license::{
    Activation, License, LicenseError, LicenseResult, LicenseStore, MemoryLicenseStore,
    MemorySession, NewLicense, StoreSession,
};
use tokio::sync::Barrier;

/// Inserts a license with `seats` remaining and returns it.
pub async fn seed_license<S: LicenseStore>(store: &S, key: &str, seats: i32) -> License {
    let mut session = store.session().await.unwrap();
    session
        .create_license(NewLicense::new("owner@example.com", key).with_seats(seats))
        .await
        .unwrap()
}

/// Reads back a license by key, panicking if it is gone.
pub async fn reload<S: LicenseStore>(store: &S, key: &str) -> License {
    let mut session = store.session().await.unwrap();
    session.find_license_by_key(key).await.unwrap().unwrap()
}

/// Counts activations for a license.
pub async fn activations<S: LicenseStore>(store: &S, license_id: i64) -> i64 {
    let mut session = store.session().await.unwrap();
    session.count_activations(license_id).await.unwrap()
}

/// Memory store wrapper that can hold sessions at a rendezvous right after
/// they count activations, and can fail seat decrements.
#[derive(Clone, Default)]
pub struct ScriptedStore {
    pub inner: MemoryLicenseStore,
    pub rendezvous: Option<Arc<Barrier>>,
    pub fail_decrement: bool,
    pub hide_activations: bool,
}

impl ScriptedStore {
    /// Every session waits until `parties` sessions have counted activations.
    pub fn with_rendezvous(parties: usize) -> Self {
        Self {
            rendezvous: Some(Arc::new(Barrier::new(parties))),
            ..Self::default()
        }
    }

    /// Every seat decrement fails with a storage error.
    pub fn failing_decrement() -> Self {
        Self {
            fail_decrement: true,
            ..Self::default()
        }
    }

    /// Activation lookups always miss, leaving duplicates to the constraint.
    pub fn hiding_activations() -> Self {
        Self {
            hide_activations: true,
            ..Self::default()
        }
    }

    fn wrap(&self, inner: MemorySession) -> ScriptedSession {
        ScriptedSession {
            inner,
            rendezvous: self.rendezvous.clone(),
            fail_decrement: self.fail_decrement,
            hide_activations: self.hide_activations,
        }
    }
}

impl LicenseStore for ScriptedStore {
    type Session = ScriptedSession;

    async fn session(&self) -> LicenseResult<ScriptedSession> {
        Ok(self.wrap(self.inner.session().await?))
    }

    async fn transaction(&self) -> LicenseResult<ScriptedSession> {
        Ok(self.wrap(self.inner.transaction().await?))
    }
}

pub struct ScriptedSession {
    inner: MemorySession,
    rendezvous: Option<Arc<Barrier>>,
    fail_decrement: bool,
    hide_activations: bool,
}

impl StoreSession for ScriptedSession {
    async fn find_license_by_key(&mut self, license_key: &str) -> LicenseResult<Option<License>> {
        self.inner.find_license_by_key(license_key).await
    }

    async fn find_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Option<Activation>> {
        if self.hide_activations {
            return Ok(None);
        }
        self.inner.find_activation(license_id, machine_id).await
    }

    async fn count_activations(&mut self, license_id: i64) -> LicenseResult<i64> {
        let count = self.inner.count_activations(license_id).await?;
        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }
        Ok(count)
    }

    async fn create_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Activation> {
        self.inner.create_activation(license_id, machine_id).await
    }

    async fn decrement_remaining(&mut self, license_id: i64, by: i32) -> LicenseResult<()> {
        if self.fail_decrement {
            return Err(LicenseError::Storage("decrement rejected".into()));
        }
        self.inner.decrement_remaining(license_id, by).await
    }

    async fn create_license(&mut self, license: NewLicense) -> LicenseResult<License> {
        self.inner.create_license(license).await
    }

    async fn commit(self) -> LicenseResult<()> {
        self.inner.commit().await
    }
}
