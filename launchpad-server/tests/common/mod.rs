//! Shared helpers for HTTP API tests.

#![allow(dead_code)]

use std::sync::Arc;

use launchpad_license::{
    ActivationService, LicenseError, LicenseResult, LicenseStore, MemoryLicenseStore,
    MemorySession, NewLicense, StoreSession,
};
use launchpad_server::build_router;

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
pub async fn spawn_server<S: LicenseStore>(service: Arc<ActivationService<S>>) -> String {
    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

/// Server over a fresh in-memory store, plus a handle to that store.
pub async fn spawn_memory_server() -> (String, MemoryLicenseStore) {
    let store = MemoryLicenseStore::new();
    let base = spawn_server(Arc::new(ActivationService::new(store.clone()))).await;
    (base, store)
}

pub async fn seed_license(store: &MemoryLicenseStore, key: &str, seats: i32) {
    let mut session = store.session().await.unwrap();
    session
        .create_license(NewLicense::new("owner@example.com", key).with_seats(seats))
        .await
        .unwrap();
}

pub async fn remaining(store: &MemoryLicenseStore, key: &str) -> i32 {
    let mut session = store.session().await.unwrap();
    session
        .find_license_by_key(key)
        .await
        .unwrap()
        .unwrap()
        .remaining
}

/// Store whose every session fails to open, as if the database went away.
#[derive(Clone, Default)]
pub struct UnreachableStore;

impl LicenseStore for UnreachableStore {
    type Session = MemorySession;

    async fn session(&self) -> LicenseResult<MemorySession> {
        Err(LicenseError::Storage("connection refused (secret-host:3306)".into()))
    }

    async fn transaction(&self) -> LicenseResult<MemorySession> {
        Err(LicenseError::Storage("connection refused (secret-host:3306)".into()))
    }
}
