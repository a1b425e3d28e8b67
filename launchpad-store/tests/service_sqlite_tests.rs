//! The activation service running against a real SQLite database.

use std::sync::Arc;

use launchpad_license::{
    ActivationService, AdmissionMode, LicenseStore, NewLicense, StoreSession, Verdict,
};
use launchpad_store::SqliteLicenseStore;
use pretty_assertions::assert_eq;
use rusqlite::Connection;

async fn seeded(seats: i32) -> (SqliteLicenseStore, i64) {
    let store = SqliteLicenseStore::open_in_memory().unwrap();
    let mut session = store.session().await.unwrap();
    let license = session
        .create_license(NewLicense::new("owner@example.com", "KEY-1").with_seats(seats))
        .await
        .unwrap();
    (store, license.id)
}

async fn state(store: &SqliteLicenseStore, license_id: i64) -> (i32, i64) {
    let mut session = store.session().await.unwrap();
    let license = session.find_license_by_key("KEY-1").await.unwrap().unwrap();
    let count = session.count_activations(license_id).await.unwrap();
    (license.remaining, count)
}

#[tokio::test]
async fn verdict_sequence_matches_memory_store() {
    for mode in [AdmissionMode::Transactional, AdmissionMode::Unguarded] {
        let (store, id) = seeded(5).await;
        let svc = ActivationService::new(store.clone()).with_admission(mode);

        let mut verdicts = Vec::new();
        for machine in ["m-1", "m-1", "m-2", "m-3", "m-4", "m-2"] {
            verdicts.push(svc.validate("KEY-1", machine).await.unwrap());
        }
        assert_eq!(
            verdicts,
            vec![
                Verdict::Activated,
                Verdict::AlreadyActivated,
                Verdict::Activated,
                Verdict::Activated,
                Verdict::MachineLimitReached,
                Verdict::AlreadyActivated,
            ],
            "mode {mode:?}"
        );
        assert_eq!(state(&store, id).await, (2, 3));
    }
}

#[tokio::test]
async fn unknown_key_and_exhausted_license() {
    let (store, _) = seeded(1).await;
    let svc = ActivationService::new(store);

    assert_eq!(
        svc.validate("KEY-404", "m-1").await.unwrap(),
        Verdict::InvalidKey
    );
    assert_eq!(svc.validate("KEY-1", "m-1").await.unwrap(), Verdict::Activated);
    assert_eq!(
        svc.validate("KEY-1", "m-2").await.unwrap(),
        Verdict::NoRemainingUses
    );
}

#[tokio::test]
async fn existing_deployment_bindings_are_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("licenses.db");

    // Tables as an existing deployment created them, without our constraints.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE licenses (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             email VARCHAR(120),
             licensekey VARCHAR(120),
             remaining INTEGER DEFAULT 5,
             purchaseinfo TEXT,
             purchasedate DATETIME DEFAULT CURRENT_TIMESTAMP
         );
         CREATE TABLE users (
             uid INTEGER PRIMARY KEY AUTOINCREMENT,
             key_id INTEGER NOT NULL,
             machine_id VARCHAR(120),
             created DATETIME DEFAULT CURRENT_TIMESTAMP
         );
         INSERT INTO licenses (id, email, licensekey, remaining, purchasedate)
             VALUES (7, 'buyer@example.com', 'LP-1700000000-42', 4, '2023-11-14 22:13:20');
         INSERT INTO users (key_id, machine_id, created)
             VALUES (7, 'm-a', '2023-11-14 22:15:00');",
    )
    .unwrap();
    drop(conn);

    let store = SqliteLicenseStore::open(&path).unwrap();
    store.verify_schema().await.unwrap();
    let svc = ActivationService::new(store.clone());

    let seats = |store: SqliteLicenseStore| async move {
        let mut session = store.session().await.unwrap();
        let license = session
            .find_license_by_key("LP-1700000000-42")
            .await
            .unwrap()
            .unwrap();
        (license.remaining, session.count_activations(license.id).await.unwrap())
    };

    assert_eq!(
        svc.validate("LP-1700000000-42", "m-a").await.unwrap(),
        Verdict::AlreadyActivated
    );
    assert_eq!(seats(store.clone()).await, (4, 1));

    assert_eq!(
        svc.validate("LP-1700000000-42", "m-b").await.unwrap(),
        Verdict::Activated
    );
    assert_eq!(seats(store.clone()).await, (3, 2));
}

#[tokio::test]
async fn registered_license_validates() {
    let store = SqliteLicenseStore::open_in_memory().unwrap();
    let svc = ActivationService::new(store.clone());

    let license = svc
        .register("buyer@example.com", Some("stripe:ch_123".into()))
        .await
        .unwrap();
    assert_eq!(license.remaining, 5);

    assert_eq!(
        svc.validate(&license.license_key, "m-1").await.unwrap(),
        Verdict::Activated
    );
    let mut session = store.session().await.unwrap();
    let stored = session
        .find_license_by_key(&license.license_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remaining, 4);
    assert_eq!(stored.purchase_info.as_deref(), Some("stripe:ch_123"));
}

#[tokio::test]
async fn key_collision_is_retried_against_unique_index() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn collide_once() -> String {
        match CALLS.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => "LP-TAKEN".to_string(),
            n => format!("LP-NEXT-{n}"),
        }
    }

    let store = SqliteLicenseStore::open_in_memory().unwrap();
    let svc = ActivationService::new(store).with_key_generator(collide_once);

    assert_eq!(svc.register("a@b.com", None).await.unwrap().license_key, "LP-TAKEN");
    assert_eq!(svc.register("c@d.com", None).await.unwrap().license_key, "LP-NEXT-2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transactional_last_seat_goes_to_one_machine() {
    let (store, id) = seeded(1).await;
    let svc = Arc::new(ActivationService::new(store.clone()));

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.validate("KEY-1", &format!("machine-{i}")).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == Verdict::Activated {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(state(&store, id).await, (0, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transactional_load_keeps_seat_accounting_consistent() {
    let (store, id) = seeded(5).await;
    let svc = Arc::new(ActivationService::new(store.clone()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.validate("KEY-1", &format!("machine-{}", i % 7)).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let (remaining, count) = state(&store, id).await;
    assert_eq!(count, 3);
    assert_eq!(i64::from(remaining) + count, 5);
}
