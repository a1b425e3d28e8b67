//! SQLite-backed license store.
//!
//! One connection serves the whole process. Autocommit sessions lock it per
//! statement; a transaction holds it from `BEGIN IMMEDIATE` until commit or
//! rollback, which also takes SQLite's write lock against other processes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use launchpad_license::{
    Activation, License, LicenseResult, LicenseStore, NewLicense, StoreSession,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::schema::{REQUIRED_TABLES, SQLITE_SCHEMA, missing_tables};

const LICENSE_COLUMNS: &str = "id, email, licensekey, remaining, purchaseinfo, purchasedate";
const ACTIVATION_COLUMNS: &str = "uid, key_id, machine_id, created";

fn license_from_row(row: &Row<'_>) -> rusqlite::Result<License> {
    Ok(License {
        id: row.get(0)?,
        email: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        license_key: row.get(2)?,
        remaining: row.get(3)?,
        purchase_info: row.get(4)?,
        purchase_date: row.get(5)?,
    })
}

fn activation_from_row(row: &Row<'_>) -> rusqlite::Result<Activation> {
    Ok(Activation {
        id: row.get(0)?,
        license_id: row.get(1)?,
        machine_id: row.get(2)?,
        created: row.get(3)?,
    })
}

/// License store over a single SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteLicenseStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLicenseStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened sqlite license store");
        Self::init(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SQLITE_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Checks that every required table exists.
    pub async fn verify_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2)",
        )?;
        let present = stmt
            .query_map(params![REQUIRED_TABLES[0], REQUIRED_TABLES[1]], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let missing = missing_tables(&present);
        if missing.is_empty() {
            Ok(())
        } else {
            warn!(?missing, "sqlite schema incomplete");
            Err(StorageError::MissingTables(missing))
        }
    }
}

impl LicenseStore for SqliteLicenseStore {
    type Session = SqliteSession;

    async fn session(&self) -> LicenseResult<SqliteSession> {
        Ok(SqliteSession {
            inner: Inner::Autocommit(Arc::clone(&self.conn)),
        })
    }

    async fn transaction(&self) -> LicenseResult<SqliteSession> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(StorageError::from)?;
        Ok(SqliteSession {
            inner: Inner::Transaction { conn, open: true },
        })
    }
}

enum Inner {
    Autocommit(Arc<Mutex<Connection>>),
    Transaction {
        conn: OwnedMutexGuard<Connection>,
        open: bool,
    },
}

/// Session over a [`SqliteLicenseStore`].
pub struct SqliteSession {
    inner: Inner,
}

impl SqliteSession {
    async fn with_conn<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T> + Send,
    ) -> LicenseResult<T> {
        let result = match &mut self.inner {
            Inner::Autocommit(conn) => {
                let conn = conn.lock().await;
                f(&conn)
            }
            Inner::Transaction { conn, .. } => f(conn),
        };
        Ok(result.map_err(StorageError::from)?)
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if let Inner::Transaction { conn, open: true } = &mut self.inner {
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "sqlite rollback failed");
            }
        }
    }
}

impl StoreSession for SqliteSession {
    async fn find_license_by_key(&mut self, license_key: &str) -> LicenseResult<Option<License>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE licensekey = ?1"),
                params![license_key],
                license_from_row,
            )
            .optional()
        })
        .await
    }

    async fn find_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Option<Activation>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {ACTIVATION_COLUMNS} FROM users \
                     WHERE key_id = ?1 AND machine_id = ?2"
                ),
                params![license_id, machine_id],
                activation_from_row,
            )
            .optional()
        })
        .await
    }

    async fn count_activations(&mut self, license_id: i64) -> LicenseResult<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE key_id = ?1",
                params![license_id],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn create_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Activation> {
        let created = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (key_id, machine_id, created) VALUES (?1, ?2, ?3)",
                params![license_id, machine_id, created],
            )?;
            Ok(Activation {
                id: conn.last_insert_rowid(),
                license_id,
                machine_id: machine_id.to_string(),
                created,
            })
        })
        .await
    }

    async fn decrement_remaining(&mut self, license_id: i64, by: i32) -> LicenseResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE licenses SET remaining = remaining - ?1 WHERE id = ?2",
                params![by, license_id],
            )
            .map(|_| ())
        })
        .await
    }

    async fn create_license(&mut self, new: NewLicense) -> LicenseResult<License> {
        let purchase_date = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO licenses (email, licensekey, remaining, purchaseinfo, purchasedate) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new.email,
                    new.license_key,
                    new.remaining,
                    new.purchase_info,
                    purchase_date
                ],
            )?;
            Ok(License {
                id: conn.last_insert_rowid(),
                email: new.email,
                license_key: new.license_key,
                remaining: new.remaining,
                purchase_info: new.purchase_info,
                purchase_date,
            })
        })
        .await
    }

    async fn commit(mut self) -> LicenseResult<()> {
        if let Inner::Transaction { conn, open } = &mut self.inner {
            conn.execute_batch("COMMIT").map_err(StorageError::from)?;
            *open = false;
        }
        Ok(())
    }
}
