//! MySQL-backed license store, the production backend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use launchpad_license::{
    Activation, License, LicenseResult, LicenseStore, NewLicense, StoreSession,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{FromRow, MySql, Transaction};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::schema::{MYSQL_SCHEMA, REQUIRED_TABLES, missing_tables};

/// Connection settings for the MySQL backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "launchpad_user".to_string(),
            password: "launchpad_password".to_string(),
            database: "launchpad_db".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl MySqlConfig {
    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

#[derive(Debug, FromRow)]
struct LicenseRow {
    id: i64,
    email: Option<String>,
    licensekey: String,
    remaining: i32,
    purchaseinfo: Option<String>,
    purchasedate: DateTime<Utc>,
}

impl From<LicenseRow> for License {
    fn from(row: LicenseRow) -> Self {
        License {
            id: row.id,
            email: row.email.unwrap_or_default(),
            license_key: row.licensekey,
            remaining: row.remaining,
            purchase_info: row.purchaseinfo,
            purchase_date: row.purchasedate,
        }
    }
}

#[derive(Debug, FromRow)]
struct ActivationRow {
    uid: i64,
    key_id: i64,
    machine_id: String,
    created: DateTime<Utc>,
}

impl From<ActivationRow> for Activation {
    fn from(row: ActivationRow) -> Self {
        Activation {
            id: row.uid,
            license_id: row.key_id,
            machine_id: row.machine_id,
            created: row.created,
        }
    }
}

/// License store over a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlLicenseStore {
    pool: MySqlPool,
}

impl MySqlLicenseStore {
    /// Connects a pool and checks that the server answers.
    pub async fn connect(config: &MySqlConfig) -> StorageResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options())
            .await?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected to mysql"
        );
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates any missing tables.
    pub async fn migrate(&self) -> StorageResult<()> {
        for statement in MYSQL_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("mysql schema applied");
        Ok(())
    }

    /// Checks that every required table exists in the connected database.
    pub async fn verify_schema(&self) -> StorageResult<()> {
        let mut present = Vec::with_capacity(REQUIRED_TABLES.len());
        for table in REQUIRED_TABLES {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
            if count > 0 {
                present.push(table.to_string());
            }
        }

        let missing = missing_tables(&present);
        if missing.is_empty() {
            Ok(())
        } else {
            warn!(?missing, "mysql schema incomplete");
            Err(StorageError::MissingTables(missing))
        }
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl LicenseStore for MySqlLicenseStore {
    type Session = MySqlSession;

    async fn session(&self) -> LicenseResult<MySqlSession> {
        let conn = self.pool.acquire().await.map_err(StorageError::from)?;
        Ok(MySqlSession {
            inner: Inner::Autocommit(conn),
        })
    }

    async fn transaction(&self) -> LicenseResult<MySqlSession> {
        let tx = self.pool.begin().await.map_err(StorageError::from)?;
        Ok(MySqlSession {
            inner: Inner::Transaction(tx),
        })
    }
}

enum Inner {
    Autocommit(PoolConnection<MySql>),
    // sqlx rolls back on drop.
    Transaction(Transaction<'static, MySql>),
}

/// Session over a [`MySqlLicenseStore`].
pub struct MySqlSession {
    inner: Inner,
}

impl MySqlSession {
    fn conn(&mut self) -> &mut MySqlConnection {
        match &mut self.inner {
            Inner::Autocommit(conn) => &mut **conn,
            Inner::Transaction(tx) => &mut **tx,
        }
    }

    fn in_transaction(&self) -> bool {
        matches!(self.inner, Inner::Transaction(_))
    }
}

impl StoreSession for MySqlSession {
    async fn find_license_by_key(&mut self, license_key: &str) -> LicenseResult<Option<License>> {
        // Inside a transaction the row stays locked until commit, serializing
        // concurrent admissions against the same license.
        let sql = if self.in_transaction() {
            "SELECT id, email, licensekey, remaining, purchaseinfo, purchasedate \
             FROM licenses WHERE licensekey = ? FOR UPDATE"
        } else {
            "SELECT id, email, licensekey, remaining, purchaseinfo, purchasedate \
             FROM licenses WHERE licensekey = ?"
        };
        let row = sqlx::query_as::<_, LicenseRow>(sql)
            .bind(license_key)
            .fetch_optional(self.conn())
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(License::from))
    }

    async fn find_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Option<Activation>> {
        let row = sqlx::query_as::<_, ActivationRow>(
            "SELECT uid, key_id, machine_id, created FROM users \
             WHERE key_id = ? AND machine_id = ?",
        )
        .bind(license_id)
        .bind(machine_id)
        .fetch_optional(self.conn())
        .await
        .map_err(StorageError::from)?;
        Ok(row.map(Activation::from))
    }

    async fn count_activations(&mut self, license_id: i64) -> LicenseResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE key_id = ?",
        )
        .bind(license_id)
        .fetch_one(self.conn())
        .await
        .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn create_activation(
        &mut self,
        license_id: i64,
        machine_id: &str,
    ) -> LicenseResult<Activation> {
        let created = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (key_id, machine_id, created) VALUES (?, ?, ?)",
        )
        .bind(license_id)
        .bind(machine_id)
        .bind(created)
        .execute(self.conn())
        .await
        .map_err(StorageError::from)?;

        let id = i64::try_from(result.last_insert_id())
            .map_err(|_| StorageError::InvalidData("activation id out of range".to_string()))?;
        Ok(Activation {
            id,
            license_id,
            machine_id: machine_id.to_string(),
            created,
        })
    }

    async fn decrement_remaining(&mut self, license_id: i64, by: i32) -> LicenseResult<()> {
        sqlx::query("UPDATE licenses SET remaining = remaining - ? WHERE id = ?")
            .bind(by)
            .bind(license_id)
            .execute(self.conn())
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn create_license(&mut self, new: NewLicense) -> LicenseResult<License> {
        let result = sqlx::query(
            "INSERT INTO licenses (email, licensekey, remaining, purchaseinfo) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&new.email)
        .bind(&new.license_key)
        .bind(new.remaining)
        .bind(&new.purchase_info)
        .execute(self.conn())
        .await
        .map_err(StorageError::from)?;

        // Re-read so purchasedate reflects the server's default.
        let row = sqlx::query_as::<_, LicenseRow>(
            "SELECT id, email, licensekey, remaining, purchaseinfo, purchasedate \
             FROM licenses WHERE id = ?",
        )
        .bind(result.last_insert_id())
        .fetch_one(self.conn())
        .await
        .map_err(StorageError::from)?;
        Ok(row.into())
    }

    async fn commit(self) -> LicenseResult<()> {
        if let Inner::Transaction(tx) = self.inner {
            tx.commit().await.map_err(StorageError::from)?;
        }
        Ok(())
    }
}
