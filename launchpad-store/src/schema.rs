//! Table definitions shared by the relational backends.
//!
//! Table and column names match existing deployments, so their licenses and
//! machine bindings load as-is. Machine bindings live in `users`, keyed by
//! `uid` and pointing at their license through `key_id`.

/// Tables the service refuses to start without.
pub const REQUIRED_TABLES: [&str; 2] = ["licenses", "users"];

/// SQLite schema, applied on open.
pub const SQLITE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS licenses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email VARCHAR(120),
        licensekey VARCHAR(120) NOT NULL UNIQUE,
        remaining INTEGER NOT NULL DEFAULT 5,
        purchaseinfo TEXT,
        purchasedate TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS users (
        uid INTEGER PRIMARY KEY AUTOINCREMENT,
        key_id INTEGER NOT NULL REFERENCES licenses(id),
        machine_id VARCHAR(120) NOT NULL,
        created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (key_id, machine_id)
    );
";

/// MySQL schema, one statement per entry. Applied only on request.
pub const MYSQL_SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS licenses (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        email VARCHAR(120) NULL,
        licensekey VARCHAR(120) NOT NULL,
        remaining INT NOT NULL DEFAULT 5,
        purchaseinfo TEXT NULL,
        purchasedate TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE KEY uq_licenses_licensekey (licensekey)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
    "CREATE TABLE IF NOT EXISTS users (
        uid BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        key_id BIGINT NOT NULL,
        machine_id VARCHAR(120) NOT NULL,
        created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE KEY uq_users_key_machine (key_id, machine_id),
        CONSTRAINT fk_users_license FOREIGN KEY (key_id) REFERENCES licenses (id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
];

/// Returns the required tables absent from `present`.
pub(crate) fn missing_tables(present: &[String]) -> Vec<String> {
    REQUIRED_TABLES
        .iter()
        .filter(|table| !present.iter().any(|p| p == *table))
        .map(|table| (*table).to_string())
        .collect()
}
