//! Relational storage for Launchpad licenses.
//!
//! Implements the [`launchpad_license::LicenseStore`] contract over two
//! backends:
//!
//! - MySQL via `sqlx`, the production target
//! - SQLite via `rusqlite`, for single-host deployments and tests
//!
//! # Schema
//!
//! Two tables, `licenses` and `users` (machine bindings). The SQLite schema
//! is applied whenever a store is opened; the MySQL schema only when
//! [`MySqlLicenseStore::migrate`] is called. Either way, the server calls
//! `verify_schema` before accepting requests.

mod error;
mod mysql;
mod schema;
mod sqlite;
mod startup;

pub use error::{StorageError, StorageResult};
pub use mysql::{MySqlConfig, MySqlLicenseStore, MySqlSession};
pub use schema::{MYSQL_SCHEMA, REQUIRED_TABLES, SQLITE_SCHEMA};
pub use sqlite::{SqliteLicenseStore, SqliteSession};
pub use startup::{RetryPolicy, connect_with_retry};
