//! Licensing and machine activation for Launchpad.
//!
//! This crate handles:
//! - License key generation
//! - The admission rule deciding whether a machine may use a license
//! - Registration of new licenses
//! - The data-access contract a relational store must satisfy
//!
//! # Seat accounting
//!
//! A license carries a single mutable `remaining` counter, starting at
//! [`DEFAULT_SEATS`]. Each newly seen machine inserts one activation row
//! and decrements `remaining` by one. Machines already bound to a license
//! are always re-validated without consuming a seat.
//!
//! # Concurrency
//!
//! The service holds no state between requests. With
//! [`AdmissionMode::Transactional`] the admission sequence runs inside one
//! store transaction; with [`AdmissionMode::Unguarded`] two new machines
//! racing for the last seat can both be admitted.

mod error;
mod key;
mod machine;
mod memory;
mod model;
mod service;
mod store;

pub use error::{LicenseError, LicenseResult};
pub use key::{KEY_PREFIX, generate_license_key, is_generated_format};
pub use machine::{MAX_FIELD_LEN, MachineId, validate_email};
pub use memory::{MemoryLicenseStore, MemorySession};
pub use model::{Activation, AdmissionMode, DEFAULT_SEATS, License, NewLicense, Verdict};
pub use service::{ActivationService, MAX_KEY_ATTEMPTS};
pub use store::{LicenseStore, StoreSession};
