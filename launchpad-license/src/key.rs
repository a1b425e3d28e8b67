//! License key generation.
//!
//! Keys use the format: `LP-XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX`
//!
//! The 32 hex digits are the simple form of a random (v4) UUID, so each key
//! carries 122 bits from the operating system's CSPRNG. Uniqueness is still
//! enforced by the store; callers retry on a duplicate.
//!
//! Keys are opaque to validation. Anything stored in the `licensekey`
//! column is looked up verbatim, including keys issued in older formats.

use uuid::Uuid;

/// Prefix carried by every generated key.
pub const KEY_PREFIX: &str = "LP";

/// Number of hex digits per dash-separated group.
const GROUP_LEN: usize = 8;

/// Generates a fresh license key.
#[must_use]
pub fn generate_license_key() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!(
        "{KEY_PREFIX}-{}-{}-{}-{}",
        &hex[..GROUP_LEN],
        &hex[GROUP_LEN..2 * GROUP_LEN],
        &hex[2 * GROUP_LEN..3 * GROUP_LEN],
        &hex[3 * GROUP_LEN..],
    )
}

/// Returns true if `key` has the shape produced by [`generate_license_key`].
#[must_use]
pub fn is_generated_format(key: &str) -> bool {
    let Some(rest) = key.strip_prefix(KEY_PREFIX).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    let groups: Vec<&str> = rest.split('-').collect();
    groups.len() == 4
        && groups.iter().all(|g| {
            g.len() == GROUP_LEN
                && g.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}
