//! Identifier generation

use uuid::Uuid;

/// Prefix carried by every diagnosis identifier
pub const DIAGNOSIS_ID_PREFIX: &str = "diag_";

/// Number of random hex characters following the prefix
const DIAGNOSIS_ID_HEX_LEN: usize = 12;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a diagnosis identifier: `diag_` plus 12 lowercase hex characters
pub fn diagnosis_id() -> String {
    let hex = generate().simple().to_string();
    format!("{}{}", DIAGNOSIS_ID_PREFIX, &hex[..DIAGNOSIS_ID_HEX_LEN])
}

/// Generate a collision-resistant object name: `<prefix>_<32 hex>.<ext>`
pub fn object_name(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, generate().simple(), extension)
}
