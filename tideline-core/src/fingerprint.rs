//! Fingerprint - Deterministic identity for elements of unordered collections
//!
//! Elements of a set-typed attribute (e.g., security group ingress rules) have
//! no remote-assigned id. They are keyed by a hash of their identity fields
//! instead, so two elements with equal fields are the same set member.
//!
//! The canonical form lists present fields sorted by key, each as
//! `key 0x1F value 0x1E`, so the order fields are added in never matters.
//! Absent fields contribute nothing.
//! The hash is the leading 64 bits of SHA-256 over the canonical form.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};

const KEY_SEPARATOR: char = '\u{1f}';
const FIELD_TERMINATOR: char = '\u{1e}';

/// Set-membership key of a collection element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Builds the canonical string of an element and hashes it
#[derive(Debug, Default)]
pub struct FingerprintBuilder {
    fields: BTreeMap<String, String>,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. `None` leaves the canonical form untouched; adding a key
    /// twice keeps the last value.
    pub fn field(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.fields.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn canonical(&self) -> String {
        let mut canonical = String::new();
        for (key, value) in &self.fields {
            canonical.push_str(key);
            canonical.push(KEY_SEPARATOR);
            canonical.push_str(value);
            canonical.push(FIELD_TERMINATOR);
        }
        canonical
    }

    pub fn finish(self) -> Fingerprint {
        let digest = Sha256::digest(self.canonical().as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Fingerprint(u64::from_be_bytes(head))
    }
}
