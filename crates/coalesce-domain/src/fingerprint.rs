//! Stable identity keys for lookup requests and responses.
//!
//! A fingerprint is the join key for both in-flight deduplication and
//! response demultiplexing. It is derived from the semantically relevant
//! fields of a payload, joined with `-` in a fixed field order, so a
//! request and the response that answers it produce the same value.
//!
//! # Example
//!
//! ```rust
//! use coalesce_domain::fingerprint::Fingerprint;
//!
//! let fp = Fingerprint::from_parts(["uuid1".to_string(), 80.to_string()]);
//! assert_eq!(fp.as_str(), "uuid1-80");
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator placed between fingerprint fields.
pub const FIELD_SEPARATOR: char = '-';

/// Deterministic identity of a request or response payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds a fingerprint by joining the given fields in order.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: fmt::Display,
    {
        let mut value = String::new();
        for (index, part) in parts.into_iter().enumerate() {
            if index > 0 {
                value.push(FIELD_SEPARATOR);
            }
            value.push_str(&part.to_string());
        }
        Self(value)
    }

    /// Returns the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the fingerprint, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for Fingerprint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Types that can derive their own fingerprint.
///
/// Implementations must be pure: no I/O, no failure, and byte-identical
/// output for semantically identical inputs.
pub trait Fingerprinted {
    /// Derives the fingerprint of this payload.
    fn fingerprint(&self) -> Fingerprint;
}

impl Fingerprinted for String {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint(self.clone())
    }
}

impl Fingerprinted for Fingerprint {
    fn fingerprint(&self) -> Fingerprint {
        self.clone()
    }
}
