//! Registration fingerprints.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// SHA-256 digest of the `(token, user ID, categories)` registration tuple.
///
/// Two states with the same token, user ID and category set always have the
/// same fingerprint, regardless of the order categories were added in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of a registration tuple.
    pub fn compute(
        device_token: Option<&[u8]>,
        user_id: Option<&str>,
        categories: &BTreeSet<String>,
    ) -> CoreResult<Self> {
        let token = device_token.map(hex::encode);
        let sorted: Vec<&str> = categories.iter().map(String::as_str).collect();

        let mut canonical = Vec::new();
        ciborium::into_writer(&(token, user_id, sorted), &mut canonical)
            .map_err(|e| CoreError::Codec(e.to_string()))?;

        let digest = Sha256::digest(&canonical);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Ok(Self(bytes))
    }

    /// Returns the raw digest.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded fingerprint.
    pub fn from_hex(s: &str) -> Option<Self> {
        let decoded = hex::decode(s).ok()?;
        let bytes: [u8; 32] = decoded.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn differs_by_each_component() {
        let cats = set(&["a", "b"]);
        let base = Fingerprint::compute(Some(&[1, 2]), Some("u"), &cats).unwrap();

        assert_ne!(
            base,
            Fingerprint::compute(Some(&[1, 3]), Some("u"), &cats).unwrap()
        );
        assert_ne!(
            base,
            Fingerprint::compute(Some(&[1, 2]), None, &cats).unwrap()
        );
        assert_ne!(
            base,
            Fingerprint::compute(Some(&[1, 2]), Some("u"), &set(&["a"])).unwrap()
        );
    }

    #[test]
    fn hex_parses_back() {
        let fp = Fingerprint::compute(None, None, &BTreeSet::new()).unwrap();
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()), Some(fp));
        assert_eq!(Fingerprint::from_hex("abcd"), None);
        assert_eq!(Fingerprint::from_hex("not hex"), None);
    }

    proptest! {
        #[test]
        fn category_insertion_order_is_irrelevant(
            cats in proptest::collection::vec("[a-z]{1,8}", 0..10)
        ) {
            let forward: BTreeSet<String> = cats.iter().cloned().collect();
            let reversed: BTreeSet<String> = cats.iter().rev().cloned().collect();

            prop_assert_eq!(
                Fingerprint::compute(Some(b"tok"), Some("user"), &forward).unwrap(),
                Fingerprint::compute(Some(b"tok"), Some("user"), &reversed).unwrap()
            );
        }
    }
}
