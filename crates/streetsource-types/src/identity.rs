use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Material a [`CallerId`] is derived from.
///
/// The upstream identity provider decides which variant it hands over; the
/// ledger only ever sees the derived identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityMaterial {
    /// An ed25519 (or similar) public key of a signing wallet.
    PublicKey([u8; 32]),
    /// An account name vouched for by an authenticating proxy.
    Account(String),
}

/// Stable, unforgeable identifier of a ledger caller.
///
/// Derived deterministically from [`IdentityMaterial`] using BLAKE3, so the
/// same account or key always maps to the same `CallerId`. Serialized as a
/// 64-character hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallerId {
    hash: [u8; 32],
}

impl CallerId {
    /// Derive a `CallerId` from identity material.
    pub fn derive(material: &IdentityMaterial) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"streetsource-caller-v1:");
        match material {
            IdentityMaterial::PublicKey(pk) => {
                hasher.update(b"pubkey:");
                hasher.update(pk);
            }
            IdentityMaterial::Account(name) => {
                hasher.update(b"account:");
                hasher.update(name.as_bytes());
            }
        }
        Self {
            hash: *hasher.finalize().as_bytes(),
        }
    }

    /// Shorthand for `derive(&IdentityMaterial::Account(name))`.
    pub fn account(name: impl Into<String>) -> Self {
        Self::derive(&IdentityMaterial::Account(name.into()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short identifier (`id:` plus the first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("id:{}", hex::encode(&self.hash[..4]))
    }

    /// Parse from 64 hex characters, optionally prefixed with `id:`.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("id:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let hash: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self { hash })
    }

    pub fn from_raw(hash: [u8; 32]) -> Self {
        Self { hash }
    }
}

impl FromStr for CallerId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl TryFrom<String> for CallerId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<CallerId> for String {
    fn from(id: CallerId) -> Self {
        id.to_hex()
    }
}

impl fmt::Debug for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallerId({})", self.short_id())
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let a = CallerId::account("vendor-ravi");
        let b = CallerId::derive(&IdentityMaterial::Account("vendor-ravi".into()));
        assert_eq!(a, b);
    }

    #[test]
    fn different_accounts_produce_different_ids() {
        assert_ne!(CallerId::account("alice"), CallerId::account("bob"));
    }

    #[test]
    fn material_kind_is_part_of_derivation() {
        let key = [7u8; 32];
        let from_key = CallerId::derive(&IdentityMaterial::PublicKey(key));
        let from_account = CallerId::account(String::from_utf8_lossy(&key).into_owned());
        assert_ne!(from_key, from_account);
    }

    #[test]
    fn short_id_format() {
        let short = CallerId::account("alice").short_id();
        assert!(short.starts_with("id:"));
        assert_eq!(short.len(), 11);
    }

    #[test]
    fn parses_with_and_without_prefix() {
        let id = CallerId::account("owner");
        assert_eq!(CallerId::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(format!("id:{}", id.to_hex()).parse::<CallerId>().unwrap(), id);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = CallerId::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn rejects_non_hex() {
        assert!(matches!(
            CallerId::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = CallerId::from_raw([0xab; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let parsed: CallerId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
