use borsh_derive::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known extra-data tag carrying the derived key's public key for the
/// extra-data signature variant.
pub const DERIVED_PUBLIC_KEY_KEY: &[u8] = b"DerivedPublicKey";
/// Well-known extra-data tag carrying an encoded transaction spending limit,
/// set on the derived-key authorization transaction.
pub const TRANSACTION_SPENDING_LIMIT_KEY: &[u8] = b"TransactionSpendingLimit";

/// A mapping from short byte-string keys to arbitrary byte-string values,
/// carried on every transaction. Ordered so serialization is canonical.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ExtraData(pub BTreeMap<Vec<u8>, Vec<u8>>);

impl ExtraData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.0.get(key).map(|v| v.as_slice())
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn derived_public_key(&self) -> Option<&[u8]> {
        self.get(DERIVED_PUBLIC_KEY_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_public_key_round_trips() {
        let mut extra = ExtraData::new();
        extra.insert(DERIVED_PUBLIC_KEY_KEY, vec![1, 2, 3]);
        assert_eq!(extra.derived_public_key(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn fresh_extra_data_is_empty() {
        assert!(ExtraData::new().is_empty());
    }
}
