use borsh_derive::{BorshDeserialize, BorshSerialize};
use core_utils::hex::ToHex;
use core_utils::serde_bytes_fixed_ref;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PUBLIC_KEY_LENGTH: usize = 33;

/// A 33-byte compressed secp256k1 curve point, used only at the network
/// boundary and for signature verification.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes_fixed_ref")] pub [u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn to_crypto(&self) -> Result<core_crypto::PublicKey, core_crypto::CryptoError> {
        core_crypto::public_key_from_bytes(&self.0)
    }

    pub fn from_crypto(pk: &core_crypto::PublicKey) -> Self {
        Self(pk.serialize())
    }
}

impl From<[u8; PUBLIC_KEY_LENGTH]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; PUBLIC_KEY_LENGTH] = slice.try_into()?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.0.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Persistent Key Identifier. Initially equal to the owning public key, but
/// stable across an identity swap — the canonical foreign key for balance,
/// order, and profile entries. Signatures are always checked against the
/// public key; storage is always keyed by PKID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Pkid(#[serde(with = "serde_bytes_fixed_ref")] pub [u8; PUBLIC_KEY_LENGTH]);

impl Pkid {
    /// DESO's balance entries use this sentinel as the "creator" PKID.
    pub const ZERO: Pkid = Pkid([0u8; PUBLIC_KEY_LENGTH]);

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; PUBLIC_KEY_LENGTH]
    }
}

impl From<PublicKey> for Pkid {
    fn from(pk: PublicKey) -> Self {
        Self(pk.0)
    }
}

impl From<[u8; PUBLIC_KEY_LENGTH]> for Pkid {
    fn from(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Pkid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Pkid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pkid({})", self.0.to_hex())
    }
}

impl fmt::Display for Pkid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}
