//! secp256k1 signing/verification and Base58Check address encoding.
//!
//! The transaction layer accepts three signature schemes (owner, derived-key
//! extra-data, derived-key DER-recoverable); all three ultimately boil down to
//! an ECDSA signature over a 32-byte message hash, optionally carrying a
//! recovery id so the signer's public key can be reconstructed instead of
//! shipped alongside the signature.

use borsh_derive::{BorshDeserialize, BorshSerialize};
use core_hashes::double_sha256;
use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature as EcdsaSignature};
use secp256k1::{Message, Secp256k1};
use sha2::{Digest, Sha256};

pub use secp256k1::{PublicKey, SecretKey};

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("message is not a valid 32-byte digest")]
    InvalidMessage,
    #[error("malformed signature")]
    InvalidSignature,
    #[error("malformed public key")]
    InvalidPublicKey,
    #[error("malformed secret key")]
    InvalidSecretKey,
    #[error("could not recover public key from signature")]
    RecoveryFailed,
    #[error("base58 payload too short to contain a checksum")]
    Base58TooShort,
    #[error("base58 checksum mismatch")]
    Base58ChecksumMismatch,
    #[error("base58 decode error: {0}")]
    Base58Decode(String),
}

/// A signature in the wire format used throughout the chain: a 32-byte `r`,
/// a 32-byte `s`, a recovery id, and a flag marking whether the recovery id
/// is meaningful. Owner signatures and the extra-data derived-key variant
/// leave `is_recoverable` false; the DER-recoverable derived-key variant
/// sets it so the signer's public key can be reconstructed from the
/// signature alone.
#[derive(Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
    pub is_recoverable: bool,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signature(r={}, s={}, recoverable={})",
            hex::encode(self.r),
            hex::encode(self.s),
            self.is_recoverable
        )
    }
}

fn message_from_digest(digest: &[u8; 32]) -> Result<Message, CryptoError> {
    Message::from_slice(digest).map_err(|_| CryptoError::InvalidMessage)
}

/// Sign with the plain (non-recoverable) scheme used for owner signatures
/// and the extra-data derived-key variant.
pub fn sign(secret_key: &SecretKey, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
    let secp = Secp256k1::signing_only();
    let message = message_from_digest(digest)?;
    let sig = secp.sign_ecdsa(&message, secret_key);
    let compact = sig.serialize_compact();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[0..32]);
    s.copy_from_slice(&compact[32..64]);
    Ok(Signature { r, s, recovery_id: 0, is_recoverable: false })
}

/// Sign with the DER-recoverable derived-key scheme: the recovery id lets a
/// verifier reconstruct the signer's public key rather than requiring it to
/// be carried alongside the signature.
pub fn sign_recoverable(secret_key: &SecretKey, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
    let secp = Secp256k1::signing_only();
    let message = message_from_digest(digest)?;
    let sig = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = sig.serialize_compact();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[0..32]);
    s.copy_from_slice(&compact[32..64]);
    Ok(Signature { r, s, recovery_id: recovery_id.to_i32() as u8, is_recoverable: true })
}

fn to_ecdsa(sig: &Signature) -> Result<EcdsaSignature, CryptoError> {
    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(&sig.r);
    compact[32..64].copy_from_slice(&sig.s);
    EcdsaSignature::from_compact(&compact).map_err(|_| CryptoError::InvalidSignature)
}

/// Verify a signature against a known public key. Used for owner signatures
/// and the extra-data derived-key variant, where the signer's public key is
/// already at hand.
pub fn verify(public_key: &PublicKey, digest: &[u8; 32], sig: &Signature) -> Result<bool, CryptoError> {
    let secp = Secp256k1::verification_only();
    let message = message_from_digest(digest)?;
    let ecdsa_sig = to_ecdsa(sig)?;
    Ok(secp.verify_ecdsa(&message, &ecdsa_sig, public_key).is_ok())
}

/// Recover the signer's public key from a DER-recoverable signature. The
/// recovered key is then treated as a derived key and validated against the
/// owning account's authorization record, same as the extra-data variant.
pub fn recover_public_key(digest: &[u8; 32], sig: &Signature) -> Result<PublicKey, CryptoError> {
    if !sig.is_recoverable {
        return Err(CryptoError::RecoveryFailed);
    }
    let secp = Secp256k1::verification_only();
    let message = message_from_digest(digest)?;
    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(&sig.r);
    compact[32..64].copy_from_slice(&sig.s);
    let recovery_id = RecoveryId::from_i32(sig.recovery_id as i32).map_err(|_| CryptoError::RecoveryFailed)?;
    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    secp.recover_ecdsa(&message, &recoverable).map_err(|_| CryptoError::RecoveryFailed)
}

/// Base58Check encoding: `version_byte || payload || double_sha256(payload)[0..4]`.
pub mod base58check {
    use super::*;

    pub fn encode(version: u8, payload: &[u8]) -> String {
        let mut versioned = Vec::with_capacity(1 + payload.len() + 4);
        versioned.push(version);
        versioned.extend_from_slice(payload);
        let checksum = double_sha256(&versioned);
        versioned.extend_from_slice(&checksum[0..4]);
        bs58::encode(&versioned).into_string()
    }

    /// Returns the version byte and payload (checksum stripped and verified).
    pub fn decode(encoded: &str) -> Result<(u8, Vec<u8>), CryptoError> {
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CryptoError::Base58Decode(e.to_string()))?;
        if decoded.len() < 5 {
            return Err(CryptoError::Base58TooShort);
        }
        let (body, checksum) = decoded.split_at(decoded.len() - 4);
        let expected = double_sha256(body);
        if &expected[0..4] != checksum {
            return Err(CryptoError::Base58ChecksumMismatch);
        }
        Ok((body[0], body[1..].to_vec()))
    }
}

/// SHA256-then-RIPEMD160 of a compressed public key, used wherever a
/// fixed-size hash of a key is needed rather than the key itself.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    ripe.into()
}

/// Parses a 33-byte compressed secp256k1 public key.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Parses a 32-byte secp256k1 secret key.
pub fn secret_key_from_bytes(bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)
}
