//! TEE matcher signing and Ethereum prefixed-hash recovery.
//!
//! Leaf signatures use the 32-byte prefixed digest
//! `keccak256("\x19Ethereum Signed Message:\n32" ‖ leaf)`; the distribution
//! challenge uses the same convention over an arbitrary-length message.
//! Signatures travel as 65 bytes `r ‖ s ‖ v` with v in {27, 28} (0/1 is
//! accepted on recovery).

use alloy_primitives::{keccak256, Address, B256, Signature};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Result;
use tracing::warn;

/// Prefixed digest for a 32-byte payload (on-chain `ecrecover` convention).
pub fn eth_signed_hash(payload: &B256) -> B256 {
    let mut preimage = Vec::with_capacity(28 + 32);
    preimage.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    preimage.extend_from_slice(payload.as_slice());
    keccak256(&preimage)
}

/// Prefixed digest for an arbitrary message (personal-sign convention).
pub fn personal_sign_hash(message: &[u8]) -> B256 {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut preimage = Vec::with_capacity(prefix.len() + message.len());
    preimage.extend_from_slice(prefix.as_bytes());
    preimage.extend_from_slice(message);
    keccak256(&preimage)
}

/// The matching engine's signing identity.
///
/// With no key configured a random signer is used, mirroring dry-run mode:
/// artifacts are still well-formed but will not recover to any registered
/// signer on-chain.
pub struct TeeSigner {
    signer: PrivateKeySigner,
}

impl TeeSigner {
    pub fn new(private_key: &str) -> Self {
        let signer = if private_key.is_empty() {
            PrivateKeySigner::random()
        } else {
            let key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);
            key_hex.parse::<PrivateKeySigner>().unwrap_or_else(|_| {
                warn!("Invalid matcher key, using random signer (dry-run)");
                PrivateKeySigner::random()
            })
        };
        Self { signer }
    }

    pub fn random() -> Self {
        Self { signer: PrivateKeySigner::random() }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign the prefixed digest of a match leaf. Returns the 65-byte
    /// signature with v normalized to 27/28.
    pub fn sign_leaf(&self, leaf: &B256) -> Result<[u8; 65]> {
        let digest = eth_signed_hash(leaf);
        let sig = self.signer.sign_hash_sync(&digest)?;
        let mut bytes = sig.as_bytes();
        if bytes[64] < 27 {
            bytes[64] += 27;
        }
        Ok(bytes)
    }

    /// Sign the personal-sign digest of an arbitrary challenge message.
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; 65]> {
        let digest = personal_sign_hash(message);
        let sig = self.signer.sign_hash_sync(&digest)?;
        let mut bytes = sig.as_bytes();
        if bytes[64] < 27 {
            bytes[64] += 27;
        }
        Ok(bytes)
    }
}

/// Recover the signer of a leaf signature, or `None` for malformed input.
pub fn recover_leaf_signer(leaf: &B256, signature: &[u8]) -> Option<Address> {
    recover_prehash(&eth_signed_hash(leaf), signature)
}

/// Recover the signer of a personal-sign challenge.
pub fn recover_message_signer(message: &[u8], signature: &[u8]) -> Option<Address> {
    recover_prehash(&personal_sign_hash(message), signature)
}

fn recover_prehash(digest: &B256, signature: &[u8]) -> Option<Address> {
    if signature.len() != 65 {
        return None;
    }
    let sig = Signature::try_from(signature).ok()?;
    sig.recover_address_from_prehash(digest).ok()
}
