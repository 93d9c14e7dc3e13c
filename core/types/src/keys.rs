// Copyright (c) 2024 Botho Foundation

//! Account signing keys and the message verification predicate.
//!
//! An account number is the account's Ed25519 public key; blocks are
//! signed over their 32-byte hash. The ledger consumes verification as
//! an opaque predicate and never handles private keys.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};

use crate::hash::{Account, BlockHash, Signature};

/// An Ed25519 keypair controlling one account.
///
/// Used by block builders and tests; the ledger core itself only ever
/// verifies.
#[derive(Clone)]
pub struct AccountKeypair {
    secret: SigningKey,
}

impl AccountKeypair {
    /// Derive a keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(&seed),
        }
    }

    /// The account number (public key) for this keypair.
    pub fn account(&self) -> Account {
        Account(self.secret.verifying_key().to_bytes())
    }

    /// Sign a block hash.
    pub fn sign(&self, hash: &BlockHash) -> Signature {
        Signature(self.secret.sign(hash.as_bytes()).to_bytes())
    }
}

/// Verify `signature` over `hash` against `account`'s public key.
///
/// Returns false for malformed public keys as well as for signatures
/// that do not verify; the burn account's all-zero key can never
/// validate.
pub fn validate_message(account: &Account, hash: &BlockHash, signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(account.as_bytes()) else {
        return false;
    };
    let signature = DalekSignature::from_bytes(signature.as_bytes());
    key.verify_strict(hash.as_bytes(), &signature).is_ok()
}
