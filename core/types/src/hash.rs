// Copyright (c) 2024 Botho Foundation

//! Fixed-width opaque byte strings: block hashes, account numbers and
//! signatures.
//!
//! `BlockHash` and `Account` share the 32-byte representation; an account
//! number doubles as a chain root and as the sentinel `source` of the
//! genesis block, so lossless conversion between the two is provided.
//! The all-zero value is the distinguished "none" sentinel for both.

use core::fmt;

use serde::{de, Deserialize, Serialize};

/// A 32-byte block hash.
#[derive(
    Clone, Copy, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct BlockHash(pub [u8; 32]);

/// A 32-byte account number (an Ed25519 public key).
#[derive(
    Clone, Copy, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Account(pub [u8; 32]);

macro_rules! impl_u256 {
    ($name:ident) => {
        impl $name {
            /// The all-zero sentinel meaning "none".
            pub const ZERO: Self = Self([0u8; 32]);

            /// Whether this is the "none" sentinel.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Copy out the raw bytes.
            pub fn to_bytes(&self) -> [u8; 32] {
                self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

impl_u256!(BlockHash);
impl_u256!(Account);

impl From<Account> for BlockHash {
    fn from(account: Account) -> Self {
        Self(account.0)
    }
}

impl From<BlockHash> for Account {
    fn from(hash: BlockHash) -> Self {
        Self(hash.0)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// The all-zero placeholder signature.
    pub const ZERO: Self = Self([0u8; 64]);

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[u8; 64]> for Signature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

// Serde caps array impls at 32 elements, so the 64-byte signature is
// encoded as a byte string by hand.
impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("64 signature bytes")
            }

            fn visit_bytes<E: de::Error>(self, value: &[u8]) -> Result<Signature, E> {
                let bytes: [u8; 64] = value
                    .try_into()
                    .map_err(|_| E::invalid_length(value.len(), &self))?;
                Ok(Signature(bytes))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Signature, A::Error> {
                let mut bytes = [0u8; 64];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}
