// Copyright (c) 2024 Botho Foundation

//! Pending (sent but unreceived) entries.

use lattice_core_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

/// Key of a pending entry: the destination account and the send hash.
///
/// The byte encoding puts the account first so a table scan groups all
/// of one account's receivable entries together.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PendingKey {
    /// The account the send is destined for.
    pub account: Account,
    /// Hash of the send block.
    pub send_hash: BlockHash,
}

impl PendingKey {
    /// Assemble a pending key.
    pub fn new(account: Account, send_hash: BlockHash) -> Self {
        Self { account, send_hash }
    }

    /// The 64-byte table key: account bytes then send hash bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(self.account.as_bytes());
        bytes[32..].copy_from_slice(self.send_hash.as_bytes());
        bytes
    }

    /// Decode a 64-byte table key.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        let mut account = [0u8; 32];
        let mut send_hash = [0u8; 32];
        account.copy_from_slice(&bytes[..32]);
        send_hash.copy_from_slice(&bytes[32..]);
        Self {
            account: Account(account),
            send_hash: BlockHash(send_hash),
        }
    }
}

/// Value of a pending entry.
///
/// Exactly one entry exists from the moment a send is applied until the
/// matching receive or open is applied. The epoch records the sender's
/// epoch at send time and gates which receive variants may pocket it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PendingInfo {
    /// The account that signed the send.
    pub source: Account,
    /// The amount the send dropped off the sender's chain.
    pub amount: Amount,
    /// The sender's epoch at send time.
    pub epoch: Epoch,
}

impl PendingInfo {
    /// Assemble a pending value.
    pub fn new(source: Account, amount: Amount, epoch: Epoch) -> Self {
        Self {
            source,
            amount,
            epoch,
        }
    }
}
