// Copyright (c) 2024 Botho Foundation

//! Account-chain epochs.
//!
//! An epoch is a versioning marker on an account chain. Upgrades are
//! carried by dedicated state blocks whose `link` field is one of a small
//! set of well-known epoch links, each signed by a pinned upgrade signer.
//! The epoch recorded for an account is monotonically non-decreasing
//! along its chain.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::hash::{Account, BlockHash};

/// An account-chain epoch, totally ordered.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Epoch {
    /// The original epoch all chains start in.
    #[default]
    Epoch0,
    /// The first upgrade epoch.
    Epoch1,
}

/// Registry of epoch upgrade descriptors: for each upgrade epoch, the
/// well-known link value that marks a state block as an upgrade block,
/// and the account pinned to sign those blocks.
#[derive(Clone, Debug, Default)]
pub struct Epochs {
    entries: Vec<EpochEntry>,
}

#[derive(Clone, Debug)]
struct EpochEntry {
    epoch: Epoch,
    signer: Account,
    link: BlockHash,
}

impl Epochs {
    /// An empty registry (no upgrades configured).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an upgrade epoch with its signer and link value.
    pub fn add(&mut self, epoch: Epoch, signer: Account, link: BlockHash) {
        debug_assert!(self.entries.iter().all(|entry| entry.epoch != epoch));
        self.entries.push(EpochEntry {
            epoch,
            signer,
            link,
        });
    }

    /// Whether `link` is one of the registered epoch links.
    pub fn is_epoch_link(&self, link: &BlockHash) -> bool {
        self.entries.iter().any(|entry| entry.link == *link)
    }

    /// The epoch implied by an epoch link.
    pub fn epoch(&self, link: &BlockHash) -> Option<Epoch> {
        self.entries
            .iter()
            .find(|entry| entry.link == *link)
            .map(|entry| entry.epoch)
    }

    /// The pinned upgrade signer for an epoch.
    pub fn signer(&self, epoch: Epoch) -> Option<&Account> {
        self.entries
            .iter()
            .find(|entry| entry.epoch == epoch)
            .map(|entry| &entry.signer)
    }

    /// The link value for an epoch.
    pub fn link(&self, epoch: Epoch) -> Option<&BlockHash> {
        self.entries
            .iter()
            .find(|entry| entry.epoch == epoch)
            .map(|entry| &entry.link)
    }
}
