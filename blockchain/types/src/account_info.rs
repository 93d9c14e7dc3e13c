// Copyright (c) 2024 Botho Foundation

//! Per-account head metadata.

use lattice_core_types::{Account, BlockHash};
use serde::{Deserialize, Serialize};

/// The latest state of an account chain.
///
/// The account's epoch is not stored here; it is an artifact of which
/// epoch-partitioned table the record lives in.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AccountInfo {
    /// Hash of the chain's head block, or zero for no chain.
    pub head: BlockHash,
    /// The representative the account currently delegates to.
    pub representative: Account,
    /// Hash of the chain's open block.
    pub open_block: BlockHash,
}

impl AccountInfo {
    /// Assemble an account record.
    pub fn new(head: BlockHash, representative: Account, open_block: BlockHash) -> Self {
        Self {
            head,
            representative,
            open_block,
        }
    }
}
