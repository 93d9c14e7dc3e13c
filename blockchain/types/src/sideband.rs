// Copyright (c) 2024 Botho Foundation

//! Store-side block annotations.

use lattice_core_types::{Account, Amount, BlockHash};
use serde::{Deserialize, Serialize};

/// Metadata recorded alongside a block when it is applied.
///
/// Not covered by the block's hash. `successor` starts at zero and is
/// filled in when a child block arrives; legacy variants store their
/// balance only here, while send and state blocks also carry it inline.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlockSideband {
    /// The account owning the chain this block sits on.
    pub account: Account,
    /// The next block on the chain, or zero while this block is the head.
    pub successor: BlockHash,
    /// The account balance as of this block's application.
    pub balance: Amount,
    /// Height of this block on its chain (the open block is height 1).
    pub height: u64,
    /// Seconds since the Unix epoch at application time.
    pub timestamp: u64,
}

impl BlockSideband {
    /// Assemble a sideband for a block being applied now.
    pub fn new(account: Account, balance: Amount, height: u64, timestamp: u64) -> Self {
        Self {
            account,
            successor: BlockHash::ZERO,
            balance,
            height,
            timestamp,
        }
    }
}
