// Copyright (c) 2024 Botho Foundation

//! Per-network ledger constants.

use std::collections::HashMap;

use lattice_blockchain_types::OpenBlock;
use lattice_core_types::{Account, Amount, BlockHash, Epochs};

/// Everything about a network the ledger core needs to know: the
/// genesis chain, the burn account, the epoch upgrade registry and the
/// static bootstrap weights used while the local ledger is still short.
#[derive(Clone, Debug)]
pub struct LedgerConstants {
    /// The account owning the genesis chain.
    pub genesis_account: Account,
    /// The genesis open block. Its `source` is the genesis account
    /// itself, a sentinel no real send carries.
    pub genesis_block: OpenBlock,
    /// The total issued supply, all of it credited by the genesis block.
    pub genesis_amount: Amount,
    /// The account that may never be opened or credited by a receive.
    pub burn_account: Account,
    /// Registered epoch upgrades.
    pub epochs: Epochs,
    /// Known representative weights served while the local block count
    /// is below `bootstrap_weight_max_blocks`.
    pub bootstrap_weights: HashMap<Account, Amount>,
    /// Block-count cutoff beyond which bootstrap weights are ignored.
    pub bootstrap_weight_max_blocks: u64,
}

impl LedgerConstants {
    /// Hash of the genesis open block.
    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_block.hash()
    }
}
