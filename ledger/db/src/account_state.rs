// Copyright (c) 2024 Botho Foundation

//! A read-time view of an account's latest state.

use lmdb::Transaction;

use lattice_blockchain_types::{AccountInfo, Block, BlockSideband};
use lattice_core_types::{Account, Amount, BlockHash, Epoch};

use crate::{Error, LedgerDb};

/// An account's record bundled with its head block and sideband.
///
/// A convenience value computed at read time and valid only within the
/// transaction that produced it. The balance accessor needs the head
/// block because legacy variants record their balance only in the
/// sideband while send and state blocks carry it inline.
#[derive(Clone, Debug)]
pub struct AccountState {
    info: AccountInfo,
    epoch: Epoch,
    block: Block,
    sideband: BlockSideband,
}

impl AccountState {
    pub(crate) fn load<T: Transaction>(
        db: &LedgerDb,
        account: &Account,
        db_transaction: &T,
    ) -> Result<Option<Self>, Error> {
        let Some((info, epoch)) = db.accounts().get(account, db_transaction)? else {
            return Ok(None);
        };
        let (block, sideband) = db
            .blocks()
            .get(&info.head, db_transaction)?
            .ok_or(Error::Corruption("account head missing from block table"))?;
        Ok(Some(Self {
            info,
            epoch,
            block,
            sideband,
        }))
    }

    /// Hash of the account's head block.
    pub fn head(&self) -> BlockHash {
        self.info.head
    }

    /// The account's current representative.
    pub fn representative(&self) -> Account {
        self.info.representative
    }

    /// Hash of the account's open block.
    pub fn open_block(&self) -> BlockHash {
        self.info.open_block
    }

    /// The account's epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// The account's balance as of its head block.
    pub fn balance(&self) -> Amount {
        self.block.balance().unwrap_or(self.sideband.balance)
    }

    /// Number of blocks on the account's chain.
    pub fn block_count(&self) -> u64 {
        self.sideband.height
    }

    /// The head block itself.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// The raw account record.
    pub fn info(&self) -> &AccountInfo {
        &self.info
    }
}
