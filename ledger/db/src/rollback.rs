// Copyright (c) 2024 Botho Foundation

//! Per-variant inversion of applied blocks.
//!
//! Rollback pops an account's head block and undoes its mutations,
//! repeating until the target hash is gone. Rolling back a send whose
//! receiver has already pocketed it first rolls the receiver's chain
//! back until the pending row reappears. The account's confirmation
//! height is the hard floor; reaching it fails the call and leaves the
//! transaction for the caller to abort.

use lmdb::RwTransaction;

use lattice_blockchain_types::{
    AccountInfo, Block, ChangeBlock, OpenBlock, PendingInfo, PendingKey, ReceiveBlock, SendBlock,
    StateBlock,
};
use lattice_core_types::{Account, BlockHash, Epoch};

use crate::{Error, Ledger};

impl Ledger {
    /// Roll back the chain containing `hash` until that block is no
    /// longer stored. Returns the popped blocks, most recent first per
    /// chain segment.
    ///
    /// On error the transaction is left as-is; the caller aborts it.
    pub fn rollback(
        &self,
        db_transaction: &mut RwTransaction,
        hash: &BlockHash,
    ) -> Result<Vec<Block>, Error> {
        let mut rolled_back = Vec::new();
        self.rollback_into(db_transaction, hash, &mut rolled_back)?;
        Ok(rolled_back)
    }

    fn rollback_into(
        &self,
        db_transaction: &mut RwTransaction,
        hash: &BlockHash,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), Error> {
        if !self.store().blocks().exists(hash, &*db_transaction)? {
            return Err(Error::BlockNotFound(*hash));
        }
        let account = self
            .account(&*db_transaction, hash)?
            .ok_or(Error::Corruption("stored block lacks a sideband account"))?;
        let block_height = self
            .store()
            .blocks()
            .account_height(hash, &*db_transaction)?;

        while self.store().blocks().exists(hash, &*db_transaction)? {
            let confirmation_height = self
                .store()
                .confirmation_heights()
                .get(&account, &*db_transaction)?
                .ok_or(Error::Corruption("account lacks a confirmation height"))?;
            if block_height <= confirmation_height {
                return Err(Error::RollbackConfirmed(account));
            }
            let (info, _) = self
                .store()
                .accounts()
                .get(&account, &*db_transaction)?
                .ok_or(Error::AccountNotFound(account))?;
            let (head, _) = self
                .store()
                .blocks()
                .get(&info.head, &*db_transaction)?
                .ok_or(Error::Corruption("account head missing from block table"))?;
            rolled_back.push(head.clone());
            self.rollback_block(db_transaction, &head, rolled_back)?;
        }
        Ok(())
    }

    fn rollback_block(
        &self,
        db_transaction: &mut RwTransaction,
        block: &Block,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), Error> {
        match block {
            Block::Send(send) => self.rollback_send(db_transaction, send, rolled_back),
            Block::Receive(receive) => self.rollback_receive(db_transaction, receive),
            Block::Open(open) => self.rollback_open(db_transaction, open),
            Block::Change(change) => self.rollback_change(db_transaction, change),
            Block::State(state) => self.rollback_state(db_transaction, state, rolled_back),
        }
    }

    fn rollback_send(
        &self,
        db_transaction: &mut RwTransaction,
        block: &SendBlock,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), Error> {
        let hash = block.hash();
        let key = PendingKey::new(block.destination, hash);
        // The destination must not have spent the receive: roll its
        // chain back until the pending row reappears.
        while !self.store().pending().exists(&key, &*db_transaction)? {
            let destination_head = self
                .latest(&*db_transaction, &block.destination)?
                .ok_or(Error::Corruption("received send has no destination chain"))?;
            self.rollback_into(db_transaction, &destination_head, rolled_back)?;
        }
        let pending = self
            .store()
            .pending()
            .get(&key, &*db_transaction)?
            .ok_or(Error::Corruption("pending entry vanished during rollback"))?;
        let state = self
            .account_state(&*db_transaction, &pending.source)?
            .ok_or(Error::AccountNotFound(pending.source))?;

        self.store().pending().del(&key, db_transaction)?;
        self.rep_weights()
            .representation_add(state.representative(), pending.amount);
        let new_info =
            AccountInfo::new(block.previous, state.representative(), state.open_block());
        self.change_latest(
            db_transaction,
            &pending.source,
            Some(&state),
            &new_info,
            Epoch::Epoch0,
        )?;
        self.store().blocks().del(&hash, db_transaction)?;
        self.store().frontiers().del(&hash, db_transaction)?;
        self.store()
            .frontiers()
            .put(&block.previous, &pending.source, db_transaction)?;
        self.store()
            .blocks()
            .successor_clear(&block.previous, db_transaction)?;
        tracing::debug!(%hash, account = %pending.source, "rolled back send block");
        Ok(())
    }

    fn rollback_receive(
        &self,
        db_transaction: &mut RwTransaction,
        block: &ReceiveBlock,
    ) -> Result<(), Error> {
        let hash = block.hash();
        let amount = self.amount(&*db_transaction, &block.source)?;
        let destination = self
            .account(&*db_transaction, &hash)?
            .ok_or(Error::Corruption("stored block lacks a sideband account"))?;
        let source_account = self
            .account(&*db_transaction, &block.source)?
            .ok_or(Error::Corruption("received send is not stored"))?;
        let state = self
            .account_state(&*db_transaction, &destination)?
            .ok_or(Error::AccountNotFound(destination))?;

        self.rep_weights()
            .representation_add(state.representative(), amount.wrapping_neg());
        let new_info =
            AccountInfo::new(block.previous, state.representative(), state.open_block());
        self.change_latest(
            db_transaction,
            &destination,
            Some(&state),
            &new_info,
            Epoch::Epoch0,
        )?;
        self.store().blocks().del(&hash, db_transaction)?;
        self.store().pending().put(
            &PendingKey::new(destination, block.source),
            &PendingInfo::new(source_account, amount, Epoch::Epoch0),
            db_transaction,
        )?;
        self.store().frontiers().del(&hash, db_transaction)?;
        self.store()
            .frontiers()
            .put(&block.previous, &destination, db_transaction)?;
        self.store()
            .blocks()
            .successor_clear(&block.previous, db_transaction)?;
        tracing::debug!(%hash, account = %destination, "rolled back receive block");
        Ok(())
    }

    fn rollback_open(
        &self,
        db_transaction: &mut RwTransaction,
        block: &OpenBlock,
    ) -> Result<(), Error> {
        let hash = block.hash();
        let amount = self.amount(&*db_transaction, &block.source)?;
        let destination = self
            .account(&*db_transaction, &hash)?
            .ok_or(Error::Corruption("stored block lacks a sideband account"))?;
        let source_account = self
            .account(&*db_transaction, &block.source)?
            .ok_or(Error::Corruption("received send is not stored"))?;

        self.rep_weights()
            .representation_add(block.representative, amount.wrapping_neg());
        // Clearing the head erases the account record and its
        // confirmation height.
        self.change_latest(
            db_transaction,
            &destination,
            None,
            &AccountInfo::default(),
            Epoch::Epoch0,
        )?;
        self.store().blocks().del(&hash, db_transaction)?;
        self.store().pending().put(
            &PendingKey::new(destination, block.source),
            &PendingInfo::new(source_account, amount, Epoch::Epoch0),
            db_transaction,
        )?;
        self.store().frontiers().del(&hash, db_transaction)?;
        tracing::debug!(%hash, account = %destination, "rolled back open block");
        Ok(())
    }

    fn rollback_change(
        &self,
        db_transaction: &mut RwTransaction,
        block: &ChangeBlock,
    ) -> Result<(), Error> {
        let hash = block.hash();
        let rep_block_hash = self.representative_block(&*db_transaction, &block.previous)?;
        let account = self
            .account(&*db_transaction, &block.previous)?
            .ok_or(Error::Corruption("stored block lacks a sideband account"))?;
        let state = self
            .account_state(&*db_transaction, &account)?
            .ok_or(Error::AccountNotFound(account))?;
        let balance = self.balance(&*db_transaction, &block.previous)?;
        let (rep_block, _) = self
            .store()
            .blocks()
            .get(&rep_block_hash, &*db_transaction)?
            .ok_or(Error::BlockNotFound(rep_block_hash))?;
        let representative = rep_block
            .representative()
            .ok_or(Error::Corruption("representative block carries no representative"))?;

        self.rep_weights()
            .representation_add(block.representative, balance.wrapping_neg());
        self.rep_weights()
            .representation_add(representative, balance);
        self.store().blocks().del(&hash, db_transaction)?;
        let new_info = AccountInfo::new(block.previous, representative, state.open_block());
        self.change_latest(
            db_transaction,
            &account,
            Some(&state),
            &new_info,
            Epoch::Epoch0,
        )?;
        self.store().frontiers().del(&hash, db_transaction)?;
        self.store()
            .frontiers()
            .put(&block.previous, &account, db_transaction)?;
        self.store()
            .blocks()
            .successor_clear(&block.previous, db_transaction)?;
        tracing::debug!(%hash, %account, "rolled back change block");
        Ok(())
    }

    fn rollback_state(
        &self,
        db_transaction: &mut RwTransaction,
        block: &StateBlock,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), Error> {
        let hash = block.hash();
        let mut rep_block_hash = BlockHash::ZERO;
        if !block.previous.is_zero() {
            rep_block_hash = self.representative_block(&*db_transaction, &block.previous)?;
        }
        let balance = self.balance(&*db_transaction, &block.previous)?;
        let is_send = block.balance < balance;

        // Take the block's own representation back out.
        self.rep_weights()
            .representation_add(block.representative, block.balance.wrapping_neg());
        let mut representative = Account::ZERO;
        if !rep_block_hash.is_zero() {
            // Move the previous representation back in.
            let (rep_block, _) = self
                .store()
                .blocks()
                .get(&rep_block_hash, &*db_transaction)?
                .ok_or(Error::BlockNotFound(rep_block_hash))?;
            representative = rep_block
                .representative()
                .ok_or(Error::Corruption("representative block carries no representative"))?;
            self.rep_weights()
                .representation_add(representative, balance);
        }

        let state = self
            .account_state(&*db_transaction, &block.account)?
            .ok_or(Error::AccountNotFound(block.account))?;

        if is_send {
            let key = PendingKey::new(Account::from(block.link), hash);
            while !self.store().pending().exists(&key, &*db_transaction)? {
                let destination_head = self
                    .latest(&*db_transaction, &Account::from(block.link))?
                    .ok_or(Error::Corruption("received send has no destination chain"))?;
                self.rollback_into(db_transaction, &destination_head, rolled_back)?;
            }
            self.store().pending().del(&key, db_transaction)?;
            tracing::debug!(%hash, account = %block.account, "rolled back state send block");
        } else if !block.link.is_zero() && !self.is_epoch_link(&block.link) {
            let source_version = self
                .store()
                .blocks()
                .version(&block.link, &*db_transaction)?;
            let source_account = self
                .account(&*db_transaction, &block.link)?
                .ok_or(Error::Corruption("received send is not stored"))?;
            self.store().pending().put(
                &PendingKey::new(block.account, block.link),
                &PendingInfo::new(source_account, block.balance - balance, source_version),
                db_transaction,
            )?;
            tracing::debug!(%hash, account = %block.account, "rolled back state receive block");
        }

        let previous_version = self
            .store()
            .blocks()
            .version(&block.previous, &*db_transaction)?;
        let new_info = AccountInfo::new(block.previous, representative, state.open_block());
        self.change_latest(
            db_transaction,
            &block.account,
            Some(&state),
            &new_info,
            previous_version,
        )?;

        if let Some((previous, _)) = self
            .store()
            .blocks()
            .get(&block.previous, &*db_transaction)?
        {
            self.store()
                .blocks()
                .successor_clear(&block.previous, db_transaction)?;
            if previous.is_legacy() {
                // The chain's head is legacy again; reinstate its
                // frontier row.
                self.store()
                    .frontiers()
                    .put(&block.previous, &block.account, db_transaction)?;
            }
        }
        self.store().blocks().del(&hash, db_transaction)?;
        Ok(())
    }
}
