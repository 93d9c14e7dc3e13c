// Copyright (c) 2024 Botho Foundation

//! Per-variant block validation and application.
//!
//! Checks run in a fixed order; the first failure decides the result
//! code and nothing is mutated. Once every check passes, the full
//! mutation set is written under the caller's transaction and becomes
//! visible atomically on commit.

use lmdb::RwTransaction;

use lattice_blockchain_types::{
    AccountInfo, Block, BlockSideband, ChangeBlock, OpenBlock, PendingInfo, PendingKey,
    ReceiveBlock, SendBlock, StateBlock,
};
use lattice_core_types::{validate_message, Account, Epoch};

use crate::{
    seconds_since_epoch, Error, Ledger, ProcessCode, ProcessResult, SignatureVerification,
};

/// One `process` call: dispatches on the block variant and accumulates
/// the outcome.
pub(crate) struct LedgerProcessor<'a, 'env> {
    ledger: &'a Ledger,
    db_transaction: &'a mut RwTransaction<'env>,
    result: ProcessResult,
}

impl<'a, 'env> LedgerProcessor<'a, 'env> {
    pub(crate) fn new(
        ledger: &'a Ledger,
        db_transaction: &'a mut RwTransaction<'env>,
        verification: SignatureVerification,
    ) -> Self {
        Self {
            ledger,
            db_transaction,
            result: ProcessResult::new(verification),
        }
    }

    pub(crate) fn process(mut self, block: &Block) -> Result<ProcessResult, Error> {
        match block {
            Block::Send(send) => self.send_block(send)?,
            Block::Receive(receive) => self.receive_block(receive)?,
            Block::Open(open) => self.open_block(open)?,
            Block::Change(change) => self.change_block(change)?,
            Block::State(state) => self.state_block(state)?,
        }
        Ok(self.result)
    }

    fn reject(&mut self, code: ProcessCode) {
        self.result.code = code;
    }

    fn send_block(&mut self, block: &SendBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let hash = block.hash();

        if store.blocks().exists(&hash, &*self.db_transaction)? {
            return Ok(self.reject(ProcessCode::Old));
        }
        let Some((previous, _)) = store.blocks().get(&block.previous, &*self.db_transaction)?
        else {
            return Ok(self.reject(ProcessCode::GapPrevious));
        };
        if !SendBlock::valid_predecessor(previous.block_type()) {
            return Ok(self.reject(ProcessCode::BlockPosition));
        }
        let Some(account) = store.frontiers().get(&block.previous, &*self.db_transaction)? else {
            return Ok(self.reject(ProcessCode::Fork));
        };
        if self.result.verified != SignatureVerification::Valid {
            if !validate_message(&account, &hash, &block.signature) {
                return Ok(self.reject(ProcessCode::BadSignature));
            }
        }
        self.result.verified = SignatureVerification::Valid;

        let state = ledger
            .account_state(&*self.db_transaction, &account)?
            .ok_or(Error::Corruption("frontier names an account with no record"))?;
        debug_assert_eq!(state.head(), block.previous);
        if state.balance() < block.balance {
            return Ok(self.reject(ProcessCode::NegativeSpend));
        }

        let amount = state.balance() - block.balance;
        ledger
            .rep_weights()
            .representation_add(state.representative(), amount.wrapping_neg());
        let sideband = BlockSideband::new(
            account,
            block.balance,
            state.block_count() + 1,
            seconds_since_epoch(),
        );
        store.blocks().put(
            &hash,
            &Block::Send(block.clone()),
            &sideband,
            Epoch::Epoch0,
            self.db_transaction,
        )?;
        let new_info = AccountInfo::new(hash, state.representative(), state.open_block());
        ledger.change_latest(
            self.db_transaction,
            &account,
            Some(&state),
            &new_info,
            Epoch::Epoch0,
        )?;
        store.pending().put(
            &PendingKey::new(block.destination, hash),
            &PendingInfo::new(account, amount, Epoch::Epoch0),
            self.db_transaction,
        )?;
        store
            .frontiers()
            .del(&block.previous, self.db_transaction)?;
        store
            .frontiers()
            .put(&hash, &account, self.db_transaction)?;

        self.result.account = account;
        self.result.amount = amount;
        self.result.pending_account = block.destination;
        tracing::trace!(%hash, %account, amount, "applied send block");
        Ok(())
    }

    fn receive_block(&mut self, block: &ReceiveBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let hash = block.hash();

        if store.blocks().exists(&hash, &*self.db_transaction)? {
            return Ok(self.reject(ProcessCode::Old));
        }
        let Some((previous, _)) = store.blocks().get(&block.previous, &*self.db_transaction)?
        else {
            return Ok(self.reject(ProcessCode::GapPrevious));
        };
        if !ReceiveBlock::valid_predecessor(previous.block_type()) {
            return Ok(self.reject(ProcessCode::BlockPosition));
        }
        let Some(account) = store.frontiers().get(&block.previous, &*self.db_transaction)? else {
            // No frontier row: previous is buried (signed fork) or the
            // chain is unknown entirely.
            let code = if store.blocks().exists(&block.previous, &*self.db_transaction)? {
                ProcessCode::Fork
            } else {
                ProcessCode::GapPrevious
            };
            return Ok(self.reject(code));
        };
        if self.result.verified != SignatureVerification::Valid {
            if !validate_message(&account, &hash, &block.signature) {
                return Ok(self.reject(ProcessCode::BadSignature));
            }
        }
        self.result.verified = SignatureVerification::Valid;
        if !store
            .blocks()
            .source_exists(&block.source, &*self.db_transaction)?
        {
            return Ok(self.reject(ProcessCode::GapSource));
        }
        let state = ledger
            .account_state(&*self.db_transaction, &account)?
            .ok_or(Error::Corruption("frontier names an account with no record"))?;
        if state.head() != block.previous {
            return Ok(self.reject(ProcessCode::GapPrevious));
        }
        let key = PendingKey::new(account, block.source);
        let Some(pending) = store.pending().get(&key, &*self.db_transaction)? else {
            return Ok(self.reject(ProcessCode::Unreceivable));
        };
        if pending.epoch != Epoch::Epoch0 {
            // A state-era send cannot be pocketed by a legacy receive.
            return Ok(self.reject(ProcessCode::Unreceivable));
        }

        let new_balance = state.balance() + pending.amount;
        store.pending().del(&key, self.db_transaction)?;
        let sideband = BlockSideband::new(
            account,
            new_balance,
            state.block_count() + 1,
            seconds_since_epoch(),
        );
        store.blocks().put(
            &hash,
            &Block::Receive(block.clone()),
            &sideband,
            Epoch::Epoch0,
            self.db_transaction,
        )?;
        let new_info = AccountInfo::new(hash, state.representative(), state.open_block());
        ledger.change_latest(
            self.db_transaction,
            &account,
            Some(&state),
            &new_info,
            Epoch::Epoch0,
        )?;
        ledger
            .rep_weights()
            .representation_add(state.representative(), pending.amount);
        store
            .frontiers()
            .del(&block.previous, self.db_transaction)?;
        store
            .frontiers()
            .put(&hash, &account, self.db_transaction)?;

        self.result.account = account;
        self.result.amount = pending.amount;
        tracing::trace!(%hash, %account, amount = pending.amount, "applied receive block");
        Ok(())
    }

    fn open_block(&mut self, block: &OpenBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let hash = block.hash();

        if store.blocks().exists(&hash, &*self.db_transaction)? {
            return Ok(self.reject(ProcessCode::Old));
        }
        if self.result.verified != SignatureVerification::Valid {
            if !validate_message(&block.account, &hash, &block.signature) {
                return Ok(self.reject(ProcessCode::BadSignature));
            }
        }
        self.result.verified = SignatureVerification::Valid;
        if !store
            .blocks()
            .source_exists(&block.source, &*self.db_transaction)?
        {
            return Ok(self.reject(ProcessCode::GapSource));
        }
        if ledger
            .account_state(&*self.db_transaction, &block.account)?
            .is_some()
        {
            return Ok(self.reject(ProcessCode::Fork));
        }
        let key = PendingKey::new(block.account, block.source);
        let Some(pending) = store.pending().get(&key, &*self.db_transaction)? else {
            return Ok(self.reject(ProcessCode::Unreceivable));
        };
        if block.account == ledger.constants().burn_account {
            return Ok(self.reject(ProcessCode::OpenedBurnAccount));
        }
        if pending.epoch != Epoch::Epoch0 {
            // A state-era send cannot be pocketed by a legacy open.
            return Ok(self.reject(ProcessCode::Unreceivable));
        }

        store.pending().del(&key, self.db_transaction)?;
        let sideband =
            BlockSideband::new(block.account, pending.amount, 1, seconds_since_epoch());
        store.blocks().put(
            &hash,
            &Block::Open(block.clone()),
            &sideband,
            Epoch::Epoch0,
            self.db_transaction,
        )?;
        let new_info = AccountInfo::new(hash, block.representative, hash);
        ledger.change_latest(
            self.db_transaction,
            &block.account,
            None,
            &new_info,
            Epoch::Epoch0,
        )?;
        ledger
            .rep_weights()
            .representation_add(block.representative, pending.amount);
        store
            .frontiers()
            .put(&hash, &block.account, self.db_transaction)?;

        self.result.account = block.account;
        self.result.amount = pending.amount;
        tracing::trace!(%hash, account = %block.account, amount = pending.amount, "applied open block");
        Ok(())
    }

    fn change_block(&mut self, block: &ChangeBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let hash = block.hash();

        if store.blocks().exists(&hash, &*self.db_transaction)? {
            return Ok(self.reject(ProcessCode::Old));
        }
        let Some((previous, _)) = store.blocks().get(&block.previous, &*self.db_transaction)?
        else {
            return Ok(self.reject(ProcessCode::GapPrevious));
        };
        if !ChangeBlock::valid_predecessor(previous.block_type()) {
            return Ok(self.reject(ProcessCode::BlockPosition));
        }
        let Some(account) = store.frontiers().get(&block.previous, &*self.db_transaction)? else {
            return Ok(self.reject(ProcessCode::Fork));
        };
        if self.result.verified != SignatureVerification::Valid {
            if !validate_message(&account, &hash, &block.signature) {
                return Ok(self.reject(ProcessCode::BadSignature));
            }
        }
        self.result.verified = SignatureVerification::Valid;

        let state = ledger
            .account_state(&*self.db_transaction, &account)?
            .ok_or(Error::Corruption("frontier names an account with no record"))?;
        debug_assert_eq!(state.head(), block.previous);
        let balance = state.balance();
        let sideband = BlockSideband::new(
            account,
            balance,
            state.block_count() + 1,
            seconds_since_epoch(),
        );
        store.blocks().put(
            &hash,
            &Block::Change(block.clone()),
            &sideband,
            Epoch::Epoch0,
            self.db_transaction,
        )?;
        ledger
            .rep_weights()
            .representation_add(block.representative, balance);
        ledger
            .rep_weights()
            .representation_add(state.representative(), balance.wrapping_neg());
        let new_info = AccountInfo::new(hash, block.representative, state.open_block());
        ledger.change_latest(
            self.db_transaction,
            &account,
            Some(&state),
            &new_info,
            Epoch::Epoch0,
        )?;
        store
            .frontiers()
            .del(&block.previous, self.db_transaction)?;
        store
            .frontiers()
            .put(&hash, &account, self.db_transaction)?;

        self.result.account = account;
        self.result.amount = 0;
        tracing::trace!(%hash, %account, representative = %block.representative, "applied change block");
        Ok(())
    }

    /// State dispatch: decide between an ordinary state block and an
    /// epoch upgrade block.
    ///
    /// A block carrying an epoch link is an upgrade only if it leaves
    /// the balance unchanged; otherwise it is an ordinary send whose
    /// destination happens to be the epoch link. When the previous
    /// block is missing and the caller gave no verdict, the signature
    /// is pre-decided here (chain owner vs. epoch signer) so no later
    /// check recomputes it.
    fn state_block(&mut self, block: &StateBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let mut is_epoch_block = false;
        if ledger.is_epoch_link(&block.link) {
            let mut prev_balance = 0;
            if !block.previous.is_zero() {
                if store.blocks().exists(&block.previous, &*self.db_transaction)? {
                    prev_balance = ledger.balance(&*self.db_transaction, &block.previous)?;
                } else {
                    self.reject(ProcessCode::GapPrevious);
                    if self.result.verified == SignatureVerification::Unknown {
                        let hash = block.hash();
                        if validate_message(&block.account, &hash, &block.signature) {
                            self.result.verified = SignatureVerification::Valid;
                        } else {
                            let signer = ledger
                                .epoch_signer(&block.link)
                                .ok_or(Error::Corruption("epoch link without a signer"))?;
                            if validate_message(&signer, &hash, &block.signature) {
                                self.result.verified = SignatureVerification::ValidEpoch;
                            } else {
                                self.result.verified = SignatureVerification::Invalid;
                                self.reject(ProcessCode::BadSignature);
                            }
                        }
                    }
                }
            }
            if block.balance == prev_balance {
                is_epoch_block = true;
            }
        }
        if self.result.code == ProcessCode::Progress {
            if is_epoch_block {
                self.epoch_block_impl(block)?;
            } else {
                self.state_block_impl(block)?;
            }
        }
        Ok(())
    }

    fn state_block_impl(&mut self, block: &StateBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let hash = block.hash();

        if store.blocks().exists(&hash, &*self.db_transaction)? {
            return Ok(self.reject(ProcessCode::Old));
        }
        if self.result.verified != SignatureVerification::Valid {
            if !validate_message(&block.account, &hash, &block.signature) {
                return Ok(self.reject(ProcessCode::BadSignature));
            }
        }
        self.result.verified = SignatureVerification::Valid;
        if block.account.is_zero() {
            return Ok(self.reject(ProcessCode::OpenedBurnAccount));
        }

        let state = ledger.account_state(&*self.db_transaction, &block.account)?;
        let mut epoch = Epoch::Epoch0;
        let mut is_send = false;
        self.result.amount = block.balance;
        if let Some(state) = &state {
            epoch = state.epoch();
            // The account already has a chain.
            if block.previous.is_zero() {
                return Ok(self.reject(ProcessCode::Fork));
            }
            if !store.blocks().exists(&block.previous, &*self.db_transaction)? {
                return Ok(self.reject(ProcessCode::GapPrevious));
            }
            is_send = block.balance < state.balance();
            self.result.amount = block.balance.abs_diff(state.balance());
            if block.previous != state.head() {
                return Ok(self.reject(ProcessCode::Fork));
            }
        } else {
            // First block of the account.
            if !block.previous.is_zero() {
                return Ok(self.reject(ProcessCode::GapPrevious));
            }
            if block.link.is_zero() {
                return Ok(self.reject(ProcessCode::GapSource));
            }
        }
        if !is_send {
            if !block.link.is_zero() {
                if !store
                    .blocks()
                    .source_exists(&block.link, &*self.db_transaction)?
                {
                    return Ok(self.reject(ProcessCode::GapSource));
                }
                let key = PendingKey::new(block.account, block.link);
                let Some(pending) = store.pending().get(&key, &*self.db_transaction)? else {
                    return Ok(self.reject(ProcessCode::Unreceivable));
                };
                if self.result.amount != pending.amount {
                    return Ok(self.reject(ProcessCode::BalanceMismatch));
                }
                epoch = epoch.max(pending.epoch);
            } else {
                // No link: only the representative may change.
                if self.result.amount != 0 {
                    return Ok(self.reject(ProcessCode::BalanceMismatch));
                }
            }
        }

        self.result.state_is_send = is_send;
        let height = state.as_ref().map(|s| s.block_count()).unwrap_or(0) + 1;
        let sideband =
            BlockSideband::new(block.account, block.balance, height, seconds_since_epoch());
        store.blocks().put(
            &hash,
            &Block::State(block.clone()),
            &sideband,
            epoch,
            self.db_transaction,
        )?;
        if let Some(state) = &state {
            if !state.representative().is_zero() {
                // Move the existing representation off the old head.
                ledger
                    .rep_weights()
                    .representation_add(state.representative(), state.balance().wrapping_neg());
            }
        }
        ledger
            .rep_weights()
            .representation_add(block.representative, block.balance);
        if is_send {
            store.pending().put(
                &PendingKey::new(Account::from(block.link), hash),
                &PendingInfo::new(block.account, self.result.amount, epoch),
                self.db_transaction,
            )?;
        } else if !block.link.is_zero() {
            store.pending().del(
                &PendingKey::new(block.account, block.link),
                self.db_transaction,
            )?;
        }
        let open_block = state.as_ref().map(|s| s.open_block()).unwrap_or(hash);
        let new_info = AccountInfo::new(hash, block.representative, open_block);
        ledger.change_latest(
            self.db_transaction,
            &block.account,
            state.as_ref(),
            &new_info,
            epoch,
        )?;
        // State heads keep no frontier row; drop the one the previous
        // legacy head may have held.
        if let Some(state) = &state {
            if store
                .frontiers()
                .get(&state.head(), &*self.db_transaction)?
                .is_some()
            {
                store.frontiers().del(&state.head(), self.db_transaction)?;
            }
        }

        self.result.account = block.account;
        tracing::trace!(%hash, account = %block.account, is_send, "applied state block");
        Ok(())
    }

    fn epoch_block_impl(&mut self, block: &StateBlock) -> Result<(), Error> {
        let ledger = self.ledger;
        let store = ledger.store();
        let hash = block.hash();

        if store.blocks().exists(&hash, &*self.db_transaction)? {
            return Ok(self.reject(ProcessCode::Old));
        }
        let signer = ledger
            .epoch_signer(&block.link)
            .ok_or(Error::Corruption("epoch link without a signer"))?;
        if self.result.verified != SignatureVerification::ValidEpoch {
            if !validate_message(&signer, &hash, &block.signature) {
                return Ok(self.reject(ProcessCode::BadSignature));
            }
        }
        self.result.verified = SignatureVerification::ValidEpoch;
        if block.account.is_zero() {
            return Ok(self.reject(ProcessCode::OpenedBurnAccount));
        }

        let state = ledger.account_state(&*self.db_transaction, &block.account)?;
        if let Some(state) = &state {
            if block.previous.is_zero() {
                return Ok(self.reject(ProcessCode::Fork));
            }
            if block.previous != state.head() {
                return Ok(self.reject(ProcessCode::Fork));
            }
            if block.representative != state.representative() {
                return Ok(self.reject(ProcessCode::RepresentativeMismatch));
            }
        } else {
            // An upgrade may open an account, but carries no funds and
            // thus no representative.
            if !block.representative.is_zero() {
                return Ok(self.reject(ProcessCode::RepresentativeMismatch));
            }
            if !block.previous.is_zero() {
                return Ok(self.reject(ProcessCode::GapPrevious));
            }
        }
        let current_epoch = state.as_ref().map(|s| s.epoch()).unwrap_or(Epoch::Epoch0);
        let link_epoch = ledger
            .constants()
            .epochs
            .epoch(&block.link)
            .ok_or(Error::Corruption("epoch link without an epoch"))?;
        if current_epoch >= link_epoch {
            return Ok(self.reject(ProcessCode::BlockPosition));
        }
        let current_balance = state.as_ref().map(|s| s.balance()).unwrap_or(0);
        if block.balance != current_balance {
            return Ok(self.reject(ProcessCode::BalanceMismatch));
        }

        let height = state.as_ref().map(|s| s.block_count()).unwrap_or(0) + 1;
        let sideband =
            BlockSideband::new(block.account, block.balance, height, seconds_since_epoch());
        store.blocks().put(
            &hash,
            &Block::State(block.clone()),
            &sideband,
            link_epoch,
            self.db_transaction,
        )?;
        let open_block = state.as_ref().map(|s| s.open_block()).unwrap_or(hash);
        let new_info = AccountInfo::new(hash, block.representative, open_block);
        ledger.change_latest(
            self.db_transaction,
            &block.account,
            state.as_ref(),
            &new_info,
            link_epoch,
        )?;
        if let Some(state) = &state {
            if store
                .frontiers()
                .get(&state.head(), &*self.db_transaction)?
                .is_some()
            {
                store.frontiers().del(&state.head(), self.db_transaction)?;
            }
        }

        self.result.account = block.account;
        self.result.amount = 0;
        tracing::trace!(%hash, account = %block.account, epoch = ?link_epoch, "applied epoch block");
        Ok(())
    }
}
