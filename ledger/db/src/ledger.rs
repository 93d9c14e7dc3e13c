// Copyright (c) 2024 Botho Foundation

//! The ledger facade: block processing, rollback and queries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use lmdb::{RwTransaction, Transaction};

use lattice_blockchain_types::{
    AccountInfo, Block, BlockSideband, QualifiedRoot, StateBlock,
};
use lattice_core_types::{Account, Amount, BlockHash, Epoch};

use crate::{
    processor::LedgerProcessor, seconds_since_epoch, AccountState, Error, LedgerConstants,
    LedgerDb, ProcessResult, RepWeights, SignatureVerification,
};

/// Construction-time cache options.
#[derive(Clone, Copy, Debug)]
pub struct LedgerOptions {
    /// Warm the representative weights by scanning the account tables.
    pub cache_reps: bool,
    /// Sum the confirmation heights into the cemented-count cache.
    pub cache_cemented_count: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            cache_reps: true,
            cache_cemented_count: true,
        }
    }
}

/// The ledger: coordinates the block validator and rollbacker over the
/// store, owns the representative-weight cache and answers queries.
///
/// Re-entrant but not internally concurrent; the store admits a single
/// writer at a time and every mutation happens under the caller's write
/// transaction. Nothing commits implicitly.
pub struct Ledger {
    db: LedgerDb,
    constants: LedgerConstants,
    rep_weights: RepWeights,
    cemented_count: AtomicU64,
    check_bootstrap_weights: AtomicBool,
}

impl Ledger {
    /// Wrap a store, seeding the genesis chain on first open and
    /// warming the requested caches.
    pub fn new(
        db: LedgerDb,
        constants: LedgerConstants,
        options: LedgerOptions,
    ) -> Result<Self, Error> {
        let needs_genesis = {
            let db_transaction = db.tx_begin_read()?;
            !db.accounts()
                .exists(&constants.genesis_account, &db_transaction)?
        };
        if needs_genesis {
            let mut db_transaction = db.tx_begin_write()?;
            let hash = constants.genesis_hash();
            let block = Block::Open(constants.genesis_block.clone());
            let sideband = BlockSideband::new(
                constants.genesis_account,
                constants.genesis_amount,
                1,
                seconds_since_epoch(),
            );
            db.blocks()
                .put(&hash, &block, &sideband, Epoch::Epoch0, &mut db_transaction)?;
            db.accounts().put(
                &constants.genesis_account,
                &AccountInfo::new(hash, constants.genesis_block.representative, hash),
                Epoch::Epoch0,
                &mut db_transaction,
            )?;
            db.frontiers()
                .put(&hash, &constants.genesis_account, &mut db_transaction)?;
            db.confirmation_heights()
                .put(&constants.genesis_account, 1, &mut db_transaction)?;
            db_transaction.commit()?;
            tracing::info!(genesis = %hash, "initialized ledger with genesis block");
        }

        let ledger = Self {
            db,
            constants,
            rep_weights: RepWeights::default(),
            cemented_count: AtomicU64::new(0),
            check_bootstrap_weights: AtomicBool::new(true),
        };

        let db_transaction = ledger.db.tx_begin_read()?;
        if options.cache_reps {
            for (_, info, _) in ledger.db.accounts().iter_all(&db_transaction)? {
                let balance = ledger
                    .db
                    .blocks()
                    .balance(&info.head, &db_transaction)?
                    .ok_or(Error::Corruption("account head missing from block table"))?;
                ledger
                    .rep_weights
                    .representation_add(info.representative, balance);
            }
        }
        if options.cache_cemented_count {
            let total = ledger
                .db
                .confirmation_heights()
                .iter_all(&db_transaction)?
                .iter()
                .map(|(_, height)| *height)
                .sum();
            ledger.cemented_count.store(total, Ordering::Relaxed);
        }
        drop(db_transaction);

        Ok(ledger)
    }

    /// The underlying store.
    pub fn store(&self) -> &LedgerDb {
        &self.db
    }

    /// The network constants.
    pub fn constants(&self) -> &LedgerConstants {
        &self.constants
    }

    /// The representative-weight cache.
    pub fn rep_weights(&self) -> &RepWeights {
        &self.rep_weights
    }

    /// Sum of all confirmation heights, as cached at construction.
    pub fn cemented_count(&self) -> u64 {
        self.cemented_count.load(Ordering::Relaxed)
    }

    /// Validate a candidate block and, when admissible, apply all of
    /// its mutations under `db_transaction`.
    ///
    /// The caller must have validated the block's work-proof, and
    /// commits or aborts the transaction; a rejected block performs no
    /// mutation. `verification` may carry an out-of-band signature
    /// verdict to skip the redundant check.
    pub fn process(
        &self,
        db_transaction: &mut RwTransaction,
        block: &Block,
        verification: SignatureVerification,
    ) -> Result<ProcessResult, Error> {
        LedgerProcessor::new(self, db_transaction, verification).process(block)
    }

    /// Balance of the account containing `hash`, as of that block.
    ///
    /// The zero sentinel names no block and reads as zero; any other
    /// unknown hash is a caller bug and surfaces as
    /// [`Error::BlockNotFound`] rather than a valid-looking zero.
    pub fn balance<T: Transaction>(
        &self,
        db_transaction: &T,
        hash: &BlockHash,
    ) -> Result<Amount, Error> {
        if hash.is_zero() {
            return Ok(0);
        }
        self.db
            .blocks()
            .balance(hash, db_transaction)?
            .ok_or(Error::BlockNotFound(*hash))
    }

    /// Current balance of an account; zero when the account has no
    /// chain.
    pub fn account_balance<T: Transaction>(
        &self,
        db_transaction: &T,
        account: &Account,
    ) -> Result<Amount, Error> {
        Ok(self
            .account_state(db_transaction, account)?
            .map(|state| state.balance())
            .unwrap_or(0))
    }

    /// Total receivable by an account, summed over both pending tables.
    pub fn account_pending<T: Transaction>(
        &self,
        db_transaction: &T,
        account: &Account,
    ) -> Result<Amount, Error> {
        Ok(self
            .db
            .pending()
            .account_entries(account, db_transaction)?
            .iter()
            .map(|(_, info)| info.amount)
            .sum())
    }

    /// Absolute balance delta a block caused on its chain.
    ///
    /// The genesis open block's `source` is the genesis account itself;
    /// querying that sentinel yields the configured genesis amount.
    pub fn amount<T: Transaction>(
        &self,
        db_transaction: &T,
        hash: &BlockHash,
    ) -> Result<Amount, Error> {
        if *hash == BlockHash::from(self.constants.genesis_account) {
            return Ok(self.constants.genesis_amount);
        }
        let (block, _) = self
            .db
            .blocks()
            .get(hash, db_transaction)?
            .ok_or(Error::BlockNotFound(*hash))?;
        let balance = self.balance(db_transaction, hash)?;
        let previous_balance = self.balance(db_transaction, &block.previous())?;
        Ok(balance.abs_diff(previous_balance))
    }

    /// Head hash of an account's chain.
    pub fn latest<T: Transaction>(
        &self,
        db_transaction: &T,
        account: &Account,
    ) -> Result<Option<BlockHash>, Error> {
        Ok(self
            .db
            .accounts()
            .get(account, db_transaction)?
            .map(|(info, _)| info.head))
    }

    /// Head hash of an account's chain, or the account itself as the
    /// root when the account has no chain yet.
    pub fn latest_root<T: Transaction>(
        &self,
        db_transaction: &T,
        account: &Account,
    ) -> Result<BlockHash, Error> {
        Ok(self
            .latest(db_transaction, account)?
            .unwrap_or_else(|| BlockHash::from(*account)))
    }

    /// The account owning `hash`.
    pub fn account<T: Transaction>(
        &self,
        db_transaction: &T,
        hash: &BlockHash,
    ) -> Result<Option<Account>, Error> {
        self.db.blocks().account(hash, db_transaction)
    }

    /// Whether a state block acts as a send.
    ///
    /// A first block is never a send; otherwise the block's `previous`
    /// must be stored, and an unknown `previous` is an error.
    pub fn is_send<T: Transaction>(
        &self,
        db_transaction: &T,
        block: &StateBlock,
    ) -> Result<bool, Error> {
        if block.previous.is_zero() {
            return Ok(false);
        }
        Ok(block.balance < self.balance(db_transaction, &block.previous)?)
    }

    /// The destination account of a send, or zero for non-sends.
    pub fn block_destination<T: Transaction>(
        &self,
        db_transaction: &T,
        block: &Block,
    ) -> Result<Account, Error> {
        match block {
            Block::Send(send) => Ok(send.destination),
            Block::State(state) => {
                if self.is_send(db_transaction, state)? {
                    Ok(Account::from(state.link))
                } else {
                    Ok(Account::ZERO)
                }
            }
            _ => Ok(Account::ZERO),
        }
    }

    /// The source hash of a receive, or zero for non-receives.
    pub fn block_source<T: Transaction>(
        &self,
        db_transaction: &T,
        block: &Block,
    ) -> Result<BlockHash, Error> {
        match block {
            Block::State(state) => {
                if self.is_send(db_transaction, state)? {
                    Ok(BlockHash::ZERO)
                } else {
                    Ok(state.link)
                }
            }
            _ => Ok(block.source()),
        }
    }

    /// Hash of the nearest block at or before `hash` on its chain that
    /// carries an explicit representative.
    pub fn representative_block<T: Transaction>(
        &self,
        db_transaction: &T,
        hash: &BlockHash,
    ) -> Result<BlockHash, Error> {
        let mut current = *hash;
        loop {
            let (block, _) = self
                .db
                .blocks()
                .get(&current, db_transaction)?
                .ok_or(Error::BlockNotFound(current))?;
            match block {
                Block::Send(_) | Block::Receive(_) => current = block.previous(),
                Block::Open(_) | Block::Change(_) | Block::State(_) => return Ok(current),
            }
        }
    }

    /// Voting weight of an account.
    ///
    /// While the local block count is below the bootstrap cutoff, a
    /// static bootstrap table answers instead of the live cache; the
    /// check disarms permanently once the cutoff is passed.
    pub fn weight<T: Transaction>(
        &self,
        db_transaction: &T,
        account: &Account,
    ) -> Result<Amount, Error> {
        if self.check_bootstrap_weights.load(Ordering::Relaxed) {
            let blocks = self.db.blocks().count(db_transaction)?;
            if blocks < self.constants.bootstrap_weight_max_blocks {
                if let Some(weight) = self.constants.bootstrap_weights.get(account) {
                    return Ok(*weight);
                }
            } else {
                self.check_bootstrap_weights.store(false, Ordering::Relaxed);
            }
        }
        Ok(self.rep_weights.representation_get(account))
    }

    /// The next block at a root: the successor on chain, or the open
    /// block when the root is an account with a chain.
    pub fn successor<T: Transaction>(
        &self,
        db_transaction: &T,
        root: &QualifiedRoot,
    ) -> Result<Option<Block>, Error> {
        let successor = if root.previous.is_zero() {
            match self
                .db
                .accounts()
                .get(&Account::from(root.root), db_transaction)?
            {
                Some((info, _)) => Some(info.open_block),
                None => None,
            }
        } else {
            self.db.blocks().successor(&root.previous, db_transaction)?
        };
        match successor {
            Some(hash) => Ok(Some(
                self.db
                    .blocks()
                    .get(&hash, db_transaction)?
                    .ok_or(Error::Corruption("successor points at a missing block"))?
                    .0,
            )),
            None => Ok(None),
        }
    }

    /// For a non-present block whose root collides with an existing
    /// chain: the block already occupying that slot.
    pub fn forked_block<T: Transaction>(
        &self,
        db_transaction: &T,
        block: &Block,
    ) -> Result<Block, Error> {
        let root = block.root();
        if let Some(successor_hash) = self.db.blocks().successor(&root, db_transaction)? {
            if let Some((existing, _)) = self.db.blocks().get(&successor_hash, db_transaction)? {
                return Ok(existing);
            }
        }
        let (info, _) = self
            .db
            .accounts()
            .get(&Account::from(root), db_transaction)?
            .ok_or(Error::AccountNotFound(Account::from(root)))?;
        let (open, _) = self
            .db
            .blocks()
            .get(&info.open_block, db_transaction)?
            .ok_or(Error::Corruption("open block missing from block table"))?;
        Ok(open)
    }

    /// Whether every block `block` references is already present.
    pub fn could_fit<T: Transaction>(
        &self,
        db_transaction: &T,
        block: &Block,
    ) -> Result<bool, Error> {
        let blocks = self.db.blocks();
        match block {
            Block::Send(_) | Block::Change(_) => {
                blocks.exists(&block.previous(), db_transaction)
            }
            Block::Receive(receive) => Ok(blocks.exists(&receive.previous, db_transaction)?
                && blocks.exists(&receive.source, db_transaction)?),
            Block::Open(open) => blocks.exists(&open.source, db_transaction),
            Block::State(state) => {
                let previous_fits =
                    state.previous.is_zero() || blocks.exists(&state.previous, db_transaction)?;
                if !previous_fits {
                    return Ok(false);
                }
                if self.is_send(db_transaction, state)? {
                    return Ok(true);
                }
                Ok(state.link.is_zero()
                    || self.is_epoch_link(&state.link)
                    || blocks.exists(&state.link, db_transaction)?)
            }
        }
    }

    /// Whether a block is at or below its account's confirmation
    /// height.
    pub fn block_confirmed<T: Transaction>(
        &self,
        db_transaction: &T,
        hash: &BlockHash,
    ) -> Result<bool, Error> {
        let height = self.db.blocks().account_height(hash, db_transaction)?;
        if height == 0 {
            // The block is not stored at all.
            return Ok(false);
        }
        let account = self
            .account(db_transaction, hash)?
            .ok_or(Error::Corruption("stored block lacks a sideband account"))?;
        let confirmation_height = self
            .db
            .confirmation_heights()
            .get(&account, db_transaction)?
            .ok_or(Error::Corruption("account lacks a confirmation height"))?;
        Ok(confirmation_height >= height)
    }

    /// Whether a block is absent, or present but not yet confirmed.
    pub fn block_not_confirmed_or_not_exists(&self, block: &Block) -> Result<bool, Error> {
        let db_transaction = self.db.tx_begin_read()?;
        let hash = block.hash();
        if self.db.blocks().exists(&hash, &db_transaction)? {
            Ok(!self.block_confirmed(&db_transaction, &hash)?)
        } else {
            Ok(true)
        }
    }

    /// Whether a block is stored, under a fresh read transaction.
    pub fn block_exists(&self, hash: &BlockHash) -> Result<bool, Error> {
        let db_transaction = self.db.tx_begin_read()?;
        self.db.blocks().exists(hash, &db_transaction)
    }

    /// Total stored blocks, under a fresh read transaction.
    pub fn block_count(&self) -> Result<u64, Error> {
        let db_transaction = self.db.tx_begin_read()?;
        self.db.blocks().count(&db_transaction)
    }

    /// Whether `link` marks an epoch upgrade block.
    pub fn is_epoch_link(&self, link: &BlockHash) -> bool {
        self.constants.epochs.is_epoch_link(link)
    }

    /// The pinned signer for the epoch `link` implies.
    pub fn epoch_signer(&self, link: &BlockHash) -> Option<Account> {
        let epoch = self.constants.epochs.epoch(link)?;
        self.constants.epochs.signer(epoch).copied()
    }

    /// The account's current state view, if it has a chain.
    pub fn account_state<T: Transaction>(
        &self,
        db_transaction: &T,
        account: &Account,
    ) -> Result<Option<AccountState>, Error> {
        AccountState::load(&self.db, account, db_transaction)
    }

    /// Move an account's record to `new_info` at `new_epoch`.
    ///
    /// Initializes the confirmation height when a chain is first
    /// opened, migrates the record across epoch tables (delete before
    /// put, so no ghost row survives in the old table), and clears
    /// record and confirmation height when the head is zeroed.
    pub(crate) fn change_latest(
        &self,
        db_transaction: &mut RwTransaction,
        account: &Account,
        old: Option<&AccountState>,
        new_info: &AccountInfo,
        new_epoch: Epoch,
    ) -> Result<(), Error> {
        if !new_info.head.is_zero() {
            if old.is_none() && new_info.open_block == new_info.head {
                debug_assert!(!self
                    .db
                    .confirmation_heights()
                    .exists(account, db_transaction)?);
                self.db
                    .confirmation_heights()
                    .put(account, 0, db_transaction)?;
            }
            if let Some(old) = old {
                if old.epoch() != new_epoch {
                    self.db.accounts().del(account, db_transaction)?;
                }
            }
            self.db
                .accounts()
                .put(account, new_info, new_epoch, db_transaction)?;
        } else {
            self.db.confirmation_heights().del(account, db_transaction)?;
            self.db.accounts().del(account, db_transaction)?;
        }
        Ok(())
    }
}
