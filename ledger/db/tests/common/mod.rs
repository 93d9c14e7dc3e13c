// Copyright (c) 2024 Botho Foundation

//! Shared fixtures for ledger integration tests: a deterministic
//! network, a temp-dir LMDB environment and single-block transaction
//! helpers.

#![allow(dead_code)]

use std::collections::HashMap;

use lattice_blockchain_types::{Block, OpenBlock, PendingInfo, PendingKey};
use lattice_core_types::{
    Account, AccountKeypair, Amount, BlockHash, Epoch, Epochs,
};
use lattice_ledger_db::{
    Error, Ledger, LedgerConstants, LedgerDb, LedgerOptions, ProcessCode, ProcessResult,
    SignatureVerification,
};
use lmdb::Transaction;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::TempDir;

/// The entire supply, credited to the genesis account.
pub const GENESIS_AMOUNT: Amount = u128::MAX;

/// The well-known epoch-1 upgrade link.
pub const EPOCH1_LINK: BlockHash = BlockHash([0xee; 32]);

pub struct TestLedger {
    pub ledger: Ledger,
    pub genesis: AccountKeypair,
    pub epoch_signer: AccountKeypair,
    _temp_dir: TempDir,
}

pub fn test_rng(seed: u8) -> StdRng {
    SeedableRng::from_seed([seed; 32])
}

pub fn keypair(rng: &mut StdRng) -> AccountKeypair {
    AccountKeypair::from_seed(rng.gen())
}

/// A ledger over a fresh temp-dir store, seeded with a deterministic
/// genesis chain and one registered epoch upgrade.
pub fn open_test_ledger(rng: &mut StdRng) -> TestLedger {
    open_test_ledger_with(rng, |_| {})
}

/// Same, but lets the caller adjust the constants before the ledger is
/// built (bootstrap weights, cutoffs).
pub fn open_test_ledger_with(
    rng: &mut StdRng,
    adjust: impl FnOnce(&mut LedgerConstants),
) -> TestLedger {
    let genesis = keypair(rng);
    let epoch_signer = keypair(rng);
    let genesis_account = genesis.account();
    // The genesis open block's source is the genesis account itself, a
    // sentinel no real send carries.
    let genesis_block = OpenBlock::new(
        BlockHash::from(genesis_account),
        genesis_account,
        genesis_account,
        &genesis,
    );
    let mut epochs = Epochs::new();
    epochs.add(Epoch::Epoch1, epoch_signer.account(), EPOCH1_LINK);

    let mut constants = LedgerConstants {
        genesis_account,
        genesis_block,
        genesis_amount: GENESIS_AMOUNT,
        burn_account: Account::ZERO,
        epochs,
        bootstrap_weights: HashMap::new(),
        bootstrap_weight_max_blocks: 0,
    };
    adjust(&mut constants);

    let temp_dir = TempDir::new().unwrap();
    let db = LedgerDb::open(temp_dir.path()).unwrap();
    let ledger = Ledger::new(db, constants, LedgerOptions::default()).unwrap();
    TestLedger {
        ledger,
        genesis,
        epoch_signer,
        _temp_dir: temp_dir,
    }
}

impl TestLedger {
    pub fn genesis_account(&self) -> Account {
        self.ledger.constants().genesis_account
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.ledger.constants().genesis_hash()
    }

    /// Process one block in its own committed write transaction.
    pub fn process(&self, block: &Block) -> ProcessCode {
        self.process_full(block, SignatureVerification::Unknown).code
    }

    /// Process one block with an explicit verification hint.
    pub fn process_full(
        &self,
        block: &Block,
        verification: SignatureVerification,
    ) -> ProcessResult {
        let mut db_transaction = self.ledger.store().tx_begin_write().unwrap();
        let result = self
            .ledger
            .process(&mut db_transaction, block, verification)
            .unwrap();
        db_transaction.commit().unwrap();
        result
    }

    /// Roll back one target in its own write transaction, committing on
    /// success and aborting on failure.
    pub fn rollback(&self, hash: &BlockHash) -> Result<Vec<Block>, Error> {
        let mut db_transaction = self.ledger.store().tx_begin_write().unwrap();
        match self.ledger.rollback(&mut db_transaction, hash) {
            Ok(rolled_back) => {
                db_transaction.commit().unwrap();
                Ok(rolled_back)
            }
            Err(e) => {
                drop(db_transaction);
                Err(e)
            }
        }
    }

    pub fn account_balance(&self, account: &Account) -> Amount {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        self.ledger
            .account_balance(&db_transaction, account)
            .unwrap()
    }

    pub fn weight(&self, account: &Account) -> Amount {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        self.ledger.weight(&db_transaction, account).unwrap()
    }

    pub fn latest(&self, account: &Account) -> Option<BlockHash> {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        self.ledger.latest(&db_transaction, account).unwrap()
    }

    pub fn pending(&self, key: &PendingKey) -> Option<PendingInfo> {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        self.ledger
            .store()
            .pending()
            .get(key, &db_transaction)
            .unwrap()
    }

    pub fn frontier(&self, hash: &BlockHash) -> Option<Account> {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        self.ledger
            .store()
            .frontiers()
            .get(hash, &db_transaction)
            .unwrap()
    }

    pub fn account_epoch(&self, account: &Account) -> Option<Epoch> {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        self.ledger
            .store()
            .accounts()
            .get(account, &db_transaction)
            .unwrap()
            .map(|(_, epoch)| epoch)
    }

    /// Sum of every account's head balance.
    pub fn total_balances(&self) -> Amount {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        let mut total = 0u128;
        for (_, info, _) in self
            .ledger
            .store()
            .accounts()
            .iter_all(&db_transaction)
            .unwrap()
        {
            total += self
                .ledger
                .store()
                .blocks()
                .balance(&info.head, &db_transaction)
                .unwrap()
                .expect("account head must be stored");
        }
        total
    }

    /// Sum of every pending entry destined for the given accounts.
    pub fn total_pending(&self, accounts: &[Account]) -> Amount {
        let db_transaction = self.ledger.store().tx_begin_read().unwrap();
        accounts
            .iter()
            .map(|account| {
                self.ledger
                    .account_pending(&db_transaction, account)
                    .unwrap()
            })
            .sum()
    }

    /// Sum of all representative weights.
    pub fn total_weights(&self) -> Amount {
        self.ledger
            .rep_weights()
            .snapshot()
            .values()
            .fold(0u128, |total, weight| total + weight)
    }

    /// Assert the conservation invariants: head balances plus pending
    /// equal the issued supply, and representative weight tracks head
    /// balances exactly.
    pub fn assert_conserved(&self, pending_accounts: &[Account]) {
        let balances = self.total_balances();
        let pending = self.total_pending(pending_accounts);
        assert_eq!(balances + pending, GENESIS_AMOUNT);
        assert_eq!(self.total_weights(), balances);
    }
}
