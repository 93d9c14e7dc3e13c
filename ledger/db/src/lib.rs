// Copyright (c) 2024 Botho Foundation

//! LMDB-backed block-lattice ledger.
//!
//! The ledger decides whether a candidate block is admissible and, if it
//! is, updates every derived index atomically under a caller-supplied
//! write transaction: the block table and its sidebands, the
//! epoch-partitioned account and pending tables, the legacy frontier
//! table, confirmation heights and the in-memory representative weights.
//! Rollback inverts the same mutations one head block at a time.
//!
//! Storage is one LMDB environment with named tables, each owned by a
//! small sub-store. Reads are generic over any [`lmdb::Transaction`];
//! mutations take `&mut lmdb::RwTransaction` and become visible only
//! when the caller commits. LMDB's single-writer model provides the
//! serializable semantics the validator relies on.

mod account_state;
mod account_store;
mod block_store;
mod confirmation_height_store;
mod constants;
mod frontier_store;
mod ledger;
mod pending_store;
mod process_result;
mod processor;
mod rep_weights;
mod rollback;

use std::{
    fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use displaydoc::Display;
use lmdb::Environment;

use lattice_core_types::{Account, BlockHash};

pub use crate::{
    account_state::AccountState,
    account_store::AccountStore,
    block_store::BlockStore,
    confirmation_height_store::ConfirmationHeightStore,
    constants::LedgerConstants,
    frontier_store::FrontierStore,
    ledger::{Ledger, LedgerOptions},
    pending_store::PendingStore,
    process_result::{ProcessCode, ProcessResult, SignatureVerification},
    rep_weights::RepWeights,
};

/// Maximum size of the LMDB memory map. The file grows sparsely; this
/// only bounds it.
const MAX_DB_FILE_SIZE: usize = 1024 * 1024 * 1024;

/// Number of named tables the environment must accommodate.
const MAX_DATABASES: u32 = 16;

/// Ledger storage errors.
///
/// Block admissibility is not an error: `process` reports it through
/// [`ProcessCode`]. These are the failures of the store itself, plus
/// invariant violations that indicate data corruption.
#[derive(Debug, Display)]
pub enum Error {
    /// LMDB error: {0}
    Lmdb(lmdb::Error),
    /// Value encoding error: {0}
    Serialization(bincode::Error),
    /// Filesystem error: {0}
    Io(std::io::Error),
    /// Block not found: {0}
    BlockNotFound(BlockHash),
    /// Account not found: {0}
    AccountNotFound(Account),
    /// Rollback reached the confirmation height of account {0}
    RollbackConfirmed(Account),
    /// Store invariant violated: {0}
    Corruption(&'static str),
}

impl From<lmdb::Error> for Error {
    fn from(err: lmdb::Error) -> Self {
        Self::Lmdb(err)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl std::error::Error for Error {}

/// Encode a u64 as big-endian table key/counter bytes.
pub fn u64_to_key_bytes(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decode big-endian table key/counter bytes to a u64.
pub fn key_bytes_to_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8]))
}

/// Seconds since the Unix epoch, for sideband timestamps.
pub(crate) fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Handle to the ledger's LMDB environment and its tables.
pub struct LedgerDb {
    env: Environment,
    blocks: BlockStore,
    accounts: AccountStore,
    pending: PendingStore,
    frontiers: FrontierStore,
    confirmation_heights: ConfirmationHeightStore,
}

impl LedgerDb {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        fs::create_dir_all(path)?;

        let env = Environment::new()
            .set_max_dbs(MAX_DATABASES)
            .set_map_size(MAX_DB_FILE_SIZE)
            .open(path)?;

        let blocks = BlockStore::new(&env)?;
        let accounts = AccountStore::new(&env)?;
        let pending = PendingStore::new(&env)?;
        let frontiers = FrontierStore::new(&env)?;
        let confirmation_heights = ConfirmationHeightStore::new(&env)?;

        tracing::debug!(path = %path.display(), "opened ledger database");

        Ok(Self {
            env,
            blocks,
            accounts,
            pending,
            frontiers,
            confirmation_heights,
        })
    }

    /// Begin a read transaction. Readers run concurrently with the
    /// writer.
    pub fn tx_begin_read(&self) -> Result<lmdb::RoTransaction<'_>, Error> {
        Ok(self.env.begin_ro_txn()?)
    }

    /// Begin the write transaction. The store admits one writer at a
    /// time; the caller commits or aborts.
    pub fn tx_begin_write(&self) -> Result<lmdb::RwTransaction<'_>, Error> {
        Ok(self.env.begin_rw_txn()?)
    }

    /// The block table.
    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    /// The epoch-partitioned account tables.
    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    /// The epoch-partitioned pending tables.
    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// The legacy frontier table.
    pub fn frontiers(&self) -> &FrontierStore {
        &self.frontiers
    }

    /// The confirmation height table.
    pub fn confirmation_heights(&self) -> &ConfirmationHeightStore {
        &self.confirmation_heights
    }
}
