// Copyright (c) 2024 Botho Foundation

//! Data access abstraction for account records, partitioned by epoch.
//!
//! An account lives in exactly one of the two tables; which one encodes
//! the account's epoch. Moving an account to a new epoch is an explicit
//! delete-then-put performed by the ledger, never an upsert, so no ghost
//! row can linger in the old table.

use lmdb::{Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};

use lattice_blockchain_types::AccountInfo;
use lattice_core_types::{Account, Epoch};

use crate::Error;

// LMDB database names.
pub const ACCOUNTS_V0_DB_NAME: &str = "accounts_v0";
pub const ACCOUNTS_V1_DB_NAME: &str = "accounts_v1";

/// Account records keyed by account number.
#[derive(Clone)]
pub struct AccountStore {
    /// `account -> AccountInfo` for epoch-0 accounts.
    accounts_v0: Database,
    /// `account -> AccountInfo` for epoch-1 accounts.
    accounts_v1: Database,
}

impl AccountStore {
    pub(crate) fn new(env: &Environment) -> Result<Self, Error> {
        Ok(Self {
            accounts_v0: env.create_db(Some(ACCOUNTS_V0_DB_NAME), DatabaseFlags::empty())?,
            accounts_v1: env.create_db(Some(ACCOUNTS_V1_DB_NAME), DatabaseFlags::empty())?,
        })
    }

    fn db_for(&self, epoch: Epoch) -> Database {
        match epoch {
            Epoch::Epoch0 => self.accounts_v0,
            Epoch::Epoch1 => self.accounts_v1,
        }
    }

    /// Fetch an account record and the epoch of the table it lives in.
    pub fn get<T: Transaction>(
        &self,
        account: &Account,
        db_transaction: &T,
    ) -> Result<Option<(AccountInfo, Epoch)>, Error> {
        for epoch in [Epoch::Epoch0, Epoch::Epoch1] {
            match db_transaction.get(self.db_for(epoch), account.as_bytes()) {
                Ok(bytes) => return Ok(Some((bincode::deserialize(bytes)?, epoch))),
                Err(lmdb::Error::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Write an account record into the table for `epoch`.
    ///
    /// Does not touch the other table; the ledger deletes the old row
    /// explicitly when an account's epoch advances.
    pub fn put(
        &self,
        account: &Account,
        info: &AccountInfo,
        epoch: Epoch,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        let bytes = bincode::serialize(info)?;
        db_transaction.put(
            self.db_for(epoch),
            account.as_bytes(),
            &bytes,
            WriteFlags::empty(),
        )?;
        Ok(())
    }

    /// Delete an account record from whichever table holds it.
    pub fn del(&self, account: &Account, db_transaction: &mut RwTransaction) -> Result<(), Error> {
        for epoch in [Epoch::Epoch0, Epoch::Epoch1] {
            match db_transaction.del(self.db_for(epoch), account.as_bytes(), None) {
                Ok(()) | Err(lmdb::Error::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Whether the account has a record in either table.
    pub fn exists<T: Transaction>(
        &self,
        account: &Account,
        db_transaction: &T,
    ) -> Result<bool, Error> {
        Ok(self.get(account, db_transaction)?.is_some())
    }

    /// Every account record across both epochs. Used for cache warm-up.
    pub fn iter_all<T: Transaction>(
        &self,
        db_transaction: &T,
    ) -> Result<Vec<(Account, AccountInfo, Epoch)>, Error> {
        let mut records = Vec::new();
        for epoch in [Epoch::Epoch0, Epoch::Epoch1] {
            let mut cursor = db_transaction.open_ro_cursor(self.db_for(epoch))?;
            for item in cursor.iter_start() {
                let (key, value) = item?;
                let key: [u8; 32] = key
                    .try_into()
                    .map_err(|_| Error::Corruption("malformed account table key"))?;
                records.push((Account(key), bincode::deserialize(value)?, epoch));
            }
        }
        Ok(records)
    }
}
