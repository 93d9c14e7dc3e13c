// Copyright (c) 2024 Botho Foundation

//! Data access abstraction for pending (sent but unreceived) entries,
//! partitioned by the sender's epoch.
//!
//! The pending tables are the sole record of unreceived funds: exactly
//! one entry exists per applied-but-unreceived send. The 64-byte key
//! puts the destination account first so one account's receivable
//! entries are contiguous under a range scan.

use lmdb::{Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};

use lattice_blockchain_types::{PendingInfo, PendingKey};
use lattice_core_types::{Account, Epoch};

use crate::Error;

// LMDB database names.
pub const PENDING_V0_DB_NAME: &str = "pending_v0";
pub const PENDING_V1_DB_NAME: &str = "pending_v1";

/// Pending entries keyed by `(destination account, send hash)`.
#[derive(Clone)]
pub struct PendingStore {
    /// Entries whose send was applied at epoch 0.
    pending_v0: Database,
    /// Entries whose send was applied at epoch 1.
    pending_v1: Database,
}

impl PendingStore {
    pub(crate) fn new(env: &Environment) -> Result<Self, Error> {
        Ok(Self {
            pending_v0: env.create_db(Some(PENDING_V0_DB_NAME), DatabaseFlags::empty())?,
            pending_v1: env.create_db(Some(PENDING_V1_DB_NAME), DatabaseFlags::empty())?,
        })
    }

    fn db_for(&self, epoch: Epoch) -> Database {
        match epoch {
            Epoch::Epoch0 => self.pending_v0,
            Epoch::Epoch1 => self.pending_v1,
        }
    }

    /// Fetch a pending entry from whichever table holds it.
    pub fn get<T: Transaction>(
        &self,
        key: &PendingKey,
        db_transaction: &T,
    ) -> Result<Option<PendingInfo>, Error> {
        let key_bytes = key.to_bytes();
        for epoch in [Epoch::Epoch0, Epoch::Epoch1] {
            match db_transaction.get(self.db_for(epoch), &key_bytes) {
                Ok(bytes) => return Ok(Some(bincode::deserialize(bytes)?)),
                Err(lmdb::Error::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Whether a pending entry exists in either table.
    pub fn exists<T: Transaction>(
        &self,
        key: &PendingKey,
        db_transaction: &T,
    ) -> Result<bool, Error> {
        Ok(self.get(key, db_transaction)?.is_some())
    }

    /// Insert a pending entry, routed to the table for its epoch.
    pub fn put(
        &self,
        key: &PendingKey,
        info: &PendingInfo,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        let bytes = bincode::serialize(info)?;
        db_transaction.put(
            self.db_for(info.epoch),
            &key.to_bytes(),
            &bytes,
            WriteFlags::empty(),
        )?;
        Ok(())
    }

    /// Remove a pending entry from whichever table holds it.
    ///
    /// The entry must exist; the validator and rollbacker only ever
    /// delete entries they just observed.
    pub fn del(&self, key: &PendingKey, db_transaction: &mut RwTransaction) -> Result<(), Error> {
        let key_bytes = key.to_bytes();
        for epoch in [Epoch::Epoch0, Epoch::Epoch1] {
            match db_transaction.del(self.db_for(epoch), &key_bytes, None) {
                Ok(()) => return Ok(()),
                Err(lmdb::Error::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Corruption("deleted pending entry does not exist"))
    }

    /// Every pending entry destined for `account`, across both tables.
    pub fn account_entries<T: Transaction>(
        &self,
        account: &Account,
        db_transaction: &T,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, Error> {
        let start = PendingKey::new(*account, Default::default()).to_bytes();
        let mut entries = Vec::new();
        for epoch in [Epoch::Epoch0, Epoch::Epoch1] {
            let mut cursor = db_transaction.open_ro_cursor(self.db_for(epoch))?;
            for item in cursor.iter_from(start) {
                let (key, value) = item?;
                let key: [u8; 64] = key
                    .try_into()
                    .map_err(|_| Error::Corruption("malformed pending table key"))?;
                let key = PendingKey::from_bytes(key);
                if key.account != *account {
                    break;
                }
                entries.push((key, bincode::deserialize(value)?));
            }
        }
        Ok(entries)
    }
}
