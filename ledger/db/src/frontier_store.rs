// Copyright (c) 2024 Botho Foundation

//! Data access abstraction for the legacy frontier index.
//!
//! Maps legacy head hashes to their owning account. State heads are
//! deliberately absent: legacy blocks locate their account through this
//! table, so the absence keeps them off state chains.

use lmdb::{Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};

use lattice_core_types::{Account, BlockHash};

use crate::Error;

// LMDB database names.
pub const FRONTIERS_DB_NAME: &str = "frontiers";

/// `legacy head hash -> account`.
#[derive(Clone)]
pub struct FrontierStore {
    frontiers: Database,
}

impl FrontierStore {
    pub(crate) fn new(env: &Environment) -> Result<Self, Error> {
        Ok(Self {
            frontiers: env.create_db(Some(FRONTIERS_DB_NAME), DatabaseFlags::empty())?,
        })
    }

    /// The account owning a legacy head, if `hash` is one.
    pub fn get<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Option<Account>, Error> {
        match db_transaction.get(self.frontiers, hash.as_bytes()) {
            Ok(bytes) => {
                let account: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::Corruption("malformed frontier value"))?;
                Ok(Some(Account(account)))
            }
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record `hash` as the legacy head of `account`.
    pub fn put(
        &self,
        hash: &BlockHash,
        account: &Account,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        db_transaction.put(
            self.frontiers,
            hash.as_bytes(),
            account.as_bytes(),
            WriteFlags::empty(),
        )?;
        Ok(())
    }

    /// Remove the frontier row for `hash`, if any.
    pub fn del(&self, hash: &BlockHash, db_transaction: &mut RwTransaction) -> Result<(), Error> {
        match db_transaction.del(self.frontiers, hash.as_bytes(), None) {
            Ok(()) | Err(lmdb::Error::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmdb::Environment;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tempfile::TempDir;

    #[test]
    fn put_get_del_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment::new()
            .set_max_dbs(10)
            .set_map_size(64 * 1024 * 1024)
            .open(temp_dir.path())
            .unwrap();
        let store = FrontierStore::new(&env).unwrap();
        let mut rng: StdRng = SeedableRng::from_seed([1u8; 32]);
        let hash = BlockHash(rng.gen());
        let account = Account(rng.gen());

        let mut db_transaction = env.begin_rw_txn().unwrap();
        assert!(store.get(&hash, &db_transaction).unwrap().is_none());

        store.put(&hash, &account, &mut db_transaction).unwrap();
        assert_eq!(store.get(&hash, &db_transaction).unwrap(), Some(account));

        store.del(&hash, &mut db_transaction).unwrap();
        assert!(store.get(&hash, &db_transaction).unwrap().is_none());

        // Deleting an absent row is harmless.
        store.del(&hash, &mut db_transaction).unwrap();
    }
}
