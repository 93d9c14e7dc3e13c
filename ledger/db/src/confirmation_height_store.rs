// Copyright (c) 2024 Botho Foundation

//! Data access abstraction for per-account confirmation heights.

use lmdb::{Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};

use lattice_core_types::Account;

use crate::Error;

// LMDB database names.
pub const CONFIRMATION_HEIGHT_DB_NAME: &str = "confirmation_height";

/// `account -> confirmed chain height`.
#[derive(Clone)]
pub struct ConfirmationHeightStore {
    confirmation_heights: Database,
}

impl ConfirmationHeightStore {
    pub(crate) fn new(env: &Environment) -> Result<Self, Error> {
        Ok(Self {
            confirmation_heights: env
                .create_db(Some(CONFIRMATION_HEIGHT_DB_NAME), DatabaseFlags::empty())?,
        })
    }

    /// The confirmed height of an account.
    pub fn get<T: Transaction>(
        &self,
        account: &Account,
        db_transaction: &T,
    ) -> Result<Option<u64>, Error> {
        match db_transaction.get(self.confirmation_heights, account.as_bytes()) {
            Ok(bytes) => Ok(Some(u64::from_le_bytes(
                bytes.try_into().unwrap_or([0u8; 8]),
            ))),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the confirmed height of an account.
    pub fn put(
        &self,
        account: &Account,
        height: u64,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        db_transaction.put(
            self.confirmation_heights,
            account.as_bytes(),
            &height.to_le_bytes(),
            WriteFlags::empty(),
        )?;
        Ok(())
    }

    /// Remove an account's confirmation height, if any.
    pub fn del(&self, account: &Account, db_transaction: &mut RwTransaction) -> Result<(), Error> {
        match db_transaction.del(self.confirmation_heights, account.as_bytes(), None) {
            Ok(()) | Err(lmdb::Error::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an account has a recorded confirmation height.
    pub fn exists<T: Transaction>(
        &self,
        account: &Account,
        db_transaction: &T,
    ) -> Result<bool, Error> {
        Ok(self.get(account, db_transaction)?.is_some())
    }

    /// Every recorded confirmation height. Used for cache warm-up.
    pub fn iter_all<T: Transaction>(
        &self,
        db_transaction: &T,
    ) -> Result<Vec<(Account, u64)>, Error> {
        let mut cursor = db_transaction.open_ro_cursor(self.confirmation_heights)?;
        let mut records = Vec::new();
        for item in cursor.iter_start() {
            let (key, value) = item?;
            let key: [u8; 32] = key
                .try_into()
                .map_err(|_| Error::Corruption("malformed confirmation height key"))?;
            let height = u64::from_le_bytes(value.try_into().unwrap_or([0u8; 8]));
            records.push((Account(key), height));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmdb::Environment;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tempfile::TempDir;

    #[test]
    fn put_get_del_and_iteration() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment::new()
            .set_max_dbs(10)
            .set_map_size(64 * 1024 * 1024)
            .open(temp_dir.path())
            .unwrap();
        let store = ConfirmationHeightStore::new(&env).unwrap();
        let mut rng: StdRng = SeedableRng::from_seed([1u8; 32]);
        let account = Account(rng.gen());
        let other = Account(rng.gen());

        let mut db_transaction = env.begin_rw_txn().unwrap();
        assert!(store.get(&account, &db_transaction).unwrap().is_none());

        store.put(&account, 0, &mut db_transaction).unwrap();
        store.put(&other, 7, &mut db_transaction).unwrap();
        assert_eq!(store.get(&account, &db_transaction).unwrap(), Some(0));
        assert!(store.exists(&account, &db_transaction).unwrap());

        let total: u64 = store
            .iter_all(&db_transaction)
            .unwrap()
            .iter()
            .map(|(_, height)| *height)
            .sum();
        assert_eq!(total, 7);

        store.del(&account, &mut db_transaction).unwrap();
        assert!(!store.exists(&account, &db_transaction).unwrap());
    }
}
