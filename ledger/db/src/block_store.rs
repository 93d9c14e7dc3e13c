// Copyright (c) 2024 Botho Foundation

//! Data access abstraction for blocks and their sidebands.

use lmdb::{Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};
use serde::{Deserialize, Serialize};

use lattice_blockchain_types::{Block, BlockSideband};
use lattice_core_types::{Account, Amount, BlockHash, Epoch};

use crate::{key_bytes_to_u64, u64_to_key_bytes, Error};

// LMDB database names.
pub const BLOCKS_DB_NAME: &str = "blocks";
pub const BLOCK_COUNTS_DB_NAME: &str = "block_counts";

// Keys used by the `block_counts` database.
const NUM_BLOCKS_KEY: &str = "num_blocks";

/// A block as stored: the block itself, its sideband and its epoch tag.
#[derive(Deserialize, Serialize)]
struct StoredBlock {
    block: Block,
    sideband: BlockSideband,
    epoch: Epoch,
}

/// Blocks indexed by hash, plus an aggregate count.
#[derive(Clone)]
pub struct BlockStore {
    /// `block hash -> StoredBlock`
    blocks: Database,
    /// Aggregate counts; `NUM_BLOCKS_KEY -> u64`.
    counts: Database,
}

impl BlockStore {
    pub(crate) fn new(env: &Environment) -> Result<Self, Error> {
        let blocks = env.create_db(Some(BLOCKS_DB_NAME), DatabaseFlags::empty())?;
        let counts = env.create_db(Some(BLOCK_COUNTS_DB_NAME), DatabaseFlags::empty())?;

        let mut db_transaction = env.begin_rw_txn()?;
        let missing = matches!(
            db_transaction.get(counts, &NUM_BLOCKS_KEY),
            Err(lmdb::Error::NotFound)
        );
        if missing {
            db_transaction.put(
                counts,
                &NUM_BLOCKS_KEY,
                &u64_to_key_bytes(0),
                WriteFlags::empty(),
            )?;
        }
        db_transaction.commit()?;

        Ok(Self { blocks, counts })
    }

    /// Store a block with its sideband and epoch tag, link the
    /// predecessor's successor to it, and bump the block count.
    pub fn put(
        &self,
        hash: &BlockHash,
        block: &Block,
        sideband: &BlockSideband,
        epoch: Epoch,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        let record = StoredBlock {
            block: block.clone(),
            sideband: sideband.clone(),
            epoch,
        };
        let bytes = bincode::serialize(&record)?;
        db_transaction.put(self.blocks, hash.as_bytes(), &bytes, WriteFlags::empty())?;

        let num_blocks = self.count(db_transaction)?;
        db_transaction.put(
            self.counts,
            &NUM_BLOCKS_KEY,
            &u64_to_key_bytes(num_blocks + 1),
            WriteFlags::empty(),
        )?;

        let previous = block.previous();
        if !previous.is_zero() {
            self.set_successor(&previous, hash, db_transaction)?;
        }
        Ok(())
    }

    /// Fetch a block and its sideband.
    pub fn get<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Option<(Block, BlockSideband)>, Error> {
        Ok(self
            .get_stored(hash, db_transaction)?
            .map(|stored| (stored.block, stored.sideband)))
    }

    /// Whether a block is stored.
    pub fn exists<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<bool, Error> {
        match db_transaction.get(self.blocks, hash.as_bytes()) {
            Ok(_) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a block is usable as the source of a receive.
    pub fn source_exists<T: Transaction>(
        &self,
        source: &BlockHash,
        db_transaction: &T,
    ) -> Result<bool, Error> {
        self.exists(source, db_transaction)
    }

    /// Delete a block and drop the block count.
    pub fn del(&self, hash: &BlockHash, db_transaction: &mut RwTransaction) -> Result<(), Error> {
        db_transaction.del(self.blocks, hash.as_bytes(), None)?;
        let num_blocks = self.count(db_transaction)?;
        db_transaction.put(
            self.counts,
            &NUM_BLOCKS_KEY,
            &u64_to_key_bytes(num_blocks.saturating_sub(1)),
            WriteFlags::empty(),
        )?;
        Ok(())
    }

    /// The successor of a block on its chain, if one has been recorded.
    pub fn successor<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Option<BlockHash>, Error> {
        Ok(self
            .get_stored(hash, db_transaction)?
            .map(|stored| stored.sideband.successor)
            .filter(|successor| !successor.is_zero()))
    }

    /// Reset a block's recorded successor to "none".
    pub fn successor_clear(
        &self,
        hash: &BlockHash,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        let mut stored = self
            .get_stored(hash, db_transaction)?
            .ok_or(Error::Corruption("successor cleared on a missing block"))?;
        stored.sideband.successor = BlockHash::ZERO;
        self.put_stored(hash, &stored, db_transaction)
    }

    /// The account owning a block, per its sideband.
    pub fn account<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Option<Account>, Error> {
        Ok(self
            .get_stored(hash, db_transaction)?
            .map(|stored| stored.sideband.account))
    }

    /// Chain height of a block; 0 when the block is not stored.
    pub fn account_height<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<u64, Error> {
        Ok(self
            .get_stored(hash, db_transaction)?
            .map(|stored| stored.sideband.height)
            .unwrap_or(0))
    }

    /// The account balance as of a block, if the block is stored. Send
    /// and state blocks carry it inline, the other variants only in the
    /// sideband.
    pub fn balance<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Option<Amount>, Error> {
        Ok(self.get_stored(hash, db_transaction)?.map(|stored| {
            stored
                .block
                .balance()
                .unwrap_or(stored.sideband.balance)
        }))
    }

    /// The epoch tag a block was stored under; `Epoch0` when the block
    /// is not stored.
    pub fn version<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Epoch, Error> {
        Ok(self
            .get_stored(hash, db_transaction)?
            .map(|stored| stored.epoch)
            .unwrap_or(Epoch::Epoch0))
    }

    /// Total number of stored blocks.
    pub fn count<T: Transaction>(&self, db_transaction: &T) -> Result<u64, Error> {
        match db_transaction.get(self.counts, &NUM_BLOCKS_KEY) {
            Ok(bytes) => Ok(key_bytes_to_u64(bytes)),
            Err(lmdb::Error::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn set_successor(
        &self,
        hash: &BlockHash,
        successor: &BlockHash,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        let mut stored = self
            .get_stored(hash, db_transaction)?
            .ok_or(Error::Corruption("successor set on a missing block"))?;
        stored.sideband.successor = *successor;
        self.put_stored(hash, &stored, db_transaction)
    }

    fn get_stored<T: Transaction>(
        &self,
        hash: &BlockHash,
        db_transaction: &T,
    ) -> Result<Option<StoredBlock>, Error> {
        match db_transaction.get(self.blocks, hash.as_bytes()) {
            Ok(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_stored(
        &self,
        hash: &BlockHash,
        stored: &StoredBlock,
        db_transaction: &mut RwTransaction,
    ) -> Result<(), Error> {
        let bytes = bincode::serialize(stored)?;
        db_transaction.put(self.blocks, hash.as_bytes(), &bytes, WriteFlags::empty())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_blockchain_types::{OpenBlock, SendBlock};
    use lattice_core_types::AccountKeypair;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tempfile::TempDir;

    fn get_env() -> (Environment, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment::new()
            .set_max_dbs(10)
            .set_map_size(64 * 1024 * 1024)
            .open(temp_dir.path())
            .unwrap();
        (env, temp_dir)
    }

    fn open_and_send(rng: &mut StdRng) -> (Block, Block, Account) {
        let keypair = AccountKeypair::from_seed(rng.gen());
        let account = keypair.account();
        let open = OpenBlock::new(BlockHash(rng.gen()), account, account, &keypair);
        let send = SendBlock::new(open.hash(), Account(rng.gen()), 40, &keypair);
        (Block::Open(open), Block::Send(send), account)
    }

    #[test]
    fn put_get_round_trip_and_count() {
        let (env, _temp_dir) = get_env();
        let store = BlockStore::new(&env).unwrap();
        let mut rng: StdRng = SeedableRng::from_seed([1u8; 32]);
        let (open, _, account) = open_and_send(&mut rng);
        let hash = open.hash();
        let sideband = BlockSideband::new(account, 100, 1, 7);

        {
            let mut db_transaction = env.begin_rw_txn().unwrap();
            assert_eq!(store.count(&db_transaction).unwrap(), 0);
            store
                .put(&hash, &open, &sideband, Epoch::Epoch0, &mut db_transaction)
                .unwrap();
            db_transaction.commit().unwrap();
        }

        let db_transaction = env.begin_ro_txn().unwrap();
        let (block, stored_sideband) = store.get(&hash, &db_transaction).unwrap().unwrap();
        assert_eq!(block, open);
        assert_eq!(stored_sideband, sideband);
        assert!(store.exists(&hash, &db_transaction).unwrap());
        assert_eq!(store.count(&db_transaction).unwrap(), 1);
        assert_eq!(store.account(&hash, &db_transaction).unwrap(), Some(account));
        assert_eq!(store.account_height(&hash, &db_transaction).unwrap(), 1);
        assert_eq!(
            store.version(&hash, &db_transaction).unwrap(),
            Epoch::Epoch0
        );
        assert!(store
            .get(&BlockHash(rng.gen()), &db_transaction)
            .unwrap()
            .is_none());
    }

    #[test]
    fn put_links_predecessor_successor() {
        let (env, _temp_dir) = get_env();
        let store = BlockStore::new(&env).unwrap();
        let mut rng: StdRng = SeedableRng::from_seed([2u8; 32]);
        let (open, send, account) = open_and_send(&mut rng);
        let open_hash = open.hash();
        let send_hash = send.hash();

        let mut db_transaction = env.begin_rw_txn().unwrap();
        store
            .put(
                &open_hash,
                &open,
                &BlockSideband::new(account, 100, 1, 7),
                Epoch::Epoch0,
                &mut db_transaction,
            )
            .unwrap();
        assert!(store.successor(&open_hash, &db_transaction).unwrap().is_none());

        store
            .put(
                &send_hash,
                &send,
                &BlockSideband::new(account, 40, 2, 8),
                Epoch::Epoch0,
                &mut db_transaction,
            )
            .unwrap();
        assert_eq!(
            store.successor(&open_hash, &db_transaction).unwrap(),
            Some(send_hash)
        );

        store.successor_clear(&open_hash, &mut db_transaction).unwrap();
        assert!(store.successor(&open_hash, &db_transaction).unwrap().is_none());
    }

    #[test]
    fn balance_prefers_inline_over_sideband() {
        let (env, _temp_dir) = get_env();
        let store = BlockStore::new(&env).unwrap();
        let mut rng: StdRng = SeedableRng::from_seed([3u8; 32]);
        let (open, send, account) = open_and_send(&mut rng);
        let open_hash = open.hash();
        let send_hash = send.hash();

        let mut db_transaction = env.begin_rw_txn().unwrap();
        store
            .put(
                &open_hash,
                &open,
                &BlockSideband::new(account, 100, 1, 7),
                Epoch::Epoch0,
                &mut db_transaction,
            )
            .unwrap();
        store
            .put(
                &send_hash,
                &send,
                &BlockSideband::new(account, 40, 2, 8),
                Epoch::Epoch0,
                &mut db_transaction,
            )
            .unwrap();

        // Legacy open: balance only lives in the sideband.
        assert_eq!(
            store.balance(&open_hash, &db_transaction).unwrap(),
            Some(100)
        );
        // Send: the inline balance wins.
        assert_eq!(
            store.balance(&send_hash, &db_transaction).unwrap(),
            Some(40)
        );
        // Unknown hash: absent, not zero.
        assert_eq!(
            store
                .balance(&BlockHash(rng.gen()), &db_transaction)
                .unwrap(),
            None
        );
    }

    #[test]
    fn del_drops_count() {
        let (env, _temp_dir) = get_env();
        let store = BlockStore::new(&env).unwrap();
        let mut rng: StdRng = SeedableRng::from_seed([4u8; 32]);
        let (open, _, account) = open_and_send(&mut rng);
        let hash = open.hash();

        let mut db_transaction = env.begin_rw_txn().unwrap();
        store
            .put(
                &hash,
                &open,
                &BlockSideband::new(account, 100, 1, 7),
                Epoch::Epoch0,
                &mut db_transaction,
            )
            .unwrap();
        store.del(&hash, &mut db_transaction).unwrap();
        assert!(!store.exists(&hash, &db_transaction).unwrap());
        assert_eq!(store.count(&db_transaction).unwrap(), 0);
    }
}
