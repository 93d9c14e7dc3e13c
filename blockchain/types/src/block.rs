// Copyright (c) 2024 Botho Foundation

//! The five block variants of the lattice.
//!
//! Legacy chains use the dedicated `Send`/`Receive`/`Open`/`Change`
//! variants; `State` subsumes all four (plus epoch upgrades) in a single
//! variant that restates the account, representative and balance on
//! every block. A block's hash covers its hashed fields and a variant
//! tag; the signature is over the hash and is not part of it.

use lattice_core_types::{Account, AccountKeypair, Amount, BlockHash, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Discriminant for the block variants.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum BlockType {
    /// Legacy send.
    Send,
    /// Legacy receive.
    Receive,
    /// Legacy open (first block of an account).
    Open,
    /// Legacy representative change.
    Change,
    /// Universal state block.
    State,
}

impl BlockType {
    fn tag(self) -> u8 {
        match self {
            BlockType::Send => 2,
            BlockType::Receive => 3,
            BlockType::Open => 4,
            BlockType::Change => 5,
            BlockType::State => 6,
        }
    }
}

/// A legacy send: moves value off this chain, leaving `balance` behind.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SendBlock {
    /// Hash of the preceding block on this chain.
    pub previous: BlockHash,
    /// Account the sent value is destined for.
    pub destination: Account,
    /// Balance remaining on this chain after the send.
    pub balance: Amount,
    /// Signature by the chain owner over the block hash.
    pub signature: Signature,
}

impl SendBlock {
    /// Whether a send may follow a block of `previous` type. Legacy
    /// blocks only extend legacy chains; a state head has no frontier
    /// row, which keeps legacy blocks off it.
    pub fn valid_predecessor(previous: BlockType) -> bool {
        matches!(
            previous,
            BlockType::Send | BlockType::Receive | BlockType::Open | BlockType::Change
        )
    }

    /// Build and sign a send block.
    pub fn new(
        previous: BlockHash,
        destination: Account,
        balance: Amount,
        keypair: &AccountKeypair,
    ) -> Self {
        let mut block = Self {
            previous,
            destination,
            balance,
            signature: Signature::ZERO,
        };
        block.signature = keypair.sign(&block.hash());
        block
    }

    /// Deterministic hash over the hashed fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([BlockType::Send.tag()]);
        hasher.update(self.previous.as_bytes());
        hasher.update(self.destination.as_bytes());
        hasher.update(self.balance.to_be_bytes());
        BlockHash(hasher.finalize().into())
    }
}

/// A legacy receive: pockets the value of a matching send.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReceiveBlock {
    /// Hash of the preceding block on this chain.
    pub previous: BlockHash,
    /// Hash of the matching send block.
    pub source: BlockHash,
    /// Signature by the chain owner over the block hash.
    pub signature: Signature,
}

impl ReceiveBlock {
    /// Whether a receive may follow a block of `previous` type.
    pub fn valid_predecessor(previous: BlockType) -> bool {
        matches!(
            previous,
            BlockType::Send | BlockType::Receive | BlockType::Open | BlockType::Change
        )
    }

    /// Build and sign a receive block.
    pub fn new(previous: BlockHash, source: BlockHash, keypair: &AccountKeypair) -> Self {
        let mut block = Self {
            previous,
            source,
            signature: Signature::ZERO,
        };
        block.signature = keypair.sign(&block.hash());
        block
    }

    /// Deterministic hash over the hashed fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([BlockType::Receive.tag()]);
        hasher.update(self.previous.as_bytes());
        hasher.update(self.source.as_bytes());
        BlockHash(hasher.finalize().into())
    }
}

/// A legacy open: the first block of an account, receiving from a send.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OpenBlock {
    /// Hash of the send this account is opened with.
    pub source: BlockHash,
    /// Representative the account delegates its weight to.
    pub representative: Account,
    /// The account being opened.
    pub account: Account,
    /// Signature by the account over the block hash.
    pub signature: Signature,
}

impl OpenBlock {
    /// Build and sign an open block.
    pub fn new(
        source: BlockHash,
        representative: Account,
        account: Account,
        keypair: &AccountKeypair,
    ) -> Self {
        let mut block = Self {
            source,
            representative,
            account,
            signature: Signature::ZERO,
        };
        block.signature = keypair.sign(&block.hash());
        block
    }

    /// Deterministic hash over the hashed fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([BlockType::Open.tag()]);
        hasher.update(self.source.as_bytes());
        hasher.update(self.representative.as_bytes());
        hasher.update(self.account.as_bytes());
        BlockHash(hasher.finalize().into())
    }
}

/// A legacy representative change.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChangeBlock {
    /// Hash of the preceding block on this chain.
    pub previous: BlockHash,
    /// The new representative.
    pub representative: Account,
    /// Signature by the chain owner over the block hash.
    pub signature: Signature,
}

impl ChangeBlock {
    /// Whether a change may follow a block of `previous` type.
    pub fn valid_predecessor(previous: BlockType) -> bool {
        matches!(
            previous,
            BlockType::Send | BlockType::Receive | BlockType::Open | BlockType::Change
        )
    }

    /// Build and sign a change block.
    pub fn new(previous: BlockHash, representative: Account, keypair: &AccountKeypair) -> Self {
        let mut block = Self {
            previous,
            representative,
            signature: Signature::ZERO,
        };
        block.signature = keypair.sign(&block.hash());
        block
    }

    /// Deterministic hash over the hashed fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([BlockType::Change.tag()]);
        hasher.update(self.previous.as_bytes());
        hasher.update(self.representative.as_bytes());
        BlockHash(hasher.finalize().into())
    }
}

/// A universal state block.
///
/// The subtype is discriminated by `link` and the balance delta: an
/// epoch link marks an upgrade block, a balance drop marks a send (with
/// `link` as destination account), a non-zero `link` otherwise marks a
/// receive (with `link` as source hash), and a zero `link` with an
/// unchanged balance is a pure representative change.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StateBlock {
    /// The chain owner, restated on every state block.
    pub account: Account,
    /// Hash of the preceding block, or zero for a first block.
    pub previous: BlockHash,
    /// Representative the account delegates its weight to.
    pub representative: Account,
    /// The new balance of the account.
    pub balance: Amount,
    /// Destination account, source hash or epoch link, per subtype.
    pub link: BlockHash,
    /// Signature over the block hash; the chain owner for ordinary
    /// blocks, the pinned epoch signer for upgrade blocks.
    pub signature: Signature,
}

impl StateBlock {
    /// Whether a state block may follow a block of `previous` type.
    /// State blocks accept any predecessor.
    pub fn valid_predecessor(_previous: BlockType) -> bool {
        true
    }

    /// Build and sign a state block. `keypair` is the chain owner for
    /// ordinary blocks and the pinned epoch signer for upgrade blocks.
    pub fn new(
        account: Account,
        previous: BlockHash,
        representative: Account,
        balance: Amount,
        link: BlockHash,
        keypair: &AccountKeypair,
    ) -> Self {
        let mut block = Self {
            account,
            previous,
            representative,
            balance,
            link,
            signature: Signature::ZERO,
        };
        block.signature = keypair.sign(&block.hash());
        block
    }

    /// Deterministic hash over the hashed fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([BlockType::State.tag()]);
        hasher.update(self.account.as_bytes());
        hasher.update(self.previous.as_bytes());
        hasher.update(self.representative.as_bytes());
        hasher.update(self.balance.to_be_bytes());
        hasher.update(self.link.as_bytes());
        BlockHash(hasher.finalize().into())
    }
}

/// The root a block contends for: its `previous`, or the account itself
/// for a first block. Two distinct blocks sharing a root are a fork.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct QualifiedRoot {
    /// The block's `previous` field (zero for a first block).
    pub previous: BlockHash,
    /// The contended root: `previous`, or the account for a first block.
    pub root: BlockHash,
}

/// A block of any variant.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Block {
    /// Legacy send.
    Send(SendBlock),
    /// Legacy receive.
    Receive(ReceiveBlock),
    /// Legacy open.
    Open(OpenBlock),
    /// Legacy representative change.
    Change(ChangeBlock),
    /// Universal state block.
    State(StateBlock),
}

impl Block {
    /// The variant discriminant.
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Send(_) => BlockType::Send,
            Block::Receive(_) => BlockType::Receive,
            Block::Open(_) => BlockType::Open,
            Block::Change(_) => BlockType::Change,
            Block::State(_) => BlockType::State,
        }
    }

    /// Whether this is one of the pre-state variants.
    pub fn is_legacy(&self) -> bool {
        !matches!(self, Block::State(_))
    }

    /// The block's deterministic hash.
    pub fn hash(&self) -> BlockHash {
        match self {
            Block::Send(block) => block.hash(),
            Block::Receive(block) => block.hash(),
            Block::Open(block) => block.hash(),
            Block::Change(block) => block.hash(),
            Block::State(block) => block.hash(),
        }
    }

    /// The preceding block on the same chain, zero for a first block.
    pub fn previous(&self) -> BlockHash {
        match self {
            Block::Send(block) => block.previous,
            Block::Receive(block) => block.previous,
            Block::Open(_) => BlockHash::ZERO,
            Block::Change(block) => block.previous,
            Block::State(block) => block.previous,
        }
    }

    /// The source send hash for the variants that carry one explicitly.
    ///
    /// State blocks return zero here; their `link` is only a source
    /// hash for the receive subtype, which takes ledger context to
    /// decide.
    pub fn source(&self) -> BlockHash {
        match self {
            Block::Receive(block) => block.source,
            Block::Open(block) => block.source,
            Block::Send(_) | Block::Change(_) | Block::State(_) => BlockHash::ZERO,
        }
    }

    /// The root this block contends for.
    pub fn root(&self) -> BlockHash {
        match self {
            Block::Open(block) => block.account.into(),
            Block::State(block) if block.previous.is_zero() => block.account.into(),
            _ => self.previous(),
        }
    }

    /// The `(previous, root)` pair identifying the slot this block
    /// occupies.
    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot {
            previous: self.previous(),
            root: self.root(),
        }
    }

    /// The representative, for the variants that restate one.
    pub fn representative(&self) -> Option<Account> {
        match self {
            Block::Open(block) => Some(block.representative),
            Block::Change(block) => Some(block.representative),
            Block::State(block) => Some(block.representative),
            Block::Send(_) | Block::Receive(_) => None,
        }
    }

    /// The balance, for the variants that carry one inline.
    pub fn balance(&self) -> Option<Amount> {
        match self {
            Block::Send(block) => Some(block.balance),
            Block::State(block) => Some(block.balance),
            Block::Receive(_) | Block::Open(_) | Block::Change(_) => None,
        }
    }

    /// The self-declared account, for the variants that carry one.
    pub fn account(&self) -> Option<Account> {
        match self {
            Block::Open(block) => Some(block.account),
            Block::State(block) => Some(block.account),
            Block::Send(_) | Block::Receive(_) | Block::Change(_) => None,
        }
    }

    /// The block's signature.
    pub fn signature(&self) -> Signature {
        match self {
            Block::Send(block) => block.signature,
            Block::Receive(block) => block.signature,
            Block::Open(block) => block.signature,
            Block::Change(block) => block.signature,
            Block::State(block) => block.signature,
        }
    }

    /// Whether `previous` is an admissible predecessor for this block.
    ///
    /// Delegates to the per-variant predicates; an open block never has
    /// a predecessor.
    pub fn valid_predecessor(&self, previous: &Block) -> bool {
        match self {
            Block::Send(_) => SendBlock::valid_predecessor(previous.block_type()),
            Block::Receive(_) => ReceiveBlock::valid_predecessor(previous.block_type()),
            Block::Change(_) => ChangeBlock::valid_predecessor(previous.block_type()),
            Block::Open(_) => false,
            Block::State(_) => StateBlock::valid_predecessor(previous.block_type()),
        }
    }
}
