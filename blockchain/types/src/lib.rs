// Copyright (c) 2024 Botho Foundation

//! Block-lattice data structures.
//!
//! Every account owns its own chain of blocks; value transfer is an
//! explicit send on the sender's chain paired with a receive on the
//! recipient's chain. These types carry no storage or validation logic;
//! the ledger crate owns both.

#![no_std]
#![deny(missing_docs)]

mod account_info;
mod block;
mod pending;
mod sideband;

pub use crate::{
    account_info::AccountInfo,
    block::{
        Block, BlockType, ChangeBlock, OpenBlock, QualifiedRoot, ReceiveBlock, SendBlock,
        StateBlock,
    },
    pending::{PendingInfo, PendingKey},
    sideband::BlockSideband,
};
