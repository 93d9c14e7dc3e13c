// Copyright (c) 2024 Botho Foundation

//! Lattice core type definitions

#![no_std]

extern crate alloc;

pub mod epoch;

pub mod hash;

pub mod keys;

/// Raw currency units.
///
/// The full supply fits a `u128` exactly; conserved-sum arithmetic over
/// amounts must never truncate. Representative-weight bookkeeping uses
/// wrapping arithmetic so a paired subtract/add cancels bit for bit.
pub type Amount = u128;

pub use crate::{
    epoch::{Epoch, Epochs},
    hash::{Account, BlockHash, Signature},
    keys::{validate_message, AccountKeypair},
};
