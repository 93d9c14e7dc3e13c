// Copyright (c) 2024 Botho Foundation

//! In-memory representative vote weights.
//!
//! A derived cache over the account tables: each representative's weight
//! is the sum of the balances of the accounts delegating to it, and it
//! moves only together with those balances. Rebuilt on startup, mutated
//! only from within an active write transaction (of which the store
//! admits one at a time), so a plain mutex suffices.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use lattice_core_types::{Account, Amount};

/// `representative -> summed voting weight`.
#[derive(Debug, Default)]
pub struct RepWeights {
    weights: Mutex<HashMap<Account, Amount>>,
}

impl RepWeights {
    /// Apply a signed delta to a representative's weight.
    ///
    /// Deltas are unsigned 128-bit values added with wrapping
    /// arithmetic; a negative delta is passed as `amount.wrapping_neg()`
    /// and cancels its positive counterpart exactly. The net ledger
    /// state never takes any weight below zero.
    pub fn representation_add(&self, account: Account, amount: Amount) {
        let mut weights = self.weights.lock().expect("rep weights mutex poisoned");
        let weight = weights.entry(account).or_insert(0);
        *weight = weight.wrapping_add(amount);
    }

    /// A representative's current weight.
    pub fn representation_get(&self, account: &Account) -> Amount {
        let weights = self.weights.lock().expect("rep weights mutex poisoned");
        weights.get(account).copied().unwrap_or(0)
    }

    /// Snapshot of every representative's weight.
    pub fn snapshot(&self) -> HashMap<Account, Amount> {
        self.weights
            .lock()
            .expect("rep weights mutex poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let weights = RepWeights::default();
        let account = Account([1u8; 32]);
        assert_eq!(weights.representation_get(&account), 0);

        weights.representation_add(account, 100);
        weights.representation_add(account, 25);
        assert_eq!(weights.representation_get(&account), 125);
    }

    #[test]
    fn paired_deltas_cancel_exactly() {
        let weights = RepWeights::default();
        let from = Account([1u8; 32]);
        let to = Account([2u8; 32]);
        let amount: Amount = u128::MAX - 7;

        weights.representation_add(from, amount);
        weights.representation_add(from, amount.wrapping_neg());
        weights.representation_add(to, amount);

        assert_eq!(weights.representation_get(&from), 0);
        assert_eq!(weights.representation_get(&to), amount);
        assert_eq!(weights.snapshot().values().sum::<Amount>(), amount);
    }
}
