// Copyright (c) 2024 Botho Foundation

//! Outcomes of validating a single block against the ledger.

use displaydoc::Display;

use lattice_core_types::{Account, Amount};

/// Why a block was accepted or rejected.
///
/// Everything except `Progress` leaves the ledger untouched. The gap
/// codes are retryable once the referenced blocks arrive; `Fork` is
/// ambiguous and resolved externally by voting; the rest are
/// unambiguous rejections.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ProcessCode {
    /// The block was accepted and applied.
    Progress,

    /// The block has already been applied.
    Old,

    /// The previous block is not yet in the ledger.
    GapPrevious,

    /// The source block is not yet in the ledger.
    GapSource,

    /// The signature does not verify against the required signer.
    BadSignature,

    /// The block spends more than the account balance.
    NegativeSpend,

    /// The block contends with an applied block at the same slot.
    Fork,

    /// No matching pending entry is receivable by this block.
    Unreceivable,

    /// The stated balance does not match the required balance.
    BalanceMismatch,

    /// The representative does not match the required representative.
    RepresentativeMismatch,

    /// The block variant may not appear at this position on the chain.
    BlockPosition,

    /// The burn account may never be opened.
    OpenedBurnAccount,
}

/// Signature verification state, carried across checks so a signature
/// is verified at most once per block.
///
/// Callers that already verified out of band pass `Valid` (or
/// `ValidEpoch` for an upgrade block) to skip the redundant check.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureVerification {
    /// Not verified yet.
    Unknown,
    /// Verified against the chain owner.
    Valid,
    /// Verified against the pinned epoch signer.
    ValidEpoch,
    /// Known not to verify.
    Invalid,
}

/// The full outcome of a `process` call.
#[derive(Clone, Debug)]
pub struct ProcessResult {
    /// Why the block was accepted or rejected.
    pub code: ProcessCode,
    /// Signature verification state after processing.
    pub verified: SignatureVerification,
    /// The account the block was applied to (zero when rejected early).
    pub account: Account,
    /// The absolute balance delta the block caused.
    pub amount: Amount,
    /// For sends: the account the new pending entry is destined for.
    pub pending_account: Account,
    /// For state blocks: whether the block acted as a send.
    pub state_is_send: bool,
}

impl ProcessResult {
    pub(crate) fn new(verified: SignatureVerification) -> Self {
        Self {
            code: ProcessCode::Progress,
            verified,
            account: Account::ZERO,
            amount: 0,
            pending_account: Account::ZERO,
            state_is_send: false,
        }
    }
}
