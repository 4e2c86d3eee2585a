//! Transaction-level state transition engine.
//!
//! Given a pre-state snapshot and a transaction, the [`Transition`]
//! driver validates the transaction, dispatches execution to an injected
//! [`Runtime`] (an EVM) or a precompiled contract, applies gas
//! accounting, and produces the list of dirty [`Object`]s to be folded
//! into the trie by the snapshot layer.

/// CREATE / CREATE2 address derivation.
pub mod address;
/// In-memory account view and journal slots.
pub mod object;
/// Precompiled contracts 1..9.
pub mod precompiled;
/// Fork revision model.
pub mod revision;
/// Runtime-facing types: contracts, results, the Host seam.
pub mod runtime;
/// The transition driver.
pub mod transition;
/// The journalled mutation buffer.
pub mod txn;

#[cfg(test)]
mod scenarios_test;

pub use address::{create2_address, create_address};
pub use object::{StateObject, StorageSlot};
pub use revision::Revision;
pub use runtime::{
    CallKind, Contract, ExecutionError, ExecutionResult, Host, Log, Runtime, StorageStatus,
    TxContext,
};
pub use transition::{
    intrinsic_gas, Transaction, Transition, TransitionError, TransitionResult,
};
pub use txn::{Checkpoint, SnapshotView, Txn};

pub use eth_state_transition_common::{Object, StorageEntry};
pub use eth_state_transition_trie::{Account, EMPTY_ROOT_HASH, KECCAK_EMPTY};
