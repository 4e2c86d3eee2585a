//! Runtime-facing types.
//!
//! The EVM itself is an external collaborator: it is handed a
//! [`Contract`] and a [`Host`] (implemented by the transition driver) and
//! returns an [`ExecutionResult`]. Precompiled contracts run through the
//! same [`Runtime`] shape internally.

use alloy_primitives::{Address, Bytes, B256, U256};
use thiserror::Error;

use crate::revision::Revision;

/// The kind of a call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Plain message call; transfers value.
    Call,
    /// Executes the callee's code with the caller's storage.
    CallCode,
    /// Executes the callee's code in the caller's full context.
    DelegateCall,
    /// Call with all state mutation forbidden.
    StaticCall,
    /// Contract creation.
    Create,
    /// Salted contract creation.
    Create2,
}

impl CallKind {
    /// True for CREATE and CREATE2 frames.
    pub fn is_create(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

/// Errors surfaced by call and create frames.
///
/// Every one of these reverts exactly one checkpoint; `Reverted`
/// additionally keeps the remaining gas and the return buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Frame ran out of gas
    #[error("out of gas")]
    OutOfGas,
    /// EVM stack overflow
    #[error("stack overflow")]
    StackOverflow,
    /// EVM stack underflow
    #[error("stack underflow")]
    StackUnderflow,
    /// Account balance cannot cover the requested change
    #[error("not enough funds")]
    NotEnoughFunds,
    /// Value transfer exceeds the caller's balance
    #[error("insufficient balance for transfer")]
    InsufficientBalance,
    /// Deployed code exceeds the Spurious Dragon size limit
    #[error("max code size exceeded")]
    MaxCodeSizeExceeded,
    /// The create target already has code or a nonce
    #[error("contract address collision")]
    ContractAddressCollision,
    /// Call depth limit reached
    #[error("max call depth exceeded")]
    MaxCallDepth,
    /// The frame executed REVERT
    #[error("execution was reverted")]
    ExecutionReverted,
    /// Not enough gas left to pay the code deposit
    #[error("contract creation code storage out of gas")]
    CodeStoreOutOfGas,
    /// A precompiled contract rejected its input
    #[error("precompile failed")]
    PrecompileFailed,
}

/// The outcome of running one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Data returned by the frame (function result, or the revert buffer).
    pub return_value: Bytes,
    /// Gas remaining after execution.
    pub gas_left: u64,
    /// The address created by a CREATE frame.
    pub create_address: Option<Address>,
    /// The failure, if any.
    pub err: Option<ExecutionError>,
}

impl ExecutionResult {
    /// A successful result with no return data.
    pub fn success(gas_left: u64) -> Self {
        Self {
            return_value: Bytes::new(),
            gas_left,
            create_address: None,
            err: None,
        }
    }

    /// A failed result consuming all gas.
    pub fn error(err: ExecutionError) -> Self {
        Self {
            return_value: Bytes::new(),
            gas_left: 0,
            create_address: None,
            err: Some(err),
        }
    }

    /// A failed result keeping the given gas.
    pub fn error_with_gas(err: ExecutionError, gas_left: u64) -> Self {
        Self {
            return_value: Bytes::new(),
            gas_left,
            create_address: None,
            err: Some(err),
        }
    }

    /// True if the frame completed without error.
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }

    /// True if the frame failed for any reason, including REVERT.
    pub fn failed(&self) -> bool {
        self.err.is_some()
    }

    /// True if the frame failed specifically with REVERT.
    pub fn reverted(&self) -> bool {
        self.err == Some(ExecutionError::ExecutionReverted)
    }
}

/// The status reported back to the EVM for an SSTORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    /// A zero slot became non-zero.
    Added,
    /// A non-zero slot changed to another non-zero value.
    Modified,
    /// A non-zero slot became zero.
    Deleted,
    /// The stored value did not change.
    Unchanged,
}

/// A log emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<B256>,
    /// Raw payload.
    pub data: Bytes,
}

/// The per-transaction context handed to the EVM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxContext {
    /// Effective gas price of the transaction.
    pub gas_price: U256,
    /// The original external sender.
    pub origin: Address,
    /// The block's beneficiary.
    pub coinbase: Address,
    /// Block number.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Chain id.
    pub chain_id: u64,
    /// Block difficulty.
    pub difficulty: B256,
}

/// The frame being executed.
#[derive(Debug, Clone)]
pub struct Contract {
    /// The code to run.
    pub code: Bytes,
    /// Frame kind.
    pub kind: CallKind,
    /// Address the code was loaded from.
    pub code_address: Address,
    /// Address whose storage the frame sees.
    pub address: Address,
    /// The calling address.
    pub caller: Address,
    /// Call depth of this frame.
    pub depth: usize,
    /// Value carried by the frame.
    pub value: U256,
    /// Call data.
    pub input: Bytes,
    /// Gas available to the frame.
    pub gas: u64,
    /// True inside STATICCALL.
    pub is_static: bool,
    /// CREATE2 salt.
    pub salt: B256,
}

impl Contract {
    /// Builds a frame of the given kind.
    pub fn new(
        kind: CallKind,
        depth: usize,
        caller: Address,
        to: Address,
        value: U256,
        gas: u64,
        code: Bytes,
    ) -> Self {
        Self {
            code,
            kind,
            code_address: to,
            address: to,
            caller,
            depth,
            value,
            input: Bytes::new(),
            gas,
            is_static: false,
            salt: B256::ZERO,
        }
    }

    /// Builds a creation frame; the init code is both code and payload.
    pub fn creation(
        depth: usize,
        caller: Address,
        to: Address,
        value: U256,
        gas: u64,
        code: Bytes,
    ) -> Self {
        Self::new(CallKind::Create, depth, caller, to, value, gas, code)
    }

    /// Builds a message-call frame.
    pub fn call(
        depth: usize,
        caller: Address,
        to: Address,
        value: U256,
        gas: u64,
        code: Bytes,
        input: Bytes,
    ) -> Self {
        let mut contract = Self::new(CallKind::Call, depth, caller, to, value, gas, code);
        contract.input = input;
        contract
    }
}

/// The execution host: the state-facing callbacks the EVM runs against.
/// Implemented by the transition driver.
pub trait Host {
    /// True if the account exists in the journal or the snapshot.
    fn account_exists(&mut self, address: Address) -> bool;
    /// True if the account is empty per EIP-161.
    fn empty(&mut self, address: Address) -> bool;
    /// Balance of the account (zero when absent).
    fn get_balance(&mut self, address: Address) -> U256;
    /// Size of the account's code.
    fn get_code_size(&mut self, address: Address) -> usize;
    /// Hash of the account's code (zero when absent).
    fn get_code_hash(&mut self, address: Address) -> B256;
    /// The account's code.
    fn get_code(&mut self, address: Address) -> Option<Bytes>;
    /// Reads a storage slot.
    fn get_storage(&mut self, address: Address, key: B256) -> B256;
    /// Writes a storage slot and classifies the change.
    fn set_storage(&mut self, address: Address, key: B256, value: B256) -> StorageStatus;
    /// Marks `address` selfdestructed in favor of `beneficiary`.
    fn selfdestruct(&mut self, address: Address, beneficiary: Address);
    /// Emits a log.
    fn emit_log(&mut self, address: Address, topics: Vec<B256>, data: Bytes);
    /// The transaction context.
    fn get_tx_context(&self) -> TxContext;
    /// The hash of the block at `number`.
    fn get_block_hash(&self, number: u64) -> B256;
    /// Recursive call/create entry point for nested frames.
    fn callx(&mut self, contract: Contract) -> ExecutionResult;
}

/// An execution engine: the EVM, or anything standing in for it.
pub trait Runtime {
    /// Runs `contract` against `host` under revision `rev`.
    fn run(&self, contract: &Contract, host: &mut dyn Host, rev: Revision) -> ExecutionResult;
}

/// Closures are runtimes, which keeps test doubles terse.
impl<F> Runtime for F
where
    F: Fn(&Contract, &mut dyn Host, Revision) -> ExecutionResult,
{
    fn run(&self, contract: &Contract, host: &mut dyn Host, rev: Revision) -> ExecutionResult {
        self(contract, host, rev)
    }
}
