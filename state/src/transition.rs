//! The transition driver.
//!
//! [`Transition::write`] validates a transaction against the pre-state,
//! dispatches execution, applies gas accounting, and leaves the results
//! in the journal; [`Transition::commit`] then serializes the journal
//! into commit diffs for the snapshot layer.

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_trie::KECCAK_EMPTY;
use thiserror::Error;
use tracing::debug;

use eth_state_transition_common::Object;

use crate::address::{create2_address, create_address};
use crate::precompiled;
use crate::revision::Revision;
use crate::runtime::{
    CallKind, Contract, ExecutionError, ExecutionResult, Host, Log, Runtime, StorageStatus,
    TxContext,
};
use crate::txn::{SnapshotView, Txn};

/// Base gas of a plain transaction.
pub const TX_GAS: u64 = 21_000;
/// Base gas of a contract-creating transaction.
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;

/// EIP-170 deployed-code size limit.
const SPURIOUS_DRAGON_MAX_CODE_SIZE: usize = 24_576;
/// Gas charged per byte of deployed code.
const CODE_DEPOSIT_GAS_PER_BYTE: u64 = 200;
/// Refund for the first SELFDESTRUCT of an account (removed by EIP-3529).
const SELFDESTRUCT_REFUND: u64 = 24_000;

/// A transaction as seen by the engine: already recovered and decoupled
/// from any wire encoding.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// The recovered sender.
    pub from: Address,
    /// The recipient; `None` creates a contract.
    pub to: Option<Address>,
    /// Sender nonce the transaction was signed with.
    pub nonce: u64,
    /// Value transferred to the recipient.
    pub value: U256,
    /// Gas limit.
    pub gas: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    /// Call data, or init code for creations.
    pub input: Bytes,
}

impl Transaction {
    /// True when the transaction creates a contract.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// Fatal pre-check failures. None of these leave any state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Sender nonce does not match the transaction nonce
    #[error("incorrect nonce")]
    NonceIncorrect,
    /// Sender cannot pay the upfront gas cost
    #[error("not enough funds to cover gas costs")]
    NotEnoughFundsForGas,
    /// Intrinsic gas computation overflowed
    #[error("overflow in intrinsic gas calculation")]
    IntrinsicGasOverflow,
    /// Gas limit is below the intrinsic cost
    #[error("not enough gas supplied for intrinsic gas costs")]
    NotEnoughIntrinsicGas,
    /// Sender cannot cover the transferred value
    #[error("not enough funds for transfer with given value")]
    NotEnoughFunds,
}

/// The outcome of one written transaction.
#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// Logs emitted during execution.
    pub logs: Vec<Log>,
    /// False when execution failed (including REVERT).
    pub success: bool,
    /// Gas consumed after refunds.
    pub gas_used: u64,
    /// The created contract's address, for creations.
    pub contract_address: Option<Address>,
    /// Data returned by the outermost frame.
    pub return_value: Bytes,
}

/// Computes the intrinsic gas of a transaction.
///
/// Creations start at 53000, calls at 21000; every zero input byte costs
/// 4 and every non-zero byte 68 (16 from Istanbul). Each addition is
/// checked for overflow.
pub fn intrinsic_gas(tx: &Transaction, rev: Revision) -> Result<u64, TransitionError> {
    let mut cost: u64 = if tx.is_contract_creation() {
        TX_GAS_CONTRACT_CREATION
    } else {
        TX_GAS
    };

    if !tx.input.is_empty() {
        let zeros = tx.input.iter().filter(|b| **b == 0).count() as u64;
        let non_zeros = tx.input.len() as u64 - zeros;

        let non_zero_cost: u64 = if rev >= Revision::Istanbul { 16 } else { 68 };
        if (u64::MAX - cost) / non_zero_cost < non_zeros {
            return Err(TransitionError::IntrinsicGasOverflow);
        }
        cost += non_zeros * non_zero_cost;

        if (u64::MAX - cost) / 4 < zeros {
            return Err(TransitionError::IntrinsicGasOverflow);
        }
        cost += zeros * 4;
    }

    Ok(cost)
}

struct Applied {
    result: ExecutionResult,
    gas_used: u64,
}

/// The state transition driver for a sequence of transactions over one
/// snapshot.
pub struct Transition<V> {
    rev: Revision,
    ctx: TxContext,
    txn: Txn<V>,
    runtime: Arc<dyn Runtime>,
    get_hash: Box<dyn Fn(u64) -> B256 + Send>,
    total_gas: u64,
}

impl<V: SnapshotView> Transition<V> {
    /// Creates a driver over `snapshot` with the given revision, block
    /// context, and execution runtime.
    pub fn new(rev: Revision, ctx: TxContext, snapshot: V, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            rev,
            ctx,
            txn: Txn::new(snapshot),
            runtime,
            // A host that knows real headers injects its own resolver.
            get_hash: Box::new(|number| keccak256(number.to_string().as_bytes())),
            total_gas: 0,
        }
    }

    /// Replaces the block-hash resolver.
    pub fn set_get_hash(&mut self, get_hash: impl Fn(u64) -> B256 + Send + 'static) {
        self.get_hash = Box::new(get_hash);
    }

    /// The underlying journal.
    pub fn txn(&mut self) -> &mut Txn<V> {
        &mut self.txn
    }

    /// Total gas consumed by every written transaction.
    pub fn total_gas(&self) -> u64 {
        self.total_gas
    }

    /// Serializes the journal into commit diffs.
    pub fn commit(&self) -> Vec<Object> {
        self.txn.commit()
    }

    fn is_revision(&self, rev: Revision) -> bool {
        self.rev >= rev
    }

    /// Applies one transaction.
    ///
    /// Pre-check failures roll back every mutation and surface as an
    /// error; execution failures surface as `success = false` with the
    /// gas charged, the way a block would record them.
    pub fn write(&mut self, tx: &Transaction) -> Result<TransitionResult, TransitionError> {
        let checkpoint = self.txn.snapshot();
        let applied = match self.apply(tx) {
            Ok(applied) => applied,
            Err(err) => {
                self.txn.revert_to_snapshot(checkpoint);
                return Err(err);
            }
        };
        self.total_gas += applied.gas_used;

        let logs = self.txn.take_logs();

        if self.is_revision(Revision::Byzantium) {
            // Suicided accounts are marked deleted for the next
            // iteration; empty touched accounts go with them.
            self.txn.clean_deleted(true);
        } else {
            self.txn
                .clean_deleted(self.is_revision(Revision::TangerineWhistle));
        }

        let contract_address = tx
            .is_contract_creation()
            .then(|| create_address(tx.from, tx.nonce));

        let success = applied.result.succeeded();
        debug!(
            target: "transition",
            from = %tx.from,
            gas_used = applied.gas_used,
            success,
            "transaction applied"
        );

        Ok(TransitionResult {
            logs,
            success,
            gas_used: applied.gas_used,
            contract_address,
            return_value: applied.result.return_value,
        })
    }

    fn apply(&mut self, tx: &Transaction) -> Result<Applied, TransitionError> {
        // 1. the nonce of the caller is correct
        if self.txn.get_nonce(tx.from) != tx.nonce {
            return Err(TransitionError::NonceIncorrect);
        }

        // 2. deduct the upfront maximum gas cost
        let upfront = tx.gas_price.saturating_mul(U256::from(tx.gas));
        self.txn
            .sub_balance(tx.from, upfront)
            .map_err(|_| TransitionError::NotEnoughFundsForGas)?;

        // 3. the purchased gas covers intrinsic usage
        let intrinsic = intrinsic_gas(tx, self.rev)?;
        if tx.gas < intrinsic {
            return Err(TransitionError::NotEnoughIntrinsicGas);
        }
        let gas_left = tx.gas - intrinsic;

        // 4. the caller covers the transferred value
        if self.txn.get_balance(tx.from) < tx.value {
            return Err(TransitionError::NotEnoughFunds);
        }

        self.ctx.gas_price = tx.gas_price;
        self.ctx.origin = tx.from;

        let mut result = if tx.is_contract_creation() {
            self.create(tx.from, tx.input.clone(), tx.value, gas_left)
        } else {
            self.txn.incr_nonce(tx.from);
            self.call(tx.from, tx.to.unwrap_or_default(), tx.input.clone(), tx.value, gas_left)
        };

        // Refund can go up to half the gas used.
        let mut gas_used = tx.gas - result.gas_left;
        let refund = self.txn.get_refund().min(gas_used / 2);
        result.gas_left += refund;
        gas_used -= refund;

        // Return unspent gas to the sender and pay the coinbase.
        let remaining = U256::from(result.gas_left).saturating_mul(tx.gas_price);
        self.txn.add_balance(tx.from, remaining);
        let coinbase_fee = U256::from(gas_used).saturating_mul(tx.gas_price);
        self.txn.add_balance(self.ctx.coinbase, coinbase_fee);

        Ok(Applied { result, gas_used })
    }

    /// Top-level CREATE dispatch.
    fn create(&mut self, caller: Address, code: Bytes, value: U256, gas: u64) -> ExecutionResult {
        let address = create_address(caller, self.txn.get_nonce(caller));
        let contract = Contract::creation(1, caller, address, value, gas, code);
        let mut result = self.apply_create(contract);
        result.create_address = Some(address);
        result
    }

    /// Top-level CALL dispatch.
    fn call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        value: U256,
        gas: u64,
    ) -> ExecutionResult {
        let code = self.txn.get_code(to).unwrap_or_default();
        let contract = Contract::call(1, caller, to, value, gas, code, input);
        self.apply_call(contract)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), ExecutionError> {
        self.txn
            .sub_balance(from, amount)
            .map_err(|_| ExecutionError::InsufficientBalance)?;
        self.txn.add_balance(to, amount);
        Ok(())
    }

    /// Dispatches a frame: precompiles first, then the injected runtime.
    /// Codeless, non-precompile accounts execute as the empty program.
    fn run(&mut self, contract: &Contract) -> ExecutionResult {
        if precompiled::is_precompiled(contract.code_address, self.rev) {
            return precompiled::run(contract.code_address, &contract.input, contract.gas, self.rev);
        }
        if contract.code.is_empty() {
            return ExecutionResult::success(contract.gas);
        }
        let runtime = self.runtime.clone();
        let rev = self.rev;
        runtime.run(contract, self, rev)
    }

    fn apply_call(&mut self, contract: Contract) -> ExecutionResult {
        let checkpoint = self.txn.snapshot();
        self.txn.touch_account(contract.address);

        if contract.kind == CallKind::Call {
            // Transfers only happen on plain calls.
            if let Err(err) = self.transfer(contract.caller, contract.address, contract.value) {
                return ExecutionResult::error_with_gas(err, contract.gas);
            }
        }

        let result = self.run(&contract);
        if result.failed() {
            self.txn.revert_to_snapshot(checkpoint);
        }
        result
    }

    fn has_code_or_nonce(&self, address: Address) -> bool {
        if self.txn.get_nonce(address) != 0 {
            return true;
        }
        let code_hash = self.txn.get_code_hash(address);
        code_hash != KECCAK_EMPTY && code_hash != B256::ZERO
    }

    fn apply_create(&mut self, mut contract: Contract) -> ExecutionResult {
        let gas_limit = contract.gas;

        let address = match contract.kind {
            CallKind::Create => create_address(contract.caller, self.txn.get_nonce(contract.caller)),
            CallKind::Create2 => create2_address(contract.caller, contract.salt, &contract.code),
            _ => unreachable!("create frame with call kind"),
        };
        contract.code_address = address;
        contract.address = address;

        self.txn.incr_nonce(contract.caller);

        if self.has_code_or_nonce(address) {
            return ExecutionResult::error(ExecutionError::ContractAddressCollision);
        }

        let checkpoint = self.txn.snapshot();

        if self.is_revision(Revision::TangerineWhistle) {
            // Force the creation of the account
            self.txn.create_account(address);
            self.txn.incr_nonce(address);
        }

        if let Err(err) = self.transfer(contract.caller, address, contract.value) {
            return ExecutionResult::error_with_gas(err, gas_limit);
        }

        let mut result = self.run(&contract);

        if result.failed() {
            self.txn.revert_to_snapshot(checkpoint);
            return result;
        }

        if self.is_revision(Revision::SpuriousDragon)
            && result.return_value.len() > SPURIOUS_DRAGON_MAX_CODE_SIZE
        {
            self.txn.revert_to_snapshot(checkpoint);
            return ExecutionResult::error(ExecutionError::MaxCodeSizeExceeded);
        }

        let deposit = result.return_value.len() as u64 * CODE_DEPOSIT_GAS_PER_BYTE;
        if result.gas_left < deposit {
            result.err = Some(ExecutionError::CodeStoreOutOfGas);
            result.return_value = Bytes::new();
            // Frontier keeps the state changes and stores no code;
            // Homestead onward the frame reverts and burns its gas.
            if self.is_revision(Revision::Homestead) {
                self.txn.revert_to_snapshot(checkpoint);
                result.gas_left = 0;
            }
            return result;
        }

        result.gas_left -= deposit;
        self.txn.set_code(address, result.return_value.clone());
        result
    }
}

impl<V: SnapshotView> Host for Transition<V> {
    fn account_exists(&mut self, address: Address) -> bool {
        self.txn.exist(address)
    }

    fn empty(&mut self, address: Address) -> bool {
        self.txn.empty(address)
    }

    fn get_balance(&mut self, address: Address) -> U256 {
        self.txn.get_balance(address)
    }

    fn get_code_size(&mut self, address: Address) -> usize {
        self.txn.get_code_size(address)
    }

    fn get_code_hash(&mut self, address: Address) -> B256 {
        self.txn.get_code_hash(address)
    }

    fn get_code(&mut self, address: Address) -> Option<Bytes> {
        self.txn.get_code(address)
    }

    fn get_storage(&mut self, address: Address, key: B256) -> B256 {
        self.txn.get_state(address, key)
    }

    fn set_storage(&mut self, address: Address, key: B256, value: B256) -> StorageStatus {
        let current = self.txn.get_state(address, key);
        if current == value {
            return StorageStatus::Unchanged;
        }
        let status = if current.is_zero() {
            StorageStatus::Added
        } else if value.is_zero() {
            StorageStatus::Deleted
        } else {
            StorageStatus::Modified
        };
        self.txn.set_state(address, key, value);
        status
    }

    fn selfdestruct(&mut self, address: Address, beneficiary: Address) {
        // One refund per account; EIP-3529 removes it entirely.
        if !self.txn.has_suicided(address) && self.rev < Revision::London {
            self.txn.add_refund(SELFDESTRUCT_REFUND);
        }
        let balance = self.txn.get_balance(address);
        self.txn.add_balance(beneficiary, balance);
        self.txn.suicide(address);
    }

    fn emit_log(&mut self, address: Address, topics: Vec<B256>, data: Bytes) {
        self.txn.emit_log(address, topics, data);
    }

    fn get_tx_context(&self) -> TxContext {
        self.ctx.clone()
    }

    fn get_block_hash(&self, number: u64) -> B256 {
        (self.get_hash)(number)
    }

    fn callx(&mut self, contract: Contract) -> ExecutionResult {
        if contract.kind.is_create() {
            self.apply_create(contract)
        } else {
            self.apply_call(contract)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_with_input(to: Option<Address>, input: &'static [u8]) -> Transaction {
        Transaction {
            from: Address::ZERO,
            to,
            nonce: 0,
            value: U256::ZERO,
            gas: 1_000_000,
            gas_price: U256::from(1),
            input: Bytes::from_static(input),
        }
    }

    #[test]
    fn intrinsic_gas_base_costs() {
        let call = tx_with_input(Some(Address::ZERO), b"");
        assert_eq!(intrinsic_gas(&call, Revision::Byzantium).unwrap(), 21_000);

        let create = tx_with_input(None, b"");
        assert_eq!(intrinsic_gas(&create, Revision::Frontier).unwrap(), 53_000);
        assert_eq!(intrinsic_gas(&create, Revision::Istanbul).unwrap(), 53_000);
    }

    #[test]
    fn intrinsic_gas_counts_bytes() {
        let tx = tx_with_input(Some(Address::ZERO), &[0, 0, 1, 2]);
        // 2 zero bytes at 4 gas, 2 non-zero at 68 (16 from Istanbul).
        assert_eq!(
            intrinsic_gas(&tx, Revision::Byzantium).unwrap(),
            21_000 + 2 * 4 + 2 * 68
        );
        assert_eq!(
            intrinsic_gas(&tx, Revision::Istanbul).unwrap(),
            21_000 + 2 * 4 + 2 * 16
        );
    }

    #[test]
    fn intrinsic_gas_istanbul_never_exceeds_earlier() {
        let inputs: [&'static [u8]; 4] = [b"", &[0; 7], &[1, 0, 2, 0, 3], &[0xff; 11]];
        for input in inputs {
            let tx = tx_with_input(Some(Address::ZERO), input);
            assert!(
                intrinsic_gas(&tx, Revision::Istanbul).unwrap()
                    <= intrinsic_gas(&tx, Revision::Petersburg).unwrap()
            );
        }
    }
}
