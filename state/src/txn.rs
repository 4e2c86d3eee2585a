//! The journalled mutation buffer.
//!
//! A [`Txn`] layers account, balance, nonce, code, storage, log, and
//! refund changes over a read-only snapshot. The journal is a persistent
//! map, so taking a checkpoint is an O(1) clone and reverting a deep
//! call tree costs only the checkpoint stack, never the state size.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use im::{OrdMap, Vector};
use schnellru::{ByLength, LruMap};
use tracing::error;

use eth_state_transition_common::{Object, Storage, StorageEntry};
use eth_state_transition_trie::{Account, Snapshot};

use crate::object::{StateObject, StorageSlot};
use crate::runtime::{ExecutionError, Log};

/// Capacity of the per-transaction code cache.
const CODE_CACHE_SIZE: u32 = 20;

/// Read access to a committed state root.
///
/// Reads are infallible by contract: the engine treats backend faults as
/// fatal, and persistence errors surface on commit, not on the read
/// path. Test doubles implement this directly.
pub trait SnapshotView {
    /// The code blob stored under `code_hash`, if any.
    fn view_code(&self, code_hash: B256) -> Option<Bytes>;
    /// The account stored under `Keccak256(address)`, if any.
    fn view_account(&self, address: Address) -> Option<Account>;
    /// The storage slot `Keccak256(key)` of the trie at `storage_root`.
    /// Missing keys and missing roots read as zero.
    fn view_storage(&self, storage_root: B256, key: B256) -> B256;
}

impl<S> SnapshotView for Snapshot<S>
where
    S: Storage + Clone,
{
    fn view_code(&self, code_hash: B256) -> Option<Bytes> {
        match self.get_code(code_hash) {
            Ok(code) => code.map(Bytes::from),
            Err(err) => {
                error!(target: "txn", %code_hash, %err, "code read failed");
                None
            }
        }
    }

    fn view_account(&self, address: Address) -> Option<Account> {
        match self.get_account(address) {
            Ok(account) => account,
            Err(err) => {
                error!(target: "txn", %address, %err, "account read failed");
                None
            }
        }
    }

    fn view_storage(&self, storage_root: B256, key: B256) -> B256 {
        match self.get_storage(storage_root, key) {
            Ok(value) => value,
            Err(err) => {
                error!(target: "txn", %storage_root, %err, "storage read failed");
                B256::ZERO
            }
        }
    }
}

/// A handle to a journal checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Everything a checkpoint must capture: the object map, the emitted
/// logs, and the accumulated refund.
#[derive(Clone, Default)]
struct Journal {
    objects: OrdMap<Address, StateObject>,
    logs: Vector<Log>,
    refund: u64,
}

/// The journalled mutation buffer over one snapshot.
pub struct Txn<V> {
    snapshot: V,
    journal: Journal,
    checkpoints: Vec<Journal>,
    code_cache: LruMap<Address, Bytes, ByLength>,
}

impl<V: SnapshotView> Txn<V> {
    /// Opens a transaction buffer over `snapshot`.
    pub fn new(snapshot: V) -> Self {
        Self {
            snapshot,
            journal: Journal::default(),
            checkpoints: Vec::new(),
            code_cache: LruMap::new(ByLength::new(CODE_CACHE_SIZE)),
        }
    }

    /// The underlying snapshot.
    pub fn snapshot_view(&self) -> &V {
        &self.snapshot
    }

    fn get_state_object(&self, address: Address) -> Option<StateObject> {
        if let Some(object) = self.journal.objects.get(&address) {
            if object.deleted {
                return None;
            }
            return Some(object.clone());
        }
        let account = self.snapshot.view_account(address)?;
        Some(StateObject::new(account))
    }

    fn upsert(&mut self, address: Address, create: bool, f: impl FnOnce(&mut StateObject)) {
        let mut object = match self.get_state_object(address) {
            Some(object) => object,
            None if create => StateObject::fresh(),
            None => return,
        };
        f(&mut object);
        self.journal.objects.insert(address, object);
    }

    // --- Checkpoints ---

    /// Opens a checkpoint covering objects, logs, and refunds.
    pub fn snapshot(&mut self) -> Checkpoint {
        self.checkpoints.push(self.journal.clone());
        Checkpoint(self.checkpoints.len() - 1)
    }

    /// Rewinds to `checkpoint`, discarding it and everything after it.
    pub fn revert_to_snapshot(&mut self, checkpoint: Checkpoint) {
        assert!(
            checkpoint.0 < self.checkpoints.len(),
            "revert to unknown checkpoint"
        );
        self.checkpoints.truncate(checkpoint.0 + 1);
        if let Some(journal) = self.checkpoints.pop() {
            self.journal = journal;
        }
    }

    // --- Getters ---

    /// The account for `address`, if it exists and is not deleted.
    pub fn get_account(&self, address: Address) -> Option<Account> {
        self.get_state_object(address).map(|object| object.account)
    }

    /// The nonce of `address` (zero when absent).
    pub fn get_nonce(&self, address: Address) -> u64 {
        self.get_state_object(address)
            .map(|object| object.account.nonce)
            .unwrap_or(0)
    }

    /// The balance of `address` (zero when absent).
    pub fn get_balance(&self, address: Address) -> U256 {
        self.get_state_object(address)
            .map(|object| object.account.balance)
            .unwrap_or_default()
    }

    /// The code hash of `address` (zero when absent).
    pub fn get_code_hash(&self, address: Address) -> B256 {
        self.get_state_object(address)
            .map(|object| object.account.code_hash)
            .unwrap_or_default()
    }

    /// The code of `address`, read through a small per-transaction cache.
    pub fn get_code(&mut self, address: Address) -> Option<Bytes> {
        let object = self.get_state_object(address)?;
        if object.dirty_code {
            return object.code;
        }
        if let Some(code) = self.code_cache.get(&address) {
            return Some(code.clone());
        }
        let code = self.snapshot.view_code(object.account.code_hash)?;
        self.code_cache.insert(address, code.clone());
        Some(code)
    }

    /// The size of the code of `address`.
    pub fn get_code_size(&mut self, address: Address) -> usize {
        self.get_code(address).map(|code| code.len()).unwrap_or(0)
    }

    /// The current value of a storage slot: the journal first, then the
    /// committed state.
    pub fn get_state(&self, address: Address, key: B256) -> B256 {
        let Some(object) = self.get_state_object(address) else {
            return B256::ZERO;
        };
        let hashed = keccak256(key);
        if let Some(slot) = object.storage.get(&hashed) {
            return slot.value.unwrap_or_default();
        }
        self.snapshot
            .view_storage(object.account.storage_root, key)
    }

    /// The value a storage slot had when the snapshot was taken.
    pub fn get_committed_state(&self, address: Address, key: B256) -> B256 {
        let Some(object) = self.get_state_object(address) else {
            return B256::ZERO;
        };
        self.snapshot
            .view_storage(object.account.storage_root, key)
    }

    /// True if the account exists (journal or snapshot) and is not
    /// deleted.
    pub fn exist(&self, address: Address) -> bool {
        self.get_state_object(address).is_some()
    }

    /// True if the account is absent or empty per EIP-161.
    pub fn empty(&self, address: Address) -> bool {
        self.get_state_object(address)
            .map(|object| object.is_empty())
            .unwrap_or(true)
    }

    // --- Mutators ---

    /// Sets the nonce.
    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.upsert(address, true, |object| object.account.nonce = nonce);
    }

    /// Increments the nonce by one.
    pub fn incr_nonce(&mut self, address: Address) {
        self.upsert(address, true, |object| object.account.nonce += 1);
    }

    /// Adds to the balance, materializing the account if needed.
    pub fn add_balance(&mut self, address: Address, amount: U256) {
        self.upsert(address, true, |object| {
            object.account.balance = object.account.balance.saturating_add(amount);
        });
    }

    /// Subtracts from the balance; fails without touching state if the
    /// result would go negative.
    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), ExecutionError> {
        if amount.is_zero() {
            return Ok(());
        }
        if self.get_balance(address) < amount {
            return Err(ExecutionError::NotEnoughFunds);
        }
        self.upsert(address, true, |object| {
            object.account.balance -= amount;
        });
        Ok(())
    }

    /// Sets the balance.
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.upsert(address, true, |object| object.account.balance = balance);
    }

    /// Credits a sealing reward, reviving a suicided beneficiary as a
    /// fresh account holding only the reward.
    pub fn add_sealing_reward(&mut self, address: Address, reward: U256) {
        self.upsert(address, true, |object| {
            if object.suicided {
                *object = StateObject::fresh();
                object.account.balance = reward;
            } else {
                object.account.balance = object.account.balance.saturating_add(reward);
            }
        });
    }

    /// Journals a storage write. An all-zero value stores a tombstone.
    pub fn set_state(&mut self, address: Address, key: B256, value: B256) {
        self.upsert(address, true, |object| {
            let hashed = keccak256(key);
            let pending = if value.is_zero() { None } else { Some(value) };
            object.storage.insert(
                hashed,
                StorageSlot {
                    key,
                    value: pending,
                },
            );
        });
    }

    /// Sets the code, updating the code hash and marking it for flush.
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        self.upsert(address, true, |object| {
            object.account.code_hash = keccak256(&code);
            object.dirty_code = true;
            object.code = Some(code);
        });
    }

    /// Replaces the account with a fresh one, carrying over only the
    /// previous balance.
    pub fn create_account(&mut self, address: Address) {
        let mut object = StateObject::fresh();
        if let Some(prev) = self.get_state_object(address) {
            object.account.balance = prev.account.balance;
        }
        self.journal.objects.insert(address, object);
    }

    /// Adds the account to the journal without changing any observable
    /// field, so the clean-up sweep sees it.
    pub fn touch_account(&mut self, address: Address) {
        self.upsert(address, true, |_| {});
    }

    /// Marks the account suicided and zeroes its balance. Returns false
    /// if the account is absent or already suicided.
    pub fn suicide(&mut self, address: Address) -> bool {
        let Some(mut object) = self.get_state_object(address) else {
            return false;
        };
        let first = !object.suicided;
        if first {
            object.suicided = true;
            object.account.balance = U256::ZERO;
        }
        self.journal.objects.insert(address, object);
        first
    }

    /// True if the account has suicided during this transaction.
    pub fn has_suicided(&self, address: Address) -> bool {
        self.get_state_object(address)
            .map(|object| object.suicided)
            .unwrap_or(false)
    }

    // --- Logs and refunds ---

    /// Appends a log to the journal.
    pub fn emit_log(&mut self, address: Address, topics: Vec<B256>, data: Bytes) {
        self.journal.logs.push_back(Log {
            address,
            topics,
            data,
        });
    }

    /// The logs emitted so far.
    pub fn logs(&self) -> Vec<Log> {
        self.journal.logs.iter().cloned().collect()
    }

    /// Drains the emitted logs.
    pub fn take_logs(&mut self) -> Vec<Log> {
        let logs = self.logs();
        self.journal.logs = Vector::new();
        logs
    }

    /// Accrues a gas refund.
    pub fn add_refund(&mut self, gas: u64) {
        self.journal.refund = self.journal.refund.saturating_add(gas);
    }

    /// Removes part of the accrued refund.
    pub fn sub_refund(&mut self, gas: u64) {
        self.journal.refund = self.journal.refund.saturating_sub(gas);
    }

    /// The refund accrued so far.
    pub fn get_refund(&self) -> u64 {
        self.journal.refund
    }

    // --- Commit pipeline ---

    /// Marks suicided accounts (and, when `delete_empty`, empty touched
    /// accounts) for removal, and clears the refund counter.
    pub fn clean_deleted(&mut self, delete_empty: bool) {
        let doomed: Vec<Address> = self
            .journal
            .objects
            .iter()
            .filter(|(_, object)| object.suicided || (delete_empty && object.is_empty()))
            .map(|(address, _)| *address)
            .collect();

        for address in doomed {
            if let Some(mut object) = self.journal.objects.get(&address).cloned() {
                object.deleted = true;
                self.journal.objects.insert(address, object);
            }
        }

        self.journal.refund = 0;
    }

    /// Serializes the journal into commit diffs, one per touched address
    /// in ascending address order.
    pub fn commit(&self) -> Vec<Object> {
        self.journal
            .objects
            .iter()
            .map(|(address, object)| Object {
                address: *address,
                nonce: object.account.nonce,
                balance: object.account.balance,
                storage_root: object.account.storage_root,
                code_hash: object.account.code_hash,
                deleted: object.deleted,
                dirty_code: object.dirty_code,
                code: object.code.clone(),
                storage: object
                    .storage
                    .values()
                    .map(|slot| StorageEntry {
                        key: slot.key,
                        value: slot.value,
                    })
                    .collect(),
            })
            .collect()
    }
}
