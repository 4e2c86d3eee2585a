//! End-to-end scenarios: genesis state built through the journal,
//! transactions driven through the transition, results folded back into
//! the trie. Mock runtimes stand in for the EVM.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{address, b256, keccak256, Address, Bytes, B256, U256};

use eth_state_transition_memorydb::MemoryDB;
use eth_state_transition_trie::{Snapshot, State, EMPTY_ROOT_HASH};

use crate::address::create_address;
use crate::revision::Revision;
use crate::runtime::{Contract, ExecutionError, ExecutionResult, Host, Runtime, TxContext};
use crate::transition::{Transaction, Transition, TransitionError};
use crate::txn::Txn;

const ETHER: u64 = 1_000_000_000_000_000_000;

const ADDR_A: Address = address!("a000000000000000000000000000000000000001");
const ADDR_B: Address = address!("b000000000000000000000000000000000000002");
const COINBASE: Address = address!("c000000000000000000000000000000000000009");

#[derive(Default, Clone)]
struct Genesis {
    nonce: u64,
    balance: U256,
    code: Bytes,
    storage: HashMap<B256, B256>,
}

impl Genesis {
    fn funded(balance: u64) -> Self {
        Self {
            balance: U256::from(balance),
            ..Default::default()
        }
    }
}

/// Builds a pre-state the way a genesis loader would: through the
/// journal, committed into the trie.
fn build_state(
    allocs: &[(Address, Genesis)],
) -> (State<MemoryDB>, Snapshot<MemoryDB>, B256) {
    let state = State::new(MemoryDB::new());
    let snapshot = state.new_snapshot();

    let mut txn = Txn::new(snapshot.clone());
    for (address, alloc) in allocs {
        txn.create_account(*address);
        txn.set_nonce(*address, alloc.nonce);
        txn.set_balance(*address, alloc.balance);
        if !alloc.code.is_empty() {
            txn.set_code(*address, alloc.code.clone());
        }
        for (key, value) in &alloc.storage {
            txn.set_state(*address, *key, *value);
        }
    }
    let objects = txn.commit();
    let (snapshot, root) = snapshot.commit(&objects).unwrap();
    (state, snapshot, root)
}

fn test_context() -> TxContext {
    TxContext {
        coinbase: COINBASE,
        number: 1,
        timestamp: 1_600_000_000,
        gas_limit: 10_000_000,
        chain_id: 1,
        ..Default::default()
    }
}

/// A runtime for transactions that never reach code execution.
fn unreachable_runtime() -> Arc<dyn Runtime> {
    Arc::new(
        |_contract: &Contract, _host: &mut dyn Host, _rev: Revision| -> ExecutionResult {
            panic!("runtime must not be invoked")
        },
    )
}

fn transfer_tx(from: Address, to: Address, value: u64, nonce: u64, gas: u64) -> Transaction {
    Transaction {
        from,
        to: Some(to),
        nonce,
        value: U256::from(value),
        gas,
        gas_price: U256::from(1),
        input: Bytes::new(),
    }
}

#[test]
fn s1_simple_value_transfer() {
    let (_state, snapshot, _) =
        build_state(&[(ADDR_A, Genesis::funded(ETHER))]);

    let mut transition = Transition::new(
        Revision::Byzantium,
        test_context(),
        snapshot.clone(),
        unreachable_runtime(),
    );

    let value = 100_000_000_000_000_000u64; // 10^17
    let result = transition
        .write(&transfer_tx(ADDR_A, ADDR_B, value, 0, 21_000))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.gas_used, 21_000);
    assert!(result.logs.is_empty());
    assert!(result.contract_address.is_none());

    let objects = transition.commit();
    let (snapshot, _) = snapshot.commit(&objects).unwrap();

    let a = snapshot.get_account(ADDR_A).unwrap().expect("sender");
    assert_eq!(a.balance, U256::from(ETHER - value - 21_000));
    assert_eq!(a.nonce, 1);

    let b = snapshot.get_account(ADDR_B).unwrap().expect("recipient");
    assert_eq!(b.balance, U256::from(value));

    let miner = snapshot.get_account(COINBASE).unwrap().expect("coinbase");
    assert_eq!(miner.balance, U256::from(21_000));
}

#[test]
fn s2_contract_creation_stores_code() {
    let (_state, snapshot, _) = build_state(&[(
        ADDR_A,
        Genesis {
            nonce: 5,
            balance: U256::from(ETHER),
            ..Default::default()
        },
    )]);

    const INIT_COST: u64 = 1000;
    let deployed: &[u8] = &[0x60, 0x01];
    let runtime = Arc::new(
        move |contract: &Contract, _host: &mut dyn Host, _rev: Revision| -> ExecutionResult {
            ExecutionResult {
                return_value: Bytes::from_static(&[0x60, 0x01]),
                gas_left: contract.gas - INIT_COST,
                create_address: None,
                err: None,
            }
        },
    );

    let mut transition =
        Transition::new(Revision::Byzantium, test_context(), snapshot.clone(), runtime);

    let tx = Transaction {
        from: ADDR_A,
        to: None,
        nonce: 5,
        value: U256::ZERO,
        gas: 100_000,
        gas_price: U256::from(1),
        input: Bytes::from_static(&[0x01]), // one non-zero byte of init code
    };
    let result = transition.write(&tx).unwrap();

    let expected_address = create_address(ADDR_A, 5);
    assert!(result.success);
    assert_eq!(result.contract_address, Some(expected_address));
    // 53000 base + 68 for the init byte + the init run + 200 per
    // deployed byte.
    assert_eq!(result.gas_used, 53_000 + 68 + INIT_COST + 2 * 200);

    let objects = transition.commit();
    let (snapshot, _) = snapshot.commit(&objects).unwrap();

    let account = snapshot
        .get_account(expected_address)
        .unwrap()
        .expect("created contract");
    assert_eq!(account.code_hash, keccak256(deployed));
    assert_eq!(account.nonce, 1); // stamped at creation since Tangerine Whistle
    assert_eq!(
        snapshot.get_code(account.code_hash).unwrap(),
        Some(deployed.to_vec())
    );

    let a = snapshot.get_account(ADDR_A).unwrap().expect("sender");
    assert_eq!(a.nonce, 6);
}

#[test]
fn s3_create_collision_burns_all_gas() {
    let target = create_address(ADDR_A, 0);
    let (_state, snapshot, _) = build_state(&[
        (ADDR_A, Genesis::funded(ETHER)),
        (
            target,
            Genesis {
                code: Bytes::from_static(&[0xab, 0xcd]),
                ..Default::default()
            },
        ),
    ]);

    let mut transition = Transition::new(
        Revision::Byzantium,
        test_context(),
        snapshot.clone(),
        unreachable_runtime(),
    );

    let tx = Transaction {
        from: ADDR_A,
        to: None,
        nonce: 0,
        value: U256::ZERO,
        gas: 80_000,
        gas_price: U256::from(1),
        input: Bytes::new(),
    };
    let result = transition.write(&tx).unwrap();

    assert!(!result.success);
    assert_eq!(result.gas_used, tx.gas);

    let objects = transition.commit();
    let (snapshot, _) = snapshot.commit(&objects).unwrap();

    // The old code is untouched and the sender paid for the whole limit.
    let account = snapshot.get_account(target).unwrap().expect("target");
    assert_eq!(account.code_hash, keccak256([0xab, 0xcd]));
    let a = snapshot.get_account(ADDR_A).unwrap().expect("sender");
    assert_eq!(a.balance, U256::from(ETHER - tx.gas));
    assert_eq!(a.nonce, 1);
}

#[test]
fn s4_nested_call_revert_discards_inner_state() {
    let contract_c = address!("cc00000000000000000000000000000000000001");
    let contract_d = address!("dd00000000000000000000000000000000000002");
    let slot = b256!("00000000000000000000000000000000000000000000000000000000000000f0");

    let (_state, snapshot, _) = build_state(&[
        (ADDR_A, Genesis::funded(ETHER)),
        (
            contract_c,
            Genesis {
                code: Bytes::from_static(&[0xc0]),
                ..Default::default()
            },
        ),
        (
            contract_d,
            Genesis {
                code: Bytes::from_static(&[0xd0]),
                ..Default::default()
            },
        ),
    ]);

    const INNER_GAS: u64 = 10_000;
    const D_COST: u64 = 3000;
    const C_COST: u64 = 500;

    let runtime = Arc::new(
        move |contract: &Contract, host: &mut dyn Host, _rev: Revision| -> ExecutionResult {
            if contract.address == contract_c {
                let code = host.get_code(contract_d).unwrap_or_default();
                let inner = Contract::call(
                    contract.depth + 1,
                    contract_c,
                    contract_d,
                    U256::ZERO,
                    INNER_GAS,
                    code,
                    Bytes::new(),
                );
                let inner_result = host.callx(inner);
                assert!(inner_result.reverted());
                // D's storage write must be gone already.
                assert_eq!(host.get_storage(contract_d, slot), B256::ZERO);

                let spent = INNER_GAS - inner_result.gas_left;
                ExecutionResult::success(contract.gas - C_COST - spent)
            } else {
                // D writes a slot, then reverts.
                host.set_storage(
                    contract.address,
                    slot,
                    b256!("00000000000000000000000000000000000000000000000000000000000000ff"),
                );
                ExecutionResult {
                    return_value: Bytes::new(),
                    gas_left: contract.gas - D_COST,
                    create_address: None,
                    err: Some(ExecutionError::ExecutionReverted),
                }
            }
        },
    );

    let mut transition =
        Transition::new(Revision::Byzantium, test_context(), snapshot.clone(), runtime);

    let result = transition
        .write(&transfer_tx(ADDR_A, contract_c, 0, 0, 100_000))
        .unwrap();

    // C absorbed the revert, so the transaction succeeds, but D's gas
    // stays spent.
    assert!(result.success);
    assert_eq!(result.gas_used, 21_000 + C_COST + D_COST);

    let objects = transition.commit();
    let (snapshot, _) = snapshot.commit(&objects).unwrap();

    let c = snapshot.get_account(contract_c).unwrap().expect("C");
    assert_eq!(c.storage_root, EMPTY_ROOT_HASH);
    let d = snapshot.get_account(contract_d).unwrap().expect("D");
    assert_eq!(d.storage_root, EMPTY_ROOT_HASH);
}

#[test]
fn s5_selfdestruct_transfers_balance_and_refunds_once() {
    let contract_x = address!("ee00000000000000000000000000000000000001");
    let beneficiary = address!("ee00000000000000000000000000000000000002");

    let (_state, snapshot, _) = build_state(&[
        (ADDR_A, Genesis::funded(ETHER)),
        (
            contract_x,
            Genesis {
                balance: U256::from(5),
                code: Bytes::from_static(&[0xfe]),
                ..Default::default()
            },
        ),
    ]);

    const X_COST: u64 = 100;
    let runtime = Arc::new(
        move |contract: &Contract, host: &mut dyn Host, _rev: Revision| -> ExecutionResult {
            // The second call must not add a second refund.
            host.selfdestruct(contract.address, beneficiary);
            host.selfdestruct(contract.address, beneficiary);
            ExecutionResult::success(contract.gas - X_COST)
        },
    );

    let mut transition =
        Transition::new(Revision::Byzantium, test_context(), snapshot.clone(), runtime);

    let result = transition
        .write(&transfer_tx(ADDR_A, contract_x, 0, 0, 100_000))
        .unwrap();
    assert!(result.success);

    // 21100 gas before refunds; the 24000 refund caps at half of it.
    let pre_refund = 21_000 + X_COST;
    assert_eq!(result.gas_used, pre_refund - pre_refund / 2);

    let objects = transition.commit();
    let (snapshot, _) = snapshot.commit(&objects).unwrap();

    assert!(snapshot.get_account(contract_x).unwrap().is_none());
    let b = snapshot.get_account(beneficiary).unwrap().expect("beneficiary");
    assert_eq!(b.balance, U256::from(5));
}

#[test]
fn s6_empty_account_pruning_is_fork_gated() {
    for (rev, survives) in [
        (Revision::Homestead, true),
        (Revision::SpuriousDragon, false),
        (Revision::Byzantium, false),
    ] {
        let empty_account = address!("e000000000000000000000000000000000000000");
        let (_state, snapshot, _) = build_state(&[
            (ADDR_A, Genesis::funded(ETHER)),
            (empty_account, Genesis::default()),
        ]);
        assert!(snapshot.get_account(empty_account).unwrap().is_some());

        let mut transition =
            Transition::new(rev, test_context(), snapshot.clone(), unreachable_runtime());

        let result = transition
            .write(&transfer_tx(ADDR_A, empty_account, 0, 0, 30_000))
            .unwrap();
        assert!(result.success);

        let objects = transition.commit();
        let (snapshot, _) = snapshot.commit(&objects).unwrap();
        assert_eq!(
            snapshot.get_account(empty_account).unwrap().is_some(),
            survives,
            "at {rev}"
        );
    }
}

#[test]
fn pre_check_failures_leave_no_mutation() {
    let (_state, snapshot, root) = build_state(&[(ADDR_A, Genesis::funded(ETHER))]);

    let mut transition = Transition::new(
        Revision::Byzantium,
        test_context(),
        snapshot.clone(),
        unreachable_runtime(),
    );

    // Wrong nonce.
    let result = transition.write(&transfer_tx(ADDR_A, ADDR_B, 1, 3, 21_000));
    assert_eq!(result.unwrap_err(), TransitionError::NonceIncorrect);

    // Gas limit below the intrinsic cost: the upfront deduction must be
    // rolled back.
    let result = transition.write(&transfer_tx(ADDR_A, ADDR_B, 1, 0, 20_000));
    assert_eq!(result.unwrap_err(), TransitionError::NotEnoughIntrinsicGas);

    // Unfunded sender cannot pay for gas.
    let result = transition.write(&transfer_tx(ADDR_B, ADDR_A, 0, 0, 21_000));
    assert_eq!(result.unwrap_err(), TransitionError::NotEnoughFundsForGas);

    assert_eq!(transition.txn().get_balance(ADDR_A), U256::from(ETHER));
    assert_eq!(transition.txn().get_nonce(ADDR_A), 0);

    // An untouched journal commits back to the same root.
    let objects = transition.commit();
    let (_, new_root) = snapshot.commit(&objects).unwrap();
    assert_eq!(new_root, root);
}

#[test]
fn commit_of_unchanged_txn_is_idempotent() {
    let (_state, snapshot, root) = build_state(&[
        (ADDR_A, Genesis::funded(ETHER)),
        (ADDR_B, Genesis::funded(42)),
    ]);

    let txn = Txn::new(snapshot.clone());
    let objects = txn.commit();
    assert!(objects.is_empty());
    let (_, new_root) = snapshot.commit(&objects).unwrap();
    assert_eq!(new_root, root);
}

#[test]
fn value_cannot_exceed_balance_after_gas() {
    let (_state, snapshot, _) = build_state(&[(ADDR_A, Genesis::funded(50_000))]);

    let mut transition = Transition::new(
        Revision::Byzantium,
        test_context(),
        snapshot,
        unreachable_runtime(),
    );

    // 50000 covers the 21000 upfront gas but not the value on top.
    let result = transition.write(&transfer_tx(ADDR_A, ADDR_B, 40_000, 0, 21_000));
    assert_eq!(result.unwrap_err(), TransitionError::NotEnoughFunds);
    assert_eq!(transition.txn().get_balance(ADDR_A), U256::from(50_000));
}

#[test]
fn storage_writes_survive_commit_roundtrip() {
    let contract = address!("ff00000000000000000000000000000000000003");
    let slot = b256!("0000000000000000000000000000000000000000000000000000000000000001");
    let value = b256!("0000000000000000000000000000000000000000000000000000000000000123");
    let seeded_slot =
        b256!("0000000000000000000000000000000000000000000000000000000000000002");
    let seeded_value =
        b256!("00000000000000000000000000000000000000000000000000000000000000aa");

    let (_state, snapshot, _) = build_state(&[
        (ADDR_A, Genesis::funded(ETHER)),
        (
            contract,
            Genesis {
                code: Bytes::from_static(&[0x55]),
                storage: HashMap::from([(seeded_slot, seeded_value)]),
                ..Default::default()
            },
        ),
    ]);

    let runtime = Arc::new(
        move |c: &Contract, host: &mut dyn Host, _rev: Revision| -> ExecutionResult {
            host.set_storage(c.address, slot, value);
            ExecutionResult::success(c.gas - 200)
        },
    );

    let mut transition =
        Transition::new(Revision::Byzantium, test_context(), snapshot.clone(), runtime);
    let result = transition
        .write(&transfer_tx(ADDR_A, contract, 0, 0, 60_000))
        .unwrap();
    assert!(result.success);

    let objects = transition.commit();
    let (snapshot, _) = snapshot.commit(&objects).unwrap();

    let account = snapshot.get_account(contract).unwrap().expect("contract");
    assert_eq!(snapshot.get_storage(account.storage_root, slot).unwrap(), value);
    // The slot seeded at genesis survives the incremental commit.
    assert_eq!(
        snapshot.get_storage(account.storage_root, seeded_slot).unwrap(),
        seeded_value
    );

    // A second transaction over the new snapshot reads it back through
    // the journal's committed path.
    let txn = Txn::new(snapshot);
    assert_eq!(txn.get_state(contract, slot), value);
    assert_eq!(txn.get_committed_state(contract, slot), value);
    assert_eq!(txn.get_state(contract, seeded_slot), seeded_value);
}
