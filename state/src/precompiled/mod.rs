//! Precompiled contracts.
//!
//! Addresses 1..9 dispatch to native implementations instead of EVM
//! bytecode. Availability is fork-gated: 5..8 exist from Byzantium, 9
//! from Istanbul. Gas is charged before the body runs; a body error
//! burns all gas and returns nothing.

mod base;
mod blake2f;
mod bn256;
mod modexp;

use alloy_primitives::Address;
use thiserror::Error;

use crate::revision::Revision;
use crate::runtime::{ExecutionError, ExecutionResult};

/// Error type for precompile bodies.
#[derive(Debug, Error)]
pub enum PrecompileError {
    /// The input failed validation
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// An operand was not a valid field element or curve point
    #[error("invalid operand: {0}")]
    InvalidOperand(&'static str),
}

/// One precompiled contract: a gas formula plus a body.
pub(crate) trait Precompile {
    /// The gas charged for `input` under revision `rev`.
    fn gas(&self, input: &[u8], rev: Revision) -> u64;
    /// Runs the contract body.
    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError>;
}

fn contract_at(address: Address) -> Option<&'static dyn Precompile> {
    if address.as_slice()[..19].iter().any(|b| *b != 0) {
        return None;
    }
    match address.as_slice()[19] {
        1 => Some(&base::ECRECOVER),
        2 => Some(&base::SHA256),
        3 => Some(&base::RIPEMD160),
        4 => Some(&base::IDENTITY),
        5 => Some(&modexp::MODEXP),
        6 => Some(&bn256::BN256_ADD),
        7 => Some(&bn256::BN256_MUL),
        8 => Some(&bn256::BN256_PAIRING),
        9 => Some(&blake2f::BLAKE2F),
        _ => None,
    }
}

/// True if `address` dispatches to a precompile under `rev`.
pub fn is_precompiled(address: Address, rev: Revision) -> bool {
    if contract_at(address).is_none() {
        return false;
    }
    match address.as_slice()[19] {
        5..=8 => rev >= Revision::Byzantium,
        9 => rev >= Revision::Istanbul,
        _ => true,
    }
}

/// Runs the precompile at `address`.
///
/// Short gas yields `OutOfGas` with zero gas left and no output; a body
/// error likewise burns everything.
pub fn run(address: Address, input: &[u8], gas: u64, rev: Revision) -> ExecutionResult {
    let contract = match contract_at(address) {
        Some(contract) => contract,
        // Callers gate on `is_precompiled`; an unknown address behaves
        // like empty code.
        None => return ExecutionResult::success(gas),
    };

    let cost = contract.gas(input, rev);
    if gas < cost {
        return ExecutionResult::error(ExecutionError::OutOfGas);
    }

    match contract.run(input) {
        Ok(output) => ExecutionResult {
            return_value: output.into(),
            gas_left: gas - cost,
            create_address: None,
            err: None,
        },
        Err(_) => ExecutionResult::error(ExecutionError::PrecompileFailed),
    }
}

/// Zero-pads (or truncates) `input` on the right to exactly `N` bytes.
pub(crate) fn right_pad<const N: usize>(input: &[u8]) -> [u8; N] {
    let mut padded = [0u8; N];
    let n = input.len().min(N);
    padded[..n].copy_from_slice(&input[..n]);
    padded
}

/// Zero-pads `buf` on the left to `n` bytes.
pub(crate) fn left_pad(buf: &[u8], n: usize) -> Vec<u8> {
    if buf.len() >= n {
        return buf.to_vec();
    }
    let mut out = vec![0u8; n];
    out[n - buf.len()..].copy_from_slice(buf);
    out
}

/// The `base + word * ceil(len / 32)` gas shape shared by the hash
/// precompiles.
pub(crate) fn base_gas_calc(input: &[u8], base: u64, word: u64) -> u64 {
    base + (input.len() as u64 + 31) / 32 * word
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn precompile_address(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from(bytes)
    }

    #[test]
    fn availability_is_fork_gated() {
        for n in 1..=4 {
            assert!(is_precompiled(precompile_address(n), Revision::Frontier));
        }
        for n in 5..=8 {
            assert!(!is_precompiled(precompile_address(n), Revision::SpuriousDragon));
            assert!(is_precompiled(precompile_address(n), Revision::Byzantium));
        }
        assert!(!is_precompiled(precompile_address(9), Revision::Petersburg));
        assert!(is_precompiled(precompile_address(9), Revision::Istanbul));

        assert!(!is_precompiled(precompile_address(0), Revision::Istanbul));
        assert!(!is_precompiled(precompile_address(10), Revision::Istanbul));
        assert!(!is_precompiled(
            address!("0100000000000000000000000000000000000001"),
            Revision::Istanbul
        ));
    }

    #[test]
    fn short_gas_burns_everything() {
        // Identity costs 15 + 3 per word.
        let result = run(precompile_address(4), b"x", 17, Revision::Istanbul);
        assert_eq!(result.err, Some(ExecutionError::OutOfGas));
        assert_eq!(result.gas_left, 0);
        assert!(result.return_value.is_empty());
    }

    #[test]
    fn gas_is_deducted_from_the_frame() {
        let result = run(precompile_address(4), b"x", 100, Revision::Istanbul);
        assert!(result.succeeded());
        assert_eq!(result.gas_left, 100 - 18);
        assert_eq!(result.return_value.as_ref(), b"x");
    }

    #[test]
    fn padding_helpers() {
        assert_eq!(right_pad::<4>(&[1, 2]), [1, 2, 0, 0]);
        assert_eq!(right_pad::<2>(&[1, 2, 3]), [1, 2]);
        assert_eq!(left_pad(&[1, 2], 4), vec![0, 0, 1, 2]);
        assert_eq!(left_pad(&[1, 2, 3], 2), vec![1, 2, 3]);
    }
}
