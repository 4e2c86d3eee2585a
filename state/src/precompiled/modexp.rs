//! Address 5: modular exponentiation (EIP-198).

use num_bigint::BigUint;

use super::{left_pad, Precompile, PrecompileError};
use crate::revision::Revision;

pub(crate) static MODEXP: ModExp = ModExp;

/// Arbitrary-precision `base^exp % modulus` with the EIP-198 gas
/// formula.
pub(crate) struct ModExp;

/// Reads the 32-byte big-endian length word at `offset`, saturating to
/// `u64::MAX` when it does not fit.
fn read_length(input: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 32];
    if offset < input.len() {
        let available = (input.len() - offset).min(32);
        word[..available].copy_from_slice(&input[offset..offset + available]);
    }
    if word[..24].iter().any(|b| *b != 0) {
        return u64::MAX;
    }
    u64::from_be_bytes(word[24..32].try_into().unwrap_or([0xff; 8]))
}

/// Reads `len` bytes at `offset`, zero-extending past the end of input.
fn read_padded(input: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if offset < input.len() {
        let available = (input.len() - offset).min(len);
        out[..available].copy_from_slice(&input[offset..offset + available]);
    }
    out
}

/// The EIP-198 multiplication complexity curve.
fn mult_complexity(x: u64) -> u64 {
    if x <= 64 {
        x.saturating_mul(x)
    } else if x <= 1024 {
        x.saturating_mul(x) / 4 + 96 * x - 3072
    } else {
        let x2 = x.saturating_mul(x);
        (x2 / 16)
            .saturating_add(x.saturating_mul(480))
            .saturating_sub(199_680)
    }
}

fn bit_length(bytes: &[u8]) -> u64 {
    for (i, b) in bytes.iter().enumerate() {
        if *b != 0 {
            return (bytes.len() - i - 1) as u64 * 8 + (8 - b.leading_zeros() as u64);
        }
    }
    0
}

/// `adjusted_exponent_length` from EIP-198: short exponents count by
/// their highest set bit, long ones by their byte length plus the head
/// word's highest bit.
fn adjusted_exponent_length(input: &[u8], base_len: u64, exp_len: u64) -> u64 {
    let head_offset = 96u64.saturating_add(base_len);
    let head_len = exp_len.min(32) as usize;
    let head = read_padded(
        input,
        head_offset.min(usize::MAX as u64) as usize,
        head_len,
    );
    let head_bits = bit_length(&head);

    if exp_len <= 32 {
        head_bits.saturating_sub(1)
    } else {
        (exp_len - 32)
            .saturating_mul(8)
            .saturating_add(head_bits.saturating_sub(1))
    }
}

impl Precompile for ModExp {
    fn gas(&self, input: &[u8], _rev: Revision) -> u64 {
        let base_len = read_length(input, 0);
        let exp_len = read_length(input, 32);
        let mod_len = read_length(input, 64);

        let mult = mult_complexity(base_len.max(mod_len));
        let adj = adjusted_exponent_length(input, base_len, exp_len).max(1);
        mult.saturating_mul(adj) / 20
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        let base_len = usize::try_from(read_length(input, 0))
            .map_err(|_| PrecompileError::InvalidInput("base length overflow"))?;
        let exp_len = usize::try_from(read_length(input, 32))
            .map_err(|_| PrecompileError::InvalidInput("exponent length overflow"))?;
        let mod_len = usize::try_from(read_length(input, 64))
            .map_err(|_| PrecompileError::InvalidInput("modulus length overflow"))?;

        if base_len == 0 && mod_len == 0 {
            return Ok(Vec::new());
        }

        let base = BigUint::from_bytes_be(&read_padded(input, 96, base_len));
        let exponent = BigUint::from_bytes_be(&read_padded(input, 96 + base_len, exp_len));
        let modulus =
            BigUint::from_bytes_be(&read_padded(input, 96 + base_len + exp_len, mod_len));

        if modulus == BigUint::default() {
            return Ok(vec![0u8; mod_len]);
        }

        let result = base.modpow(&exponent, &modulus);
        Ok(left_pad(&result.to_bytes_be(), mod_len))
    }
}
