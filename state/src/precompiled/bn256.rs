//! Addresses 6..8: alt_bn128 point addition, scalar multiplication, and
//! the pairing check (EIP-196 / EIP-197), with Istanbul repricing
//! (EIP-1108).

use bn::{pairing_batch, AffineG1, AffineG2, Fq, Fq2, Fr, Group, Gt, G1, G2};

use super::{right_pad, Precompile, PrecompileError};
use crate::revision::Revision;

pub(crate) static BN256_ADD: Bn256Add = Bn256Add;
pub(crate) static BN256_MUL: Bn256Mul = Bn256Mul;
pub(crate) static BN256_PAIRING: Bn256Pairing = Bn256Pairing;

fn read_fq(bytes: &[u8]) -> Result<Fq, PrecompileError> {
    Fq::from_slice(bytes).map_err(|_| PrecompileError::InvalidOperand("field element"))
}

/// Reads a G1 point from two 32-byte coordinates; (0, 0) is the point at
/// infinity.
fn read_g1(bytes: &[u8]) -> Result<G1, PrecompileError> {
    let x = read_fq(&bytes[..32])?;
    let y = read_fq(&bytes[32..64])?;
    if x == Fq::zero() && y == Fq::zero() {
        return Ok(G1::zero());
    }
    AffineG1::new(x, y)
        .map(Into::into)
        .map_err(|_| PrecompileError::InvalidOperand("point not on curve"))
}

fn write_g1(point: G1) -> Result<Vec<u8>, PrecompileError> {
    let mut out = vec![0u8; 64];
    if let Some(affine) = AffineG1::from_jacobian(point) {
        affine
            .x()
            .to_big_endian(&mut out[..32])
            .map_err(|_| PrecompileError::InvalidOperand("coordinate"))?;
        affine
            .y()
            .to_big_endian(&mut out[32..])
            .map_err(|_| PrecompileError::InvalidOperand("coordinate"))?;
    }
    Ok(out)
}

/// Address 6: point addition.
pub(crate) struct Bn256Add;

impl Precompile for Bn256Add {
    fn gas(&self, _input: &[u8], rev: Revision) -> u64 {
        if rev >= Revision::Istanbul {
            150
        } else {
            500
        }
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        let input = right_pad::<128>(input);
        let p = read_g1(&input[..64])?;
        let q = read_g1(&input[64..128])?;
        write_g1(p + q)
    }
}

/// Address 7: scalar multiplication.
pub(crate) struct Bn256Mul;

impl Precompile for Bn256Mul {
    fn gas(&self, _input: &[u8], rev: Revision) -> u64 {
        if rev >= Revision::Istanbul {
            6000
        } else {
            40_000
        }
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        let input = right_pad::<96>(input);
        let p = read_g1(&input[..64])?;
        let scalar = Fr::from_slice(&input[64..96])
            .map_err(|_| PrecompileError::InvalidOperand("scalar"))?;
        write_g1(p * scalar)
    }
}

/// Address 8: the pairing product check.
pub(crate) struct Bn256Pairing;

impl Precompile for Bn256Pairing {
    fn gas(&self, input: &[u8], rev: Revision) -> u64 {
        let pairs = (input.len() / 192) as u64;
        if rev >= Revision::Istanbul {
            45_000 + pairs * 34_000
        } else {
            100_000 + pairs * 80_000
        }
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        if input.len() % 192 != 0 {
            return Err(PrecompileError::InvalidInput(
                "pairing input must be a multiple of 192 bytes",
            ));
        }

        let mut pairs = Vec::with_capacity(input.len() / 192);
        for chunk in input.chunks_exact(192) {
            let a = read_g1(&chunk[..64])?;

            // G2 coordinates arrive imaginary-part first.
            let x_i = read_fq(&chunk[64..96])?;
            let x_r = read_fq(&chunk[96..128])?;
            let y_i = read_fq(&chunk[128..160])?;
            let y_r = read_fq(&chunk[160..192])?;
            let b = if x_i == Fq::zero()
                && x_r == Fq::zero()
                && y_i == Fq::zero()
                && y_r == Fq::zero()
            {
                G2::zero()
            } else {
                AffineG2::new(Fq2::new(x_r, x_i), Fq2::new(y_r, y_i))
                    .map(Into::into)
                    .map_err(|_| PrecompileError::InvalidOperand("point not in G2"))?
            };

            // A pair with a point at infinity contributes the identity.
            if a.is_zero() || b.is_zero() {
                continue;
            }
            pairs.push((a, b));
        }

        let ok = pairs.is_empty() || pairing_batch(&pairs) == Gt::one();
        let mut out = vec![0u8; 32];
        out[31] = ok as u8;
        Ok(out)
    }
}
