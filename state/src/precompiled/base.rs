//! The original four precompiles: ECRECOVER, SHA-256, RIPEMD-160, and
//! the identity function.

use alloy_primitives::{b256, keccak256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::{base_gas_calc, left_pad, right_pad, Precompile, PrecompileError};
use crate::revision::Revision;

pub(crate) static ECRECOVER: EcRecover = EcRecover;
pub(crate) static SHA256: Sha256Hash = Sha256Hash;
pub(crate) static RIPEMD160: Ripemd160Hash = Ripemd160Hash;
pub(crate) static IDENTITY: Identity = Identity;

/// Address 1: ECDSA public key recovery.
pub(crate) struct EcRecover;

fn secp256k1_order() -> U256 {
    U256::from_be_bytes(
        b256!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141").0,
    )
}

/// Scalars must lie in `[1, n)`.
fn valid_scalar(bytes: &[u8]) -> bool {
    let scalar = U256::from_be_slice(bytes);
    !scalar.is_zero() && scalar < secp256k1_order()
}

impl Precompile for EcRecover {
    fn gas(&self, _input: &[u8], _rev: Revision) -> u64 {
        3000
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        // Invalid input is not an error: the contract returns empty
        // output and the gas stays charged.
        let input = right_pad::<128>(input);

        if input[32..63].iter().any(|b| *b != 0) {
            return Ok(Vec::new());
        }
        let v = input[63];
        if v != 27 && v != 28 {
            return Ok(Vec::new());
        }
        if !valid_scalar(&input[64..96]) || !valid_scalar(&input[96..128]) {
            return Ok(Vec::new());
        }

        let Ok(mut signature) = Signature::from_slice(&input[64..128]) else {
            return Ok(Vec::new());
        };
        let Some(mut recovery_id) = RecoveryId::from_byte(v - 27) else {
            return Ok(Vec::new());
        };
        // The precompile accepts high-s signatures; normalize for the
        // recovery routine and flip the parity bit to compensate.
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
                .unwrap_or(recovery_id);
        }

        let Ok(key) = VerifyingKey::recover_from_prehash(&input[..32], &signature, recovery_id)
        else {
            return Ok(Vec::new());
        };

        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        Ok(left_pad(&hash[12..], 32))
    }
}

/// Address 2: SHA-256.
pub(crate) struct Sha256Hash;

impl Precompile for Sha256Hash {
    fn gas(&self, input: &[u8], _rev: Revision) -> u64 {
        base_gas_calc(input, 60, 12)
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        Ok(Sha256::digest(input).to_vec())
    }
}

/// Address 3: RIPEMD-160, left-padded to 32 bytes.
pub(crate) struct Ripemd160Hash;

impl Precompile for Ripemd160Hash {
    fn gas(&self, input: &[u8], _rev: Revision) -> u64 {
        base_gas_calc(input, 600, 120)
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        let digest = Ripemd160::digest(input);
        Ok(left_pad(&digest, 32))
    }
}

/// Address 4: the identity function.
pub(crate) struct Identity;

impl Precompile for Identity {
    fn gas(&self, input: &[u8], _rev: Revision) -> u64 {
        base_gas_calc(input, 15, 3)
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, PrecompileError> {
        Ok(input.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty_input() {
        assert_eq!(
            hex::encode(Sha256Hash.run(&[]).unwrap()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(Sha256Hash.gas(&[], Revision::Istanbul), 60);
        assert_eq!(Sha256Hash.gas(&[0; 33], Revision::Istanbul), 60 + 24);
    }

    #[test]
    fn ripemd160_empty_input() {
        assert_eq!(
            hex::encode(Ripemd160Hash.run(&[]).unwrap()),
            "0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
        assert_eq!(Ripemd160Hash.gas(&[], Revision::Istanbul), 600);
    }

    #[test]
    fn identity_copies_input() {
        let input = b"arbitrary bytes".to_vec();
        assert_eq!(Identity.run(&input).unwrap(), input);
        assert_eq!(Identity.gas(&input, Revision::Istanbul), 15 + 3);
    }

    #[test]
    fn ecrecover_known_signature() {
        let input = hex::decode(concat!(
            "456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3",
            "000000000000000000000000000000000000000000000000000000000000001c",
            "9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608",
            "4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada"
        ))
        .unwrap();
        assert_eq!(
            hex::encode(EcRecover.run(&input).unwrap()),
            "0000000000000000000000007156526fbd7a3c72969b54f64e42c10fbb768c8a"
        );
    }

    #[test]
    fn ecrecover_invalid_inputs_return_empty() {
        // Garbage v byte.
        let mut input = right_pad::<128>(&[]).to_vec();
        input[63] = 26;
        assert!(EcRecover.run(&input).unwrap().is_empty());

        // Non-zero padding inside the v word.
        let mut input = right_pad::<128>(&[]).to_vec();
        input[40] = 1;
        input[63] = 27;
        assert!(EcRecover.run(&input).unwrap().is_empty());

        // r out of range (zero).
        let mut input = vec![0u8; 128];
        input[63] = 27;
        input[127] = 1; // s = 1, r = 0
        assert!(EcRecover.run(&input).unwrap().is_empty());

        // Truncated input is padded, not rejected.
        assert!(EcRecover.run(&[0x01, 0x02]).unwrap().is_empty());
    }
}
