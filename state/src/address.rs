//! Contract address derivation.

use alloy_primitives::{keccak256, Address, B256};
use alloy_rlp::Encodable;

/// Derives the address of a contract created with CREATE:
/// `Keccak256(RLP([sender, nonce]))[12..]`.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut payload = Vec::with_capacity(32);
    sender.encode(&mut payload);
    nonce.encode(&mut payload);

    let mut out = Vec::with_capacity(payload.len() + 2);
    alloy_rlp::Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);

    Address::from_slice(&keccak256(&out)[12..])
}

/// Derives the address of a contract created with CREATE2:
/// `Keccak256(0xff || sender || salt || Keccak256(init_code))[12..]`.
pub fn create2_address(sender: Address, salt: B256, init_code: &[u8]) -> Address {
    let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
    buf.push(0xff);
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(salt.as_slice());
    buf.extend_from_slice(keccak256(init_code).as_slice());

    Address::from_slice(&keccak256(&buf)[12..])
}
