//! State account structure and RLP codec.

use alloy_primitives::{keccak256, B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use alloy_trie::{EMPTY_ROOT_HASH, KECCAK_EMPTY};

/// The account record stored at each leaf of the state trie.
///
/// Encoded as an RLP list of exactly four elements, in order:
/// `[nonce, balance, storage_root, code_hash]`. The nonce is a canonical
/// unsigned integer, the balance a canonical big-endian integer, and the
/// roots 32-byte strings, matching the yellow-paper account encoding
/// bit for bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, RlpDecodable, RlpEncodable)]
pub struct Account {
    /// Number of transactions sent from this account (or creations made
    /// by it, for contracts).
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of this account's storage trie; [`EMPTY_ROOT_HASH`] when the
    /// account has no storage.
    pub storage_root: B256,
    /// Keccak-256 of the account's code; [`KECCAK_EMPTY`] for accounts
    /// without code.
    pub code_hash: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: EMPTY_ROOT_HASH,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl Account {
    /// Set custom nonce
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set custom balance
    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    /// Set custom storage root
    pub fn with_storage_root(mut self, storage_root: B256) -> Self {
        self.storage_root = storage_root;
        self
    }

    /// Set custom code hash
    pub fn with_code_hash(mut self, code_hash: B256) -> Self {
        self.code_hash = code_hash;
        self
    }

    /// True iff the account matches the EIP-161 emptiness rule: zero
    /// nonce, zero balance, no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == KECCAK_EMPTY
    }

    /// Keccak-256 of the RLP encoding, as committed into the trie.
    pub fn trie_hash(&self) -> B256 {
        keccak256(self.to_rlp())
    }

    /// Encode the account as RLP.
    pub fn to_rlp(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }

    /// Decode an account from RLP bytes.
    pub fn from_rlp(data: &[u8]) -> Result<Self, alloy_rlp::Error> {
        Account::decode(&mut &*data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_account_hash() {
        let account = Account::default();
        assert!(account.is_empty());
        assert_eq!(
            format!("{:x}", account.trie_hash()),
            "0943e8ddb43403e237cc56ac8ec3e256006e0f75d8e79ca1457b123e5d51a45c"
        );
    }

    #[test]
    fn rlp_roundtrip() {
        let account = Account::default()
            .with_nonce(99)
            .with_balance(U256::from(100))
            .with_storage_root(keccak256(b"storage_root_1"))
            .with_code_hash(keccak256(b"code_hash_1"));

        let encoded = account.to_rlp();
        let decoded = Account::from_rlp(&encoded).unwrap();
        assert_eq!(decoded, account);
        assert!(!account.is_empty());
    }

    #[test]
    fn emptiness_follows_eip161() {
        assert!(!Account::default().with_nonce(1).is_empty());
        assert!(!Account::default().with_balance(U256::from(1)).is_empty());
        assert!(!Account::default()
            .with_code_hash(keccak256(b"code"))
            .is_empty());
        // A non-empty storage root alone does not make an account
        // non-empty.
        assert!(Account::default()
            .with_storage_root(keccak256(b"root"))
            .is_empty());
    }
}
