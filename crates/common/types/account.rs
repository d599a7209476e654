use cinder_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ethereum_types::{H256, U256};

use crate::constants::{EMPTY_KECCACK_HASH, EMPTY_TRIE_HASH};

/// The state of an account as stored in the account trie: the value of an
/// account leaf is the RLP encoding of this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCACK_HASH,
        }
    }
}

impl AccountState {
    /// Returns true if the account owns contract storage.
    pub fn has_storage(&self) -> bool {
        self.storage_root != EMPTY_TRIE_HASH
    }
}

impl RLPEncode for AccountState {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new()
            .field(&self.nonce)
            .field(&self.balance)
            .field(&self.storage_root)
            .field(&self.code_hash)
            .write_to(buf);
    }
}

impl RLPDecode for AccountState {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let mut decoder = Decoder::new(rlp)?;
        let nonce = decoder.field("nonce")?;
        let balance = decoder.field("balance")?;
        let storage_root = decoder.field("storage_root")?;
        let code_hash = decoder.field("code_hash")?;
        Ok((
            Self {
                nonce,
                balance,
                storage_root,
                code_hash,
            },
            decoder.finish()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_state_round_trip() {
        let account = AccountState {
            nonce: 1,
            balance: U256::from(1000),
            storage_root: EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCACK_HASH,
        };
        let encoded = account.encode_to_vec();
        assert_eq!(AccountState::decode(&encoded).unwrap(), account);
    }

    #[test]
    fn default_account_has_no_storage() {
        assert!(!AccountState::default().has_storage());
        let account = AccountState {
            storage_root: H256::repeat_byte(0xaa),
            ..Default::default()
        };
        assert!(account.has_storage());
    }

    #[test]
    fn truncated_account_is_rejected() {
        let account = AccountState::default();
        let encoded = account.encode_to_vec();
        assert!(AccountState::decode(&encoded[..encoded.len() - 1]).is_err());
    }
}
