use ethereum_types::H256;
use hex_literal::hex;

/// Keccak256 hash of an empty byte string. Used as the code hash of accounts
/// without code.
pub const EMPTY_KECCACK_HASH: H256 = H256(hex!(
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
));

/// Keccak256 hash of the RLP encoding of an empty string, the root of an empty
/// Merkle Patricia Trie. Used as the storage root of accounts without storage.
pub const EMPTY_TRIE_HASH: H256 = H256(hex!(
    "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
));
