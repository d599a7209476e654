//! Recursive Length Prefix (RLP) encoding and decoding for the cinder client.
//!
//! RLP is the serialization format Ethereum uses for account state, trie nodes
//! and protocol messages. The crate exposes two traits, [`encode::RLPEncode`]
//! and [`decode::RLPDecode`], plus the [`structs::Encoder`]/[`structs::Decoder`]
//! builders for list-shaped payloads.
//!
//! ```rust
//! use cinder_rlp::decode::RLPDecode;
//! use cinder_rlp::encode::RLPEncode;
//!
//! let encoded = 42u64.encode_to_vec();
//! assert_eq!(u64::decode(&encoded).unwrap(), 42);
//! ```

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
