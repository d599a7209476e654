//! Common types and helpers shared across the cinder client.

pub mod constants;
pub mod types;
pub mod witness;

pub use ethereum_types::{H256, U256};
