use bytes::Bytes;
use cinder_rlp::{
    decode::RLPDecode,
    error::RLPDecodeError,
    encode::RLPEncode,
    structs::{Decoder, Encoder},
};
use ethereum_types::H256;

/// Subset of an execution-layer block header carried through sync.
/// The healing engine only cares about the pivot's number and state root;
/// the remaining consensus fields live with the chain database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub parent_hash: H256,
    pub number: u64,
    pub state_root: H256,
    pub timestamp: u64,
}

impl RLPEncode for BlockHeader {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new()
            .field(&self.parent_hash)
            .field(&self.number)
            .field(&self.state_root)
            .field(&self.timestamp)
            .write_to(buf);
    }
}

impl RLPDecode for BlockHeader {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let mut decoder = Decoder::new(rlp)?;
        let parent_hash = decoder.field("parent_hash")?;
        let number = decoder.field("number")?;
        let state_root = decoder.field("state_root")?;
        let timestamp = decoder.field("timestamp")?;
        Ok((
            Self {
                parent_hash,
                number,
                state_root,
                timestamp,
            },
            decoder.finish()?,
        ))
    }
}

/// Opaque block body as fetched from peers. Bodies are persisted alongside
/// headers without being interpreted by the healing engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBody {
    pub transactions: Vec<Bytes>,
}
