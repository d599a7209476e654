use ethereum_types::H256;
use sha3::{Digest, Keccak256};

/// The hash of a trie node, which doubles as its reference inside parent
/// nodes. Nodes whose RLP encoding is shorter than 32 bytes are not hashed
/// but embedded verbatim in their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeHash {
    Hashed(H256),
    /// Raw RLP of a short node, plus its length.
    Inline([u8; 31], u8),
}

impl NodeHash {
    /// Builds the reference for a node given its RLP encoding.
    pub fn from_encoded(encoded: &[u8]) -> NodeHash {
        if encoded.len() >= 32 {
            NodeHash::Hashed(keccak(encoded))
        } else {
            NodeHash::inline(encoded)
        }
    }

    /// Builds a reference from the bytes found in a parent node: a 32-byte
    /// string is a hash, anything shorter is an embedded node.
    pub fn from_slice(slice: &[u8]) -> NodeHash {
        if slice.len() == 32 {
            NodeHash::Hashed(H256::from_slice(slice))
        } else {
            NodeHash::inline(slice)
        }
    }

    fn inline(encoded: &[u8]) -> NodeHash {
        debug_assert!(encoded.len() < 32);
        let mut data = [0u8; 31];
        let len = encoded.len().min(31);
        data[..len].copy_from_slice(&encoded[..len]);
        NodeHash::Inline(data, len as u8)
    }

    /// Converts the reference into a full hash, hashing the embedded RLP for
    /// inline nodes.
    pub fn finalize(&self) -> H256 {
        match self {
            NodeHash::Hashed(hash) => *hash,
            NodeHash::Inline(data, len) => keccak(&data[..*len as usize]),
        }
    }

    /// Returns the embedded RLP of an inline node.
    pub fn as_inline(&self) -> Option<&[u8]> {
        match self {
            NodeHash::Hashed(_) => None,
            NodeHash::Inline(data, len) => Some(&data[..*len as usize]),
        }
    }

    /// An all-zero hash marks an empty child slot.
    pub fn is_valid(&self) -> bool {
        *self != NodeHash::default()
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Hashed(H256::zero())
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}

pub(crate) fn keccak(data: &[u8]) -> H256 {
    H256::from_slice(Keccak256::digest(data).as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_encodings_are_hashed() {
        let encoded = [0xaa; 32];
        let hash = NodeHash::from_encoded(&encoded);
        assert!(matches!(hash, NodeHash::Hashed(_)));
        assert_eq!(hash.finalize(), keccak(&encoded));
    }

    #[test]
    fn short_encodings_are_inlined() {
        let encoded = [0xc2, 0x01, 0x02];
        let hash = NodeHash::from_encoded(&encoded);
        assert_eq!(hash.as_inline(), Some(encoded.as_slice()));
        assert_eq!(hash.finalize(), keccak(&encoded));
    }

    #[test]
    fn empty_slot_is_invalid() {
        assert!(!NodeHash::default().is_valid());
        assert!(NodeHash::Hashed(H256::repeat_byte(1)).is_valid());
    }
}
