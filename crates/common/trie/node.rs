use cinder_rlp::{
    decode::decode_bytes,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::{nibbles::Nibbles, node_hash::NodeHash};

/// A Node in an Ethereum compatible Patricia Merkle Trie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

/// Discriminant of a [`Node`], reported back by batched imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Branch,
    Extension,
    Leaf,
}

/// A node with 16 child slots, one per nibble, plus an optional value for
/// paths terminating here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub choices: [NodeHash; 16],
    pub value: Vec<u8>,
}

impl BranchNode {
    /// Number of occupied slots: valid children plus a non-empty value.
    /// A well-formed branch has at least two.
    pub fn occupied_slots(&self) -> usize {
        let children = self.choices.iter().filter(|c| c.is_valid()).count();
        children + usize::from(!self.value.is_empty())
    }
}

/// A node compressing a shared segment of nibbles leading to a single child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

/// A node terminating a key. In the account trie its value is an RLP-encoded
/// account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: Vec<u8>,
}

impl From<BranchNode> for Node {
    fn from(val: BranchNode) -> Self {
        Node::Branch(Box::new(val))
    }
}

impl From<ExtensionNode> for Node {
    fn from(val: ExtensionNode) -> Self {
        Node::Extension(val)
    }
}

impl From<LeafNode> for Node {
    fn from(val: LeafNode) -> Self {
        Node::Leaf(val)
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Branch(_) => NodeKind::Branch,
            Node::Extension(_) => NodeKind::Extension,
            Node::Leaf(_) => NodeKind::Leaf,
        }
    }

    /// Decodes a node from its raw RLP encoding.
    ///
    /// A two-element list is a leaf or an extension, told apart by the
    /// hex-prefix flag on its path; a seventeen-element list is a branch.
    /// Branches with fewer than two occupied slots are rejected.
    pub fn decode_raw(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let mut decoder = Decoder::new(rlp)?;
        let first = decoder.raw_item()?;
        let second = decoder.raw_item()?;

        if decoder.is_done() {
            let (compact, _) = decode_bytes(first)?;
            let path = Nibbles::decode_compact(compact);
            if path.is_leaf() {
                let (value, _) = decode_bytes(second)?;
                return Ok(LeafNode {
                    partial: path,
                    value: value.to_vec(),
                }
                .into());
            }
            return Ok(ExtensionNode {
                prefix: path,
                child: child_ref(second),
            }
            .into());
        }

        let mut choices = [NodeHash::default(); 16];
        choices[0] = child_ref(first);
        choices[1] = child_ref(second);
        for slot in choices.iter_mut().skip(2) {
            *slot = child_ref(decoder.raw_item()?);
        }
        let (value, _) = decode_bytes(decoder.raw_item()?)?;
        if !decoder.is_done() {
            return Err(RLPDecodeError::Custom(
                "Trie node with more than 17 elements".to_string(),
            ));
        }

        let branch = BranchNode {
            choices,
            value: value.to_vec(),
        };
        if branch.occupied_slots() < 2 {
            return Err(RLPDecodeError::Custom(
                "Branch node with fewer than two occupied slots".to_string(),
            ));
        }
        Ok(branch.into())
    }

    /// Serializes the node to its raw RLP form.
    pub fn encode_raw(&self) -> Vec<u8> {
        let encoder = match self {
            Node::Branch(branch) => {
                let mut encoder = Encoder::new();
                for child in &branch.choices {
                    encoder = child_slot(encoder, child);
                }
                encoder.bytes_field(&branch.value)
            }
            Node::Extension(extension) => child_slot(
                Encoder::new().bytes_field(&extension.prefix.encode_compact()),
                &extension.child,
            ),
            Node::Leaf(leaf) => Encoder::new()
                .bytes_field(&leaf.partial.encode_compact())
                .bytes_field(&leaf.value),
        };
        let mut buf = Vec::new();
        encoder.write_to(&mut buf);
        buf
    }

    /// Content address of the node: the hash of its RLP encoding, or the
    /// encoding itself when it fits inline.
    pub fn compute_hash(&self) -> NodeHash {
        NodeHash::from_encoded(&self.encode_raw())
    }
}

/// Reads a child slot: a 32-byte hash string, an empty string for a vacant
/// slot, or a whole node embedded when its encoding is shorter than a hash.
fn child_ref(item: &[u8]) -> NodeHash {
    match decode_bytes(item) {
        Ok(([], [])) => NodeHash::default(),
        Ok((payload, [])) if payload.len() == 32 => NodeHash::from_slice(payload),
        _ => NodeHash::from_slice(item),
    }
}

fn child_slot(encoder: Encoder, child: &NodeHash) -> Encoder {
    match child {
        NodeHash::Hashed(hash) if child.is_valid() => encoder.bytes_field(hash.as_bytes()),
        NodeHash::Inline(rlp, len) => encoder.raw(&rlp[..*len as usize]),
        // A vacant slot encodes as the empty string
        _ => encoder.bytes_field(&[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_hash::keccak;
    use ethereum_types::H256;

    fn leaf(partial: Nibbles, value: Vec<u8>) -> Node {
        LeafNode { partial, value }.into()
    }

    #[test]
    fn leaf_round_trip() {
        let node = leaf(Nibbles::from_bytes(&[0xab; 32]), b"account".to_vec());
        let encoded = node.encode_raw();
        assert_eq!(Node::decode_raw(&encoded).unwrap(), node);
    }

    #[test]
    fn extension_round_trip() {
        let node: Node = ExtensionNode {
            prefix: Nibbles::from_hex(vec![0xa, 0xb, 0xc]),
            child: NodeHash::Hashed(H256::repeat_byte(0x11)),
        }
        .into();
        let encoded = node.encode_raw();
        assert_eq!(Node::decode_raw(&encoded).unwrap(), node);
    }

    #[test]
    fn branch_round_trip() {
        let mut choices: [NodeHash; 16] = Default::default();
        choices[3] = NodeHash::Hashed(H256::repeat_byte(0x22));
        choices[5] = NodeHash::Hashed(H256::repeat_byte(0x33));
        let node: Node = BranchNode {
            choices,
            value: vec![],
        }
        .into();
        let encoded = node.encode_raw();
        assert_eq!(Node::decode_raw(&encoded).unwrap(), node);
    }

    #[test]
    fn branch_with_single_child_is_rejected() {
        let mut choices: [NodeHash; 16] = Default::default();
        choices[3] = NodeHash::Hashed(H256::repeat_byte(0x22));
        let node: Node = BranchNode {
            choices,
            value: vec![],
        }
        .into();
        let encoded = node.encode_raw();
        assert!(Node::decode_raw(&encoded).is_err());
    }

    #[test]
    fn short_nodes_hash_inline() {
        let node = leaf(Nibbles::from_hex(vec![0x1, 16]), vec![0x01]);
        let encoded = node.encode_raw();
        assert!(encoded.len() < 32);
        assert!(matches!(node.compute_hash(), NodeHash::Inline(_, _)));
        assert_eq!(node.compute_hash().finalize(), keccak(&encoded));
    }

    #[test]
    fn malformed_rlp_is_rejected() {
        assert!(Node::decode_raw(&[0x80]).is_err());
        assert!(Node::decode_raw(&[0xc1, 0x01]).is_err());
    }
}
