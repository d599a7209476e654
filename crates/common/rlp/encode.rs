use super::constants::{MAX_SHORT_PAYLOAD, RLP_EMPTY_LIST, RLP_NULL};
use bytes::{BufMut, Bytes};
use ethereum_types::{H256, U256};

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    fn length(&self) -> usize {
        self.encode_to_vec().len()
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            // A lone byte below the string prefix stands for itself
            [byte] if *byte < RLP_NULL => buf.put_u8(*byte),
            _ => {
                write_header(RLP_NULL, self.len(), buf);
                buf.put_slice(self);
            }
        }
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_slice().encode(buf);
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf);
    }
}

impl RLPEncode for str {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf);
    }
}

impl RLPEncode for String {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_str().encode(buf);
    }
}

// Unsigned integers are encoded as their minimal big-endian byte string.
macro_rules! impl_uint_encode {
    ($($t:ty),*) => {$(
        impl RLPEncode for $t {
            fn encode(&self, buf: &mut dyn BufMut) {
                trim_leading_zeros(&self.to_be_bytes()).encode(buf);
            }
        }
    )*};
}

impl_uint_encode!(u8, u16, u32, u64, usize);

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf);
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        trim_leading_zeros(&self.to_big_endian()).encode(buf);
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        for item in self {
            item.encode(&mut payload);
        }
        encode_list_header(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

impl<A: RLPEncode, B: RLPEncode> RLPEncode for (A, B) {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        self.0.encode(&mut payload);
        self.1.encode(&mut payload);
        encode_list_header(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

/// Writes the list prefix for a payload of the given length.
pub fn encode_list_header(payload_len: usize, buf: &mut dyn BufMut) {
    write_header(RLP_EMPTY_LIST, payload_len, buf);
}

/// Writes an item prefix. `base` picks the namespace: [`RLP_NULL`] for
/// strings, [`RLP_EMPTY_LIST`] for lists; the long form adds the payload
/// length in minimal big-endian bytes after the tag.
fn write_header(base: u8, payload_len: usize, buf: &mut dyn BufMut) {
    if payload_len <= MAX_SHORT_PAYLOAD {
        buf.put_u8(base + payload_len as u8);
    } else {
        let payload_len_bytes = payload_len.to_be_bytes();
        let len_bytes = trim_leading_zeros(&payload_len_bytes);
        buf.put_u8(base + MAX_SHORT_PAYLOAD as u8 + len_bytes.len() as u8);
        buf.put_slice(len_bytes);
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let zeros = bytes.iter().take_while(|byte| **byte == 0).count();
    &bytes[zeros..]
}
