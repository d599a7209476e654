use super::{
    constants::{MAX_SHORT_PAYLOAD, RLP_EMPTY_LIST, RLP_NULL},
    error::RLPDecodeError,
};
use bytes::Bytes;
use ethereum_types::{H256, U256};

/// Max payload size accepted when decoding. Larger payloads are RLP
/// spec-compliant but no message in our protocols legitimately carries them,
/// so they are either bugs or hostile input.
const MAX_RLP_BYTES: usize = 1024 * 1024 * 1024;

/// Types reconstructible from their RLP encoding.
/// See <https://ethereum.org/en/developers/docs/data-structures-and-encoding/rlp/#rlp-decoding>.
/// Implementors provide [`decode_unfinished`](RLPDecode::decode_unfinished), which
/// returns the decoded value along with the remaining bytes; consumers normally
/// call [`decode`](RLPDecode::decode), which additionally rejects trailing bytes.
pub trait RLPDecode: Sized {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }

        Ok(decoded)
    }
}

// Unsigned integers are byte strings holding their minimal big-endian form.
macro_rules! impl_uint_decode {
    ($($t:ty),*) => {$(
        impl RLPDecode for $t {
            fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                let (bytes, rest) = decode_bytes(rlp)?;
                Ok((<$t>::from_be_bytes(static_left_pad(bytes)?), rest))
            }
        }
    )*};
}

impl_uint_decode!(u8, u16, u32, u64, usize);

impl<const N: usize> RLPDecode for [u8; N] {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let array = bytes.try_into().map_err(|_| RLPDecodeError::InvalidLength)?;
        Ok((array, rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(bytes), rest))
    }
}

impl RLPDecode for H256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (array, rest) = <[u8; 32]>::decode_unfinished(rlp)?;
        Ok((H256(array), rest))
    }
}

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let padded: [u8; 32] = static_left_pad(bytes)?;
        Ok((U256::from_big_endian(&padded), rest))
    }
}

impl RLPDecode for String {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let text = str::from_utf8(bytes).map_err(|_| RLPDecodeError::MalformedData)?;
        Ok((text.to_owned(), rest))
    }
}

impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let mut items = Vec::new();
        let mut remaining = payload;
        while !remaining.is_empty() {
            let (item, rem) = T::decode_unfinished(remaining)?;
            items.push(item);
            remaining = rem;
        }
        Ok((items, rest))
    }
}

impl<A: RLPDecode, B: RLPDecode> RLPDecode for (A, B) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let (a, payload) = A::decode_unfinished(payload)?;
        let (b, payload) = B::decode_unfinished(payload)?;
        if !payload.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(((a, b), rest))
    }
}

/// Reads one item's header: whether it is a list, how many bytes the header
/// takes and how long the payload is. Bounds are validated against the input.
fn parse_header(data: &[u8]) -> Result<(bool, usize, usize), RLPDecodeError> {
    let &tag = data.first().ok_or(RLPDecodeError::InvalidLength)?;
    let long_string_base = RLP_NULL + MAX_SHORT_PAYLOAD as u8;
    let long_list_base = RLP_EMPTY_LIST + MAX_SHORT_PAYLOAD as u8;

    let (is_list, header_len, payload_len) = if tag < RLP_NULL {
        // The byte is its own payload
        (false, 0, 1)
    } else if tag <= long_string_base {
        (false, 1, (tag - RLP_NULL) as usize)
    } else if tag < RLP_EMPTY_LIST {
        let len_of_len = (tag - long_string_base) as usize;
        (false, 1 + len_of_len, read_be_len(data, len_of_len)?)
    } else if tag <= long_list_base {
        (true, 1, (tag - RLP_EMPTY_LIST) as usize)
    } else {
        let len_of_len = (tag - long_list_base) as usize;
        (true, 1 + len_of_len, read_be_len(data, len_of_len)?)
    };

    if payload_len > MAX_RLP_BYTES || data.len() < header_len + payload_len {
        return Err(RLPDecodeError::InvalidLength);
    }
    Ok((is_list, header_len, payload_len))
}

/// Reads the long-form payload length following the tag byte. Lengths must be
/// minimal, so a leading zero is malformed.
fn read_be_len(data: &[u8], len_of_len: usize) -> Result<usize, RLPDecodeError> {
    let bytes = data
        .get(1..1 + len_of_len)
        .ok_or(RLPDecodeError::InvalidLength)?;
    match bytes {
        [] | [0, ..] => Err(RLPDecodeError::MalformedData),
        _ if bytes.len() > size_of::<usize>() => Err(RLPDecodeError::InvalidLength),
        _ => Ok(bytes.iter().fold(0usize, |len, &b| len << 8 | b as usize)),
    }
}

/// Takes one item off the front of `data`, yielding its list flag, its bare
/// payload, and whatever follows the item.
pub fn decode_rlp_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let (is_list, header_len, payload_len) = parse_header(data)?;
    let payload = &data[header_len..header_len + payload_len];
    Ok((is_list, payload, &data[header_len + payload_len..]))
}

/// Cuts the input right after its first item, keeping the item's prefix
/// attached.
pub fn get_item_with_prefix(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (_, header_len, payload_len) = parse_header(data)?;
    Ok(data.split_at(header_len + payload_len))
}

/// Like [`decode_rlp_item`] but insists the item is a string, yielding its
/// payload and the bytes after it.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_rlp_item(data)?;
    if is_list {
        return Err(RLPDecodeError::UnexpectedList);
    }
    Ok((payload, rest))
}

/// Left-pads a minimal big-endian byte string to a fixed width. Inputs with a
/// leading zero are not minimal and are rejected.
#[inline]
pub fn static_left_pad<const N: usize>(data: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    let mut padded = [0u8; N];
    match data {
        [] => Ok(padded),
        [0, ..] => Err(RLPDecodeError::MalformedData),
        _ if data.len() > N => Err(RLPDecodeError::InvalidLength),
        _ => {
            padded[N - data.len()..].copy_from_slice(data);
            Ok(padded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn decode_integers() {
        assert_eq!(u8::decode(&[0x80]).unwrap(), 0);
        assert_eq!(u8::decode(&[0x07]).unwrap(), 7);
        assert_eq!(u64::decode(&hex!("820400")).unwrap(), 1024);
        assert_eq!(u64::decode(&hex!("83010000")).unwrap(), 65536);
    }

    #[test]
    fn decode_rejects_leading_zeros() {
        assert!(u64::decode(&hex!("820001")).is_err());
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        assert!(u8::decode(&[0x07, 0x07]).is_err());
    }

    #[test]
    fn decode_rejects_truncated_payloads() {
        assert!(u64::decode(&hex!("83 0100")).is_err());
        assert!(Vec::<u8>::decode(&hex!("c3 0102")).is_err());
    }

    #[test]
    fn decode_rejects_non_minimal_long_lengths() {
        // Long form announcing a one-byte length of zero
        assert!(decode_rlp_item(&hex!("b800")).is_err());
    }

    #[test]
    fn decode_h256() {
        let bytes = hex!("a0ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff");
        assert_eq!(H256::decode(&bytes).unwrap(), H256([0xff; 32]));
    }

    #[test]
    fn decode_u256() {
        let bytes = hex!("8203e8");
        assert_eq!(U256::decode(&bytes).unwrap(), U256::from(1000));
    }

    #[test]
    fn decode_string() {
        assert_eq!(String::decode(&hex!("83646f67")).unwrap(), "dog");
    }

    #[test]
    fn decode_vec() {
        let bytes = hex!("c3010203");
        assert_eq!(Vec::<u8>::decode(&bytes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn split_item_with_prefix() {
        let data = hex!("83646f6701");
        let (item, rest) = get_item_with_prefix(&data).unwrap();
        assert_eq!(item, hex!("83646f67"));
        assert_eq!(rest, [0x01]);
    }
}
