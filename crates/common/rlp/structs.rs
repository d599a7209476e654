use super::{
    decode::{RLPDecode, decode_rlp_item, get_item_with_prefix},
    encode::{RLPEncode, encode_list_header},
    error::RLPDecodeError,
};
use bytes::BufMut;

/// Streaming decoder over the elements of an RLP list.
///
/// Each [`field`](Decoder::field) call consumes the next element;
/// [`finish`](Decoder::finish) asserts the list was read to its end and
/// yields whatever followed it in the input.
#[derive(Debug)]
pub struct Decoder<'a> {
    /// Unconsumed part of the list payload.
    body: &'a [u8],
    /// Bytes that followed the list in the original input.
    tail: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, RLPDecodeError> {
        let (is_list, body, tail) = decode_rlp_item(buf)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        Ok(Self { body, tail })
    }

    /// Decodes the next list element. `name` labels decode failures.
    pub fn field<T: RLPDecode>(&mut self, name: &str) -> Result<T, RLPDecodeError> {
        let (value, rest) = T::decode_unfinished(self.body)
            .map_err(|err| RLPDecodeError::Custom(format!("field '{name}': {err}")))?;
        self.body = rest;
        Ok(value)
    }

    /// Hands out the next element undecoded, prefix included.
    pub fn raw_item(&mut self) -> Result<&'a [u8], RLPDecodeError> {
        let (item, rest) = get_item_with_prefix(self.body)?;
        self.body = rest;
        Ok(item)
    }

    /// True once every list element has been consumed.
    pub fn is_done(&self) -> bool {
        self.body.is_empty()
    }

    /// Checks the list was fully consumed and returns the bytes after it.
    pub fn finish(self) -> Result<&'a [u8], RLPDecodeError> {
        if !self.is_done() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(self.tail)
    }
}

/// List encoder. Fields accumulate into a payload buffer that gets its
/// length prefix when written out with [`write_to`](Encoder::write_to).
#[derive(Debug, Default)]
pub struct Encoder {
    payload: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an RLP-encoded field.
    pub fn field<T: RLPEncode>(mut self, value: &T) -> Self {
        value.encode(&mut self.payload);
        self
    }

    /// Appends a byte-string field. Sidesteps `Vec<u8>` encoding as a list
    /// of integers.
    pub fn bytes_field(mut self, value: &[u8]) -> Self {
        value.encode(&mut self.payload);
        self
    }

    /// Appends an already-encoded item verbatim.
    pub fn raw(mut self, item: &[u8]) -> Self {
        self.payload.extend_from_slice(item);
        self
    }

    /// Prefixes the accumulated payload with its list header and writes both
    /// into `buf`.
    pub fn write_to(self, buf: &mut dyn BufMut) {
        encode_list_header(self.payload.len(), buf);
        buf.put_slice(&self.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Sample {
        pub tag: u8,
        pub count: u16,
    }

    #[test]
    fn decoder_reads_fields_in_order() {
        let expected = Sample {
            tag: 42,
            count: 1000,
        };
        let mut buf = Vec::new();
        (expected.tag, expected.count).encode(&mut buf);

        let mut decoder = Decoder::new(&buf).unwrap();
        let tag = decoder.field("tag").unwrap();
        let count = decoder.field("count").unwrap();
        let rest = decoder.finish().unwrap();

        assert!(rest.is_empty());
        assert_eq!(Sample { tag, count }, expected);
    }

    #[test]
    fn decoder_finish_rejects_unread_fields() {
        let mut buf = Vec::new();
        (42u8, 1000u16).encode(&mut buf);

        let mut decoder = Decoder::new(&buf).unwrap();
        let _: u8 = decoder.field("tag").unwrap();
        assert!(!decoder.is_done());
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn encoder_matches_tuple_encoding() {
        let input = Sample {
            tag: 42,
            count: 1000,
        };
        let mut buf = Vec::new();

        Encoder::new()
            .field(&input.tag)
            .field(&input.count)
            .write_to(&mut buf);

        assert_eq!(buf, vec![0xc4, 0x2a, 0x82, 0x03, 0xe8]);

        let mut tuple_encoded = Vec::new();
        (input.tag, input.count).encode(&mut tuple_encoded);
        assert_eq!(buf, tuple_encoded);
    }

    #[test]
    fn empty_list_round_trips() {
        let mut buf = Vec::new();
        Encoder::new().write_to(&mut buf);
        assert_eq!(buf, vec![0xc0]);

        let decoder = Decoder::new(&buf).unwrap();
        assert!(decoder.is_done());
    }

    #[test]
    fn raw_item_hands_back_the_prefixed_element() {
        let mut buf = Vec::new();
        Encoder::new()
            .bytes_field(b"dog")
            .field(&7u8)
            .write_to(&mut buf);

        let mut decoder = Decoder::new(&buf).unwrap();
        assert_eq!(decoder.raw_item().unwrap(), [0x83, b'd', b'o', b'g']);
        assert_eq!(decoder.raw_item().unwrap(), [0x07]);
        assert!(decoder.is_done());
    }
}
