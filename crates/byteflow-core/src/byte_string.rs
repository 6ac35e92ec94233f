//! Immutable byte sequences with codec helpers.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig},
};

use crate::error::{ErrorKind, Result};

/// Accepts the inputs real-world base64 producers emit: optional padding and
/// partial trailing groups.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const STANDARD_BASE64: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, GeneralPurposeConfig::new());

/// An immutable sequence of bytes.
///
/// `ByteString` shares its backing storage: cloning and [`substring`] are
/// reference bumps, never copies. The hash is memoized on first use.
///
/// [`substring`]: ByteString::substring
pub struct ByteString {
    data: Arc<[u8]>,
    start: usize,
    len: usize,
    hash: OnceLock<i32>,
}

impl ByteString {
    /// An empty byte string.
    pub fn empty() -> ByteString {
        ByteString::from(&[][..])
    }

    /// A byte string holding the UTF-8 encoding of `string`.
    pub fn encode_utf8(string: &str) -> ByteString {
        ByteString::from(string.as_bytes())
    }

    /// Decodes base64, tolerating whitespace, loose `=` padding, and the
    /// URL-safe alphabet. Returns `None` on any other character.
    pub fn decode_base64(encoded: &str) -> Option<ByteString> {
        let mut normalized = Vec::with_capacity(encoded.len());
        for byte in encoded.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' | b'=' => {
                    normalized.push(byte)
                }
                b'-' => normalized.push(b'+'),
                b'_' => normalized.push(b'/'),
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ => return None,
            }
        }
        LENIENT_BASE64.decode(&normalized).ok().map(ByteString::from)
    }

    /// Decodes a hex string, accepting either case. Fails on odd length or
    /// a non-hex character.
    pub fn decode_hex(encoded: &str) -> Result<ByteString> {
        hex::decode(encoded)
            .map(ByteString::from)
            .map_err(|error| ErrorKind::Encoding(error.to_string()))
    }

    /// Encodes as base64 with `=` padding.
    pub fn base64(&self) -> String {
        STANDARD_BASE64.encode(self.as_slice())
    }

    /// Encodes as lowercase hex.
    pub fn hex(&self) -> String {
        hex::encode(self.as_slice())
    }

    /// Decodes the content as UTF-8.
    pub fn utf8(&self) -> Result<&str> {
        std::str::from_utf8(self.as_slice())
            .map_err(|_| ErrorKind::Encoding("invalid utf-8".into()))
    }

    /// The bytes of this byte string.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.start + self.len]
    }

    /// The number of bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when this byte string holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A view of the bytes in `[begin, end)`, sharing the backing storage.
    /// Panics if the range is out of bounds.
    pub fn substring(&self, begin: usize, end: usize) -> ByteString {
        assert!(begin <= end, "substring begin out of bounds");
        assert!(end <= self.len, "substring end out of bounds");
        ByteString {
            data: Arc::clone(&self.data),
            start: self.start + begin,
            len: end - begin,
            hash: OnceLock::new(),
        }
    }

    /// A copy with ASCII letters lowercased.
    pub fn to_ascii_lowercase(&self) -> ByteString {
        ByteString::from(self.as_slice().to_ascii_lowercase())
    }

    /// A copy with ASCII letters uppercased.
    pub fn to_ascii_uppercase(&self) -> ByteString {
        ByteString::from(self.as_slice().to_ascii_uppercase())
    }

    fn hash_code(&self) -> i32 {
        *self.hash.get_or_init(|| {
            self.as_slice()
                .iter()
                .fold(1i32, |hash, &byte| hash.wrapping_mul(31).wrapping_add(byte as i8 as i32))
        })
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(data: Vec<u8>) -> Self {
        let len = data.len();
        ByteString { data: Arc::from(data), start: 0, len, hash: OnceLock::new() }
    }
}

impl From<&[u8]> for ByteString {
    fn from(data: &[u8]) -> Self {
        ByteString::from(data.to_vec())
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Clone for ByteString {
    fn clone(&self) -> Self {
        ByteString {
            data: Arc::clone(&self.data),
            start: self.start,
            len: self.len,
            hash: self.hash.clone(),
        }
    }
}

impl PartialEq for ByteString {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteString {}

impl PartialOrd for ByteString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl Hash for ByteString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len <= 16 {
            write!(f, "ByteString[size={} data={}]", self.len, self.hex())
        } else {
            write!(
                f,
                "ByteString[size={} data={}…]",
                self.len,
                hex::encode(&self.as_slice()[..16])
            )
        }
    }
}
