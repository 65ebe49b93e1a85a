//! Radix-32 tile fingerprints.
//!
//! A fingerprint is a 64-bit value plus one flag bit, written as exactly 13
//! radix-32 digits from the alphabet `0-9a-v`. The first digit carries the top
//! four bits of the value in its upper bits and the flag in its lowest bit;
//! the remaining 12 digits carry the low 60 bits, five at a time.
//!
//! The flag conventionally marks the fingerprint of the missing (empty) tile.
//!
//! ```
//! use pyramid_tiles::tile::Fingerprint;
//!
//! let etag = Fingerprint::new(0xdead_beef, false);
//! let text = etag.encode();
//! assert_eq!(text.len(), 13);
//! assert_eq!(Fingerprint::decode(&text), etag);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Number of radix-32 digits in an encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 13;

/// Payloads at or below this size don't get a synthesized fingerprint.
pub const MIN_SYNTHESIS_SIZE: usize = 128;

const DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

// =============================================================================
// Decoding Mode
// =============================================================================

/// How to treat malformed fingerprint strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EtagDecoding {
    /// Decode as far as the input is valid, padding the rest with zero digits.
    #[default]
    Lenient,

    /// Require exactly 13 valid digits.
    Strict,
}

// =============================================================================
// Fingerprint
// =============================================================================

/// A 64-bit content fingerprint with a missing-tile flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// The 64-bit payload
    pub value: u64,

    /// Set when this fingerprint identifies the missing (empty) tile
    pub missing: bool,
}

impl Fingerprint {
    /// Create a fingerprint from a value and flag.
    pub const fn new(value: u64, missing: bool) -> Self {
        Self { value, missing }
    }

    /// Fingerprint of the empty tile derived from a seed value.
    pub const fn for_missing_tile(seed: u64) -> Self {
        Self::new(seed, true)
    }

    /// Encode as a 13 character radix-32 string.
    pub fn encode(&self) -> String {
        encode(self.value, self.missing)
    }

    /// Encode as a quoted string, ready for an `ETag` header.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.encode())
    }

    /// Lenient decode, see [`decode`].
    pub fn decode(input: &str) -> Self {
        let (value, missing) = decode(input);
        Self { value, missing }
    }

    /// Decode exactly 13 radix-32 digits, optionally wrapped in double quotes.
    pub fn decode_strict(input: &str) -> Result<Self, ParseError> {
        let digits = input
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(input);

        if digits.len() != FINGERPRINT_LEN || !digits.bytes().all(|b| digit_value(b).is_some()) {
            return Err(ParseError::InvalidFingerprint(input.to_string()));
        }

        Ok(Self::decode(digits))
    }

    /// Decode using the given mode.
    pub fn decode_with(input: &str, mode: EtagDecoding) -> Result<Self, ParseError> {
        match mode {
            EtagDecoding::Lenient => Ok(Self::decode(input)),
            EtagDecoding::Strict => Self::decode_strict(input),
        }
    }

    /// Derive a cheap content signature from a payload.
    ///
    /// XORs three little-endian 64-bit words: word 4 from the start and words
    /// `len/8 - 4` and `len/8 - 6`. This samples the payload, it is not a hash
    /// of it. Returns `None` for payloads of 128 bytes or less, see
    /// [`Fingerprint::for_payload`].
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() <= MIN_SYNTHESIS_SIZE {
            return None;
        }

        let words = payload.len() / 8;
        let value = word_at(payload, 4) ^ word_at(payload, words - 4) ^ word_at(payload, words - 6);
        Some(Self::new(value, false))
    }

    /// Fingerprint for a payload served without a validator.
    ///
    /// Payloads too small to sample get the zero fingerprint so every
    /// response still carries one.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self::from_payload(payload).unwrap_or(Self::new(0, false))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Fingerprint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode_strict(s)
    }
}

// =============================================================================
// Codec Functions
// =============================================================================

/// Encode a 64-bit value and flag as 13 radix-32 digits.
pub fn encode(value: u64, flag: bool) -> String {
    let mut out = String::with_capacity(FINGERPRINT_LEN);
    let first = (((value >> 60) & 0xf) << 1) | u64::from(flag);
    out.push(DIGITS[first as usize] as char);
    for i in 1..FINGERPRINT_LEN {
        let digit = (value >> (60 - i * 5)) & 0x1f;
        out.push(DIGITS[digit as usize] as char);
    }
    out
}

/// Decode a radix-32 fingerprint, leniently.
///
/// Leading double quotes are skipped and digits are case-insensitive. Decoding
/// stops at the first character that is not a digit and the missing trailing
/// digits count as zero. An input that starts with an invalid character
/// decodes to `(0, false)`.
pub fn decode(input: &str) -> (u64, bool) {
    let mut digits = input
        .trim_start_matches('"')
        .bytes()
        .map(digit_value)
        .map_while(|d| d);

    let first = match digits.next() {
        Some(d) => d,
        None => return (0, false),
    };

    let flag = first & 1 == 1;
    let mut value = u64::from(first >> 1);
    let mut count = 1;
    for digit in digits.take(FINGERPRINT_LEN - 1) {
        value = (value << 5) | u64::from(digit);
        count += 1;
    }

    value <<= 5 * (FINGERPRINT_LEN - count);
    (value, flag)
}

/// Value of a radix-32 digit, `None` if the byte is not one.
fn digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'v' => Some(c - b'a' + 10),
        b'A'..=b'V' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Little-endian u64 at word `index`. Caller guarantees the word is in bounds.
#[inline]
fn word_at(payload: &[u8], index: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&payload[index * 8..index * 8 + 8]);
    u64::from_le_bytes(word)
}

// =============================================================================
// Tests
// =============================================================================
