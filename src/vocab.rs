//! Token vocabulary and byte-level text remapping
//!
//! Whisper's BPE tokenizer stores vocabulary entries in a printable
//! substitution alphabet: every raw byte is represented by a visible
//! character so whitespace and control bytes survive inside token strings.
//! Decoding a token means undoing that substitution byte-for-byte and
//! reinterpreting the result as UTF-8.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing::info;

use crate::error::{DecodeError, Result};

/// End-of-text token ID.
pub const END_OF_TEXT: i64 = 50257;
/// Start-of-transcript token ID.
pub const START_OF_TRANSCRIPT: i64 = 50258;
/// English language tag token ID.
pub const ENGLISH: i64 = 50259;
/// Transcribe task tag token ID.
pub const TRANSCRIBE: i64 = 50359;
/// First timestamp token ID (t = 0.00s).
pub const START_TIME: i64 = 50364;

/// Dense ID -> token-string table for ordinary (non-special) tokens.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
}

impl Vocabulary {
    /// Build the vocabulary by inverting a token-string -> ID mapping.
    ///
    /// IDs must form the contiguous range `[0, N)`: out-of-range, duplicate,
    /// or missing IDs are configuration errors, never silently blank tokens.
    pub fn from_token_map(map: HashMap<String, u32>) -> Result<Self> {
        if map.is_empty() {
            return Err(DecodeError::config("Vocabulary mapping is empty"));
        }

        let count = map.len();
        let mut slots: Vec<Option<String>> = vec![None; count];

        for (token, id) in map {
            let idx = id as usize;
            if idx >= count {
                return Err(DecodeError::config(format!(
                    "Token ID {} out of range for vocabulary of {} entries",
                    idx, count
                )));
            }
            if slots[idx].is_some() {
                return Err(DecodeError::config(format!("Duplicate token ID {}", idx)));
            }
            slots[idx] = Some(token);
        }

        let mut tokens = Vec::with_capacity(count);
        for (id, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(token) => tokens.push(token),
                None => {
                    return Err(DecodeError::config(format!(
                        "Vocabulary has no token for ID {}",
                        id
                    )))
                }
            }
        }

        info!("Loaded vocabulary with {} tokens", tokens.len());
        Ok(Self { tokens })
    }

    /// Parse a JSON object of token-string -> ID pairs (`vocab.json` format).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let map: HashMap<String, u32> = serde_json::from_str(json)
            .map_err(|e| DecodeError::config(format!("Failed to parse vocabulary JSON: {}", e)))?;
        Self::from_token_map(map)
    }

    /// Load the vocabulary from a `vocab.json` file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Vocabulary size.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Raw token string (still in the substitution alphabet) by ID.
    pub fn raw_token(&self, id: i64) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.tokens.get(idx))
            .map(|s| s.as_str())
    }

    /// Decode one vocabulary token to its readable UTF-8 text fragment.
    pub fn decode_token(&self, id: i64) -> Result<String> {
        let token = self
            .raw_token(id)
            .ok_or_else(|| DecodeError::config(format!("Invalid token ID: {}", id)))?;
        remap_token(token)
    }
}

/// A byte is shifted by the tokenizer iff it falls outside the three
/// printable ranges `!`..=`~`, `¡`..=`¬` and `®`..=`ÿ`.
fn is_shifted_byte(b: u8) -> bool {
    !(0x21..=0x7E).contains(&b) && !(0xA1..=0xAC).contains(&b) && !(0xAE..=0xFF).contains(&b)
}

/// 256-entry shift table: entry k holds the k-th shifted byte value in
/// ascending order. Entries past the qualifying count stay zero.
fn shift_table() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        let mut n = 0;
        for b in 0..=255u8 {
            if is_shifted_byte(b) {
                table[n] = b;
                n += 1;
            }
        }
        table
    })
}

/// Byte -> alphabet code point table, the inverse of the shift table.
fn byte_alphabet() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        let mut n = 0;
        for b in 0..256usize {
            table[b] = if is_shifted_byte(b as u8) {
                let cp = 256 + n;
                n += 1;
                cp
            } else {
                b as u32
            };
        }
        table
    })
}

/// Encode raw bytes into the tokenizer's printable substitution alphabet.
///
/// Printable bytes map to their own code point; shifted bytes map to
/// `256 + k` where k is their rank in the shift table.
pub fn encode_bytes(bytes: &[u8]) -> String {
    let alphabet = byte_alphabet();
    bytes
        .iter()
        // Alphabet code points top out well below the surrogate range.
        .map(|&b| char::from_u32(alphabet[b as usize]).unwrap())
        .collect()
}

/// Reverse the substitution for one token, producing its raw byte sequence.
///
/// Code points below 256 pass through as Latin-1 bytes; code points 256 and
/// above index the shift table. Anything past the table is not part of the
/// alphabet and fails with `TextEncoding`.
pub fn remap_token_bytes(token: &str) -> Result<Vec<u8>> {
    let table = shift_table();
    let mut bytes = Vec::with_capacity(token.len());

    for ch in token.chars() {
        let cp = ch as u32;
        if cp < 256 {
            bytes.push(cp as u8);
        } else {
            let idx = (cp - 256) as usize;
            if idx >= table.len() {
                return Err(DecodeError::text_encoding(format!(
                    "Character U+{:04X} is not in the substitution alphabet",
                    cp
                )));
            }
            bytes.push(table[idx]);
        }
    }

    Ok(bytes)
}

/// Decode one token to readable text.
///
/// Invalid UTF-8 after reconstruction is replaced rather than rejected:
/// tokens may legitimately split multi-byte sequences mid-character.
pub fn remap_token(token: &str) -> Result<String> {
    let bytes = remap_token_bytes(token)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
