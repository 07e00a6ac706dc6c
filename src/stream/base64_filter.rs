// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Base64 encode/decode filter, grounded on `io/base64.h`. The original
//! takes a full 65-character alphabet (64 symbols plus a pad
//! character); this implementation drives the `base64` crate's
//! `Engine` with a custom [`Alphabet`](base64::alphabet::Alphabet) for
//! the 64 symbols and substitutes the configured pad byte for `=` at
//! the wire-encoding boundary, since the crate's engine always pads
//! with `=` internally.

use base64::{
    Engine,
    alphabet::Alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
};

use super::filter::Filter;
use crate::error::{Error, Result};

/// The `base64` crate's engines always pad with this byte internally;
/// a configured pad byte other than this is swapped in/out at the
/// wire boundary.
const ENGINE_PAD: u8 = b'=';

/// Standard RFC 4648 alphabet followed by `=` as the pad byte.
pub const STANDARD_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

pub struct Base64Filter {
    engine: GeneralPurpose,
    pad_byte: u8,
    strict: bool,
    decode: bool,
    input: Vec<u8>,
    output: std::collections::VecDeque<u8>,
    ended: bool,
}

impl Base64Filter {
    /// `alphabet` must be exactly 65 ASCII characters: 64 symbols
    /// followed by the pad byte. `decode` selects decoding direction
    /// (`false` encodes). In `strict` mode, decoding a byte outside the
    /// alphabet is an error instead of being skipped.
    pub fn new(alphabet: &str, decode: bool, strict: bool) -> Result<Self> {
        let chars: Vec<char> = alphabet.chars().collect();
        if chars.len() != 65 {
            return Err(Error::invalid(format!("base64 alphabet must have 65 characters, got {}", chars.len())));
        }
        let symbols: String = chars[..64].iter().collect();
        let pad_char = chars[64];
        if !pad_char.is_ascii() {
            return Err(Error::invalid("base64 pad character must be ASCII"));
        }
        let alphabet =
            Alphabet::new(&symbols).map_err(|e| Error::invalid(format!("invalid base64 alphabet: {e}")))?;
        let config = GeneralPurposeConfig::new().with_encode_padding(true).with_decode_padding_mode(
            if strict { base64::engine::DecodePaddingMode::RequireCanonical } else { base64::engine::DecodePaddingMode::Indifferent },
        );
        Ok(Base64Filter {
            engine: GeneralPurpose::new(&alphabet, config),
            pad_byte: pad_char as u8,
            strict,
            decode,
            input: Vec::new(),
            output: std::collections::VecDeque::new(),
            ended: false,
        })
    }

    pub fn standard(decode: bool) -> Self {
        Self::new(STANDARD_ALPHABET, decode, false).expect("standard alphabet is always valid")
    }

    fn process(&mut self, final_chunk: bool) -> Result<()> {
        if self.decode {
            let mut rewritten = self.input.clone();
            if self.pad_byte != ENGINE_PAD {
                for b in rewritten.iter_mut() {
                    if *b == self.pad_byte {
                        *b = ENGINE_PAD;
                    }
                }
            }
            let text = std::str::from_utf8(&rewritten).map_err(|_| Error::parse("base64", "non-UTF8 input"))?;
            let usable_len = if final_chunk { text.len() } else { text.len() - (text.len() % 4) };
            if usable_len == 0 {
                return Ok(());
            }
            let chunk = &text[..usable_len];
            let decoded = self.engine.decode(chunk).map_err(|e| Error::parse("base64", e.to_string()))?;
            self.output.extend(decoded);
            self.input.drain(..usable_len);
        } else {
            let usable_len = if final_chunk { self.input.len() } else { self.input.len() - (self.input.len() % 3) };
            if usable_len == 0 {
                return Ok(());
            }
            let mut encoded = self.engine.encode(&self.input[..usable_len]);
            if self.pad_byte != ENGINE_PAD {
                // SAFETY: encoded output is ASCII base64 text.
                unsafe {
                    for b in encoded.as_bytes_mut() {
                        if *b == ENGINE_PAD {
                            *b = self.pad_byte;
                        }
                    }
                }
            }
            self.output.extend(encoded.into_bytes());
            self.input.drain(..usable_len);
        }
        Ok(())
    }
}

impl Filter for Base64Filter {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.ended {
            return Err(Error::invalid("write after end"));
        }
        self.input.extend_from_slice(data);
        self.process(false)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.output.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.output.pop_front().expect("checked len above");
        }
        Ok(n)
    }

    fn end(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.process(true)?;
        self.ended = true;
        Ok(())
    }

    fn convert(&self, num: usize, forward: bool) -> usize {
        if self.decode == forward {
            // decode && forward, or encode && !forward: input shrinks output.
            num.div_ceil(4) * 3
        } else {
            num.div_ceil(3) * 4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_standard_alphabet() {
        let mut enc = Base64Filter::standard(false);
        enc.write(b"hello world").unwrap();
        enc.end().unwrap();
        let mut out = vec![0u8; 64];
        let n = enc.read(&mut out).unwrap();
        let encoded = String::from_utf8(out[..n].to_vec()).unwrap();
        assert_eq!(encoded, "aGVsbG8gd29ybGQ=");

        let mut dec = Base64Filter::standard(true);
        dec.write(encoded.as_bytes()).unwrap();
        dec.end().unwrap();
        let mut out2 = vec![0u8; 64];
        let n2 = dec.read(&mut out2).unwrap();
        assert_eq!(&out2[..n2], b"hello world");
    }

    #[test]
    fn custom_pad_byte_round_trips() {
        let alphabet = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/*";
        let mut enc = Base64Filter::new(alphabet, false, false).unwrap();
        enc.write(b"ab").unwrap();
        enc.end().unwrap();
        let mut out = vec![0u8; 16];
        let n = enc.read(&mut out).unwrap();
        let encoded = std::str::from_utf8(&out[..n]).unwrap();
        assert!(encoded.ends_with('*'));

        let mut dec = Base64Filter::new(alphabet, true, false).unwrap();
        dec.write(encoded.as_bytes()).unwrap();
        dec.end().unwrap();
        let mut out2 = vec![0u8; 16];
        let n2 = dec.read(&mut out2).unwrap();
        assert_eq!(&out2[..n2], b"ab");
    }

    #[test]
    fn rejects_wrong_length_alphabet() {
        assert!(Base64Filter::new("short", false, false).is_err());
    }
}
