//! Binary-to-text encoding for embedded payloads
//!
//! Both schemes produce text that can sit inside a `<script>` element or a JS
//! string literal without escaping:
//!
//! - **base64**: standard alphabet with `=` padding
//! - **ascii85**: base-85 over an alphabet of printable ASCII minus
//!   `"` `$` `&` `'` `/` `<` `>` `\` and backtick, so no quote, markup,
//!   template-literal or closing-tag sequence can ever be formed
//!
//! **ascii85 layout**: each 4-byte group is read as a big-endian `u32` and
//! written as 5 digits, most significant first. A final group of `n` bytes
//! is zero-padded and only its first `n + 1` digits are kept.

use crate::error::{Result, VeilError};
use crate::options::Encoding;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// The 85 symbols of the ascii85 alphabet, in digit order
pub const ASCII85_ALPHABET: &[u8; 85] =
    b"!#%()*+,-.0123456789:;=?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[]^_abcdefghijklmnopqrstuvwxyz{|}~";

/// Characters that never appear in ascii85 output
pub const FORBIDDEN_CHARS: &[char] = &['"', '$', '&', '\'', '/', '<', '>', '\\', '`'];

const NO_DIGIT: u8 = 0xFF;

const fn build_reverse_table() -> [u8; 128] {
    let mut table = [NO_DIGIT; 128];
    let mut i = 0;
    while i < ASCII85_ALPHABET.len() {
        table[ASCII85_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

const ASCII85_REVERSE: [u8; 128] = build_reverse_table();

/// Encode bytes as text using the given scheme
pub fn encode(data: &[u8], scheme: Encoding) -> String {
    match scheme {
        Encoding::Base64 => STANDARD.encode(data),
        Encoding::Ascii85 => encode_ascii85(data),
    }
}

/// Decode text produced by [`encode`]
pub fn decode(text: &str, scheme: Encoding) -> Result<Vec<u8>> {
    match scheme {
        Encoding::Base64 => STANDARD
            .decode(text.trim())
            .map_err(|e| VeilError::Encoding(format!("invalid base64 payload: {}", e))),
        Encoding::Ascii85 => decode_ascii85(text.trim()),
    }
}

fn encode_ascii85(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(4) * 5);

    for chunk in data.chunks(4) {
        let mut group = [0u8; 4];
        group[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(group);

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = ASCII85_ALPHABET[(value % 85) as usize];
            value /= 85;
        }

        for &d in &digits[..chunk.len() + 1] {
            out.push(d as char);
        }
    }

    out
}

fn decode_ascii85(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.len() % 5 == 1 {
        return Err(VeilError::Encoding(
            "ascii85 payload ends with a single dangling digit".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(bytes.len() / 5 * 4 + 4);

    for chunk in bytes.chunks(5) {
        let mut value: u64 = 0;
        for i in 0..5 {
            // Short final group is padded with the highest digit
            let digit = match chunk.get(i) {
                Some(&c) => digit_value(c)?,
                None => 84,
            };
            value = value * 85 + digit as u64;
        }

        if value > u32::MAX as u64 {
            return Err(VeilError::Encoding(
                "ascii85 group overflows 32 bits".to_string(),
            ));
        }

        let group = (value as u32).to_be_bytes();
        out.extend_from_slice(&group[..chunk.len() - 1]);
    }

    Ok(out)
}

fn digit_value(c: u8) -> Result<u8> {
    let digit = if c < 128 {
        ASCII85_REVERSE[c as usize]
    } else {
        NO_DIGIT
    };

    if digit == NO_DIGIT {
        return Err(VeilError::Encoding(format!(
            "character {:?} is not in the ascii85 alphabet",
            c as char
        )));
    }
    Ok(digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_is_distinct_and_safe() {
        let mut seen = std::collections::HashSet::new();
        for &c in ASCII85_ALPHABET.iter() {
            assert!(seen.insert(c), "duplicate symbol {}", c as char);
            assert!(c.is_ascii_graphic());
            assert!(!FORBIDDEN_CHARS.contains(&(c as char)));
        }
        assert_eq!(seen.len(), 85);
    }

    #[test]
    fn test_ascii85_known_values() {
        assert_eq!(encode(&[0, 0, 0, 0], Encoding::Ascii85), "!!!!!");
        assert_eq!(encode(&[0xFF; 4], Encoding::Ascii85), "|?_2!");
        assert_eq!(encode(&[], Encoding::Ascii85), "");
    }

    #[test]
    fn test_ascii85_partial_groups() {
        for len in 0..12 {
            let data: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let text = encode(&data, Encoding::Ascii85);
            assert_eq!(text.len(), len / 4 * 5 + if len % 4 == 0 { 0 } else { len % 4 + 1 });
            assert_eq!(decode(&text, Encoding::Ascii85).unwrap(), data);
        }
    }

    #[test]
    fn test_base64_is_padded_standard() {
        assert_eq!(encode(b"ab", Encoding::Base64), "YWI=");
        assert_eq!(encode(&[0xfb, 0xff], Encoding::Base64), "+/8=");
        assert_eq!(decode("YWI=", Encoding::Base64).unwrap(), b"ab");
    }

    #[test]
    fn test_encoding_is_idempotent() {
        let data: Vec<u8> = (0..=255u8).collect();
        for scheme in [Encoding::Base64, Encoding::Ascii85] {
            assert_eq!(encode(&data, scheme), encode(&data, scheme));
        }
    }

    #[test]
    fn test_ascii85_rejects_foreign_characters() {
        let result = decode("!!<!!", Encoding::Ascii85);
        assert!(matches!(result, Err(VeilError::Encoding(_))));

        let result = decode("!!é!", Encoding::Ascii85);
        assert!(matches!(result, Err(VeilError::Encoding(_))));
    }

    #[test]
    fn test_ascii85_rejects_dangling_digit() {
        let result = decode("!!!!!!", Encoding::Ascii85);
        assert!(matches!(result, Err(VeilError::Encoding(_))));
    }

    #[test]
    fn test_ascii85_rejects_overflow() {
        let result = decode("~~~~~", Encoding::Ascii85);
        assert!(matches!(result, Err(VeilError::Encoding(_))));
    }

    #[test]
    fn test_base64_rejects_garbage() {
        let result = decode("not base64!", Encoding::Base64);
        assert!(matches!(result, Err(VeilError::Encoding(_))));
    }
}
