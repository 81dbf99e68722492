//! Tag codec: converts document field values to and from the restricted
//! blob-tag alphabet `^[A-Za-z0-9 .\-/:_]+$`, preserving equality and, for
//! numbers and timestamps, lexicographic order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Fixed digit width for the zero-padded integer encoding. Wide enough for
/// the magnitude of any `i64` (max magnitude has 19 digits).
const INTEGER_DIGIT_WIDTH: usize = 19;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed tag escape sequence in {0:?}")]
    MalformedEscape(String),
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

fn is_unescaped(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '/' | ':')
}

/// Encode an arbitrary string into the reversible tag form: double every
/// `_`, escape every other disallowed character as `_XX` (uppercase hex
/// of its UTF-8 byte).
pub fn encode_reversible(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '_' {
            out.push_str("__");
        } else if is_unescaped(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("_{byte:02X}"));
            }
        }
    }
    out
}

/// Inverse of [`encode_reversible`]. Scans for `_` followed by two hex
/// digits (a byte escape) or a doubled `_` (a literal underscore); any
/// other lone `_` is malformed.
pub fn decode_reversible(tag: &str) -> Result<String, CodecError> {
    let bytes = tag.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            if bytes.get(i + 1) == Some(&b'_') {
                out.push(b'_');
                i += 2;
            } else if i + 2 < bytes.len() {
                let hex = &tag[i + 1..i + 3];
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|_| CodecError::MalformedEscape(tag.to_string()))?;
                out.push(byte);
                i += 3;
            } else {
                return Err(CodecError::MalformedEscape(tag.to_string()));
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| CodecError::InvalidUtf8)
}

/// Encode a signed integer as a fixed-width, zero-padded decimal with a
/// sign prefix, such that lexicographic order on the result matches
/// numeric order. The sign prefix is `-` for negative and `.` for
/// non-negative (both already members of the unescaped tag alphabet), and
/// `-` (0x2D) sorts before `.` (0x2E), so the property holds on the raw
/// output with no further escaping required. Negative magnitudes are
/// digit-inverted (`9 - d`) so that a more-negative value sorts before a
/// less-negative one once zero-padded.
pub fn encode_integer(n: i64) -> String {
    if n >= 0 {
        format!(".{:0width$}", n as u64, width = INTEGER_DIGIT_WIDTH)
    } else {
        let magnitude = n.unsigned_abs();
        let digits = format!("{magnitude:0width$}", width = INTEGER_DIGIT_WIDTH);
        let inverted: String = digits
            .chars()
            .map(|c| {
                let d = c.to_digit(10).expect("decimal digit");
                std::char::from_digit(9 - d, 10).expect("single inverted digit")
            })
            .collect();
        format!("-{inverted}")
    }
}

/// Decode a string produced by [`encode_integer`] back to its `i64`.
pub fn decode_integer(s: &str) -> Result<i64, CodecError> {
    let malformed = || CodecError::MalformedEscape(s.to_string());
    if s.is_empty() {
        return Err(malformed());
    }
    let (sign, digits) = s.split_at(1);
    match sign {
        "." => digits.parse::<u64>().map(|v| v as i64).map_err(|_| malformed()),
        "-" => {
            let inverted: String = digits
                .chars()
                .map(|c| {
                    let d = c.to_digit(10).ok_or_else(malformed)?;
                    Ok(std::char::from_digit(9 - d, 10).expect("single inverted digit"))
                })
                .collect::<Result<_, CodecError>>()?;
            let magnitude: u64 = inverted.parse().map_err(|_| malformed())?;
            // `wrapping_neg` handles `magnitude == i64::MIN.unsigned_abs()`
            // correctly: casting that magnitude to `i64` wraps to `i64::MIN`,
            // and negating `i64::MIN` with unary `-` would overflow, but
            // `i64::MIN.wrapping_neg() == i64::MIN` is exactly the value we want.
            Ok((magnitude as i64).wrapping_neg())
        }
        _ => Err(malformed()),
    }
}

/// Encode a UTC timestamp as the canonical extended ISO-8601 form
/// `YYYY-MM-DDTHH:MM:SS.sssZ`. Every character in this form
/// is already in the unescaped tag alphabet, so string order equals
/// chronological order without further escaping.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a timestamp produced by [`encode_timestamp`].
pub fn decode_timestamp(s: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CodecError::MalformedEscape(s.to_string()))
}

/// Encode a JSON value as a blob tag value. Returns `None` for value
/// types with no tag encoding
/// (the write path logs a warning and skips tagging that field).
pub fn encode(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                Some(encode_reversible(&encode_timestamp(ts.with_timezone(&Utc))))
            } else {
                Some(encode_reversible(s))
            }
        }
        Value::Number(n) => n.as_i64().map(|i| encode_reversible(&encode_integer(i))),
        _ => None,
    }
}

/// Decode a tag value produced by [`encode`] back to its textual form.
/// Callers that know a field is numeric or temporal should further pass
/// this through [`decode_integer`]/[`decode_timestamp`].
pub fn decode(tag: &str) -> Result<String, CodecError> {
    decode_reversible(tag)
}

/// Hashed form: the lowercase hex SHA-256 digest of the value's UTF-8
/// bytes, for unique fields whose natural values might
/// collide after escaping or exceed the 256-byte tag limit. Hashed tags
/// support equality only.
pub fn hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}
