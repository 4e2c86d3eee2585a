//! Helpers for splitting raw RLP without materializing a parse tree.
//!
//! Node decoding only ever needs to peel one item at a time off an
//! encoded list, so these functions operate directly on byte slices and
//! return borrowed content.

use alloy_rlp::Error as RlpError;

/// The kind of a raw RLP item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A byte string.
    String,
    /// A list.
    List,
}

/// Reads the kind and size tags of the first item in `buf`.
///
/// Returns `(kind, tag_size, content_size)`.
fn read_kind(buf: &[u8]) -> Result<(Kind, usize, usize), RlpError> {
    let first = *buf.first().ok_or(RlpError::InputTooShort)?;
    match first {
        0x00..=0x7f => Ok((Kind::String, 0, 1)),
        0x80..=0xb7 => {
            let size = (first - 0x80) as usize;
            if size == 1 {
                let content = *buf.get(1).ok_or(RlpError::InputTooShort)?;
                if content < 0x80 {
                    return Err(RlpError::Custom("non-canonical single byte"));
                }
            }
            Ok((Kind::String, 1, size))
        }
        0xb8..=0xbf => {
            let lenlen = (first - 0xb7) as usize;
            let size = read_size(buf.get(1..).ok_or(RlpError::InputTooShort)?, lenlen)?;
            Ok((Kind::String, 1 + lenlen, size))
        }
        0xc0..=0xf7 => Ok((Kind::List, 1, (first - 0xc0) as usize)),
        0xf8..=0xff => {
            let lenlen = (first - 0xf7) as usize;
            let size = read_size(buf.get(1..).ok_or(RlpError::InputTooShort)?, lenlen)?;
            Ok((Kind::List, 1 + lenlen, size))
        }
    }
}

/// Reads a big-endian size of `lenlen` bytes, rejecting non-canonical
/// encodings.
fn read_size(buf: &[u8], lenlen: usize) -> Result<usize, RlpError> {
    if buf.len() < lenlen {
        return Err(RlpError::InputTooShort);
    }
    if buf[0] == 0 {
        return Err(RlpError::Custom("size with leading zero"));
    }
    let mut size = 0usize;
    for &b in &buf[..lenlen] {
        size = size
            .checked_shl(8)
            .ok_or(RlpError::Custom("size overflow"))?
            | b as usize;
    }
    if size < 56 {
        return Err(RlpError::Custom("non-canonical size"));
    }
    Ok(size)
}

/// Splits `buf` into the first item's `(kind, content, rest)`.
pub fn split(buf: &[u8]) -> Result<(Kind, &[u8], &[u8]), RlpError> {
    let (kind, tag_size, content_size) = read_kind(buf)?;
    let total = tag_size
        .checked_add(content_size)
        .ok_or(RlpError::Custom("size overflow"))?;
    if buf.len() < total {
        return Err(RlpError::InputTooShort);
    }
    Ok((kind, &buf[tag_size..total], &buf[total..]))
}

/// Splits off the content of a list item.
pub fn split_list(buf: &[u8]) -> Result<(&[u8], &[u8]), RlpError> {
    match split(buf)? {
        (Kind::List, content, rest) => Ok((content, rest)),
        _ => Err(RlpError::Custom("expected list")),
    }
}

/// Splits off the content of a string item.
pub fn split_string(buf: &[u8]) -> Result<(&[u8], &[u8]), RlpError> {
    match split(buf)? {
        (Kind::String, content, rest) => Ok((content, rest)),
        _ => Err(RlpError::Custom("expected string")),
    }
}

/// Counts the encoded values in `buf` (typically list content).
pub fn count_values(buf: &[u8]) -> Result<usize, RlpError> {
    let mut count = 0;
    let mut rest = buf;
    while !rest.is_empty() {
        let (_, _, next) = split(rest)?;
        rest = next;
        count += 1;
    }
    Ok(count)
}
