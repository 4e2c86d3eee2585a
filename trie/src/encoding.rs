//! Key codecs for the trie.
//!
//! Keys exist in three encodings:
//!
//! - **keybytes**: the raw byte string supplied by the caller.
//! - **hex**: one nibble per byte, with an optional trailing terminator
//!   `0x10` marking a key that ends at a value (leaf).
//! - **compact** (hex-prefix): the wire form used inside node encodings.
//!   The first nibble carries the leaf flag and the odd-length flag, so
//!   the terminator and any odd nibble fold into the header byte.

/// The terminator nibble appended to leaf keys in hex encoding.
pub const TERMINATOR: u8 = 0x10;

/// Converts raw key bytes to hex nibbles with a trailing terminator.
pub fn keybytes_to_hex(key: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(key.len() * 2 + 1);
    for b in key {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0f);
    }
    nibbles.push(TERMINATOR);
    nibbles
}

/// Returns true if the hex key ends with the terminator nibble.
pub fn has_term(hex: &[u8]) -> bool {
    hex.last() == Some(&TERMINATOR)
}

/// Converts a hex-nibble key to its compact (hex-prefix) encoding.
pub fn hex_to_compact(hex: &[u8]) -> Vec<u8> {
    let mut hex = hex;
    let mut terminator = 0u8;
    if has_term(hex) {
        terminator = 1;
        hex = &hex[..hex.len() - 1];
    }

    let mut buf = vec![0u8; hex.len() / 2 + 1];
    buf[0] = terminator << 5; // the flag byte
    if hex.len() & 1 == 1 {
        buf[0] |= 1 << 4; // odd flag
        buf[0] |= hex[0]; // first nibble goes into the flag byte
        hex = &hex[1..];
    }
    for (i, pair) in hex.chunks(2).enumerate() {
        buf[i + 1] = (pair[0] << 4) | pair[1];
    }
    buf
}

/// Converts a compact-encoded key back to hex nibbles, restoring the
/// terminator for leaf keys.
pub fn compact_to_hex(compact: &[u8]) -> Vec<u8> {
    if compact.is_empty() {
        return Vec::new();
    }
    let mut base = keybytes_to_hex(compact);
    // The terminator appended by keybytes_to_hex only belongs to leaves.
    if base[0] < 2 {
        base.pop();
    }
    // The flag byte holds one usable nibble when the length is odd.
    let chop = 2 - (base[0] & 1) as usize;
    base.drain(..chop);
    base
}

/// Length of the common prefix of two nibble keys.
pub fn prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_compact_known_vectors() {
        // (hex nibbles, compact encoding)
        let cases: Vec<(Vec<u8>, Vec<u8>)> = vec![
            // empty extension
            (vec![], vec![0x00]),
            // empty leaf
            (vec![16], vec![0x20]),
            // odd extension
            (vec![1, 2, 3, 4, 5], vec![0x11, 0x23, 0x45]),
            // even extension
            (vec![0, 1, 2, 3, 4, 5], vec![0x00, 0x01, 0x23, 0x45]),
            // even leaf
            (vec![15, 1, 12, 11, 8, 16], vec![0x20, 0x0f, 0x1c, 0xb8]),
            // odd leaf
            (vec![1, 2, 3, 4, 5, 16], vec![0x31, 0x23, 0x45]),
        ];
        for (hex, compact) in cases {
            assert_eq!(hex_to_compact(&hex), compact, "encode {hex:?}");
            assert_eq!(compact_to_hex(&compact), hex, "decode {compact:?}");
        }
    }

    #[test]
    fn keybytes_roundtrip() {
        let key = b"dogglesworth";
        let hex = keybytes_to_hex(key);
        assert_eq!(hex.len(), key.len() * 2 + 1);
        assert!(has_term(&hex));
        assert_eq!(hex[0], b'd' >> 4);
        assert_eq!(hex[1], b'd' & 0x0f);
    }

    #[test]
    fn common_prefix() {
        assert_eq!(prefix_len(&[1, 2, 3], &[1, 2, 4]), 2);
        assert_eq!(prefix_len(&[1, 2], &[1, 2, 4]), 2);
        assert_eq!(prefix_len(&[], &[1]), 0);
        assert_eq!(prefix_len(&[9], &[1]), 0);
    }
}
