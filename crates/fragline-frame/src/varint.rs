//! Length prefixes for inlined descriptors and events.
//!
//! A length is written as big-endian 7-bit groups. Every byte but the last
//! has its high bit set.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

const CONTINUATION: u8 = 0x80;
const GROUP_MASK: u8 = 0x7f;

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: usize) -> usize {
    let mut len = 1;
    while len < 10 && value >> (7 * len) != 0 {
        len += 1;
    }
    len
}

/// Append the varint encoding of `value` to `dst`.
pub fn encode_varint(value: usize, dst: &mut BytesMut) {
    let len = encoded_len(value);
    dst.reserve(len);
    for group in (0..len).rev() {
        let bits = ((value >> (7 * group)) as u8) & GROUP_MASK;
        if group > 0 {
            dst.put_u8(CONTINUATION | bits);
        } else {
            dst.put_u8(bits);
        }
    }
}

/// Decode a varint length from the front of `src`.
///
/// Returns `(length, prefix_len)`. The decoded length is checked against
/// the bytes that follow the prefix, so a caller can slice
/// `src[prefix_len..prefix_len + length]` without further checks.
pub fn decode_varint(src: &[u8]) -> Result<(usize, usize)> {
    let mut value: usize = 0;
    let mut offset = 0;

    loop {
        let Some(&byte) = src.get(offset) else {
            return Err(FrameError::TruncatedInput);
        };
        offset += 1;

        if value > usize::MAX >> 7 {
            return Err(FrameError::OversizedLength {
                length: usize::MAX,
                remaining: src.len() - offset,
            });
        }
        value = (value << 7) | usize::from(byte & GROUP_MASK);

        if byte & CONTINUATION == 0 {
            break;
        }
    }

    let remaining = src.len() - offset;
    if value > remaining {
        return Err(FrameError::OversizedLength {
            length: value,
            remaining,
        });
    }

    Ok((value, offset))
}

/// Split a length-prefixed field off the front of `src`.
///
/// Returns the field bytes and the total number of bytes consumed.
pub fn read_prefixed(src: &[u8]) -> Result<(&[u8], usize)> {
    let (length, prefix) = decode_varint(src)?;
    Ok((&src[prefix..prefix + length], prefix + length))
}
