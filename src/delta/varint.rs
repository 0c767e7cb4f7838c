// Base-128 variable-length integers used for the delta length header.
//
// Little-endian: least-significant 7-bit group first. Every byte except the
// last has bit 7 set. Decoding stops at the first byte with bit 7 clear and
// ignores anything after it.

use crate::error::{DeltaError, Result};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into `buf`, returning the number of bytes used (1..=10).
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    while num >= 0x80 {
        buf[i] = (num as u8) | 0x80;
        num >>= 7;
        i += 1;
    }
    buf[i] = num as u8;
    i + 1
}

/// Append the encoding of `num` to `out`.
pub fn write_u64(out: &mut Vec<u8>, num: u64) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    out.extend_from_slice(&buf[..len]);
}

/// Append the encoding of `num` to `out`.
#[inline]
pub fn write_usize(out: &mut Vec<u8>, num: usize) {
    write_u64(out, num as u64);
}

/// Encode `num` into a fresh buffer.
pub fn encode_base128(num: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(sizeof_u64(num));
    write_u64(&mut out, num);
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a value from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize)> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(DeltaError::corrupt("varint longer than 10 bytes"));
        }
        let group = u64::from(byte & 0x7F);
        let shift = 7 * i as u32;
        if shift == 63 && group > 1 {
            return Err(DeltaError::corrupt("varint overflows 64 bits"));
        }
        val |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(DeltaError::truncated("varint", data.len()))
}

/// Decode a `usize` from the front of `data`.
pub fn read_usize(data: &[u8]) -> Result<(usize, usize)> {
    let (val, len) = read_u64(data)?;
    let val = usize::try_from(val).map_err(|_| DeltaError::corrupt("varint exceeds usize"))?;
    Ok((val, len))
}

/// Decode the value starting at `pos`, returning `(value, bytes_consumed)`.
pub fn decode_base128(data: &[u8], pos: usize) -> Result<(u64, usize)> {
    let tail = data
        .get(pos..)
        .ok_or_else(|| DeltaError::truncated("varint", pos))?;
    let (val, len) = read_u64(tail).map_err(|e| match e {
        DeltaError::TruncatedInput { what, .. } => DeltaError::truncated(what, data.len()),
        other => other,
    })?;
    Ok((val, len))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Encoded byte-length of `num`.
#[inline]
pub fn sizeof_u64(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    bits.max(1).div_ceil(7) as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_values() {
        assert_eq!(encode_base128(0), b"\x00");
        assert_eq!(encode_base128(1), b"\x01");
        assert_eq!(encode_base128(2), b"\x02");
        assert_eq!(encode_base128(127), b"\x7f");
        assert_eq!(encode_base128(128), b"\x80\x01");
        assert_eq!(encode_base128(255), b"\xff\x01");
        assert_eq!(encode_base128(256), b"\x80\x02");
        assert_eq!(encode_base128(0xFFFF_FFFF), b"\xff\xff\xff\xff\x0f");
    }

    #[test]
    fn decode_known_values() {
        assert_eq!(read_u64(b"\x01").unwrap(), (1, 1));
        assert_eq!(read_u64(b"\x02").unwrap(), (2, 1));
        assert_eq!(read_u64(b"\x7f").unwrap(), (127, 1));
        assert_eq!(read_u64(b"\x80\x01").unwrap(), (128, 2));
        assert_eq!(read_u64(b"\xff\x01").unwrap(), (255, 2));
        assert_eq!(read_u64(b"\x80\x02").unwrap(), (256, 2));
        assert_eq!(read_u64(b"\xff\xff\xff\xff\x0f").unwrap(), (0xFFFF_FFFF, 5));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        assert_eq!(read_u64(b"\x01abcdef").unwrap(), (1, 1));
        assert_eq!(read_u64(b"\x7f\x01").unwrap(), (127, 1));
        assert_eq!(read_u64(b"\x80\x01abcdef").unwrap(), (128, 2));
        assert_eq!(read_u64(b"\xff\x01\xff").unwrap(), (255, 2));
    }

    #[test]
    fn decode_from_offset() {
        assert_eq!(decode_base128(b"ab\x80\x01cd", 2).unwrap(), (128, 2));
        assert_eq!(decode_base128(b"xyz\x05", 3).unwrap(), (5, 1));
    }

    #[test]
    fn truncated_input() {
        assert!(matches!(
            read_u64(b""),
            Err(DeltaError::TruncatedInput { .. })
        ));
        assert!(matches!(
            read_u64(b"\x80\x80"),
            Err(DeltaError::TruncatedInput { offset: 2, .. })
        ));
        assert!(matches!(
            decode_base128(b"\x01", 5),
            Err(DeltaError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn overlong_input_rejected() {
        let overlong = [0xFFu8; 11];
        assert!(matches!(
            read_u64(&overlong),
            Err(DeltaError::CorruptDelta(_))
        ));
    }

    #[test]
    fn u64_max_roundtrip() {
        let enc = encode_base128(u64::MAX);
        assert_eq!(enc.len(), MAX_VARINT_LEN);
        assert_eq!(read_u64(&enc).unwrap(), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn sizeof_matches_encoding() {
        for &v in &[0u64, 1, 127, 128, 16383, 16384, 1 << 35, u64::MAX] {
            assert_eq!(sizeof_u64(v), encode_base128(v).len(), "value {v}");
        }
    }
}
