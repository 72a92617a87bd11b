//! LEB128 variable-length integers.
//!
//! Unsigned LEB128 is used for every count, index and size in the binary
//! format; signed LEB128 for `i32.const` / `i64.const` immediates. Writers
//! always produce the minimal number of 7-bit groups. Readers also accept
//! padded encodings, so those do not survive a round trip byte for byte.

use crate::cursor::ByteCursor;
use crate::error::DecodeError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;
const SIGN: u8 = 0x40;

fn read_unsigned(cursor: &mut ByteCursor<'_>, bits: u32) -> Result<u64, DecodeError> {
    let start = cursor.offset();
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = cursor.read_byte()?;
        result |= u64::from(byte & PAYLOAD) << shift;
        if byte & CONTINUATION == 0 {
            break;
        }
        shift += 7;
        if shift >= bits {
            return Err(DecodeError::VarintOverflow { offset: start });
        }
    }
    if bits < 64 && result >> bits != 0 {
        return Err(DecodeError::VarintOverflow { offset: start });
    }
    Ok(result)
}

fn read_signed(cursor: &mut ByteCursor<'_>, bits: u32) -> Result<i64, DecodeError> {
    let start = cursor.offset();
    let mut result = 0i64;
    let mut shift = 0u32;
    loop {
        let byte = cursor.read_byte()?;
        result |= i64::from(byte & PAYLOAD) << shift;
        shift += 7;
        if byte & CONTINUATION == 0 {
            if shift < 64 && byte & SIGN != 0 {
                result |= -1i64 << shift;
            }
            return Ok(result);
        }
        if shift >= bits {
            return Err(DecodeError::VarintOverflow { offset: start });
        }
    }
}

/// Decodes an unsigned LEB128 value that must fit in a `u32`.
pub fn read_u32(cursor: &mut ByteCursor<'_>) -> Result<u32, DecodeError> {
    let value = read_unsigned(cursor, 32)?;
    // read_unsigned already rejected anything wider than 32 bits
    Ok(value as u32)
}

/// Decodes a signed LEB128 value that must fit in an `i32`.
pub fn read_i32(cursor: &mut ByteCursor<'_>) -> Result<i32, DecodeError> {
    let start = cursor.offset();
    let value = read_signed(cursor, 32)?;
    i32::try_from(value).map_err(|_| DecodeError::VarintOverflow { offset: start })
}

/// Decodes a signed LEB128 value that must fit in an `i64`.
pub fn read_i64(cursor: &mut ByteCursor<'_>) -> Result<i64, DecodeError> {
    read_signed(cursor, 64)
}

/// Appends `value` as unsigned LEB128.
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    let mut value = value;
    loop {
        let mut byte = (value as u8) & PAYLOAD;
        value >>= 7;
        if value != 0 {
            byte |= CONTINUATION;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Appends `value` as signed LEB128.
pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    let mut value = value;
    loop {
        let byte = (value as u8) & PAYLOAD;
        value >>= 7;
        let done = (value == 0 && byte & SIGN == 0) || (value == -1 && byte & SIGN != 0);
        if done {
            out.push(byte);
            break;
        }
        out.push(byte | CONTINUATION);
    }
}

/// Appends `value` as signed LEB128. Same bytes as the sign-extended `i64`.
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    write_i64(out, i64::from(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, value);
        out
    }

    fn signed(value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        write_i64(&mut out, value);
        out
    }

    #[test]
    fn unsigned_known_encodings() {
        assert_eq!(unsigned(0), vec![0x00]);
        assert_eq!(unsigned(127), vec![0x7f]);
        assert_eq!(unsigned(128), vec![0x80, 0x01]);
        assert_eq!(unsigned(624_485), vec![0xe5, 0x8e, 0x26]);
        assert_eq!(unsigned(u32::MAX), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn signed_known_encodings() {
        assert_eq!(signed(0), vec![0x00]);
        assert_eq!(signed(-1), vec![0x7f]);
        assert_eq!(signed(63), vec![0x3f]);
        // 64 needs a second group because bit 6 would read as the sign
        assert_eq!(signed(64), vec![0xc0, 0x00]);
        assert_eq!(signed(-64), vec![0x40]);
        assert_eq!(signed(-123_456), vec![0xc0, 0xbb, 0x78]);
    }

    #[test]
    fn unsigned_decodes_what_it_encodes() {
        for value in [0, 1, 127, 128, 16_383, 16_384, 1 << 28, u32::MAX] {
            let bytes = unsigned(value);
            let mut cursor = ByteCursor::new(&bytes);
            assert_eq!(read_u32(&mut cursor).unwrap(), value);
            assert!(cursor.is_empty(), "trailing bytes for {value}");
        }
    }

    #[test]
    fn signed_i32_decodes_what_it_encodes() {
        for value in [0, 1, -1, 63, 64, -64, -65, i32::MAX, i32::MIN] {
            let mut bytes = Vec::new();
            write_i32(&mut bytes, value);
            let mut cursor = ByteCursor::new(&bytes);
            assert_eq!(read_i32(&mut cursor).unwrap(), value);
            assert!(cursor.is_empty(), "trailing bytes for {value}");
        }
    }

    #[test]
    fn signed_i64_extremes() {
        for value in [i64::MAX, i64::MIN, -(1 << 40), 1 << 40] {
            let bytes = signed(value);
            assert!(bytes.len() <= 10);
            let mut cursor = ByteCursor::new(&bytes);
            assert_eq!(read_i64(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn decoding_stops_at_first_terminal_byte() {
        let bytes = [0x05, 0x80];
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(read_u32(&mut cursor).unwrap(), 5);
        assert_eq!(cursor.bytes_read(), 1);
    }

    #[test]
    fn empty_and_unterminated_inputs_are_truncated() {
        let mut cursor = ByteCursor::new(&[]);
        assert!(matches!(
            read_u32(&mut cursor),
            Err(DecodeError::TruncatedInput { .. })
        ));

        let mut cursor = ByteCursor::new(&[0x80, 0x80]);
        assert!(matches!(
            read_u32(&mut cursor),
            Err(DecodeError::TruncatedInput { offset: 2, .. })
        ));
    }

    #[test]
    fn oversized_values_overflow() {
        // six groups can never be a u32
        let mut cursor = ByteCursor::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(
            read_u32(&mut cursor),
            Err(DecodeError::VarintOverflow { offset: 0 })
        );

        // five groups, but the last carries bits above 2^32
        let mut cursor = ByteCursor::new(&[0xff, 0xff, 0xff, 0xff, 0x1f]);
        assert_eq!(
            read_u32(&mut cursor),
            Err(DecodeError::VarintOverflow { offset: 0 })
        );

        // i64::MAX encoded, read back as i32
        let bytes = signed(i64::MAX);
        let mut cursor = ByteCursor::new(&bytes);
        assert!(read_i32(&mut cursor).is_err());
    }
}
