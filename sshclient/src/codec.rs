//! SSH wire byte codec (§4.B1): the primitive encodings every packet
//! and key-exchange structure is built from.

use crate::error::{Error, ProtocolSnafu};
use snafu::ensure;

pub fn write_u32_be(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn read_u32_be(buf: &[u8], pos: &mut usize) -> Result<u32, Error> {
    ensure!(
        buf.len() >= *pos + 4,
        ProtocolSnafu {
            reason: "truncated u32"
        }
    );
    let v = u32::from_be_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(v)
}

pub fn read_u64_be(buf: &[u8], pos: &mut usize) -> Result<u64, Error> {
    ensure!(
        buf.len() >= *pos + 8,
        ProtocolSnafu {
            reason: "truncated u64"
        }
    );
    let v = u64::from_be_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    Ok(v)
}

pub fn write_string(buf: &mut Vec<u8>, s: &[u8]) {
    write_u32_be(buf, s.len() as u32);
    buf.extend_from_slice(s);
}

pub fn read_string<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], Error> {
    let len = read_u32_be(buf, pos)? as usize;
    ensure!(
        buf.len() >= *pos + len,
        ProtocolSnafu {
            reason: "truncated string"
        }
    );
    let s = &buf[*pos..*pos + len];
    *pos += len;
    Ok(s)
}

pub fn write_bool(buf: &mut Vec<u8>, b: bool) {
    buf.push(if b { 1 } else { 0 });
}

pub fn read_bool(buf: &[u8], pos: &mut usize) -> Result<bool, Error> {
    ensure!(
        buf.len() >= *pos + 1,
        ProtocolSnafu {
            reason: "truncated bool"
        }
    );
    let v = buf[*pos] != 0;
    *pos += 1;
    Ok(v)
}

/// Writes an arbitrary-precision integer in SSH `mpint` form (RFC4251
/// §5): big-endian two's complement, minimal length, with a leading
/// zero byte prepended whenever the high bit of the first byte would
/// otherwise make a non-negative value look negative.
pub fn write_mpint(buf: &mut Vec<u8>, bytes_be: &[u8]) {
    // Strip leading zero bytes first (minimal-length encoding).
    let mut start = 0;
    while start < bytes_be.len() && bytes_be[start] == 0 {
        start += 1;
    }
    let trimmed = &bytes_be[start..];
    if trimmed.is_empty() {
        write_string(buf, &[]);
        return;
    }
    if trimmed[0] & 0x80 != 0 {
        let mut with_zero = Vec::with_capacity(trimmed.len() + 1);
        with_zero.push(0);
        with_zero.extend_from_slice(trimmed);
        write_string(buf, &with_zero);
    } else {
        write_string(buf, trimmed);
    }
}

/// Writes a fixed-width unsigned value (e.g. a Curve25519 public
/// point) as an `mpint`, treating it as a big-endian magnitude.
pub fn write_mpint_from_uint(buf: &mut Vec<u8>, magnitude_be: &[u8]) {
    write_mpint(buf, magnitude_be)
}

pub fn read_mpint<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], Error> {
    read_string(buf, pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_roundtrip() {
        let mut buf = Vec::new();
        write_u32_be(&mut buf, 0xdead_beef);
        let mut pos = 0;
        assert_eq!(read_u32_be(&buf, &mut pos).unwrap(), 0xdead_beef);
        assert_eq!(pos, 4);
    }

    #[test]
    fn u64_roundtrip() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0xdead_beef_0000_0001u64.to_be_bytes());
        let mut pos = 0;
        assert_eq!(read_u64_be(&buf, &mut pos).unwrap(), 0xdead_beef_0000_0001);
        assert_eq!(pos, 8);
    }

    #[test]
    fn u64_rejects_truncated_input() {
        let buf = [0u8; 4];
        let mut pos = 0;
        assert!(read_u64_be(&buf, &mut pos).is_err());
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, b"ssh-ed25519");
        let mut pos = 0;
        assert_eq!(read_string(&buf, &mut pos).unwrap(), b"ssh-ed25519");
    }

    #[test]
    fn mpint_strips_leading_zeros() {
        let mut buf = Vec::new();
        write_mpint(&mut buf, &[0x00, 0x00, 0x01]);
        let mut pos = 0;
        assert_eq!(read_mpint(&buf, &mut pos).unwrap(), &[0x01]);
    }

    #[test]
    fn mpint_prepends_zero_for_high_bit() {
        let mut buf = Vec::new();
        write_mpint(&mut buf, &[0x80]);
        let mut pos = 0;
        assert_eq!(read_mpint(&buf, &mut pos).unwrap(), &[0x00, 0x80]);
    }

    #[test]
    fn mpint_all_zero_is_empty_string() {
        let mut buf = Vec::new();
        write_mpint(&mut buf, &[0x00, 0x00]);
        let mut pos = 0;
        assert_eq!(read_mpint(&buf, &mut pos).unwrap(), &[] as &[u8]);
    }
}
