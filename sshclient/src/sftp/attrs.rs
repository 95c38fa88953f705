//! `SSH_FXP_ATTRS` encode/decode (§4.B7): a `flags` bitmask followed,
//! in flag order, by only the fields whose bit is set. File type is
//! derived from the POSIX type bits of `permissions` rather than
//! carried as a separate field, matching SFTP v3.

use crate::codec::{read_string, read_u32_be, read_u64_be, write_string, write_u32_be};
use crate::error::{ProtocolSnafu, Result};
use snafu::ensure;

const SIZE: u32 = 0x0000_0001;
const UIDGID: u32 = 0x0000_0002;
const PERMISSIONS: u32 = 0x0000_0004;
const ACMODTIME: u32 = 0x0000_0008;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct Attrs {
    pub size: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub permissions: Option<u32>,
    pub atime: Option<u32>,
    pub mtime: Option<u32>,
}

impl Attrs {
    pub fn file_type(&self) -> FileType {
        match self.permissions.map(|p| p & S_IFMT) {
            Some(S_IFDIR) => FileType::Directory,
            Some(S_IFLNK) => FileType::Symlink,
            Some(S_IFREG) => FileType::Regular,
            _ => FileType::Other,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut flags = 0u32;
        if self.size.is_some() {
            flags |= SIZE;
        }
        if self.uid.is_some() && self.gid.is_some() {
            flags |= UIDGID;
        }
        if self.permissions.is_some() {
            flags |= PERMISSIONS;
        }
        if self.atime.is_some() && self.mtime.is_some() {
            flags |= ACMODTIME;
        }

        let mut out = Vec::new();
        write_u32_be(&mut out, flags);
        if let Some(size) = self.size {
            out.extend_from_slice(&size.to_be_bytes());
        }
        if flags & UIDGID != 0 {
            write_u32_be(&mut out, self.uid.unwrap());
            write_u32_be(&mut out, self.gid.unwrap());
        }
        if let Some(permissions) = self.permissions {
            write_u32_be(&mut out, permissions);
        }
        if flags & ACMODTIME != 0 {
            write_u32_be(&mut out, self.atime.unwrap());
            write_u32_be(&mut out, self.mtime.unwrap());
        }
        out
    }

    /// Decodes an ATTRS structure starting at `*pos`, advancing it
    /// past the structure.
    pub fn decode(buf: &[u8], pos: &mut usize) -> Result<Self> {
        let flags = read_u32_be(buf, pos)?;
        let mut attrs = Attrs::default();
        if flags & SIZE != 0 {
            attrs.size = Some(read_u64_be(buf, pos)?);
        }
        if flags & UIDGID != 0 {
            attrs.uid = Some(read_u32_be(buf, pos)?);
            attrs.gid = Some(read_u32_be(buf, pos)?);
        }
        if flags & PERMISSIONS != 0 {
            attrs.permissions = Some(read_u32_be(buf, pos)?);
        }
        if flags & ACMODTIME != 0 {
            attrs.atime = Some(read_u32_be(buf, pos)?);
            attrs.mtime = Some(read_u32_be(buf, pos)?);
        }
        Ok(attrs)
    }
}

/// One entry in a `NAME` reply (both `REALPATH`'s single entry and
/// `READDIR`'s batch share this shape).
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub filename: String,
    pub longname: String,
    pub attrs: Attrs,
}

/// Smallest possible on-wire entry: two empty strings (4 bytes of
/// length prefix each) plus an all-zero ATTRS flags word.
const MIN_NAME_ENTRY_LEN: usize = 4 + 4 + 4;

pub fn decode_name_entries(body: &[u8], mut pos: usize) -> Result<Vec<NameEntry>> {
    let count = read_u32_be(body, &mut pos)?;
    ensure!(
        count as usize <= body.len().saturating_sub(pos) / MIN_NAME_ENTRY_LEN,
        ProtocolSnafu {
            reason: "name entry count exceeds remaining buffer"
        }
    );
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let filename = String::from_utf8_lossy(read_string(body, &mut pos)?).into_owned();
        let longname = String::from_utf8_lossy(read_string(body, &mut pos)?).into_owned();
        let attrs = Attrs::decode(body, &mut pos)?;
        entries.push(NameEntry { filename, longname, attrs });
    }
    Ok(entries)
}

#[allow(dead_code)]
pub fn encode_name_entry(out: &mut Vec<u8>, entry: &NameEntry) {
    write_string(out, entry.filename.as_bytes());
    write_string(out, entry.longname.as_bytes());
    out.extend_from_slice(&entry.attrs.encode());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_roundtrip_with_all_fields_set() {
        let attrs = Attrs {
            size: Some(42),
            uid: Some(1000),
            gid: Some(1000),
            permissions: Some(0o100644),
            atime: Some(1000),
            mtime: Some(2000),
        };
        let encoded = attrs.encode();
        let mut pos = 0;
        let decoded = Attrs::decode(&encoded, &mut pos).unwrap();
        assert_eq!(decoded.size, Some(42));
        assert_eq!(decoded.permissions, Some(0o100644));
        assert_eq!(decoded.file_type(), FileType::Regular);
    }

    #[test]
    fn attrs_with_no_fields_encodes_to_just_flags() {
        let attrs = Attrs::default();
        let encoded = attrs.encode();
        assert_eq!(encoded, vec![0, 0, 0, 0]);
    }

    #[test]
    fn directory_permissions_yield_directory_file_type() {
        let attrs = Attrs { permissions: Some(0o040755), ..Attrs::default() };
        assert_eq!(attrs.file_type(), FileType::Directory);
    }

    #[test]
    fn attrs_decode_rejects_truncated_size_field() {
        // SIZE flag set but only 3 bytes of the 8-byte value follow.
        let buf = [0, 0, 0, 1, 0, 0, 0];
        let mut pos = 0;
        assert!(Attrs::decode(&buf, &mut pos).is_err());
    }

    #[test]
    fn decode_name_entries_rejects_oversized_count() {
        let mut body = Vec::new();
        write_u32_be(&mut body, u32::MAX);
        assert!(decode_name_entries(&body, 0).is_err());
    }

    #[test]
    fn decode_name_entries_accepts_matching_count() {
        let mut body = Vec::new();
        write_u32_be(&mut body, 1);
        write_string(&mut body, b"file.txt");
        write_string(&mut body, b"-rw-r--r-- file.txt");
        body.extend_from_slice(&Attrs::default().encode());
        let entries = decode_name_entries(&body, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "file.txt");
    }
}
