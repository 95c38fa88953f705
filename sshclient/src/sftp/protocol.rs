//! SFTP version 3 wire framing and the request/reply type/status
//! tables (§6.3). Framing (`length(u32) || type(u8) || payload`) is
//! distinct from the Binary Packet Protocol in `packet.rs` — it rides
//! inside a channel's `CHANNEL_DATA` stream rather than the socket
//! directly, mirrored from how `aneoconsulting-tf-provider/rusftp`
//! layers its own SFTP framing over an arbitrary `AsyncRead`/`AsyncWrite`.

use crate::codec::{read_string, read_u32_be, write_string, write_u32_be};
use crate::error::{Error, ProtocolSnafu, Result, SftpStatusSnafu};
use snafu::ensure;

pub mod pkt {
    pub const INIT: u8 = 1;
    pub const VERSION: u8 = 2;
    pub const OPEN: u8 = 3;
    pub const CLOSE: u8 = 4;
    pub const READ: u8 = 5;
    pub const WRITE: u8 = 6;
    pub const LSTAT: u8 = 7;
    pub const FSTAT: u8 = 8;
    pub const SETSTAT: u8 = 9;
    pub const FSETSTAT: u8 = 10;
    pub const OPENDIR: u8 = 11;
    pub const READDIR: u8 = 12;
    pub const REMOVE: u8 = 13;
    pub const MKDIR: u8 = 14;
    pub const RMDIR: u8 = 15;
    pub const REALPATH: u8 = 16;
    pub const STAT: u8 = 17;
    pub const RENAME: u8 = 18;
    pub const READLINK: u8 = 19;
    pub const SYMLINK: u8 = 20;
    pub const STATUS: u8 = 101;
    pub const HANDLE: u8 = 102;
    pub const DATA: u8 = 103;
    pub const NAME: u8 = 104;
    pub const ATTRS: u8 = 105;
}

pub mod open_flag {
    pub const READ: u32 = 0x01;
    pub const WRITE: u32 = 0x02;
    pub const APPEND: u32 = 0x04;
    pub const CREAT: u32 = 0x08;
    pub const TRUNC: u32 = 0x10;
    pub const EXCL: u32 = 0x20;
}

pub mod status_code {
    pub const OK: u32 = 0;
    pub const EOF: u32 = 1;
    pub const NO_SUCH_FILE: u32 = 2;
    pub const PERMISSION_DENIED: u32 = 3;
    pub const FAILURE: u32 = 4;
    pub const BAD_MESSAGE: u32 = 5;
    pub const NO_CONNECTION: u32 = 6;
    pub const CONNECTION_LOST: u32 = 7;
    pub const OP_UNSUPPORTED: u32 = 8;
    pub const INVALID_HANDLE: u32 = 9;
    pub const NO_SUCH_PATH: u32 = 10;
    pub const FILE_ALREADY_EXISTS: u32 = 11;
    pub const WRITE_PROTECT: u32 = 12;
    pub const NO_MEDIA: u32 = 13;
}

pub const PROTOCOL_VERSION: u32 = 3;

/// Frames `msg_type || payload` (the `request_id` already lives at
/// the front of `payload` per §4.B7) with its length prefix.
pub fn frame(msg_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + payload.len());
    write_u32_be(&mut out, 1 + payload.len() as u32);
    out.push(msg_type);
    out.extend_from_slice(payload);
    out
}

/// Splits one length-prefixed SFTP frame off the front of `buf`,
/// returning `(msg_type, body, bytes_consumed)`. `body` excludes the
/// `request_id` — callers read that themselves, since INIT/VERSION
/// have no request id.
pub fn split_frame(buf: &[u8]) -> Result<Option<(u8, &[u8], usize)>> {
    if buf.len() < 5 {
        return Ok(None);
    }
    let mut pos = 0;
    let len = read_u32_be(buf, &mut pos)? as usize;
    ensure!(len >= 1, ProtocolSnafu { reason: "SFTP frame length must cover the type byte" });
    if buf.len() < 4 + len {
        return Ok(None);
    }
    let msg_type = buf[4];
    let body = &buf[5..4 + len];
    Ok(Some((msg_type, body, 4 + len)))
}

pub fn encode_init(version: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    write_u32_be(&mut payload, version);
    frame(pkt::INIT, &payload)
}

pub fn decode_version(body: &[u8]) -> Result<u32> {
    let mut pos = 0;
    read_u32_be(body, &mut pos)
}

pub fn encode_handle_request(msg_type: u8, request_id: u32, handle: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    write_u32_be(&mut payload, request_id);
    write_string(&mut payload, handle);
    frame(msg_type, &payload)
}

pub fn encode_path_request(msg_type: u8, request_id: u32, path: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    write_u32_be(&mut payload, request_id);
    write_string(&mut payload, path.as_bytes());
    frame(msg_type, &payload)
}

/// Reads `request_id` off the front of an SFTP reply body.
pub fn decode_request_id(body: &[u8]) -> Result<(u32, usize)> {
    let mut pos = 0;
    let id = read_u32_be(body, &mut pos)?;
    Ok((id, pos))
}

pub struct StatusReply {
    pub request_id: u32,
    pub code: u32,
    pub message: String,
}

pub fn decode_status(body: &[u8]) -> Result<StatusReply> {
    let mut pos = 0;
    let request_id = read_u32_be(body, &mut pos)?;
    let code = read_u32_be(body, &mut pos)?;
    let message = if body.len() > pos {
        String::from_utf8_lossy(read_string(body, &mut pos)?).into_owned()
    } else {
        String::new()
    };
    Ok(StatusReply { request_id, code, message })
}

/// Converts a non-OK `STATUS` reply into an error; `Eof` is handled
/// by callers that expect it (e.g. `read`/`readdir` at end of data),
/// so this is only called once a genuine failure is established.
pub fn status_to_error(status: &StatusReply) -> Error {
    SftpStatusSnafu { code: status.code, message: status.message.clone() }.build()
}

pub fn decode_handle(body: &[u8]) -> Result<(u32, Vec<u8>)> {
    let mut pos = 0;
    let request_id = read_u32_be(body, &mut pos)?;
    let handle = read_string(body, &mut pos)?.to_vec();
    Ok((request_id, handle))
}

pub fn decode_data(body: &[u8]) -> Result<(u32, Vec<u8>)> {
    let mut pos = 0;
    let request_id = read_u32_be(body, &mut pos)?;
    let data = read_string(body, &mut pos)?.to_vec();
    Ok((request_id, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip_splits_cleanly() {
        let framed = frame(pkt::STATUS, &[1, 2, 3, 4]);
        let (msg_type, body, consumed) = split_frame(&framed).unwrap().unwrap();
        assert_eq!(msg_type, pkt::STATUS);
        assert_eq!(body, &[1, 2, 3, 4]);
        assert_eq!(consumed, framed.len());
    }

    #[test]
    fn split_frame_waits_for_more_bytes() {
        let framed = frame(pkt::STATUS, &[1, 2, 3, 4]);
        assert!(split_frame(&framed[..4]).unwrap().is_none());
    }

    #[test]
    fn handle_roundtrip() {
        let encoded = encode_handle_request(pkt::CLOSE, 7, b"abc");
        let (_, body, _) = split_frame(&encoded).unwrap().unwrap();
        let (id, rest) = decode_request_id(body).unwrap();
        assert_eq!(id, 7);
        assert_eq!(&body[rest..], b"\0\0\0\x03abc");
    }
}
