//! `SftpSession`/`SftpFile`/`SftpDir` (§3.2, §4.B7): the request/reply
//! loop over a channel's `CHANNEL_DATA` stream, and the file/directory
//! handle API built on top of it.
//!
//! `SftpFile`/`SftpDir` hold a lightweight `Handle` (table index +
//! generation) rather than a back-reference into `SftpSession`
//! (design note §9): every operation takes the owning `SftpSession`
//! (and, transitively, the `Session` whose channel it rides on)
//! explicitly, so there is no self-referential pointer to express in
//! a borrow-checked way.

use crate::error::{Error, ProtocolSnafu, Result, SftpUnsupportedVersionSnafu};
use crate::session::Session;
use snafu::ensure;

use super::attrs::{decode_name_entries, Attrs, NameEntry};
use super::protocol::{self, open_flag, pkt, status_code};

struct HandleSlot {
    generation: u64,
    bytes: Option<Vec<u8>>,
}

/// A lightweight reference to a server handle in `SftpSession`'s
/// table; not valid across sessions and not valid once the slot's
/// generation has moved on (i.e. after close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    index: usize,
    generation: u64,
}

pub struct SftpSession {
    local_id: u32,
    next_request_id: u32,
    version: u32,
    recv_buffer: Vec<u8>,
    handles: Vec<HandleSlot>,
    last_error: Option<String>,
}

impl SftpSession {
    /// Runs `SSH_FXP_INIT`/`VERSION` over the already-open `local_id`
    /// channel. Called only from [`Session::open_sftp`].
    pub(crate) fn init(session: &mut Session, local_id: u32) -> Result<Self> {
        let mut sftp = SftpSession {
            local_id,
            next_request_id: 0,
            version: 0,
            recv_buffer: Vec::new(),
            handles: Vec::new(),
            last_error: None,
        };
        session.channel_write_raw(local_id, &protocol::encode_init(protocol::PROTOCOL_VERSION))?;
        let (msg_type, body) = sftp.read_frame(session)?;
        ensure!(msg_type == pkt::VERSION, ProtocolSnafu { reason: "expected SSH_FXP_VERSION" });
        let version = protocol::decode_version(&body)?;
        ensure!(version >= protocol::PROTOCOL_VERSION, SftpUnsupportedVersionSnafu { version });
        sftp.version = version;
        Ok(sftp)
    }

    pub fn protocol_version(&self) -> u32 {
        self.version
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn allocate_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn read_frame(&mut self, session: &mut Session) -> Result<(u8, Vec<u8>)> {
        loop {
            if let Some((msg_type, body, consumed)) = protocol::split_frame(&self.recv_buffer)? {
                let body = body.to_vec();
                self.recv_buffer.drain(..consumed);
                return Ok((msg_type, body));
            }
            let chunk = session.channel_read_some(self.local_id)?;
            self.recv_buffer.extend_from_slice(&chunk);
        }
    }

    /// Sends `wire` and reads replies until one whose echoed
    /// `request_id` matches, per §4.B7's single-outstanding-request
    /// model (any reply that doesn't match is a protocol violation —
    /// this client never pipelines two requests on one session).
    fn roundtrip(&mut self, session: &mut Session, request_id: u32, wire: Vec<u8>) -> Result<(u8, Vec<u8>)> {
        session.channel_write_raw(self.local_id, &wire)?;
        let (msg_type, body) = self.read_frame(session)?;
        let (echoed_id, _) = protocol::decode_request_id(&body)?;
        ensure!(echoed_id == request_id, ProtocolSnafu { reason: "SFTP reply request id mismatch" });
        Ok((msg_type, body))
    }

    fn expect_status_ok(&mut self, session: &mut Session, wire: Vec<u8>, request_id: u32) -> Result<()> {
        let (msg_type, body) = self.roundtrip(session, request_id, wire)?;
        ensure!(msg_type == pkt::STATUS, ProtocolSnafu { reason: "expected SSH_FXP_STATUS" });
        let status = protocol::decode_status(&body)?;
        if status.code == status_code::OK {
            Ok(())
        } else {
            self.last_error = Some(status.message.clone());
            Err(protocol::status_to_error(&status))
        }
    }

    fn open_raw(&mut self, session: &mut Session, path: &str, pflags: u32, attrs: &Attrs) -> Result<Vec<u8>> {
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, path.as_bytes());
        crate::codec::write_u32_be(&mut payload, pflags);
        payload.extend_from_slice(&attrs.encode());
        let wire = protocol::frame(pkt::OPEN, &payload);
        let (msg_type, body) = self.roundtrip(session, request_id, wire)?;
        match msg_type {
            pkt::HANDLE => Ok(protocol::decode_handle(&body)?.1),
            pkt::STATUS => {
                let status = protocol::decode_status(&body)?;
                self.last_error = Some(status.message.clone());
                Err(protocol::status_to_error(&status))
            }
            _ => Err(Error::Protocol { reason: "expected SSH_FXP_HANDLE or SSH_FXP_STATUS" }),
        }
    }

    fn store_handle(&mut self, bytes: Vec<u8>) -> Handle {
        for (index, slot) in self.handles.iter_mut().enumerate() {
            if slot.bytes.is_none() {
                slot.generation += 1;
                slot.bytes = Some(bytes);
                return Handle { index, generation: slot.generation };
            }
        }
        let index = self.handles.len();
        self.handles.push(HandleSlot { generation: 0, bytes: Some(bytes) });
        Handle { index, generation: 0 }
    }

    fn handle_bytes(&self, handle: Handle) -> Result<&[u8]> {
        let slot = self.handles.get(handle.index).ok_or(Error::Protocol { reason: "invalid SFTP handle" })?;
        if slot.generation != handle.generation {
            return Err(Error::Protocol { reason: "stale SFTP handle" });
        }
        slot.bytes.as_deref().ok_or(Error::Protocol { reason: "SFTP handle already closed" })
    }

    fn close_handle(&mut self, session: &mut Session, handle: Handle) -> Result<()> {
        let bytes = self.handle_bytes(handle)?.to_vec();
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_handle_request(pkt::CLOSE, request_id, &bytes);
        self.expect_status_ok(session, wire, request_id)?;
        self.handles[handle.index].bytes = None;
        Ok(())
    }

    pub fn open(&mut self, session: &mut Session, path: &str, pflags: u32, attrs: &Attrs) -> Result<SftpFile> {
        let bytes = self.open_raw(session, path, pflags, attrs)?;
        Ok(SftpFile { handle: self.store_handle(bytes), offset: 0 })
    }

    pub fn open_read(&mut self, session: &mut Session, path: &str) -> Result<SftpFile> {
        self.open(session, path, open_flag::READ, &Attrs::default())
    }

    pub fn create(&mut self, session: &mut Session, path: &str) -> Result<SftpFile> {
        self.open(
            session,
            path,
            open_flag::WRITE | open_flag::CREAT | open_flag::TRUNC,
            &Attrs::default(),
        )
    }

    pub fn close_file(&mut self, session: &mut Session, file: SftpFile) -> Result<()> {
        self.close_handle(session, file.handle)
    }

    pub fn read(&mut self, session: &mut Session, file: &mut SftpFile, max_len: u32) -> Result<Option<Vec<u8>>> {
        let handle_bytes = self.handle_bytes(file.handle)?.to_vec();
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, &handle_bytes);
        payload.extend_from_slice(&file.offset.to_be_bytes());
        crate::codec::write_u32_be(&mut payload, max_len);
        let wire = protocol::frame(pkt::READ, &payload);

        let (msg_type, body) = self.roundtrip(session, request_id, wire)?;
        match msg_type {
            pkt::DATA => {
                let (_, data) = protocol::decode_data(&body)?;
                file.offset += data.len() as u64;
                Ok(Some(data))
            }
            pkt::STATUS => {
                let status = protocol::decode_status(&body)?;
                if status.code == status_code::EOF {
                    Ok(None)
                } else {
                    self.last_error = Some(status.message.clone());
                    Err(protocol::status_to_error(&status))
                }
            }
            _ => Err(Error::Protocol { reason: "expected SSH_FXP_DATA or SSH_FXP_STATUS" }),
        }
    }

    pub fn write(&mut self, session: &mut Session, file: &mut SftpFile, data: &[u8]) -> Result<()> {
        let handle_bytes = self.handle_bytes(file.handle)?.to_vec();
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, &handle_bytes);
        payload.extend_from_slice(&file.offset.to_be_bytes());
        crate::codec::write_string(&mut payload, data);
        let wire = protocol::frame(pkt::WRITE, &payload);
        self.expect_status_ok(session, wire, request_id)?;
        file.offset += data.len() as u64;
        Ok(())
    }

    fn stat_like(&mut self, session: &mut Session, msg_type: u8, path: &str) -> Result<Attrs> {
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_path_request(msg_type, request_id, path);
        let (reply_type, body) = self.roundtrip(session, request_id, wire)?;
        match reply_type {
            pkt::ATTRS => {
                let mut pos = 4; // skip request_id
                Attrs::decode(&body, &mut pos)
            }
            pkt::STATUS => {
                let status = protocol::decode_status(&body)?;
                self.last_error = Some(status.message.clone());
                Err(protocol::status_to_error(&status))
            }
            _ => Err(Error::Protocol { reason: "expected SSH_FXP_ATTRS or SSH_FXP_STATUS" }),
        }
    }

    pub fn stat(&mut self, session: &mut Session, path: &str) -> Result<Attrs> {
        self.stat_like(session, pkt::STAT, path)
    }

    pub fn lstat(&mut self, session: &mut Session, path: &str) -> Result<Attrs> {
        self.stat_like(session, pkt::LSTAT, path)
    }

    pub fn fstat(&mut self, session: &mut Session, file: &SftpFile) -> Result<Attrs> {
        let handle_bytes = self.handle_bytes(file.handle)?.to_vec();
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_handle_request(pkt::FSTAT, request_id, &handle_bytes);
        let (reply_type, body) = self.roundtrip(session, request_id, wire)?;
        match reply_type {
            pkt::ATTRS => {
                let mut pos = 4;
                Attrs::decode(&body, &mut pos)
            }
            pkt::STATUS => {
                let status = protocol::decode_status(&body)?;
                self.last_error = Some(status.message.clone());
                Err(protocol::status_to_error(&status))
            }
            _ => Err(Error::Protocol { reason: "expected SSH_FXP_ATTRS or SSH_FXP_STATUS" }),
        }
    }

    pub fn setstat(&mut self, session: &mut Session, path: &str, attrs: &Attrs) -> Result<()> {
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, path.as_bytes());
        payload.extend_from_slice(&attrs.encode());
        let wire = protocol::frame(pkt::SETSTAT, &payload);
        self.expect_status_ok(session, wire, request_id)
    }

    fn name_request(&mut self, session: &mut Session, msg_type: u8, path: &str) -> Result<Vec<NameEntry>> {
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_path_request(msg_type, request_id, path);
        let (reply_type, body) = self.roundtrip(session, request_id, wire)?;
        match reply_type {
            pkt::NAME => decode_name_entries(&body, 4),
            pkt::STATUS => {
                let status = protocol::decode_status(&body)?;
                self.last_error = Some(status.message.clone());
                Err(protocol::status_to_error(&status))
            }
            _ => Err(Error::Protocol { reason: "expected SSH_FXP_NAME or SSH_FXP_STATUS" }),
        }
    }

    pub fn realpath(&mut self, session: &mut Session, path: &str) -> Result<String> {
        let mut entries = self.name_request(session, pkt::REALPATH, path)?;
        ensure!(!entries.is_empty(), ProtocolSnafu { reason: "REALPATH returned no entries" });
        Ok(entries.remove(0).filename)
    }

    pub fn readlink(&mut self, session: &mut Session, path: &str) -> Result<String> {
        let mut entries = self.name_request(session, pkt::READLINK, path)?;
        ensure!(!entries.is_empty(), ProtocolSnafu { reason: "READLINK returned no entries" });
        Ok(entries.remove(0).filename)
    }

    pub fn symlink(&mut self, session: &mut Session, target: &str, link_path: &str) -> Result<()> {
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, link_path.as_bytes());
        crate::codec::write_string(&mut payload, target.as_bytes());
        let wire = protocol::frame(pkt::SYMLINK, &payload);
        self.expect_status_ok(session, wire, request_id)
    }

    pub fn mkdir(&mut self, session: &mut Session, path: &str, attrs: &Attrs) -> Result<()> {
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, path.as_bytes());
        payload.extend_from_slice(&attrs.encode());
        let wire = protocol::frame(pkt::MKDIR, &payload);
        self.expect_status_ok(session, wire, request_id)
    }

    pub fn rmdir(&mut self, session: &mut Session, path: &str) -> Result<()> {
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_path_request(pkt::RMDIR, request_id, path);
        self.expect_status_ok(session, wire, request_id)
    }

    pub fn remove(&mut self, session: &mut Session, path: &str) -> Result<()> {
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_path_request(pkt::REMOVE, request_id, path);
        self.expect_status_ok(session, wire, request_id)
    }

    pub fn rename(&mut self, session: &mut Session, old_path: &str, new_path: &str) -> Result<()> {
        let request_id = self.allocate_request_id();
        let mut payload = Vec::new();
        crate::codec::write_u32_be(&mut payload, request_id);
        crate::codec::write_string(&mut payload, old_path.as_bytes());
        crate::codec::write_string(&mut payload, new_path.as_bytes());
        let wire = protocol::frame(pkt::RENAME, &payload);
        self.expect_status_ok(session, wire, request_id)
    }

    pub fn opendir(&mut self, session: &mut Session, path: &str) -> Result<SftpDir> {
        let request_id = self.allocate_request_id();
        let wire = protocol::encode_path_request(pkt::OPENDIR, request_id, path);
        let (msg_type, body) = self.roundtrip(session, request_id, wire)?;
        match msg_type {
            pkt::HANDLE => {
                let (_, bytes) = protocol::decode_handle(&body)?;
                Ok(SftpDir { handle: self.store_handle(bytes), batch: Vec::new(), cursor: 0, eof: false })
            }
            pkt::STATUS => {
                let status = protocol::decode_status(&body)?;
                self.last_error = Some(status.message.clone());
                Err(protocol::status_to_error(&status))
            }
            _ => Err(Error::Protocol { reason: "expected SSH_FXP_HANDLE or SSH_FXP_STATUS" }),
        }
    }

    pub fn close_dir(&mut self, session: &mut Session, dir: SftpDir) -> Result<()> {
        self.close_handle(session, dir.handle)
    }

    /// Returns the next directory entry, refilling `dir`'s batch via
    /// `READDIR` on exhaustion (§4.B7's materialise-then-drain model),
    /// or `None` once the server reports EOF.
    pub fn readdir(&mut self, session: &mut Session, dir: &mut SftpDir) -> Result<Option<NameEntry>> {
        if dir.cursor >= dir.batch.len() {
            if dir.eof {
                return Ok(None);
            }
            let handle_bytes = self.handle_bytes(dir.handle)?.to_vec();
            let request_id = self.allocate_request_id();
            let wire = protocol::encode_handle_request(pkt::READDIR, request_id, &handle_bytes);
            let (msg_type, body) = self.roundtrip(session, request_id, wire)?;
            match msg_type {
                pkt::NAME => {
                    dir.batch = decode_name_entries(&body, 4)?;
                    dir.cursor = 0;
                }
                pkt::STATUS => {
                    let status = protocol::decode_status(&body)?;
                    if status.code == status_code::EOF {
                        dir.eof = true;
                        return Ok(None);
                    }
                    self.last_error = Some(status.message.clone());
                    return Err(protocol::status_to_error(&status));
                }
                _ => return Err(Error::Protocol { reason: "expected SSH_FXP_NAME or SSH_FXP_STATUS" }),
            }
        }
        if dir.cursor < dir.batch.len() {
            let entry = dir.batch[dir.cursor].clone();
            dir.cursor += 1;
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }
}

/// An open remote file. Valid until passed to
/// [`SftpSession::close_file`]; using it afterward fails with a stale
/// handle error.
pub struct SftpFile {
    handle: Handle,
    offset: u64,
}

/// An open remote directory, with its own `READDIR` batch buffer and
/// cursor (§3.2).
pub struct SftpDir {
    handle: Handle,
    batch: Vec<NameEntry>,
    cursor: usize,
    eof: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_handle_reuses_closed_slots_with_a_new_generation() {
        let mut sftp = SftpSession {
            local_id: 0,
            next_request_id: 0,
            version: 3,
            recv_buffer: Vec::new(),
            handles: Vec::new(),
            last_error: None,
        };
        let first = sftp.store_handle(vec![1]);
        sftp.handles[first.index].bytes = None;
        let second = sftp.store_handle(vec![2]);
        assert_eq!(second.index, first.index);
        assert_ne!(second.generation, first.generation);
        assert!(sftp.handle_bytes(first).is_err());
        assert_eq!(sftp.handle_bytes(second).unwrap(), &[2]);
    }
}
