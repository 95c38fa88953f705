//! Wire message catalogue (RFC 4253/4252/4254), owned (no lifetimes)
//! since this client copies once off the socket rather than borrowing
//! from a zero-copy buffer. Shaped after the teacher's `packets.rs`
//! struct-per-message layout and its `(number, name, type, ...)`
//! message table, but hand-encoded through `codec.rs` instead of the
//! teacher's `sshwire` derive macro, which is tied to the no_std
//! zero-copy `Packet` enum this blocking client does not use.

use crate::codec::*;
use crate::error::{Error, ProtocolSnafu};
use snafu::ensure;

pub mod msg {
    pub const DISCONNECT: u8 = 1;
    pub const IGNORE: u8 = 2;
    pub const UNIMPLEMENTED: u8 = 3;
    pub const DEBUG: u8 = 4;
    pub const SERVICE_REQUEST: u8 = 5;
    pub const SERVICE_ACCEPT: u8 = 6;
    pub const KEXINIT: u8 = 20;
    pub const NEWKEYS: u8 = 21;
    pub const KEX_ECDH_INIT: u8 = 30;
    pub const KEX_ECDH_REPLY: u8 = 31;
    pub const USERAUTH_REQUEST: u8 = 50;
    pub const USERAUTH_FAILURE: u8 = 51;
    pub const USERAUTH_SUCCESS: u8 = 52;
    pub const USERAUTH_BANNER: u8 = 53;
    pub const USERAUTH_PK_OK: u8 = 60;
    pub const CHANNEL_OPEN: u8 = 90;
    pub const CHANNEL_OPEN_CONFIRMATION: u8 = 91;
    pub const CHANNEL_OPEN_FAILURE: u8 = 92;
    pub const CHANNEL_WINDOW_ADJUST: u8 = 93;
    pub const CHANNEL_DATA: u8 = 94;
    pub const CHANNEL_EXTENDED_DATA: u8 = 95;
    pub const CHANNEL_EOF: u8 = 96;
    pub const CHANNEL_CLOSE: u8 = 97;
    pub const CHANNEL_REQUEST: u8 = 98;
    pub const CHANNEL_SUCCESS: u8 = 99;
    pub const CHANNEL_FAILURE: u8 = 100;
}

fn read_str_owned(buf: &[u8], pos: &mut usize) -> Result<String, Error> {
    let bytes = read_string(buf, pos)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Protocol { reason: "non-UTF8 string field" })
}

fn read_namelist(buf: &[u8], pos: &mut usize) -> Result<Vec<String>, Error> {
    let s = read_str_owned(buf, pos)?;
    if s.is_empty() {
        return Ok(Vec::new());
    }
    Ok(s.split(',').map(|piece| piece.to_string()).collect())
}

fn write_namelist(out: &mut Vec<u8>, names: &[&str]) {
    write_string(out, names.join(",").as_bytes());
}

#[derive(Debug, Clone)]
pub struct KexInit {
    pub cookie: [u8; 16],
    pub kex_algorithms: Vec<String>,
    pub server_host_key_algorithms: Vec<String>,
    pub encryption_client_to_server: Vec<String>,
    pub encryption_server_to_client: Vec<String>,
    pub mac_client_to_server: Vec<String>,
    pub mac_server_to_client: Vec<String>,
    pub compression_client_to_server: Vec<String>,
    pub compression_server_to_client: Vec<String>,
    pub languages_client_to_server: Vec<String>,
    pub languages_server_to_client: Vec<String>,
    pub first_kex_packet_follows: bool,
}

impl KexInit {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(msg::KEXINIT);
        out.extend_from_slice(&self.cookie);
        write_namelist(&mut out, &as_refs(&self.kex_algorithms));
        write_namelist(&mut out, &as_refs(&self.server_host_key_algorithms));
        write_namelist(&mut out, &as_refs(&self.encryption_client_to_server));
        write_namelist(&mut out, &as_refs(&self.encryption_server_to_client));
        write_namelist(&mut out, &as_refs(&self.mac_client_to_server));
        write_namelist(&mut out, &as_refs(&self.mac_server_to_client));
        write_namelist(&mut out, &as_refs(&self.compression_client_to_server));
        write_namelist(&mut out, &as_refs(&self.compression_server_to_client));
        write_namelist(&mut out, &as_refs(&self.languages_client_to_server));
        write_namelist(&mut out, &as_refs(&self.languages_server_to_client));
        write_bool(&mut out, self.first_kex_packet_follows);
        write_u32_be(&mut out, 0); // reserved
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut pos = 1; // skip message number
        ensure!(payload.len() >= pos + 16, ProtocolSnafu { reason: "truncated KEXINIT cookie" });
        let mut cookie = [0u8; 16];
        cookie.copy_from_slice(&payload[pos..pos + 16]);
        pos += 16;
        Ok(KexInit {
            cookie,
            kex_algorithms: read_namelist(payload, &mut pos)?,
            server_host_key_algorithms: read_namelist(payload, &mut pos)?,
            encryption_client_to_server: read_namelist(payload, &mut pos)?,
            encryption_server_to_client: read_namelist(payload, &mut pos)?,
            mac_client_to_server: read_namelist(payload, &mut pos)?,
            mac_server_to_client: read_namelist(payload, &mut pos)?,
            compression_client_to_server: read_namelist(payload, &mut pos)?,
            compression_server_to_client: read_namelist(payload, &mut pos)?,
            languages_client_to_server: read_namelist(payload, &mut pos)?,
            languages_server_to_client: read_namelist(payload, &mut pos)?,
            first_kex_packet_follows: read_bool(payload, &mut pos)?,
        })
    }
}

fn as_refs(v: &[String]) -> Vec<&str> {
    v.iter().map(|s| s.as_str()).collect()
}

pub fn encode_newkeys() -> Vec<u8> {
    vec![msg::NEWKEYS]
}

#[derive(Debug, Clone)]
pub struct KexEcdhInit {
    pub client_public: [u8; 32],
}

impl KexEcdhInit {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![msg::KEX_ECDH_INIT];
        write_string(&mut out, &self.client_public);
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut pos = 1;
        let q_c = read_string(payload, &mut pos)?;
        ensure!(q_c.len() == 32, ProtocolSnafu { reason: "KEX_ECDH_INIT q_c not 32 bytes" });
        let mut client_public = [0u8; 32];
        client_public.copy_from_slice(q_c);
        Ok(KexEcdhInit { client_public })
    }
}

/// Host key blob, in the raw wire form `string type || ...fields`
/// (§6.4). Kept as the raw bytes plus a parsed Ed25519 view where
/// applicable; RSA blobs are parsed lazily by `hostkey.rs`.
#[derive(Debug, Clone)]
pub struct HostKeyBlob {
    pub algorithm: String,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct KexEcdhReply {
    pub host_key: HostKeyBlob,
    pub server_public: [u8; 32],
    pub signature_algorithm: String,
    pub signature: Vec<u8>,
}

impl KexEcdhReply {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut pos = 1;
        let host_key_blob = read_string(payload, &mut pos)?.to_vec();
        let q_s = read_string(payload, &mut pos)?;
        ensure!(q_s.len() == 32, ProtocolSnafu { reason: "KEX_ECDH_REPLY q_s not 32 bytes" });
        let mut server_public = [0u8; 32];
        server_public.copy_from_slice(q_s);
        let sig_blob = read_string(payload, &mut pos)?;

        let mut kp = 0usize;
        let algorithm = read_str_owned(&host_key_blob, &mut kp)?;

        let mut sp = 0usize;
        let signature_algorithm = read_str_owned(sig_blob, &mut sp)?;
        let signature = read_string(sig_blob, &mut sp)?.to_vec();

        Ok(KexEcdhReply {
            host_key: HostKeyBlob { algorithm, raw: host_key_blob },
            server_public,
            signature_algorithm,
            signature,
        })
    }
}

pub fn encode_service_request(name: &str) -> Vec<u8> {
    let mut out = vec![msg::SERVICE_REQUEST];
    write_string(&mut out, name.as_bytes());
    out
}

pub fn decode_service_accept(payload: &[u8]) -> Result<String, Error> {
    let mut pos = 1;
    read_str_owned(payload, &mut pos)
}

#[derive(Debug, Clone)]
pub enum AuthMethod {
    None,
    Password { password: String },
    PublicKeyProbe { algorithm: String, public_key_blob: Vec<u8> },
    PublicKeySigned { algorithm: String, public_key_blob: Vec<u8>, signature_blob: Vec<u8> },
}

pub fn encode_userauth_request(username: &str, service: &str, method: &AuthMethod) -> Vec<u8> {
    let mut out = vec![msg::USERAUTH_REQUEST];
    write_string(&mut out, username.as_bytes());
    write_string(&mut out, service.as_bytes());
    match method {
        AuthMethod::None => {
            write_string(&mut out, b"none");
        }
        AuthMethod::Password { password } => {
            write_string(&mut out, b"password");
            write_bool(&mut out, false);
            write_string(&mut out, password.as_bytes());
        }
        AuthMethod::PublicKeyProbe { algorithm, public_key_blob } => {
            write_string(&mut out, b"publickey");
            write_bool(&mut out, false);
            write_string(&mut out, algorithm.as_bytes());
            write_string(&mut out, public_key_blob);
        }
        AuthMethod::PublicKeySigned { algorithm, public_key_blob, signature_blob } => {
            write_string(&mut out, b"publickey");
            write_bool(&mut out, true);
            write_string(&mut out, algorithm.as_bytes());
            write_string(&mut out, public_key_blob);
            write_string(&mut out, signature_blob);
        }
    }
    out
}

/// Builds the data that gets Ed25519-signed for `publickey` auth
/// (RFC 4252 §7): `string session_id` followed by the body of the
/// USERAUTH_REQUEST packet up to (not including) the signature field.
pub fn userauth_signed_data(
    session_id: &[u8],
    username: &str,
    service: &str,
    algorithm: &str,
    public_key_blob: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    write_string(&mut out, session_id);
    out.push(msg::USERAUTH_REQUEST);
    write_string(&mut out, username.as_bytes());
    write_string(&mut out, service.as_bytes());
    write_string(&mut out, b"publickey");
    write_bool(&mut out, true);
    write_string(&mut out, algorithm.as_bytes());
    write_string(&mut out, public_key_blob);
    out
}

#[derive(Debug, Clone)]
pub struct UserauthFailure {
    pub methods_that_can_continue: Vec<String>,
    pub partial_success: bool,
}

impl UserauthFailure {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut pos = 1;
        Ok(UserauthFailure {
            methods_that_can_continue: read_namelist(payload, &mut pos)?,
            partial_success: read_bool(payload, &mut pos)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ChannelOpenKind {
    Session,
}

#[derive(Debug, Clone)]
pub struct ChannelOpen {
    pub sender_channel: u32,
    pub initial_window_size: u32,
    pub max_packet_size: u32,
    pub kind: ChannelOpenKind,
}

impl ChannelOpen {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![msg::CHANNEL_OPEN];
        write_string(&mut out, b"session");
        write_u32_be(&mut out, self.sender_channel);
        write_u32_be(&mut out, self.initial_window_size);
        write_u32_be(&mut out, self.max_packet_size);
        out
    }
}

#[derive(Debug, Clone)]
pub struct ChannelOpenConfirmation {
    pub recipient_channel: u32,
    pub sender_channel: u32,
    pub initial_window_size: u32,
    pub max_packet_size: u32,
}

impl ChannelOpenConfirmation {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut pos = 1;
        Ok(ChannelOpenConfirmation {
            recipient_channel: read_u32_be(payload, &mut pos)?,
            sender_channel: read_u32_be(payload, &mut pos)?,
            initial_window_size: read_u32_be(payload, &mut pos)?,
            max_packet_size: read_u32_be(payload, &mut pos)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelOpenFailure {
    pub recipient_channel: u32,
    pub reason_code: u32,
    pub description: String,
}

impl ChannelOpenFailure {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut pos = 1;
        let recipient_channel = read_u32_be(payload, &mut pos)?;
        let reason_code = read_u32_be(payload, &mut pos)?;
        let description = read_str_owned(payload, &mut pos)?;
        Ok(ChannelOpenFailure { recipient_channel, reason_code, description })
    }
}

pub fn encode_channel_window_adjust(recipient_channel: u32, bytes_to_add: u32) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_WINDOW_ADJUST];
    write_u32_be(&mut out, recipient_channel);
    write_u32_be(&mut out, bytes_to_add);
    out
}

pub fn decode_channel_window_adjust(payload: &[u8]) -> Result<(u32, u32), Error> {
    let mut pos = 1;
    Ok((read_u32_be(payload, &mut pos)?, read_u32_be(payload, &mut pos)?))
}

pub fn encode_channel_data(recipient_channel: u32, data: &[u8]) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_DATA];
    write_u32_be(&mut out, recipient_channel);
    write_string(&mut out, data);
    out
}

pub fn decode_channel_data(payload: &[u8]) -> Result<(u32, Vec<u8>), Error> {
    let mut pos = 1;
    let channel = read_u32_be(payload, &mut pos)?;
    let data = read_string(payload, &mut pos)?.to_vec();
    Ok((channel, data))
}

pub fn decode_channel_extended_data(payload: &[u8]) -> Result<(u32, u32, Vec<u8>), Error> {
    let mut pos = 1;
    let channel = read_u32_be(payload, &mut pos)?;
    let data_type = read_u32_be(payload, &mut pos)?;
    let data = read_string(payload, &mut pos)?.to_vec();
    Ok((channel, data_type, data))
}

pub fn encode_channel_eof(recipient_channel: u32) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_EOF];
    write_u32_be(&mut out, recipient_channel);
    out
}

pub fn encode_channel_close(recipient_channel: u32) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_CLOSE];
    write_u32_be(&mut out, recipient_channel);
    out
}

pub fn decode_channel_number(payload: &[u8]) -> Result<u32, Error> {
    let mut pos = 1;
    read_u32_be(payload, &mut pos)
}

#[derive(Debug, Clone)]
pub enum ChannelRequestKind {
    Exec { command: String },
    Shell,
    PtyReq { term: String, cols: u32, rows: u32, width_px: u32, height_px: u32, modes: Vec<u8> },
    Subsystem { name: String },
    ExitStatus { code: u32 },
}

pub fn encode_channel_request(recipient_channel: u32, want_reply: bool, kind: &ChannelRequestKind) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_REQUEST];
    write_u32_be(&mut out, recipient_channel);
    match kind {
        ChannelRequestKind::Exec { command } => {
            write_string(&mut out, b"exec");
            write_bool(&mut out, want_reply);
            write_string(&mut out, command.as_bytes());
        }
        ChannelRequestKind::Shell => {
            write_string(&mut out, b"shell");
            write_bool(&mut out, want_reply);
        }
        ChannelRequestKind::PtyReq { term, cols, rows, width_px, height_px, modes } => {
            write_string(&mut out, b"pty-req");
            write_bool(&mut out, want_reply);
            write_string(&mut out, term.as_bytes());
            write_u32_be(&mut out, *cols);
            write_u32_be(&mut out, *rows);
            write_u32_be(&mut out, *width_px);
            write_u32_be(&mut out, *height_px);
            write_string(&mut out, modes);
        }
        ChannelRequestKind::Subsystem { name } => {
            write_string(&mut out, b"subsystem");
            write_bool(&mut out, want_reply);
            write_string(&mut out, name.as_bytes());
        }
        ChannelRequestKind::ExitStatus { code } => {
            write_string(&mut out, b"exit-status");
            write_bool(&mut out, false);
            write_u32_be(&mut out, *code);
        }
    }
    out
}

/// Decodes an incoming `CHANNEL_REQUEST`, recognizing only
/// `exit-status` (the only server-to-client request this client acts
/// on); anything else is reported as an unrecognized name for the
/// caller to reply `CHANNEL_FAILURE` to, per §6.2's `Unknown` passthrough.
pub fn decode_channel_request_exit_status(payload: &[u8]) -> Result<Option<(u32, u32)>, Error> {
    let mut pos = 1;
    let channel = read_u32_be(payload, &mut pos)?;
    let name = read_str_owned(payload, &mut pos)?;
    if name != "exit-status" {
        return Ok(None);
    }
    let _want_reply = read_bool(payload, &mut pos)?;
    let code = read_u32_be(payload, &mut pos)?;
    Ok(Some((channel, code)))
}

pub fn encode_channel_success(recipient_channel: u32) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_SUCCESS];
    write_u32_be(&mut out, recipient_channel);
    out
}

pub fn encode_channel_failure(recipient_channel: u32) -> Vec<u8> {
    let mut out = vec![msg::CHANNEL_FAILURE];
    write_u32_be(&mut out, recipient_channel);
    out
}

pub fn encode_disconnect(reason_code: u32, description: &str) -> Vec<u8> {
    let mut out = vec![msg::DISCONNECT];
    write_u32_be(&mut out, reason_code);
    write_string(&mut out, description.as_bytes());
    write_string(&mut out, b"en");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kexinit_roundtrip() {
        let init = KexInit {
            cookie: [7u8; 16],
            kex_algorithms: vec!["curve25519-sha256".into()],
            server_host_key_algorithms: vec!["ssh-ed25519".into()],
            encryption_client_to_server: vec!["aes256-ctr".into()],
            encryption_server_to_client: vec!["aes256-ctr".into()],
            mac_client_to_server: vec!["hmac-sha2-256".into()],
            mac_server_to_client: vec!["hmac-sha2-256".into()],
            compression_client_to_server: vec!["none".into()],
            compression_server_to_client: vec!["none".into()],
            languages_client_to_server: vec![],
            languages_server_to_client: vec![],
            first_kex_packet_follows: false,
        };
        let encoded = init.encode();
        let decoded = KexInit::decode(&encoded).unwrap();
        assert_eq!(decoded.cookie, init.cookie);
        assert_eq!(decoded.kex_algorithms, init.kex_algorithms);
        assert_eq!(decoded.languages_client_to_server, Vec::<String>::new());
    }

    #[test]
    fn channel_data_roundtrip() {
        let encoded = encode_channel_data(3, b"payload");
        let (channel, data) = decode_channel_data(&encoded).unwrap();
        assert_eq!(channel, 3);
        assert_eq!(data, b"payload");
    }

    #[test]
    fn userauth_signed_data_embeds_session_id_and_request_body() {
        let signed = userauth_signed_data(b"sess", "alice", "ssh-connection", "ssh-ed25519", b"keyblob");
        assert!(signed.starts_with(&[0, 0, 0, 4]));
    }
}
