//! Top-level client: owns the TCP stream, runs version exchange and
//! key exchange, authenticates, and multiplexes channels over one
//! blocking receive loop. The monotonic state-machine shape (connect
//! → kex → auth → channels, no going backwards except rekey) mirrors
//! the teacher's `runner.rs`, adapted from its async/event-callback
//! design to a direct blocking call sequence per §5.

use std::collections::HashMap;
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::auth::Credential;
use crate::channel::{Channel, ChannelState};
use crate::error::{ChannelClosedSnafu, Error, ProtocolSnafu, Result};
use crate::hostkey::HostKeyVerifier;
use crate::kex::{self, KexResult};
use crate::messages::{self, ChannelRequestKind};
use crate::packet::PacketCodec;
use snafu::ensure;

pub struct SessionConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { connect_timeout: Duration::from_secs(10), read_timeout: None }
    }
}

/// A connected, key-exchanged, authenticated SSH session. Every
/// operation is blocking: `open_channel`/`read_channel`/etc. drive the
/// socket directly rather than returning futures, per §5.
pub struct Session {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    codec: PacketCodec,
    client_version: String,
    server_version: String,
    session_id: Vec<u8>,
    channels: HashMap<u32, Channel>,
    next_channel_id: u32,
}

impl Session {
    /// Connects, completes version + key exchange, and verifies the
    /// server's host key via `verifier`. Does not authenticate; call
    /// [`Session::authenticate`] next.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        config: &SessionConfig,
        verifier: &mut dyn HostKeyVerifier,
    ) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()
            .map_err(|source| Error::Io { source })?
            .next()
            .ok_or(Error::Protocol { reason: "no address resolved" })?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|source| Error::Io { source })?;
        stream.set_read_timeout(config.read_timeout).map_err(|source| Error::Io { source })?;
        let writer = stream.try_clone().map_err(|source| Error::Io { source })?;
        let mut reader = BufReader::new(stream);

        kex::write_client_version(&mut writer.try_clone().map_err(|source| Error::Io { source })?)?;
        let server_version = kex::read_server_version(&mut reader)?;
        let client_version = "SSH-2.0-sshclient_0.1".to_string();

        let mut codec = PacketCodec::new_cleartext();
        let mut writer = writer;
        let kex_result = kex::perform_client_kex(
            &mut reader,
            &mut writer,
            &mut codec,
            &client_version,
            &server_version,
            None,
            verifier,
        )?;
        install_keys(&mut codec, &kex_result);
        // kex_result's key material zeroes itself on drop; session_id
        // isn't secret and is cloned out rather than moved, since
        // KexResult can't be partially moved once it implements Drop.
        let session_id = kex_result.session_id.clone();

        Ok(Session {
            reader,
            writer,
            codec,
            client_version,
            server_version,
            session_id,
            channels: HashMap::new(),
            next_channel_id: 0,
        })
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn authenticate(&mut self, username: &str, credential: &Credential) -> Result<()> {
        crate::auth::authenticate(&mut self.reader, &mut self.writer, &mut self.codec, username, &self.session_id, credential)
    }

    /// Opens a `session` channel and runs `command` via `exec`, waiting
    /// for either the remote `CHANNEL_REQUEST exit-status` or channel
    /// close. Reads stdout/stderr to completion before returning.
    pub fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let local_id = self.open_session_channel()?;
        self.send_channel_request(local_id, &ChannelRequestKind::Exec { command: command.to_string() }, false)?;

        loop {
            let channel = self.channels.get(&local_id).ok_or(Error::trap("channel vanished"))?;
            if channel.state == ChannelState::Closed {
                break;
            }
            self.pump_one_message()?;
        }

        let mut channel = self.channels.remove(&local_id).ok_or(Error::trap("channel vanished"))?;
        Ok(ExecOutput {
            stdout: channel.drain_stdout(),
            stderr: channel.drain_stderr(),
            exit_status: channel.exit_status,
        })
    }

    /// Opens a `session` channel, requests the `sftp` subsystem, and
    /// runs the `SSH_FXP_INIT`/`VERSION` handshake (§4.B7).
    pub fn open_sftp(&mut self) -> Result<crate::sftp::SftpSession> {
        let local_id = self.open_session_channel()?;
        self.send_channel_request(local_id, &ChannelRequestKind::Subsystem { name: "sftp".to_string() }, true)?;
        loop {
            let payload = self.codec.read_packet(&mut self.reader)?;
            match payload.first() {
                Some(&messages::msg::CHANNEL_SUCCESS) => break,
                Some(&messages::msg::CHANNEL_FAILURE) => {
                    return Err(Error::ProtocolOwned { reason: "server refused the sftp subsystem request".to_string() });
                }
                _ => self.dispatch(&payload)?,
            }
        }
        crate::sftp::SftpSession::init(self, local_id)
    }

    /// Sends `data` as one or more `CHANNEL_DATA` messages, pumping the
    /// receive loop (to pick up window adjustments) whenever the
    /// remote window is too small to take the next chunk.
    pub(crate) fn channel_write_raw(&mut self, local_id: u32, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let (chunks, consumed) = {
                let channel = self.channels.get_mut(&local_id).ok_or(Error::trap("channel vanished"))?;
                channel.chunks_to_send(data)
            };
            if consumed == 0 {
                self.pump_one_message()?;
                continue;
            }
            let remote_id = self.channels.get(&local_id).ok_or(Error::trap("channel vanished"))?.remote_id;
            for chunk in chunks {
                let payload = messages::encode_channel_data(remote_id, chunk);
                self.codec.write_packet(&mut self.writer, &payload)?;
            }
            data = &data[consumed..];
        }
        Ok(())
    }

    /// Pumps exactly one incoming message and returns whatever is now
    /// buffered for `local_id`'s stdout (possibly empty, if the pumped
    /// message belonged to a different channel).
    pub(crate) fn channel_read_some(&mut self, local_id: u32) -> Result<Vec<u8>> {
        self.pump_one_message()?;
        let channel = self.channels.get_mut(&local_id).ok_or(Error::trap("channel vanished"))?;
        Ok(channel.drain_stdout())
    }

    fn open_session_channel(&mut self) -> Result<u32> {
        let local_id = self.next_channel_id;
        self.next_channel_id += 1;
        let channel = Channel::new_opening(local_id);
        self.channels.insert(local_id, channel);

        let open = messages::ChannelOpen {
            sender_channel: local_id,
            initial_window_size: crate::channel::INITIAL_WINDOW_SIZE,
            max_packet_size: crate::channel::MAX_PACKET_SIZE,
            kind: messages::ChannelOpenKind::Session,
        };
        self.codec.write_packet(&mut self.writer, &open.encode())?;

        loop {
            let payload = self.codec.read_packet(&mut self.reader)?;
            match payload.first() {
                Some(&messages::msg::CHANNEL_OPEN_CONFIRMATION) => {
                    let confirm = messages::ChannelOpenConfirmation::decode(&payload)?;
                    ensure!(confirm.recipient_channel == local_id, ProtocolSnafu { reason: "channel id mismatch on open confirmation" });
                    let channel = self.channels.get_mut(&local_id).ok_or(Error::trap("channel vanished"))?;
                    channel.mark_open(confirm.sender_channel, confirm.initial_window_size, confirm.max_packet_size);
                    return Ok(local_id);
                }
                Some(&messages::msg::CHANNEL_OPEN_FAILURE) => {
                    let failure = messages::ChannelOpenFailure::decode(&payload)?;
                    self.channels.remove(&local_id);
                    return Err(Error::ProtocolOwned {
                        reason: format!("channel open failed: {}", failure.description),
                    });
                }
                _ => self.dispatch(&payload)?,
            }
        }
    }

    pub(crate) fn send_channel_request(&mut self, local_id: u32, kind: &ChannelRequestKind, want_reply: bool) -> Result<()> {
        let remote_id = self.channels.get(&local_id).ok_or(Error::trap("channel vanished"))?.remote_id;
        let payload = messages::encode_channel_request(remote_id, want_reply, kind);
        self.codec.write_packet(&mut self.writer, &payload)
    }

    fn pump_one_message(&mut self) -> Result<()> {
        let payload = self.codec.read_packet(&mut self.reader)?;
        self.dispatch(&payload)
    }

    /// Handles any message that is not specific to the caller's
    /// current blocking wait: channel data/window/close/request
    /// traffic that may interleave with whatever the caller is
    /// actually waiting for.
    fn dispatch(&mut self, payload: &[u8]) -> Result<()> {
        match payload.first() {
            Some(&messages::msg::CHANNEL_DATA) => {
                let (channel_id, data) = messages::decode_channel_data(payload)?;
                let len = data.len() as u32;
                if let Some(channel) = self.channels.get_mut(&channel_id) {
                    channel.push_stdout(&data);
                    if let Some(adjust) = channel.on_data_received(len)? {
                        let remote_id = channel.remote_id;
                        let adjust_payload = messages::encode_channel_window_adjust(remote_id, adjust);
                        self.codec.write_packet(&mut self.writer, &adjust_payload)?;
                    }
                }
                Ok(())
            }
            Some(&messages::msg::CHANNEL_EXTENDED_DATA) => {
                let (channel_id, _data_type, data) = messages::decode_channel_extended_data(payload)?;
                if let Some(channel) = self.channels.get_mut(&channel_id) {
                    channel.push_stderr(&data);
                }
                Ok(())
            }
            Some(&messages::msg::CHANNEL_WINDOW_ADJUST) => {
                let (channel_id, bytes) = messages::decode_channel_window_adjust(payload)?;
                if let Some(channel) = self.channels.get_mut(&channel_id) {
                    channel.on_window_adjust(bytes);
                }
                Ok(())
            }
            Some(&messages::msg::CHANNEL_EOF) => {
                let channel_id = messages::decode_channel_number(payload)?;
                if let Some(channel) = self.channels.get_mut(&channel_id) {
                    channel.remote_eof = true;
                }
                Ok(())
            }
            Some(&messages::msg::CHANNEL_CLOSE) => {
                let channel_id = messages::decode_channel_number(payload)?;
                if let Some(channel) = self.channels.get_mut(&channel_id) {
                    channel.state = ChannelState::Closed;
                    let remote_id = channel.remote_id;
                    let close_payload = messages::encode_channel_close(remote_id);
                    self.codec.write_packet(&mut self.writer, &close_payload)?;
                }
                Ok(())
            }
            Some(&messages::msg::CHANNEL_REQUEST) => {
                if let Ok(Some((channel_id, code))) = messages::decode_channel_request_exit_status(payload) {
                    if let Some(channel) = self.channels.get_mut(&channel_id) {
                        channel.exit_status = Some(code);
                    }
                }
                Ok(())
            }
            Some(&messages::msg::DISCONNECT) => ChannelClosedSnafu.fail(),
            _ => {
                log::debug!("ignoring unhandled message type {:?}", payload.first());
                Ok(())
            }
        }
    }
}

pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: Option<u32>,
}

fn install_keys(codec: &mut PacketCodec, kex_result: &KexResult) {
    use crate::crypto::aes::AesKey;
    codec.rekey_send(
        AesKey::new(&kex_result.client_to_server_key),
        kex_result.client_to_server_iv,
        kex::mac_algorithm(),
        kex_result.client_to_server_mac_key.clone(),
    );
    codec.rekey_receive(
        AesKey::new(&kex_result.server_to_client_key),
        kex_result.server_to_client_iv,
        kex::mac_algorithm(),
        kex_result.server_to_client_mac_key.clone(),
    );
}
