//! Per-channel state: local/remote ids, flow-control windows, the
//! stdout/stderr (extended data) demux, and exit status capture
//! (§6.3). Window/`max_packet` bookkeeping and the open/opening/closed
//! state shape are grounded on the teacher's channel handling in
//! `packets.rs` (`ChannelOpen`/`ChannelWindowAdjust`/`ChannelDataExt`).

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Local flow-control window replenishment threshold: once the
/// window drops below this, a `CHANNEL_WINDOW_ADJUST` is due. Matches
/// OpenSSH's default receive buffer granularity (64 KiB channel
/// windows are typical; refill once a quarter is consumed).
const WINDOW_REFILL_THRESHOLD: u32 = 16 * 1024;
pub const INITIAL_WINDOW_SIZE: u32 = 2 * 1024 * 1024;
pub const MAX_PACKET_SIZE: u32 = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Opening,
    Open,
    EofSent,
    EofReceived,
    Closed,
}

pub struct Channel {
    pub local_id: u32,
    pub remote_id: u32,
    pub state: ChannelState,
    local_window: u32,
    remote_window: u32,
    remote_max_packet: u32,
    stdout_buffer: VecDeque<u8>,
    stderr_buffer: VecDeque<u8>,
    pub exit_status: Option<u32>,
    pub remote_eof: bool,
}

impl Channel {
    pub fn new_opening(local_id: u32) -> Self {
        Channel {
            local_id,
            remote_id: 0,
            state: ChannelState::Opening,
            local_window: INITIAL_WINDOW_SIZE,
            remote_window: 0,
            remote_max_packet: 0,
            stdout_buffer: VecDeque::new(),
            stderr_buffer: VecDeque::new(),
            exit_status: None,
            remote_eof: false,
        }
    }

    pub fn mark_open(&mut self, remote_id: u32, remote_window: u32, remote_max_packet: u32) {
        self.remote_id = remote_id;
        self.remote_window = remote_window;
        self.remote_max_packet = remote_max_packet;
        self.state = ChannelState::Open;
    }

    /// Splits `data` (an outbound write request) into chunks no larger
    /// than the remote's advertised `max_packet`, consuming from the
    /// remote window as it goes. Returns the chunks to send as
    /// individual `CHANNEL_DATA` messages and the number of input bytes
    /// actually consumed (less than `data.len()` if the window runs
    /// out first — the caller must wait for a window adjust).
    pub fn chunks_to_send<'a>(&mut self, data: &'a [u8]) -> (Vec<&'a [u8]>, usize) {
        let mut chunks = Vec::new();
        let mut offset = 0;
        while offset < data.len() && self.remote_window > 0 {
            let chunk_len = (data.len() - offset).min(self.remote_max_packet as usize).min(self.remote_window as usize);
            if chunk_len == 0 {
                break;
            }
            chunks.push(&data[offset..offset + chunk_len]);
            offset += chunk_len;
            self.remote_window -= chunk_len as u32;
        }
        (chunks, offset)
    }

    pub fn on_window_adjust(&mut self, bytes_to_add: u32) {
        self.remote_window = self.remote_window.saturating_add(bytes_to_add);
    }

    /// Accounts for `len` bytes of inbound data against the local
    /// window, returning the window-adjust amount to send back if the
    /// window has dropped below the refill threshold.
    pub fn on_data_received(&mut self, len: u32) -> Result<Option<u32>> {
        self.local_window = self
            .local_window
            .checked_sub(len)
            .ok_or(Error::ProtocolOwned { reason: "peer sent more data than the window allowed".to_string() })?;
        if self.local_window < WINDOW_REFILL_THRESHOLD {
            let to_add = INITIAL_WINDOW_SIZE - self.local_window;
            self.local_window = INITIAL_WINDOW_SIZE;
            Ok(Some(to_add))
        } else {
            Ok(None)
        }
    }

    pub fn push_stdout(&mut self, data: &[u8]) {
        self.stdout_buffer.extend(data);
    }

    pub fn push_stderr(&mut self, data: &[u8]) {
        self.stderr_buffer.extend(data);
    }

    pub fn drain_stdout(&mut self) -> Vec<u8> {
        self.stdout_buffer.drain(..).collect()
    }

    pub fn drain_stderr(&mut self) -> Vec<u8> {
        self.stderr_buffer.drain(..).collect()
    }

    pub fn has_buffered_output(&self) -> bool {
        !self.stdout_buffer.is_empty() || !self.stderr_buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_to_send_respects_remote_max_packet_and_window() {
        let mut ch = Channel::new_opening(0);
        ch.mark_open(1, 10, 4);
        let data = [0u8; 9];
        let (chunks, consumed) = ch.chunks_to_send(&data);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![4, 4]);
        assert_eq!(consumed, 8);
    }

    #[test]
    fn on_data_received_errors_when_exceeding_window() {
        let mut ch = Channel::new_opening(0);
        ch.local_window = 4;
        assert!(ch.on_data_received(5).is_err());
    }

    #[test]
    fn on_data_received_signals_refill_below_threshold() {
        let mut ch = Channel::new_opening(0);
        ch.local_window = WINDOW_REFILL_THRESHOLD + 1;
        let adjust = ch.on_data_received(2).unwrap();
        assert!(adjust.is_some());
    }
}
