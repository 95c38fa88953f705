//! SSH Binary Packet Protocol framing (RFC 4253 §6): padding, the
//! MAC-then-encrypt / decrypt-then-verify sequencing, and the
//! per-direction sequence numbers used in both the cipher (CTR IV
//! counter is independent) and the MAC input. Stateful shape grounded
//! on the teacher's `encrypt.rs::KeyState` (`seq_encrypt`/`seq_decrypt`
//! as `Wrapping<u32>`, a `decrypt_first_block` then `decrypt` split so
//! the caller can learn `packet_length` before the rest of the packet
//! has arrived on the wire).

use std::io::{Read, Write};
use std::num::Wrapping;

use crate::crypto::aes::{AesCtr, AesKey};
use crate::crypto::hmac::{hmac_sha1, hmac_sha256};
use crate::error::{Error, ProtocolSnafu, Result};
use snafu::ensure;

/// RFC 4253 §6.1's absolute cap on `packet_length` is 35000 bytes; any
/// announced length above that is a protocol violation, not merely an
/// oversized allocation to guard against.
pub const MAX_PACKET_LENGTH: u32 = 35000;

const MIN_PADDING: usize = 4;
const MIN_BLOCK: usize = 8;
const LENGTH_FIELD_SIZE: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha256,
}

impl MacAlgorithm {
    pub fn len(self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacSha256 => 32,
        }
    }
}

#[derive(zeroize::ZeroizeOnDrop)]
enum EncKey {
    NoCipher,
    Aes(AesCtr),
}

#[derive(zeroize::ZeroizeOnDrop)]
enum IntegKey {
    NoInteg,
    Mac {
        #[zeroize(skip)]
        algorithm: MacAlgorithm,
        key: Vec<u8>,
    },
}

impl IntegKey {
    fn len(&self) -> usize {
        match self {
            IntegKey::NoInteg => 0,
            IntegKey::Mac { algorithm, .. } => algorithm.len(),
        }
    }

    fn compute(&self, seq: u32, packet: &[u8]) -> Vec<u8> {
        match self {
            IntegKey::NoInteg => Vec::new(),
            IntegKey::Mac { algorithm, key } => {
                let mut input = Vec::with_capacity(4 + packet.len());
                input.extend_from_slice(&seq.to_be_bytes());
                input.extend_from_slice(packet);
                match algorithm {
                    MacAlgorithm::HmacSha1 => hmac_sha1(key, &input).to_vec(),
                    MacAlgorithm::HmacSha256 => hmac_sha256(key, &input).to_vec(),
                }
            }
        }
    }
}

/// One direction's negotiated keys (`send` or `receive`); cleartext
/// before the first `NEWKEYS`, `Aes`/`Mac` after. Zeroed on drop (and on
/// every rekey, since replacing `send`/`receive` drops the old value)
/// along with the cipher and MAC state it owns.
#[derive(zeroize::ZeroizeOnDrop)]
struct DirectionKeys {
    enc: EncKey,
    integ: IntegKey,
}

impl DirectionKeys {
    fn cleartext() -> Self {
        DirectionKeys { enc: EncKey::NoCipher, integ: IntegKey::NoInteg }
    }

    fn block_size(&self) -> usize {
        match self.enc {
            EncKey::NoCipher => MIN_BLOCK,
            EncKey::Aes(_) => AesKey::block_size(),
        }
    }
}

/// Per-session framing state: one `DirectionKeys` + sequence number
/// each way. Sequence numbers survive rekeying (teacher's
/// `KeyState::rekey` keeps `seq_encrypt`/`seq_decrypt` unchanged and
/// only swaps `keys`), so `rekey_send`/`rekey_receive` replace only
/// the key material.
pub struct PacketCodec {
    send: DirectionKeys,
    receive: DirectionKeys,
    seq_send: Wrapping<u32>,
    seq_receive: Wrapping<u32>,
}

impl PacketCodec {
    pub fn new_cleartext() -> Self {
        PacketCodec {
            send: DirectionKeys::cleartext(),
            receive: DirectionKeys::cleartext(),
            seq_send: Wrapping(0),
            seq_receive: Wrapping(0),
        }
    }

    pub fn rekey_send(&mut self, aes_key: AesKey, iv: [u8; 16], mac_algorithm: MacAlgorithm, mac_key: Vec<u8>) {
        self.send = DirectionKeys {
            enc: EncKey::Aes(AesCtr::new(aes_key, iv)),
            integ: IntegKey::Mac { algorithm: mac_algorithm, key: mac_key },
        };
    }

    pub fn rekey_receive(&mut self, aes_key: AesKey, iv: [u8; 16], mac_algorithm: MacAlgorithm, mac_key: Vec<u8>) {
        self.receive = DirectionKeys {
            enc: EncKey::Aes(AesCtr::new(aes_key, iv)),
            integ: IntegKey::Mac { algorithm: mac_algorithm, key: mac_key },
        };
    }

    /// Frames and writes `payload` as one Binary Packet Protocol packet.
    pub fn write_packet<W: Write>(&mut self, writer: &mut W, payload: &[u8]) -> Result<()> {
        let block_size = self.send.block_size().max(MIN_BLOCK);
        // 4 (length) + 1 (padding length byte) + payload + padding must
        // be a multiple of block_size, with padding >= MIN_PADDING.
        let unpadded = LENGTH_FIELD_SIZE + 1 + payload.len();
        let mut padding_len = block_size - (unpadded % block_size);
        if padding_len < MIN_PADDING {
            padding_len += block_size;
        }
        let packet_length = (1 + payload.len() + padding_len) as u32;

        let mut buf = Vec::with_capacity(LENGTH_FIELD_SIZE + packet_length as usize);
        buf.extend_from_slice(&packet_length.to_be_bytes());
        buf.push(padding_len as u8);
        buf.extend_from_slice(payload);
        let padding = crate::crypto::rng::random_bytes_vec(padding_len)?;
        buf.extend_from_slice(&padding);

        let mac = self.send.integ.compute(self.seq_send.0, &buf);
        if let EncKey::Aes(ctr) = &mut self.send.enc {
            ctr.apply(&mut buf);
        }
        buf.extend_from_slice(&mac);

        writer.write_all(&buf).map_err(|source| Error::Io { source })?;
        self.seq_send += 1;
        Ok(())
    }

    /// Reads and unframes one packet, returning its payload.
    pub fn read_packet<R: Read>(&mut self, reader: &mut R) -> Result<Vec<u8>> {
        let block_size = self.receive.block_size().max(MIN_BLOCK);
        let mut first_block = vec![0u8; block_size];
        reader.read_exact(&mut first_block).map_err(|source| Error::Io { source })?;

        let mac_len = self.receive.integ.len();
        let decrypted_first = {
            let mut block = first_block.clone();
            if let EncKey::Aes(ctr) = &mut self.receive.enc {
                ctr.apply(&mut block);
            }
            block
        };
        let packet_length = u32::from_be_bytes(decrypted_first[0..4].try_into().unwrap());
        ensure!(
            packet_length <= MAX_PACKET_LENGTH && packet_length as usize + LENGTH_FIELD_SIZE >= block_size,
            ProtocolSnafu { reason: "packet_length out of range" }
        );

        let remaining = LENGTH_FIELD_SIZE + packet_length as usize - block_size;
        let mut rest = vec![0u8; remaining];
        reader.read_exact(&mut rest).map_err(|source| Error::Io { source })?;
        let mut mac_tag = vec![0u8; mac_len];
        reader.read_exact(&mut mac_tag).map_err(|source| Error::Io { source })?;

        let mut full_cipher = first_block;
        full_cipher.extend_from_slice(&rest);
        let expected_mac = self.receive.integ.compute(self.seq_receive.0, &full_cipher);
        ensure!(expected_mac == mac_tag, crate::error::MacVerificationFailedSnafu);

        let mut plain = decrypted_first;
        let mut rest_plain = rest;
        if let EncKey::Aes(ctr) = &mut self.receive.enc {
            ctr.apply(&mut rest_plain);
        }
        plain.extend_from_slice(&rest_plain);

        let padding_len = plain[4] as usize;
        let payload_len = packet_length as usize - 1 - padding_len;
        ensure!(
            payload_len <= plain.len().saturating_sub(5),
            ProtocolSnafu { reason: "padding_length exceeds packet_length" }
        );
        let payload = plain[5..5 + payload_len].to_vec();

        self.seq_receive += 1;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_cleartext_packet() {
        let mut codec_out = PacketCodec::new_cleartext();
        let mut codec_in = PacketCodec::new_cleartext();
        let mut wire = Vec::new();
        codec_out.write_packet(&mut wire, b"hello world").unwrap();

        let mut cursor = std::io::Cursor::new(wire);
        let payload = codec_in.read_packet(&mut cursor).unwrap();
        assert_eq!(payload, b"hello world");
    }

    #[test]
    fn sequence_numbers_advance_independently() {
        let mut codec = PacketCodec::new_cleartext();
        let mut wire = Vec::new();
        codec.write_packet(&mut wire, b"one").unwrap();
        codec.write_packet(&mut wire, b"two").unwrap();
        assert_eq!(codec.seq_send, Wrapping(2));
    }
}
