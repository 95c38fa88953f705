//! Version banner exchange, KEXINIT negotiation, X25519 ECDH key
//! exchange, exchange-hash computation and RFC 4253 §7.2 six-key
//! derivation. Negotiation-by-client-preference-order and the
//! `AlgoConfig`-style fixed algorithm lists are grounded on the
//! teacher's `kex.rs::AlgoConfig`; this client supports exactly one
//! algorithm per category (curve25519-sha256 / ssh-ed25519 /
//! aes256-ctr / hmac-sha2-256) rather than the teacher's negotiable
//! set, since §4.B2 names these as the only primitives implemented.

use std::io::{BufRead, Write};

use crate::codec::{write_mpint, write_string};
use crate::crypto::rng;
use crate::crypto::sha256::{sha256, Sha256};
use crate::crypto::x25519;
use crate::error::{
    ConnectionLostSnafu, Error, HostKeyRejectedSnafu, KeyExchangeFailedSnafu, NoCommonAlgorithmSnafu,
    ProtocolSnafu, Result,
};
use crate::hostkey::{self, HostKeyVerifier};
use crate::messages::{self, KexEcdhInit, KexEcdhReply, KexInit};
use crate::packet::{MacAlgorithm, PacketCodec};
use snafu::ensure;
use zeroize::Zeroize;

pub const KEX_ALGORITHM: &str = "curve25519-sha256";
pub const HOST_KEY_ALGORITHMS: [&str; 3] = [hostkey::ALGO_ED25519, hostkey::ALGO_RSA_SHA2_256, hostkey::ALGO_RSA];
pub const CIPHER_ALGORITHM: &str = "aes256-ctr";
pub const MAC_ALGORITHM: &str = "hmac-sha2-256";
pub const COMPRESSION_ALGORITHM: &str = "none";

const CLIENT_VERSION: &str = "SSH-2.0-sshclient_0.1";

pub struct NegotiatedAlgorithms {
    pub host_key_algorithm: String,
}

fn first_common<'a>(client_prefs: &[&'a str], server_list: &[String]) -> Option<&'a str> {
    client_prefs.iter().find(|c| server_list.iter().any(|s| s == *c)).copied()
}

fn build_client_kexinit() -> KexInit {
    KexInit {
        cookie: rng::random_bytes::<16>().unwrap_or([0u8; 16]),
        kex_algorithms: vec![KEX_ALGORITHM.to_string()],
        server_host_key_algorithms: HOST_KEY_ALGORITHMS.iter().map(|s| s.to_string()).collect(),
        encryption_client_to_server: vec![CIPHER_ALGORITHM.to_string()],
        encryption_server_to_client: vec![CIPHER_ALGORITHM.to_string()],
        mac_client_to_server: vec![MAC_ALGORITHM.to_string()],
        mac_server_to_client: vec![MAC_ALGORITHM.to_string()],
        compression_client_to_server: vec![COMPRESSION_ALGORITHM.to_string()],
        compression_server_to_client: vec![COMPRESSION_ALGORITHM.to_string()],
        languages_client_to_server: vec![],
        languages_server_to_client: vec![],
        first_kex_packet_follows: false,
    }
}

/// Reads the server's `SSH-...\r\n` identification line, tolerating
/// leading non-SSH banner lines as RFC 4253 §4.2 permits.
pub fn read_server_version<R: BufRead>(reader: &mut R) -> Result<String> {
    for _ in 0..50 {
        let mut line = String::new();
        let n = reader.read_line(&mut line).map_err(|source| Error::Io { source })?;
        ensure!(n > 0, ConnectionLostSnafu);
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.starts_with("SSH-") {
            return Ok(trimmed.to_string());
        }
    }
    Err(Error::Protocol { reason: "no SSH version banner within 50 lines" })
}

pub fn write_client_version<W: Write>(writer: &mut W) -> Result<()> {
    writer
        .write_all(format!("{CLIENT_VERSION}\r\n").as_bytes())
        .map_err(|source| Error::Io { source })
}

/// Result of a completed (or rekeyed) exchange: the derived directional
/// keys plus the exchange hash, and — only set on the very first
/// exchange — the session id (RFC 4253 §7.2: fixed for the life of the
/// connection, reused unchanged across any later rekey). The key
/// material is zeroed once `install_keys` has copied it into the
/// codec's own `AesKey`/MAC state; `session_id` is not secret and is
/// cloned out by the caller before this drops.
#[derive(zeroize::ZeroizeOnDrop)]
pub struct KexResult {
    #[zeroize(skip)]
    pub session_id: Vec<u8>,
    pub client_to_server_key: [u8; 32],
    pub client_to_server_iv: [u8; 16],
    pub client_to_server_mac_key: Vec<u8>,
    pub server_to_client_key: [u8; 32],
    pub server_to_client_iv: [u8; 16],
    pub server_to_client_mac_key: Vec<u8>,
}

/// Runs one full client-side key exchange over `reader`/`writer` using
/// `codec` for framing. `existing_session_id` is `None` on the initial
/// exchange and `Some` on a rekey (the session id never changes after
/// the first exchange).
pub fn perform_client_kex<R: std::io::Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    codec: &mut PacketCodec,
    client_version: &str,
    server_version: &str,
    existing_session_id: Option<&[u8]>,
    verifier: &mut dyn HostKeyVerifier,
) -> Result<KexResult> {
    let client_kexinit = build_client_kexinit();
    let client_kexinit_payload = client_kexinit.encode();
    codec.write_packet(writer, &client_kexinit_payload)?;

    let server_kexinit_payload = codec.read_packet(reader)?;
    ensure!(
        server_kexinit_payload.first() == Some(&messages::msg::KEXINIT),
        ProtocolSnafu { reason: "expected SSH_MSG_KEXINIT" }
    );
    let server_kexinit = KexInit::decode(&server_kexinit_payload)?;

    ensure!(
        first_common(&[KEX_ALGORITHM], &server_kexinit.kex_algorithms).is_some(),
        NoCommonAlgorithmSnafu { category: "kex" }
    );
    let host_key_algorithm = first_common(&HOST_KEY_ALGORITHMS, &server_kexinit.server_host_key_algorithms)
        .ok_or(Error::NoCommonAlgorithm { category: "host key" })?
        .to_string();
    ensure!(
        first_common(&[CIPHER_ALGORITHM], &server_kexinit.encryption_client_to_server).is_some()
            && first_common(&[CIPHER_ALGORITHM], &server_kexinit.encryption_server_to_client).is_some(),
        NoCommonAlgorithmSnafu { category: "cipher" }
    );
    ensure!(
        first_common(&[MAC_ALGORITHM], &server_kexinit.mac_client_to_server).is_some()
            && first_common(&[MAC_ALGORITHM], &server_kexinit.mac_server_to_client).is_some(),
        NoCommonAlgorithmSnafu { category: "mac" }
    );

    let mut client_secret = rng::random_bytes::<32>()?;
    let client_public = x25519::x25519_public_key(&client_secret);
    let ecdh_init = KexEcdhInit { client_public };
    codec.write_packet(writer, &ecdh_init.encode())?;

    let reply_payload = codec.read_packet(reader)?;
    ensure!(
        reply_payload.first() == Some(&messages::msg::KEX_ECDH_REPLY),
        ProtocolSnafu { reason: "expected SSH_MSG_KEX_ECDH_REPLY" }
    );
    let reply = KexEcdhReply::decode(&reply_payload)?;

    let host_key = hostkey::PublicKey::parse(&reply.host_key)
        .map_err(|_| Error::KeyExchangeFailed { reason: "unparseable host key blob".to_string() })?;
    let fp = hostkey::fingerprint(&reply.host_key);
    ensure!(verifier.verify(&fp), HostKeyRejectedSnafu);

    let mut shared_secret = x25519::x25519_shared_secret(&client_secret, &reply.server_public)
        .ok_or(Error::KeyExchangeFailed { reason: "all-zero X25519 shared secret".to_string() })?;
    client_secret.zeroize();

    let mut k_mpint = Vec::new();
    write_mpint(&mut k_mpint, &shared_secret);
    shared_secret.zeroize();
    // write_mpint writes a length-prefixed string; the hash input wants
    // exactly that (RFC 4253 §8's "mpint" encoding of K).

    let mut hash_input = Vec::new();
    write_string(&mut hash_input, client_version.as_bytes());
    write_string(&mut hash_input, server_version.as_bytes());
    write_string(&mut hash_input, &client_kexinit_payload);
    write_string(&mut hash_input, &server_kexinit_payload);
    write_string(&mut hash_input, &reply.host_key.raw);
    write_string(&mut hash_input, &client_public);
    write_string(&mut hash_input, &reply.server_public);
    hash_input.extend_from_slice(&k_mpint);
    let exchange_hash = sha256(&hash_input);

    ensure!(
        host_key.verify(&reply.signature_algorithm, &exchange_hash, &reply.signature),
        KeyExchangeFailedSnafu { reason: "host key signature verification failed" }
    );

    let session_id = existing_session_id.map(|s| s.to_vec()).unwrap_or_else(|| exchange_hash.to_vec());

    codec.write_packet(writer, &messages::encode_newkeys())?;
    let newkeys_payload = codec.read_packet(reader)?;
    ensure!(
        newkeys_payload.first() == Some(&messages::msg::NEWKEYS),
        ProtocolSnafu { reason: "expected SSH_MSG_NEWKEYS" }
    );

    let derive = |letter: u8| derive_key(&k_mpint, &exchange_hash, letter, &session_id, 32);

    let result = KexResult {
        client_to_server_iv: derive(b'A')[..16].try_into().unwrap(),
        server_to_client_iv: derive(b'B')[..16].try_into().unwrap(),
        client_to_server_key: derive(b'C')[..32].try_into().unwrap(),
        server_to_client_key: derive(b'D')[..32].try_into().unwrap(),
        client_to_server_mac_key: derive(b'E'),
        server_to_client_mac_key: derive(b'F'),
        session_id,
    };
    k_mpint.zeroize();
    Ok(result)
}

/// RFC 4253 §7.2 key derivation: `HASH(K || H || letter || session_id)`,
/// extended with `HASH(K || H || K1 || K2 || ...)` if more bytes are
/// needed than one hash output provides.
fn derive_key(k_mpint: &[u8], h: &[u8; 32], letter: u8, session_id: &[u8], want_len: usize) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(k_mpint);
    hasher.update(h);
    hasher.update(&[letter]);
    hasher.update(session_id);
    let mut out = hasher.finalize().to_vec();
    while out.len() < want_len {
        let mut extend = Sha256::new();
        extend.update(k_mpint);
        extend.update(h);
        extend.update(&out);
        out.extend_from_slice(&extend.finalize());
    }
    out
}

pub fn mac_algorithm() -> MacAlgorithm {
    MacAlgorithm::HmacSha256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_common_prefers_client_order() {
        let server = vec!["b".to_string(), "a".to_string()];
        assert_eq!(first_common(&["a", "b"], &server), Some("a"));
    }

    #[test]
    fn derive_key_is_deterministic_and_length_matches() {
        let k = vec![1, 2, 3];
        let h = [9u8; 32];
        let session_id = vec![4, 5, 6];
        let a = derive_key(&k, &h, b'A', &session_id, 32);
        let b = derive_key(&k, &h, b'A', &session_id, 32);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
