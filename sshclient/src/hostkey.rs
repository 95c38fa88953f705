//! Host key parsing and the verifier callback contract (§6.4).
//! Grounded on the teacher's `packets.rs::PubKey`/`Signature` enums
//! (algorithm-tagged blob shapes) but owned rather than borrowed, and
//! on `behaviour.rs`'s callback-trait pattern for pluggable policy.

use crate::codec::{read_string, write_string};
use crate::crypto::{ed25519, rsa};
use crate::error::{Error, ProtocolSnafu, Result};
use crate::messages::HostKeyBlob;
use snafu::ensure;

pub const ALGO_ED25519: &str = "ssh-ed25519";
pub const ALGO_RSA_SHA2_256: &str = "rsa-sha2-256";
pub const ALGO_RSA: &str = "ssh-rsa";

#[derive(Debug, Clone)]
pub enum PublicKey {
    Ed25519 { key: [u8; 32] },
    Rsa { e: Vec<u8>, n: Vec<u8> },
}

impl PublicKey {
    pub fn parse(blob: &HostKeyBlob) -> Result<Self> {
        let mut pos = 0;
        let algorithm = read_string(&blob.raw, &mut pos)?;
        match std::str::from_utf8(algorithm).unwrap_or("") {
            ALGO_ED25519 => {
                let key = read_string(&blob.raw, &mut pos)?;
                ensure!(key.len() == 32, ProtocolSnafu { reason: "ed25519 host key not 32 bytes" });
                let mut arr = [0u8; 32];
                arr.copy_from_slice(key);
                Ok(PublicKey::Ed25519 { key: arr })
            }
            ALGO_RSA => {
                let e = read_string(&blob.raw, &mut pos)?.to_vec();
                let n = read_string(&blob.raw, &mut pos)?.to_vec();
                Ok(PublicKey::Rsa { e, n })
            }
            _ => Err(Error::Protocol { reason: "unsupported host key algorithm" }),
        }
    }

    /// Re-encodes the blob, for computing its own fingerprint or for
    /// embedding in the `publickey` auth request.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            PublicKey::Ed25519 { key } => {
                write_string(&mut out, ALGO_ED25519.as_bytes());
                write_string(&mut out, key);
            }
            PublicKey::Rsa { e, n } => {
                write_string(&mut out, ALGO_RSA.as_bytes());
                write_string(&mut out, e);
                write_string(&mut out, n);
            }
        }
        out
    }

    /// Verifies `signature` (already split from its algorithm tag) was
    /// produced over `message` by this key.
    pub fn verify(&self, signature_algorithm: &str, message: &[u8], signature: &[u8]) -> bool {
        match self {
            PublicKey::Ed25519 { key } => {
                let Ok(sig): std::result::Result<[u8; 64], _> = signature.try_into() else {
                    return false;
                };
                ed25519::verify(key, message, &sig)
            }
            PublicKey::Rsa { e, n } => {
                let hash = match signature_algorithm {
                    ALGO_RSA_SHA2_256 => rsa::RsaHash::Sha256,
                    ALGO_RSA => rsa::RsaHash::Sha1,
                    _ => return false,
                };
                let key = rsa::RsaPublicKey { e: e.clone(), n: n.clone() };
                rsa::verify(&key, hash, message, signature)
            }
        }
    }
}

/// A fingerprint summary shown to a [`HostKeyVerifier`] (SHA-256 of
/// the key blob, matching OpenSSH's default fingerprint algorithm).
pub struct HostKeyFingerprint {
    pub algorithm: String,
    pub sha256: [u8; 32],
}

/// Policy callback deciding whether to trust a server's offered host
/// key; the only extension point in the handshake a caller must
/// supply, mirroring the teacher's `CliBehaviour::valid_hostkey`.
pub trait HostKeyVerifier: Send {
    fn verify(&mut self, fingerprint: &HostKeyFingerprint) -> bool;
}

/// Accepts every host key; useful only for tests or first-connect
/// bootstrapping flows that pin the fingerprint elsewhere. Never the
/// default a `Session` constructs on its own.
pub struct TrustOnFirstUse;

impl HostKeyVerifier for TrustOnFirstUse {
    fn verify(&mut self, _fingerprint: &HostKeyFingerprint) -> bool {
        true
    }
}

pub fn fingerprint(blob: &HostKeyBlob) -> HostKeyFingerprint {
    HostKeyFingerprint {
        algorithm: blob.algorithm.clone(),
        sha256: crate::crypto::sha256::sha256(&blob.raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ed25519_blob_roundtrip() {
        let key = PublicKey::Ed25519 { key: [9u8; 32] };
        let blob = HostKeyBlob { algorithm: ALGO_ED25519.to_string(), raw: key.to_blob() };
        let parsed = PublicKey::parse(&blob).unwrap();
        match parsed {
            PublicKey::Ed25519 { key: k } => assert_eq!(k, [9u8; 32]),
            _ => panic!("expected ed25519"),
        }
    }
}
