//! Cryptographic primitives implemented from the published standards
//! directly (§4.B2: "no external library required"). Every algorithm
//! here is a from-scratch implementation, not a wrapper around a
//! crypto crate — the one deliberate divergence from the teacher's
//! dependency stack (`ring`, `salty`), recorded in `DESIGN.md`.

pub mod aes;
pub mod bignum;
pub mod ed25519;
pub mod hmac;
pub mod rng;
pub mod rsa;
pub mod sha1;
pub mod sha256;
pub mod sha512;
pub mod x25519;
