//! Blocking SSH-2 transport, authentication, channel and SFTP-v3
//! client, with every cryptographic primitive implemented from the
//! published standards rather than delegated to a crypto crate
//! (`crypto` module docs). Grounded throughout on the teacher's
//! session/channel/auth state-machine shapes; see `DESIGN.md`.

pub mod auth;
pub mod channel;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod hostkey;
pub mod kex;
pub mod messages;
pub mod packet;
pub mod session;
pub mod sftp;

pub use error::{Error, Result};
pub use hostkey::HostKeyVerifier;
pub use session::{Session, SessionConfig};
