//! Error taxonomy (§7), built the way the teacher builds `BhError`:
//! `snafu` context selectors, `.fail()` at the call site, propagation
//! via `Result` only — no panics on recoverable paths.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("protocol error: {reason}"))]
    Protocol { reason: &'static str },

    #[snafu(display("protocol error: {reason}"))]
    ProtocolOwned { reason: String },

    #[snafu(display("MAC verification failed"))]
    MacVerificationFailed,

    #[snafu(display("key exchange failed: {reason}"))]
    KeyExchangeFailed { reason: String },

    #[snafu(display("host key rejected"))]
    HostKeyRejected,

    #[snafu(display("no common algorithm for {category}"))]
    NoCommonAlgorithm { category: &'static str },

    #[snafu(display("connection lost"))]
    ConnectionLost,

    #[snafu(display("timed out waiting for {waiting_for}"))]
    Timeout { waiting_for: &'static str },

    #[snafu(display("authentication denied"))]
    AuthDenied,

    #[snafu(display("channel closed"))]
    ChannelClosed,

    #[snafu(display("operation would block"))]
    Again,

    #[snafu(display("SFTP status {code}: {message}"))]
    SftpStatus { code: u32, message: String },

    #[snafu(display("unsupported SFTP protocol version {version}"))]
    SftpUnsupportedVersion { version: u32 },

    #[snafu(display("underlying I/O error: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("internal error (should not happen): {reason}"))]
    Bug { reason: &'static str },
}

impl Error {
    /// Converts an "this should never happen" condition into a `Bug`
    /// variant rather than panicking, matching the teacher's
    /// `.trap()`-style conversion of impossible states into a typed
    /// error instead of `unreachable!()`.
    pub fn trap(reason: &'static str) -> Self {
        Error::Bug { reason }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
