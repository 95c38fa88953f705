//! SFTP-v3 subsystem (§4.B7): wire framing in [`protocol`], the
//! `ATTRS` structure in [`attrs`], and the session/file/dir client API
//! in [`client`].

pub mod attrs;
pub mod client;
pub mod protocol;

pub use attrs::{Attrs, FileType, NameEntry};
pub use client::{Handle, SftpDir, SftpFile, SftpSession};
pub use protocol::{open_flag, status_code, PROTOCOL_VERSION};
