//! Remote file transport
//!
//! The traits are synchronous; callers run them inside
//! `tokio::task::spawn_blocking`.

pub mod keyfile;
pub mod sftp;

use crate::domain::Result;
use std::net::SocketAddr;
use std::path::Path;

pub use keyfile::ScopedKeyFile;
pub use sftp::SftpTransport;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name without directory
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    /// Modification time in seconds since the Unix epoch
    pub modified: Option<u64>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64, modified: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size: Some(size),
            modified: Some(modified),
        }
    }
}

/// Opens authenticated sessions against a remote host
pub trait RemoteTransport: Send + Sync {
    /// Connect to `addr` and authenticate `username` with the key at `key_path`
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionError::ConnectionFailed` or
    /// `AcquisitionError::AuthenticationFailed`.
    fn authenticate(
        &self,
        addr: SocketAddr,
        host: &str,
        username: &str,
        key_path: &Path,
    ) -> Result<Box<dyn RemoteSession>>;
}

/// An authenticated session
pub trait RemoteSession: Send {
    /// List a remote directory
    fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>>;

    /// Stream a remote file to `local_path`, returning the byte count
    fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64>;

    /// Close the session; calling it again is a no-op
    fn close(&mut self);
}

/// Join a remote directory and file name with `/`
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        return name.to_string();
    }
    format!("{}/{name}", dir.trim_end_matches('/'))
}
