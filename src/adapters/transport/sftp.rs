//! SFTP transport over libssh2

use super::{RemoteEntry, RemoteSession, RemoteTransport};
use crate::domain::{AcquisitionError, MatrikelError, Result};
use ssh2::{HashType, Session, Sftp};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;

const COPY_BUFFER_BYTES: usize = 1 << 20;

/// Key-authenticated SFTP connections
#[derive(Debug, Clone)]
pub struct SftpTransport {
    timeout: Duration,
}

impl SftpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl RemoteTransport for SftpTransport {
    fn authenticate(
        &self,
        addr: SocketAddr,
        host: &str,
        username: &str,
        key_path: &Path,
    ) -> Result<Box<dyn RemoteSession>> {
        let connect_failed =
            |stage: &str, e: &dyn std::fmt::Display| -> MatrikelError {
                AcquisitionError::ConnectionFailed(format!("{host} ({addr}) {stage}: {e}")).into()
            };

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| connect_failed("tcp connect", &e))?;
        tcp.set_read_timeout(Some(self.timeout))
            .and_then(|_| tcp.set_write_timeout(Some(self.timeout)))
            .map_err(|e| connect_failed("socket setup", &e))?;

        let mut session = Session::new().map_err(|e| connect_failed("session", &e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| connect_failed("handshake", &e))?;

        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            let fingerprint: String = hash.iter().map(|b| format!("{b:02x}")).collect();
            tracing::info!(host = %host, fingerprint = %fingerprint, "Remote host key");
        }

        session
            .userauth_pubkey_file(username, None, key_path, None)
            .map_err(|e| AcquisitionError::AuthenticationFailed(format!("{username}@{host}: {e}")))?;
        if !session.authenticated() {
            return Err(AcquisitionError::AuthenticationFailed(format!(
                "{username}@{host}: key was not accepted"
            ))
            .into());
        }

        let sftp = session
            .sftp()
            .map_err(|e| connect_failed("sftp subsystem", &e))?;

        tracing::info!(host = %host, addr = %addr, "SFTP session established");
        Ok(Box::new(SftpSession {
            session,
            sftp: Some(sftp),
            closed: false,
        }))
    }
}

struct SftpSession {
    session: Session,
    sftp: Option<Sftp>,
    closed: bool,
}

impl SftpSession {
    fn sftp(&self) -> Result<&Sftp> {
        self.sftp.as_ref().ok_or_else(|| {
            AcquisitionError::ConnectionFailed("session is already closed".to_string()).into()
        })
    }
}

impl RemoteSession for SftpSession {
    fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let listing = self
            .sftp()?
            .readdir(Path::new(dir))
            .map_err(|e| AcquisitionError::ListingFailed(format!("{dir}: {e}")))?;

        Ok(listing
            .into_iter()
            .filter_map(|(path, stat)| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                Some(RemoteEntry {
                    name,
                    is_dir: stat.is_dir(),
                    size: stat.size,
                    modified: stat.mtime,
                })
            })
            .collect())
    }

    fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let failed = |e: &dyn std::fmt::Display| -> MatrikelError {
            AcquisitionError::DownloadFailed(format!("{remote_path}: {e}")).into()
        };

        let mut remote = self
            .sftp()?
            .open(Path::new(remote_path))
            .map_err(|e| failed(&e))?;

        let copy = (|| -> std::io::Result<u64> {
            let file = File::create(local_path)?;
            let mut writer = BufWriter::with_capacity(COPY_BUFFER_BYTES, file);
            let bytes = std::io::copy(&mut remote, &mut writer)?;
            writer.flush()?;
            Ok(bytes)
        })();

        copy.map_err(|e| {
            let _ = std::fs::remove_file(local_path);
            failed(&e)
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.sftp = None;
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            tracing::debug!(error = %e, "SFTP disconnect reported an error");
        }
        tracing::debug!("SFTP session closed");
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        self.close();
    }
}
