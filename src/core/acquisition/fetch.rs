//! Credential retrieval, connection and download of the latest archive

use super::resolver::HostResolver;
use super::retry::{RetryError, RetryPolicy, Sleeper};
use crate::adapters::secrets::SecretStore;
use crate::adapters::transport::{
    remote_join, RemoteEntry, RemoteSession, RemoteTransport, ScopedKeyFile,
};
use crate::config::{SecretString, SourceConfig};
use crate::domain::{AcquisitionError, MatrikelError, Result};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Secrets fetched and host resolved; no connection yet
pub struct ResolvedSource {
    pub host: String,
    pub username: String,
    pub addr: SocketAddr,
    private_key: SecretString,
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// The downloaded archive
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedArchive {
    pub path: PathBuf,
    pub remote_name: String,
    pub bytes: u64,
    pub modified: Option<u64>,
}

/// Newest non-directory entry whose name ends with `suffix`
///
/// Entries without a modification time sort before any entry with one; ties
/// go to the lexicographically greatest name.
pub fn select_latest<'a>(entries: &'a [RemoteEntry], suffix: &str) -> Option<&'a RemoteEntry> {
    entries
        .iter()
        .filter(|e| !e.is_dir && e.name.ends_with(suffix))
        .max_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.name.cmp(&b.name))
        })
}

/// Drives the acquisition stages against injected capabilities
pub struct Acquirer {
    config: SourceConfig,
    secrets: Arc<dyn SecretStore>,
    resolver: Arc<dyn HostResolver>,
    transport: Arc<dyn RemoteTransport>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: watch::Receiver<bool>,
}

impl Acquirer {
    pub fn new(
        config: SourceConfig,
        secrets: Arc<dyn SecretStore>,
        resolver: Arc<dyn HostResolver>,
        transport: Arc<dyn RemoteTransport>,
        sleeper: Arc<dyn Sleeper>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            secrets,
            resolver,
            transport,
            sleeper,
            shutdown,
        }
    }

    /// Fetch credentials and resolve the host, retrying resolution
    ///
    /// # Errors
    ///
    /// Missing secrets are fatal; resolution failure after the last attempt is
    /// `AcquisitionError::NameResolution`; shutdown is `MatrikelError::Cancelled`.
    pub async fn resolve(&self) -> Result<ResolvedSource> {
        let host = self.secrets.get_secret(&self.config.host_secret).await?;
        let username = self.secrets.get_secret(&self.config.username_secret).await?;
        let private_key = self
            .secrets
            .get_secret(&self.config.private_key_secret)
            .await?;

        let host = host.expose_secret().trim().to_string();
        let username = username.expose_secret().trim().to_string();
        let port = self.config.port;

        let policy = RetryPolicy::from_config(&self.config.retry);
        let resolver = self.resolver.clone();
        let outcome = policy
            .run("resolve", self.sleeper.as_ref(), &self.shutdown, |attempt| {
                let resolver = resolver.clone();
                let host = host.clone();
                async move {
                    tracing::debug!(host = %host, attempt, "Resolving remote host");
                    resolver.resolve(&host, port).await
                }
            })
            .await;

        let addrs = match outcome {
            Ok(addrs) => addrs,
            Err(RetryError::Cancelled) => return Err(MatrikelError::Cancelled),
            Err(RetryError::Exhausted { attempts, last }) => {
                return Err(AcquisitionError::NameResolution {
                    host,
                    attempts,
                    message: last.to_string(),
                }
                .into())
            }
        };

        let addr = addrs
            .first()
            .copied()
            .ok_or_else(|| AcquisitionError::NameResolution {
                host: host.clone(),
                attempts: 1,
                message: "no addresses".to_string(),
            })?;
        tracing::info!(host = %host, addr = %addr, "Resolved remote host");

        Ok(ResolvedSource {
            host,
            username,
            addr,
            private_key,
        })
    }

    /// Open an authenticated session
    ///
    /// The key file exists only for the duration of the authentication call.
    pub async fn connect(&self, source: &ResolvedSource) -> Result<Box<dyn RemoteSession>> {
        let key_file = ScopedKeyFile::create(&source.private_key)?;
        let transport = self.transport.clone();
        let addr = source.addr;
        let host = source.host.clone();
        let username = source.username.clone();

        tokio::task::spawn_blocking(move || {
            let session = transport.authenticate(addr, &host, &username, key_file.path());
            drop(key_file);
            session
        })
        .await
        .map_err(|e| MatrikelError::Other(format!("authentication task failed: {e}")))?
    }

    /// Select the newest matching archive and stream it into `download_dir`
    ///
    /// The session is closed before this returns, whatever the outcome.
    pub async fn download_latest(
        &self,
        mut session: Box<dyn RemoteSession>,
        download_dir: &Path,
    ) -> Result<DownloadedArchive> {
        let remote_dir = self.config.remote_dir.clone();
        let suffix = self.config.file_suffix.clone();
        let download_dir = download_dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let result = download_blocking(session.as_mut(), &remote_dir, &suffix, &download_dir);
            session.close();
            result
        })
        .await
        .map_err(|e| MatrikelError::Other(format!("download task failed: {e}")))?
    }
}

fn download_blocking(
    session: &mut dyn RemoteSession,
    remote_dir: &str,
    suffix: &str,
    download_dir: &Path,
) -> Result<DownloadedArchive> {
    let entries = session.list(remote_dir)?;
    tracing::debug!(dir = %remote_dir, entries = entries.len(), "Listed remote directory");

    let latest = select_latest(&entries, suffix).ok_or_else(|| AcquisitionError::NoSourceFile {
        directory: remote_dir.to_string(),
        suffix: suffix.to_string(),
    })?;
    tracing::info!(
        file = %latest.name,
        size = latest.size,
        modified = latest.modified,
        "Selected newest source archive"
    );

    std::fs::create_dir_all(download_dir)?;
    let local = download_dir.join(&latest.name);
    let bytes = session.download(&remote_join(remote_dir, &latest.name), &local)?;
    tracing::info!(path = %local.display(), bytes, "Downloaded source archive");

    Ok(DownloadedArchive {
        path: local,
        remote_name: latest.name.clone(),
        bytes,
        modified: latest.modified,
    })
}
