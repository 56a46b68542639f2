//! Short-lived private key file
//!
//! Key-based SSH authentication wants a path. The key is written to an
//! owner-only temporary file that lives exactly as long as this guard.

use crate::config::SecretString;
use crate::domain::{MatrikelError, Result};
use secrecy::ExposeSecret;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Temporary key file removed when dropped
pub struct ScopedKeyFile {
    file: NamedTempFile,
}

impl ScopedKeyFile {
    /// Write `key` to a new mode-0600 temporary file
    pub fn create(key: &SecretString) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("matrikel-key-")
            .tempfile()
            .map_err(|e| MatrikelError::Io(format!("Failed to create key file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(|e| MatrikelError::Io(format!("Failed to restrict key file: {e}")))?;
        }

        let material: &str = key.expose_secret().as_ref();
        write_key(&mut file, material)
            .map_err(|e| MatrikelError::Io(format!("Failed to write key file: {e}")))?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// OpenSSH rejects keys without a final newline.
fn write_key(file: &mut NamedTempFile, material: &str) -> std::io::Result<()> {
    file.write_all(material.as_bytes())?;
    if !material.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()
}

impl std::fmt::Debug for ScopedKeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKeyFile")
            .field("path", &self.file.path())
            .finish()
    }
}
