//! Archive extraction
//!
//! Picks the payload document out of the downloaded zip container and
//! decompresses only that entry to disk.

use crate::config::ArchiveConfig;
use crate::domain::{ArchiveError, MatrikelError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// The extracted payload
#[derive(Debug, Clone)]
pub struct ExtractedPayload {
    /// Local path of the payload document
    pub path: PathBuf,
    /// Entry name inside the archive
    pub entry_name: String,
    /// Number of entries that matched the payload filter
    pub candidates: usize,
    /// Uncompressed size in bytes
    pub bytes: u64,
}

/// Whether an archive entry name is a payload document
pub fn is_payload(name: &str, config: &ArchiveConfig) -> bool {
    name.ends_with(&config.payload_suffix)
        && (config.sidecar_suffix.is_empty() || !name.ends_with(&config.sidecar_suffix))
}

/// Extract the first payload entry of `archive_path` into `dest_dir`
///
/// When several entries match, the first in archive order wins; the count is
/// logged but only existence is required.
///
/// # Errors
///
/// Returns `ArchiveError::Unreadable` if the container cannot be read and
/// `ArchiveError::NoPayload` if no entry matches.
pub fn extract_payload(
    archive_path: &Path,
    dest_dir: &Path,
    config: &ArchiveConfig,
) -> Result<ExtractedPayload> {
    let unreadable = |message: String| {
        MatrikelError::Archive(ArchiveError::Unreadable {
            path: archive_path.display().to_string(),
            message,
        })
    };

    let file = File::open(archive_path).map_err(|e| unreadable(e.to_string()))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| unreadable(e.to_string()))?;

    let mut first_match = None;
    let mut candidates = 0usize;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| unreadable(format!("entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        if is_payload(entry.name(), config) {
            candidates += 1;
            if first_match.is_none() {
                first_match = Some(i);
            }
        } else {
            tracing::debug!(entry = %entry.name(), "Ignoring archive entry");
        }
    }

    let Some(index) = first_match else {
        return Err(MatrikelError::Archive(ArchiveError::NoPayload {
            path: archive_path.display().to_string(),
            suffix: config.payload_suffix.clone(),
            excluded: config.sidecar_suffix.clone(),
        }));
    };

    if candidates > 1 {
        tracing::warn!(candidates, "Several payload entries found, using the first");
    }

    let mut entry = archive
        .by_index(index)
        .map_err(|e| unreadable(format!("entry {index}: {e}")))?;
    let entry_name = entry.name().to_string();
    let file_name = entry
        .enclosed_name()
        .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        .ok_or_else(|| unreadable(format!("entry '{entry_name}' has an unsafe name")))?;

    std::fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(file_name);

    let copy = (|| -> std::io::Result<u64> {
        let mut writer = BufWriter::new(File::create(&dest)?);
        let bytes = std::io::copy(&mut entry, &mut writer)?;
        writer.flush()?;
        Ok(bytes)
    })();

    let bytes = match copy {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = std::fs::remove_file(&dest);
            return Err(unreadable(format!("failed to extract '{entry_name}': {e}")));
        }
    };

    tracing::info!(
        entry = %entry_name,
        candidates,
        bytes,
        path = %dest.display(),
        "Extracted payload document"
    );

    Ok(ExtractedPayload {
        path: dest,
        entry_name,
        candidates,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("EJF_20250101.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_is_payload() {
        let config = ArchiveConfig::default();
        assert!(is_payload("EJF_Ejerskab.json", &config));
        assert!(!is_payload("EJF_Ejerskab_metadata.json", &config));
        assert!(!is_payload("readme.txt", &config));
    }

    #[test]
    fn test_extracts_payload_and_skips_sidecar() {
        let dir = TempDir::new().unwrap();
        let archive = build_zip(
            dir.path(),
            &[
                ("dump_metadata.json", "{\"rows\": 3}"),
                ("nested/dump.json", "{\"features\": []}"),
            ],
        );

        let out = dir.path().join("extract");
        let payload = extract_payload(&archive, &out, &ArchiveConfig::default()).unwrap();

        assert_eq!(payload.entry_name, "nested/dump.json");
        assert_eq!(payload.candidates, 1);
        assert_eq!(payload.path, out.join("dump.json"));
        assert_eq!(
            std::fs::read_to_string(&payload.path).unwrap(),
            "{\"features\": []}"
        );
        assert!(!out.join("dump_metadata.json").exists());
    }

    #[test]
    fn test_first_of_several_matches_wins() {
        let dir = TempDir::new().unwrap();
        let archive = build_zip(dir.path(), &[("a.json", "[1]"), ("b.json", "[2]")]);
        let payload =
            extract_payload(&archive, &dir.path().join("x"), &ArchiveConfig::default()).unwrap();
        assert_eq!(payload.entry_name, "a.json");
        assert_eq!(payload.candidates, 2);
    }

    #[test]
    fn test_no_payload_is_fatal() {
        let dir = TempDir::new().unwrap();
        let archive = build_zip(dir.path(), &[("only_metadata.json", "{}")]);
        let err = extract_payload(&archive, &dir.path().join("x"), &ArchiveConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            MatrikelError::Archive(ArchiveError::NoPayload { .. })
        ));
    }

    #[test]
    fn test_not_a_zip_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        let err =
            extract_payload(&path, &dir.path().join("x"), &ArchiveConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            MatrikelError::Archive(ArchiveError::Unreadable { .. })
        ));
    }
}
