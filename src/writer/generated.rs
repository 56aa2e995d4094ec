//! Persists a script's buffered output next to the script.
//!
//! The bytes go to a temporary file in the target's directory which is
//! then renamed over the target, so an interrupted write never leaves a
//! half-written generated file behind.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

/// `models.sgx` + `.g.rs` → `models.g.rs`.
pub fn output_path(script: &Path, extension: &str) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = extension.trim_start_matches('.');
    let file_name = if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    };
    script.with_file_name(file_name)
}

/// Creates `path` or fully replaces its content with `bytes`.
pub fn persist(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
