// LootScribe - platform/fs.rs
//
// File reading and atomic writing helpers.

use std::io;
use std::path::Path;

/// Read the full content of a file as a string.
///
/// Client logs are mostly ASCII but occasionally carry stray bytes; invalid
/// UTF-8 is replaced rather than rejected.
pub fn read_file_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read log file");
    Ok(content)
}

/// Write `bytes` to `path` atomically (write temp, then rename).
///
/// Creates parent directories as needed. A crash between write and rename
/// leaves the previous file intact.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);

    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        e
    })
}
