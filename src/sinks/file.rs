//! File sink with size-based rotation
//!
//! Appends one structured line per entry. When the file reaches its size
//! limit it is renamed to `<path>.<UTC yyyyMMddHHmmss>.old` (optionally
//! gzipped) and a fresh file is started.

use crate::core::error::{LoggerError, Result};
use crate::core::log_entry::LogEntry;
use crate::core::sink::Sink;
use crate::core::timestamp;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Default size at which the file is rotated
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

const ARCHIVE_EXTENSION: &str = "old";

/// Structured-line file sink
///
/// # Examples
///
/// ```no_run
/// use fleet_log::sinks::FileSink;
///
/// let sink = FileSink::new("/var/log/fleet/patching.log")
///     .with_max_bytes(50 * 1024 * 1024)
///     .with_compression(true);
/// ```
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    current_size: u64,
    max_bytes: u64,
    compress_archives: bool,
}

impl FileSink {
    /// Create a sink that opens `path` on first write
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            current_size: 0,
            max_bytes: DEFAULT_MAX_FILE_BYTES,
            compress_archives: false,
        }
    }

    /// Create a sink and open `path` immediately
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut sink = Self::new(path);
        sink.ensure_open()?;
        Ok(sink)
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes.max(1);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_archives = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    fn ensure_open(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| {
                    LoggerError::io_operation(
                        "open log file",
                        format!("Failed to open '{}'", self.path.display()),
                        e,
                    )
                })?;

            self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
            self.file = Some(file);
        }

        self.file
            .as_mut()
            .ok_or_else(|| LoggerError::sink_unavailable("log file is not open"))
    }

    /// Archive name for a rotation happening now, avoiding existing files
    fn archive_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("fleet.log");
        let stamp = timestamp::format_archive_suffix(&Utc::now());

        let mut candidate = self
            .path
            .with_file_name(format!("{}.{}.{}", file_name, stamp, ARCHIVE_EXTENSION));
        let mut n = 1;
        while candidate.exists() || gz_path(&candidate).exists() {
            candidate = self.path.with_file_name(format!(
                "{}.{}-{}.{}",
                file_name, stamp, n, ARCHIVE_EXTENSION
            ));
            n += 1;
        }
        candidate
    }

    /// Rename the current file to its archive name and start a new one
    fn rotate(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let archive = self.archive_path();
        fs::rename(&self.path, &archive).map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to rotate current log file: {}", e),
            )
        })?;

        if self.compress_archives {
            // A failed compression leaves the plain archive in place
            if let Err(e) = compress_file(&archive) {
                eprintln!(
                    "[LOGGER WARNING] Failed to compress archive {}: {}",
                    archive.display(),
                    e
                );
            }
        }

        self.current_size = 0;
        self.ensure_open()?;
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<()> {
        let file = self.ensure_open()?;

        #[cfg(feature = "file")]
        fs2::FileExt::lock_exclusive(&*file)?;

        let result = file
            .write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush());

        #[cfg(feature = "file")]
        let _ = fs2::FileExt::unlock(&*file);

        result?;
        self.current_size += line.len() as u64 + 1;
        Ok(())
    }
}

impl Sink for FileSink {
    fn emit(&mut self, entry: &LogEntry) -> Result<()> {
        let line = entry.serialize_structured()?;

        self.ensure_open()?;
        if self.current_size >= self.max_bytes {
            self.rotate()?;
        }

        self.append_line(&line)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` to `<path>.gz`, removing the original only after success
fn compress_file(path: &Path) -> Result<PathBuf> {
    let gz = gz_path(path);
    let mut temp_name = gz.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp = PathBuf::from(temp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed: std::io::Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp, &gz).map_err(|e| {
        let _ = fs::remove_file(&temp);
        LoggerError::file_rotation(
            gz.display().to_string(),
            format!("Failed to move compressed archive into place: {}", e),
        )
    })?;

    // Only delete the original once the compressed copy is in place
    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but could not remove the original: {}",
            path.display(),
            e
        );
    }

    Ok(gz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(LogLevel::Information, message).unwrap()
    }

    fn archives(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy().into_owned();
                name.ends_with(".old") || name.ends_with(".old.gz")
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_creates_directory_and_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/run.log");

        let mut sink = FileSink::new(&path);
        sink.emit(&entry("first")).unwrap();
        sink.emit(&entry("second")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(LogEntry::deserialize(lines[1]).unwrap().message(), "second");
    }

    #[test]
    fn test_rotation_names_archive_with_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");

        let mut sink = FileSink::new(&path).with_max_bytes(64);
        for i in 0..3 {
            sink.emit(&entry(&format!("message number {} padded out", i))).unwrap();
        }

        let archived = archives(dir.path());
        assert!(!archived.is_empty());
        let name = archived[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("run.log."));
        assert!(name.ends_with(".old"));

        // Current file only holds entries written after the last rotation
        let current = fs::read_to_string(&path).unwrap();
        assert_eq!(current.lines().count(), 1);
    }

    #[test]
    fn test_rotation_with_compression() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");

        let mut sink = FileSink::new(&path).with_max_bytes(1).with_compression(true);
        sink.emit(&entry("archived")).unwrap();
        sink.emit(&entry("current")).unwrap();

        let archived = archives(dir.path());
        assert_eq!(archived.len(), 1);
        assert!(archived[0].to_string_lossy().ends_with(".old.gz"));

        let mut text = String::new();
        GzDecoder::new(File::open(&archived[0]).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains("\"message\":\"archived\""));
    }

    #[test]
    fn test_existing_size_counts_toward_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        fs::write(&path, "x".repeat(100)).unwrap();

        let mut sink = FileSink::open(&path).unwrap().with_max_bytes(50);
        assert_eq!(sink.current_size(), 100);
        sink.emit(&entry("after")).unwrap();

        assert_eq!(archives(dir.path()).len(), 1);
    }
}
