//! Raw stream capture
//!
//! A [`CaptureLog`] is a bridge sink that writes the drained byte stream to
//! a file.

use crate::core::bridge::TerminalSink;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// File could not be opened
    #[error("Failed to open capture file {path}: {source}")]
    Open {
        /// Capture path
        path: PathBuf,
        /// Cause
        source: io::Error,
    },

    /// Write or flush failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Capture file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureFormat {
    /// Bytes exactly as received
    #[default]
    Raw,
    /// One timestamped text line per chunk
    Text,
    /// One timestamped hex line per chunk
    Hex,
}

impl CaptureFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            CaptureFormat::Raw => "nmea",
            CaptureFormat::Text => "txt",
            CaptureFormat::Hex => "hex",
        }
    }
}

impl std::str::FromStr for CaptureFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "text" | "txt" => Ok(Self::Text),
            "hex" => Ok(Self::Hex),
            other => Err(format!("unknown capture format: {}", other)),
        }
    }
}

/// Capture file writer
pub struct CaptureLog {
    file: BufWriter<File>,
    format: CaptureFormat,
    path: PathBuf,
    bytes_logged: u64,
    chunks_logged: u64,
}

impl CaptureLog {
    /// Open `path` for appending
    pub fn create(path: impl AsRef<Path>, format: CaptureFormat) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| CaptureError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            file: BufWriter::new(file),
            format,
            path,
            bytes_logged: 0,
            chunks_logged: 0,
        })
    }

    /// Capture path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capture format
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Append one chunk
    pub fn log(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        match self.format {
            CaptureFormat::Raw => self.file.write_all(data)?,
            CaptureFormat::Text => {
                let text = String::from_utf8_lossy(data);
                writeln!(
                    self.file,
                    "[{}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    text.trim_end_matches(&['\r', '\n'][..])
                )?
            }
            CaptureFormat::Hex => writeln!(
                self.file,
                "[{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                hex::encode_upper(data)
            )?,
        }

        self.bytes_logged += data.len() as u64;
        self.chunks_logged += 1;

        // Flush periodically
        if self.chunks_logged % 100 == 0 {
            self.file.flush()?;
        }
        Ok(())
    }

    /// Flush to disk
    pub fn flush(&mut self) -> Result<(), CaptureError> {
        self.file.flush()?;
        Ok(())
    }

    /// (bytes, chunks) written so far
    pub fn stats(&self) -> (u64, u64) {
        (self.bytes_logged, self.chunks_logged)
    }
}

impl TerminalSink for CaptureLog {
    fn write(&mut self, data: &[u8]) {
        if let Err(e) = self.log(data) {
            tracing::warn!(path = %self.path.display(), error = %e, "capture write failed");
        }
    }
}

impl Drop for CaptureLog {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

/// Generate capture filename with timestamp
pub fn generate_capture_filename(prefix: &str, format: CaptureFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.nmea");
        {
            let mut log = CaptureLog::create(&path, CaptureFormat::Raw).unwrap();
            log.write(b"$PDKEY,1\r\n");
            log.write(b"$PDK");
            assert_eq!(log.stats(), (14, 2));
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"$PDKEY,1\r\n$PDK");
    }

    #[test]
    fn test_hex_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.hex");
        {
            let mut log = CaptureLog::create(&path, CaptureFormat::Hex).unwrap();
            log.log(&[0x24, 0x0a, 0xff]).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_end().ends_with("] 240AFF"));
    }

    #[test]
    fn test_text_capture_strips_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        {
            let mut log = CaptureLog::create(&path, CaptureFormat::Text).unwrap();
            log.log(b"$GPGGA,1\r\n").unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("] $GPGGA,1\n"));
    }

    #[test]
    fn test_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = CaptureLog::create(dir.path().join("missing/x.nmea"), CaptureFormat::Raw);
        assert!(matches!(err, Err(CaptureError::Open { .. })));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("HEX".parse::<CaptureFormat>(), Ok(CaptureFormat::Hex));
        assert!("csv".parse::<CaptureFormat>().is_err());
        assert!(generate_capture_filename("gps", CaptureFormat::Raw).ends_with(".nmea"));
    }
}
