//! Append-only audit sink and audit file helpers.
//!
//! The audit format is one row key per line, UTF-8, newline-terminated, no
//! header, no escaping (row keys are assumed not to contain newlines). A
//! failed write is fatal: the audit record is a correctness commitment.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::store::RowKey;

/// Append-only destination for matched row keys.
pub enum AuditSink {
    Disabled,
    Writer(Box<dyn Write + Send>),
}

impl AuditSink {
    pub fn disabled() -> Self {
        AuditSink::Disabled
    }

    /// Create the audit file `flush_resource_ids_<start_epoch>` in `dir`.
    ///
    /// Returns the sink and the file's path so the caller can remove the
    /// file later if nothing was ever written to it.
    pub fn create_file(dir: &Path, start_epoch: u64) -> io::Result<(Self, PathBuf)> {
        let path = dir.join(audit_file_name(start_epoch));
        let file = File::create(&path)?;
        Ok((AuditSink::Writer(Box::new(file)), path))
    }

    /// Wrap an arbitrary writer (used by tests).
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        AuditSink::Writer(Box::new(writer))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, AuditSink::Writer(_))
    }

    /// Append one row key followed by a newline. No-op when disabled.
    pub fn write_key(&mut self, key: &str) -> io::Result<()> {
        if let AuditSink::Writer(writer) = self {
            writer.write_all(key.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Audit file basename for a run that started at the given epoch second.
pub fn audit_file_name(start_epoch: u64) -> String {
    format!("flush_resource_ids_{start_epoch}")
}

/// Remove the file at `path` if it is empty. Returns whether it was
/// removed.
pub fn remove_if_empty(path: &Path) -> io::Result<bool> {
    if fs::metadata(path)?.len() == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }
    Ok(false)
}

/// Estimated audit file size for the given keys: one byte per key byte
/// plus the terminating newline of each line.
pub fn estimated_size(keys: &[RowKey]) -> u64 {
    keys.iter().map(|key| key.len() as u64 + 1).sum()
}

/// Render a byte count in decimal units (1000-based), two decimals above
/// one kilobyte.
pub fn human_byte_size(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{bytes} Bytes");
    }

    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];
    let mut divider = 1000u64;
    let mut exponent = 0usize;
    let mut n = bytes / 1000;
    while n >= 1000 && exponent < UNITS.len() - 1 {
        divider *= 1000;
        exponent += 1;
        n /= 1000;
    }

    format!("{:.2} {}", bytes as f64 / divider as f64, UNITS[exponent])
}


#[cfg(test)]
mod tests {
    use super::{test_support::SharedBuf, *};

    #[test]
    fn writes_one_key_per_line() {
        let buf = SharedBuf::new();
        let mut sink = AuditSink::from_writer(buf.clone());

        sink.write_key("a").unwrap();
        sink.write_key("b").unwrap();
        sink.write_key("c").unwrap();

        assert_eq!(buf.contents(), b"a\nb\nc\n");
    }

    #[test]
    fn disabled_sink_swallows_nothing_and_writes_nothing() {
        let mut sink = AuditSink::disabled();
        assert!(!sink.is_enabled());
        sink.write_key("a").unwrap();
    }

    #[test]
    fn audit_file_naming() {
        assert_eq!(audit_file_name(1600000000), "flush_resource_ids_1600000000");
    }

    #[test]
    fn empty_file_is_removed_nonempty_is_kept() {
        let dir = tempfile::tempdir().unwrap();

        let (sink, path) = AuditSink::create_file(dir.path(), 42).unwrap();
        drop(sink);
        assert!(remove_if_empty(&path).unwrap());
        assert!(!path.exists());

        let (mut sink, path) = AuditSink::create_file(dir.path(), 43).unwrap();
        sink.write_key("row-1").unwrap();
        drop(sink);
        assert!(!remove_if_empty(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"row-1\n");
    }

    #[test]
    fn size_estimate_counts_newlines() {
        let keys = vec!["a".to_string(), "bb".to_string()];
        assert_eq!(estimated_size(&keys), 5);
        assert_eq!(estimated_size(&[]), 0);
    }

    #[test]
    fn human_byte_sizes() {
        assert_eq!(human_byte_size(0), "0 Bytes");
        assert_eq!(human_byte_size(999), "999 Bytes");
        assert_eq!(human_byte_size(1500), "1.50 kB");
        assert_eq!(human_byte_size(2_000_000), "2.00 MB");
        assert_eq!(human_byte_size(3_500_000_000), "3.50 GB");
    }

    #[test]
    fn writer_errors_surface() {
        struct Failing;
        impl std::io::Write for Failing {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut sink = AuditSink::from_writer(Failing);
        assert!(sink.write_key("a").is_err());
    }
}
