// # File Change Log
//
// Append-only text implementation of ChangeLog.
//
// ## Purpose
//
// Keeps a human-readable history of identity changes across sessions.
//
// ## Durability
//
// - Scoped writes: every append opens, writes, flushes and closes the file
// - Single header: the file is created exclusively, so the header is
//   written exactly once even if two processes race on first use. A file
//   whose header write failed is removed; an empty one gets the header.
// - Serialized appends: an internal lock keeps lines from interleaving
//
// ## File Format
//
// ```text
// # tormask identity change log
// # timestamp | address | country | city | isp
// 2025-01-09 12:00:00 | 185.220.101.4 | Germany | Frankfurt | Example GmbH
// ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::change_log::{ChangeLog, ChangeLogEntry};

/// Header written once when the log file is created
pub const LOG_HEADER: &str =
    "# tormask identity change log\n# timestamp | address | country | city | isp\n";

/// Append-only file change log
///
/// # Example
///
/// ```rust,no_run
/// use tormask_core::changelog::FileChangeLog;
/// use tormask_core::traits::{ChangeLog, ChangeLogEntry, IdentityRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let log = FileChangeLog::new("/home/user/Desktop/tor_ip_changed_log.txt");
///
///     let entry = ChangeLogEntry::now(IdentityRecord::unresolved("185.220.101.4"));
///     log.append(&entry).await?;
///
///     let lines = log.recent(5).await?;
///     assert_eq!(lines.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileChangeLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileChangeLog {
    /// Create a change log at `path`
    ///
    /// Nothing touches the filesystem until the first append.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory if needed
    async fn ensure_parent(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::log_write(format!(
                        "Failed to create log directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Open for append, creating the file with its header if it is new
    async fn open_for_append(&self) -> Result<fs::File, Error> {
        let created = fs::OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&self.path)
            .await;

        match created {
            Ok(mut file) => {
                tracing::info!("Created change log {}", self.path.display());
                if let Err(e) = write_header(&mut file).await {
                    // Remove the headerless file so the next append recreates it
                    drop(file);
                    if let Err(remove) = fs::remove_file(&self.path).await {
                        tracing::warn!(
                            "Failed to remove headerless log {}: {}",
                            self.path.display(),
                            remove
                        );
                    }
                    return Err(Error::log_write(format!(
                        "Failed to write header to {}: {}",
                        self.path.display(),
                        e
                    )));
                }
                Ok(file)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let mut file = fs::OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|e| {
                        Error::log_write(format!("Failed to open {}: {}", self.path.display(), e))
                    })?;

                // An empty file was created but never got its header
                let len = file.metadata().await.map(|m| m.len()).unwrap_or(1);
                if len == 0 {
                    write_header(&mut file).await.map_err(|e| {
                        Error::log_write(format!(
                            "Failed to write header to {}: {}",
                            self.path.display(),
                            e
                        ))
                    })?;
                }
                Ok(file)
            }
            Err(e) => Err(Error::log_write(format!(
                "Failed to create {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

async fn write_header<W>(out: &mut W) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    out.write_all(LOG_HEADER.as_bytes()).await?;
    out.flush().await
}

#[async_trait]
impl ChangeLog for FileChangeLog {
    async fn append(&self, entry: &ChangeLogEntry) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        self.ensure_parent().await?;
        let mut file = self.open_for_append().await?;

        let mut line = entry.to_line();
        line.push('\n');

        file.write_all(line.as_bytes()).await.map_err(|e| {
            Error::log_write(format!("Failed to append to {}: {}", self.path.display(), e))
        })?;

        file.flush().await.map_err(|e| {
            Error::log_write(format!("Failed to flush {}: {}", self.path.display(), e))
        })?;

        file.sync_data().await.map_err(|e| {
            Error::log_write(format!("Failed to sync {}: {}", self.path.display(), e))
        })?;

        tracing::trace!("Appended change log entry to {}", self.path.display());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<String>, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::log_write(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let lines: Vec<&str> = content
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .collect();

        let skip = lines.len().saturating_sub(limit);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::IdentityRecord;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn entry(address: &str) -> ChangeLogEntry {
        ChangeLogEntry::now(IdentityRecord::unresolved(address))
    }

    #[tokio::test]
    async fn creates_directory_and_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("log.txt");
        let log = FileChangeLog::new(&path);

        log.append(&entry("1.1.1.1")).await.unwrap();
        log.append(&entry("2.2.2.2")).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with(LOG_HEADER));
        assert_eq!(content.matches("# tormask identity change log").count(), 1);
        assert_eq!(content.lines().count(), 4);
    }

    #[tokio::test]
    async fn appends_keep_call_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = FileChangeLog::new(&path);

        for i in 0..10 {
            log.append(&entry(&format!("10.0.0.{}", i))).await.unwrap();
        }

        let lines = log.recent(100).await.unwrap();
        assert_eq!(lines.len(), 10);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.contains(&format!("| 10.0.0.{} |", i)), "line {}: {}", i, line);
        }
    }

    #[tokio::test]
    async fn concurrent_appends_never_interleave() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = Arc::new(FileChangeLog::new(&path));

        let mut handles = Vec::new();
        for i in 0..20 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                log.append(&entry(&format!("192.0.2.{}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = fs::read_to_string(&path).await.unwrap();
        let data: Vec<&str> = content.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data.len(), 20);
        for line in data {
            assert_eq!(line.split(" | ").count(), 5, "malformed line: {}", line);
        }
    }

    #[tokio::test]
    async fn existing_file_gets_no_second_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "previous content\n").await.unwrap();

        let log = FileChangeLog::new(&path);
        log.append(&entry("3.3.3.3")).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("previous content\n"));
        assert!(!content.contains("# tormask"));
    }

    #[tokio::test]
    async fn hostile_field_cannot_forge_a_line() {
        let dir = tempdir().unwrap();
        let log = FileChangeLog::new(dir.path().join("log.txt"));

        let mut identity = IdentityRecord::unresolved("1.2.3.4");
        identity.country = "DE".to_string();
        identity.city = "Berlin".to_string();
        identity.isp = "Evil ISP\n2099-01-01 00:00:00 | 6.6.6.6 | X | Y | Z".to_string();
        log.append(&ChangeLogEntry::now(identity)).await.unwrap();

        let lines = log.recent(100).await.unwrap();
        assert_eq!(lines.len(), 1, "{:?}", lines);
        assert_eq!(lines[0].split(" | ").count(), 5);
        assert!(lines[0].ends_with("| 1.2.3.4 | DE | Berlin | Evil ISP 2099-01-01 00:00:00 6.6.6.6 X Y Z"));
    }

    #[tokio::test]
    async fn empty_existing_file_gets_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "").await.unwrap();

        let log = FileChangeLog::new(&path);
        log.append(&entry("5.5.5.5")).await.unwrap();
        log.append(&entry("6.6.6.6")).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with(LOG_HEADER));
        assert_eq!(content.matches("# tormask identity change log").count(), 1);
        assert_eq!(log.recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_header_write_is_reported() {
        struct Broken;
        impl tokio::io::AsyncWrite for Broken {
            fn poll_write(
                self: std::pin::Pin<&mut Self>,
                _: &mut std::task::Context<'_>,
                _: &[u8],
            ) -> std::task::Poll<std::io::Result<usize>> {
                std::task::Poll::Ready(Err(std::io::Error::other("disk full")))
            }
            fn poll_flush(
                self: std::pin::Pin<&mut Self>,
                _: &mut std::task::Context<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                self: std::pin::Pin<&mut Self>,
                _: &mut std::task::Context<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
        }

        let err = write_header(&mut Broken).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn recent_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = FileChangeLog::new(dir.path().join("absent.txt"));
        assert!(log.recent(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_returns_tail() {
        let dir = tempdir().unwrap();
        let log = FileChangeLog::new(dir.path().join("log.txt"));
        for i in 0..6 {
            log.append(&entry(&format!("198.51.100.{}", i))).await.unwrap();
        }

        let tail = log.recent(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail[0].contains("198.51.100.4"));
        assert!(tail[1].contains("198.51.100.5"));
    }

    #[tokio::test]
    async fn unwritable_location_is_log_write_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file-not-dir");
        fs::write(&blocker, "x").await.unwrap();

        let log = FileChangeLog::new(blocker.join("log.txt"));
        let err = log.append(&entry("4.4.4.4")).await.unwrap_err();
        assert!(matches!(err, Error::LogWrite(_)));
    }
}
