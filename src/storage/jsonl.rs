//! JSON-lines alert store.
//!
//! One `LedgerEntry` per line, appended and synced before the append is
//! acknowledged. The file is only ever opened in append mode and is held
//! under an exclusive advisory lock for the life of the store, so a second
//! writer on the same path fails at open instead of forking the sequence.
//!
//! A failed append is rolled back to the last acknowledged length. If the
//! rollback fails too the store is poisoned and refuses further appends.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use fs2::FileExt;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::ledger::alert::LedgerEntry;
use crate::storage::repository::AlertStore;

/// The operations an append needs from the backing file.
trait LedgerFile: Write + Send + std::fmt::Debug {
    fn size(&self) -> io::Result<u64>;
    fn sync(&mut self) -> io::Result<()>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl LedgerFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_data()
    }
}

#[derive(Debug)]
struct Writer {
    file: Box<dyn LedgerFile>,
    next_sequence: u64,
    poisoned: bool,
}

#[derive(Debug)]
pub struct JsonlAlertStore {
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl JsonlAlertStore {
    /// Open (or create) the ledger file at `path` and lock it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Unavailable(format!("open {}: {}", path.display(), e)))?;

        // Released when the store, and with it the file, is dropped.
        file.try_lock_exclusive().map_err(|e| {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                log::warn!("ALERT_STORE_LOCKED path={}", path.display());
                StoreError::Locked(path.display().to_string())
            } else {
                StoreError::Unavailable(format!("lock {}: {}", path.display(), e))
            }
        })?;

        Self::with_file(path, Box::new(file))
    }

    fn with_file(path: PathBuf, file: Box<dyn LedgerFile>) -> Result<Self, StoreError> {
        let next_sequence = read_entries(&path)?.len() as u64;

        log::info!(
            "ALERT_STORE_OPENED path={} entries={}",
            path.display(),
            next_sequence
        );

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file,
                next_sequence,
                poisoned: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn poisoned(&self) -> StoreError {
        StoreError::Poisoned(self.path.display().to_string())
    }

    /// Cut the file back to `len` after a failed append.
    fn roll_back(&self, writer: &mut Writer, len: u64, cause: io::Error) -> StoreError {
        match writer.file.truncate_to(len) {
            Ok(()) => {
                log::warn!(
                    "ALERT_STORE_APPEND_ROLLED_BACK path={} sequence={} error={}",
                    self.path.display(),
                    writer.next_sequence,
                    cause
                );
                StoreError::Unavailable(cause.to_string())
            }
            Err(e) => {
                writer.poisoned = true;
                log::error!(
                    "ALERT_STORE_POISONED path={} sequence={} error={} rollback_error={}",
                    self.path.display(),
                    writer.next_sequence,
                    cause,
                    e
                );
                self.poisoned()
            }
        }
    }
}

impl AlertStore for JsonlAlertStore {
    fn append(&self, entry: &LedgerEntry, deadline: Instant) -> Result<(), StoreError> {
        let started = Instant::now();
        let mut writer = self
            .writer
            .try_lock_until(deadline)
            .ok_or_else(|| StoreError::Timeout(deadline.saturating_duration_since(started)))?;

        if writer.poisoned {
            return Err(self.poisoned());
        }

        if entry.sequence != writer.next_sequence {
            return Err(StoreError::Corrupt {
                line: entry.sequence as usize,
                reason: format!(
                    "expected sequence {}, got {}",
                    writer.next_sequence, entry.sequence
                ),
            });
        }

        let mut line = serde_json::to_vec(entry).map_err(|e| StoreError::Corrupt {
            line: entry.sequence as usize,
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let committed = writer
            .file
            .size()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Err(e) = write_synced(writer.file.as_mut(), &line) {
            return Err(self.roll_back(&mut writer, committed, e));
        }

        writer.next_sequence += 1;
        Ok(())
    }

    fn load(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        // Hold the writer so no append interleaves with the read.
        let _writer = self.writer.lock();
        read_entries(&self.path)
    }
}

fn write_synced(file: &mut dyn LedgerFile, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync()
}

fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>, StoreError> {
    let file = File::open(path)
        .map_err(|e| StoreError::Unavailable(format!("open {}: {}", path.display(), e)))?;

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LedgerEntry = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
            line: index + 1,
            reason: e.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::ledger::alert::{AdmissionPath, Alert, GENESIS_HASH};
    use crate::types::{Address, AlertType, Priority};

    fn entry(sequence: u64, prev_hash: &str) -> LedgerEntry {
        let alert = Alert {
            message: format!("Debris on lane {}", sequence),
            origin: Address::from_bytes([4u8; 20]),
            timestamp: Utc::now(),
            alert_type: AlertType::Hazard,
            priority: Priority::Medium,
            is_emergency_broadcast: false,
        };
        LedgerEntry::seal(sequence, alert, AdmissionPath::Direct, prev_hash)
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    /// Real file whose sync and truncate can be made to fail. Writes always
    /// reach the file, so a failed sync leaves the line on disk.
    #[derive(Debug)]
    struct FaultyFile {
        inner: File,
        fail_sync: Arc<AtomicBool>,
        fail_truncate: bool,
    }

    impl FaultyFile {
        fn open(path: &Path, fail_sync: Arc<AtomicBool>, fail_truncate: bool) -> Self {
            let inner = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap();
            Self {
                inner,
                fail_sync,
                fail_truncate,
            }
        }
    }

    impl Write for FaultyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl LedgerFile for FaultyFile {
        fn size(&self) -> io::Result<u64> {
            self.inner.size()
        }

        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "sync failed"));
            }
            self.inner.sync()
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            if self.fail_truncate {
                return Err(io::Error::new(io::ErrorKind::Other, "truncate failed"));
            }
            self.inner.truncate_to(len)
        }
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");

        let first = entry(0, GENESIS_HASH);
        let second = entry(1, &first.entry_hash);
        {
            let store = JsonlAlertStore::open(&path).unwrap();
            store.append(&first, deadline()).unwrap();
            store.append(&second, deadline()).unwrap();
        }

        let reopened = JsonlAlertStore::open(&path).unwrap();
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded, vec![first, second.clone()]);

        // Sequence continues after reopen.
        let third = entry(2, &second.entry_hash);
        reopened.append(&third, deadline()).unwrap();
        assert_eq!(reopened.load().unwrap().len(), 3);
    }

    #[test]
    fn test_rejects_out_of_order_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAlertStore::open(dir.path().join("alerts.jsonl")).unwrap();
        let err = store.append(&entry(5, GENESIS_HASH), deadline()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_corrupt_line_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = JsonlAlertStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 1, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_second_open_is_locked_until_first_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");

        let first = JsonlAlertStore::open(&path).unwrap();
        let err = JsonlAlertStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
        assert!(err.is_transient());

        first.append(&entry(0, GENESIS_HASH), deadline()).unwrap();
        drop(first);

        let reopened = JsonlAlertStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_sync_is_rolled_back_and_retry_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let fail_sync = Arc::new(AtomicBool::new(true));
        let file = FaultyFile::open(&path, Arc::clone(&fail_sync), false);
        let store = JsonlAlertStore::with_file(path.clone(), Box::new(file)).unwrap();

        let first = entry(0, GENESIS_HASH);
        let err = store.append(&first, deadline()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_transient());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        // The retry reuses the same sequence and lands exactly once.
        fail_sync.store(false, Ordering::SeqCst);
        store.append(&first, deadline()).unwrap();
        assert_eq!(store.load().unwrap(), vec![first.clone()]);

        let second = entry(1, &first.entry_hash);
        store.append(&second, deadline()).unwrap();
        assert_eq!(read_entries(&path).unwrap(), vec![first, second]);
    }

    #[test]
    fn test_failed_rollback_poisons_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let fail_sync = Arc::new(AtomicBool::new(true));
        let file = FaultyFile::open(&path, Arc::clone(&fail_sync), true);
        let store = JsonlAlertStore::with_file(path, Box::new(file)).unwrap();

        let first = entry(0, GENESIS_HASH);
        let err = store.append(&first, deadline()).unwrap_err();
        assert!(matches!(err, StoreError::Poisoned(_)));
        assert!(!err.is_transient());

        fail_sync.store(false, Ordering::SeqCst);
        let err = store.append(&first, deadline()).unwrap_err();
        assert!(matches!(err, StoreError::Poisoned(_)));
    }
}
