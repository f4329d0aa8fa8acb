use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use crate::rotation::{Clock, RotationPolicy, SystemClock};
use crate::{Error, Result};

/// State of the current log file.
#[derive(Debug)]
struct ActiveFile {
    file: File,
    path: PathBuf,
    generation: i64,
}

/// A writer that starts a new file per rotation interval.
///
/// Files are named `<base>.<suffix>` (see [`RotationPolicy::suffix`]). On unix
/// `<base>` itself is kept as a symlink to the file currently being written.
/// Every rotation deletes sibling `<base>.<digits>` files older than the
/// policy's `max_age`.
///
/// Writes go through `&RotatingWriter`, so an `Arc<RotatingWriter>` can be
/// handed to `tracing-subscriber` directly as a `MakeWriter`.
pub struct RotatingWriter {
    base_path: PathBuf,
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<ActiveFile>>,
}

impl std::fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingWriter")
            .field("base_path", &self.base_path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Create the parent directories of `path` if they are missing.
pub(crate) fn make_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| Error::LogDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

impl RotatingWriter {
    /// Create a daily rotating writer on the system clock.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_clock(base_path, RotationPolicy::default(), Arc::new(SystemClock::new()))
    }

    /// Create a rotating writer with an explicit policy and clock.
    ///
    /// The parent directory is created and the current interval's file is
    /// opened eagerly, so misconfiguration surfaces here instead of on the
    /// first write.
    pub fn with_clock(
        base_path: impl Into<PathBuf>,
        policy: RotationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        policy.validate()?;
        let base_path = base_path.into();
        make_parent_dir(&base_path)?;

        let writer = Self {
            base_path,
            policy,
            clock,
            state: Mutex::new(None),
        };

        {
            let mut guard = writer.lock_state();
            writer
                .rotate_if_needed(&mut guard)
                .map_err(|source| Error::FileSink {
                    path: writer.base_path.clone(),
                    source,
                })?;
        }

        Ok(writer)
    }

    /// The link path handed to the constructor.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The rotation policy in effect.
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Path of the file currently receiving writes.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.lock_state().as_ref().map(|active| active.path.clone())
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<ActiveFile>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Path of the rotated file carrying `suffix`.
    fn file_path_for(&self, suffix: &str) -> PathBuf {
        let mut name = self.base_path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Switch to the file for the current interval if it differs from the active one.
    ///
    /// Rotation only moves forward: a clock reading from an earlier interval
    /// keeps the active file. When the new file opens but the link cannot be
    /// swapped, the file is still installed and the link error is returned.
    fn rotate_if_needed(&self, state: &mut Option<ActiveFile>) -> io::Result<()> {
        let now = self.clock.now();
        let generation = self.policy.generation(now);
        if matches!(state, Some(active) if generation <= active.generation) {
            return Ok(());
        }

        // Close current file (drop it)
        *state = None;

        let path = self.file_path_for(&self.policy.suffix(now));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let linked = self.update_link(&path);

        if self.policy.purges()
            && let Some(cutoff) = SystemTime::from(now).checked_sub(self.policy.max_age)
        {
            self.purge_expired(&path, cutoff);
        }

        *state = Some(ActiveFile {
            file,
            path,
            generation,
        });
        linked
    }

    /// Point `<base>` at `target` by swapping in a freshly created symlink.
    #[cfg(unix)]
    fn update_link(&self, target: &Path) -> io::Result<()> {
        let link_target = target.file_name().map(PathBuf::from).unwrap_or_default();
        let mut tmp = self.base_path.as_os_str().to_owned();
        tmp.push("_symlink");
        let tmp = PathBuf::from(tmp);

        match std::fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::os::unix::fs::symlink(&link_target, &tmp)?;
        std::fs::rename(&tmp, &self.base_path)
    }

    #[cfg(not(unix))]
    fn update_link(&self, _target: &Path) -> io::Result<()> {
        Ok(())
    }

    /// Delete rotated siblings last modified before `cutoff`. Failures are skipped.
    fn purge_expired(&self, current: &Path, cutoff: SystemTime) {
        let Some(base_name) = self.base_path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let dir = match self.base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        let prefix = format!("{}.", base_name);
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_name() == current.file_name() {
                continue;
            }
            let name = entry.file_name();
            let Some(suffix) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let Ok(meta) = std::fs::symlink_metadata(&path) else {
                continue;
            };
            if meta.file_type().is_symlink() {
                continue;
            }
            if meta.modified().is_ok_and(|modified| modified < cutoff) {
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

impl Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.lock_state();
        if let Err(err) = self.rotate_if_needed(&mut guard) {
            if guard.is_none() {
                return Err(err);
            }
            // Reported once per rotation; the new file keeps receiving records.
            eprintln!(
                "oncelog: failed to update log link {}: {}",
                self.base_path.display(),
                err
            );
        }

        match guard.as_mut() {
            Some(active) => active.file.write(buf),
            None => Err(io::Error::other("Failed to open log file")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock_state().as_mut() {
            Some(active) => active.file.flush(),
            None => Ok(()),
        }
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::ManualClock;
    use std::time::Duration;
    use time::macros::datetime;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn manual_writer(dir: &Path, clock: &Arc<ManualClock>) -> RotatingWriter {
        RotatingWriter::with_clock(
            dir.join("info.log"),
            RotationPolicy::daily(),
            Arc::clone(clock) as Arc<dyn Clock>,
        )
        .expect("create writer")
    }

    fn set_mtime(path: &Path, at: time::OffsetDateTime) {
        let file = OpenOptions::new().append(true).open(path).unwrap();
        file.set_modified(SystemTime::from(at)).unwrap();
    }

    #[test]
    fn test_rotating_writer_creates_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 09:30 UTC)));
        let mut writer = manual_writer(dir.path(), &clock);

        writer.write_all(b"hello world\n").unwrap();
        writer.flush().unwrap();

        let dated = dir.path().join("info.log.20261016");
        assert_eq!(writer.current_path(), Some(dated.clone()));
        let content = std::fs::read_to_string(&dated).unwrap();
        assert!(content.contains("hello world"));
    }

    #[test]
    fn test_rotating_writer_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/inner");
        assert!(!nested.exists());

        let writer = RotatingWriter::new(nested.join("app.log")).expect("create writer");
        (&writer).write_all(b"hello parent\n").unwrap();

        assert!(nested.exists(), "Parent directories should have been created");
        assert!(writer.current_path().is_some_and(|p| p.exists()));
    }

    #[test]
    fn test_parent_dir_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = RotatingWriter::new(blocker.join("sub/app.log")).unwrap_err();
        assert!(matches!(err, Error::LogDirectory { .. }), "got {err:?}");
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = RotatingWriter::with_clock(
            dir.path().join("app.log"),
            RotationPolicy::new(Duration::ZERO, DAY),
            Arc::new(SystemClock::new()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rotates_on_day_change() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 23:59 UTC)));
        let writer = manual_writer(dir.path(), &clock);

        (&writer).write_all(b"day one\n").unwrap();
        clock.advance(Duration::from_secs(120));
        (&writer).write_all(b"day two\n").unwrap();

        let first = std::fs::read_to_string(dir.path().join("info.log.20261016")).unwrap();
        let second = std::fs::read_to_string(dir.path().join("info.log.20261017")).unwrap();
        assert_eq!(first, "day one\n");
        assert_eq!(second, "day two\n");
    }

    #[test]
    fn test_reopens_existing_file_in_append_mode() {
        let dir = tempfile::tempdir().unwrap();
        let dated = dir.path().join("info.log.20261016");
        std::fs::write(&dated, b"existing content\n").unwrap();

        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 12:00 UTC)));
        let writer = manual_writer(dir.path(), &clock);
        (&writer).write_all(b"new content\n").unwrap();

        let content = std::fs::read_to_string(&dated).unwrap();
        assert_eq!(content, "existing content\nnew content\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_link_follows_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 12:00 UTC)));
        let writer = manual_writer(dir.path(), &clock);
        let link = dir.path().join("info.log");

        assert_eq!(
            std::fs::read_link(&link).unwrap(),
            PathBuf::from("info.log.20261016")
        );

        clock.advance(DAY);
        (&writer).write_all(b"next day\n").unwrap();

        assert_eq!(
            std::fs::read_link(&link).unwrap(),
            PathBuf::from("info.log.20261017")
        );
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "next day\n");
        assert!(!dir.path().join("info.log_symlink").exists());
    }

    #[test]
    fn test_offset_change_does_not_rotate_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-17 02:00 +8)));
        let writer = manual_writer(dir.path(), &clock);
        (&writer).write_all(b"local\n").unwrap();

        // Same instant one second later, read back in UTC: the previous local day.
        clock.set(datetime!(2026-10-16 18:00:01 UTC));
        (&writer).write_all(b"utc\n").unwrap();

        let current = dir.path().join("info.log.20261017");
        assert_eq!(writer.current_path(), Some(current.clone()));
        assert_eq!(std::fs::read_to_string(&current).unwrap(), "local\nutc\n");
        assert!(!dir.path().join("info.log.20261016").exists());
        #[cfg(unix)]
        {
            assert_eq!(
                std::fs::read_link(dir.path().join("info.log")).unwrap(),
                PathBuf::from("info.log.20261017")
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_link_failure_keeps_writing_after_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 12:00 UTC)));
        let writer = manual_writer(dir.path(), &clock);

        // A non-empty directory where the link lives cannot be replaced by rename.
        let link = dir.path().join("info.log");
        std::fs::remove_file(&link).unwrap();
        std::fs::create_dir(&link).unwrap();
        std::fs::write(link.join("occupied"), b"x").unwrap();

        clock.advance(DAY);
        for _ in 0..5 {
            (&writer).write_all(b"still here\n").unwrap();
        }

        let day2 = dir.path().join("info.log.20261017");
        assert_eq!(writer.current_path(), Some(day2.clone()));
        assert_eq!(
            std::fs::read_to_string(&day2).unwrap(),
            "still here\n".repeat(5)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_link_failure_at_construction_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("info.log");
        std::fs::create_dir(&link).unwrap();
        std::fs::write(link.join("occupied"), b"x").unwrap();

        let clock = Arc::new(ManualClock::new(datetime!(2026-10-16 12:00 UTC)));
        let err = RotatingWriter::with_clock(
            &link,
            RotationPolicy::daily(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileSink { .. }), "got {err:?}");
    }

    #[test]
    fn test_purges_files_older_than_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let start = datetime!(2026-10-01 12:00 UTC);
        let clock = Arc::new(ManualClock::new(start));
        let writer = manual_writer(dir.path(), &clock);

        (&writer).write_all(b"oct 1\n").unwrap();
        set_mtime(&dir.path().join("info.log.20261001"), start);

        clock.advance(3 * DAY);
        (&writer).write_all(b"oct 4\n").unwrap();
        set_mtime(&dir.path().join("info.log.20261004"), start + 3 * DAY);

        // Unrelated files must survive even when old.
        let unrelated = dir.path().join("info.log.backup");
        std::fs::write(&unrelated, b"keep").unwrap();
        set_mtime(&unrelated, start);

        clock.advance(5 * DAY);
        (&writer).write_all(b"oct 9\n").unwrap();

        assert!(!dir.path().join("info.log.20261001").exists());
        assert!(dir.path().join("info.log.20261004").exists());
        assert!(dir.path().join("info.log.20261009").exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_zero_max_age_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let start = datetime!(2026-10-01 12:00 UTC);
        let clock = Arc::new(ManualClock::new(start));
        let writer = RotatingWriter::with_clock(
            dir.path().join("info.log"),
            RotationPolicy::daily().with_max_age(Duration::ZERO),
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap();

        (&writer).write_all(b"old\n").unwrap();
        set_mtime(&dir.path().join("info.log.20261001"), start);

        clock.advance(30 * DAY);
        (&writer).write_all(b"new\n").unwrap();

        assert!(dir.path().join("info.log.20261001").exists());
        assert!(dir.path().join("info.log.20261031").exists());
    }
}
