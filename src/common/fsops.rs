//! The handful of filesystem primitives the mover and the cleanup engine
//! depend on, behind a trait so tests can inject a failure at any step.

use std::fs::File;
use std::io;
use std::path::Path;

pub trait FileOps: Send + Sync {
    /// Free bytes available to this user on the volume holding `path`
    fn available_space(&self, path: &Path) -> Option<u64>;

    /// Best-effort "is somebody else holding this file" probe.
    ///
    /// Opens and closes the file; no OS lock is taken, so a writer may
    /// grab the file right after the probe returns.
    fn probe_exclusive(&self, path: &Path) -> io::Result<()>;

    /// Copy contents and modification time
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Rename, falling back to copy + delete across volumes
    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileOps for RealFs {
    fn available_space(&self, path: &Path) -> Option<u64> {
        available_space(path)
    }

    fn probe_exclusive(&self, path: &Path) -> io::Result<()> {
        File::open(path).map(drop)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let bytes = std::fs::copy(from, to)?;
        if let Ok(modified) = std::fs::metadata(from).and_then(|m| m.modified()) {
            let _ = File::options()
                .write(true)
                .open(to)
                .and_then(|f| f.set_modified(modified));
        }
        Ok(bytes)
    }

    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        // Try rename first (fast, same filesystem)
        if std::fs::rename(from, to).is_ok() {
            return Ok(());
        }
        copy_then_remove(self, from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Cross-volume move: copy, then delete the source.
///
/// On any failure `from` is left in place and nothing this call wrote
/// survives at `to`, neither a truncated copy nor a second live copy.
pub fn copy_then_remove(fs: &dyn FileOps, from: &Path, to: &Path) -> io::Result<()> {
    let preexisting = to.exists();
    if let Err(e) = fs.copy(from, to) {
        if !preexisting {
            let _ = fs.remove_file(to);
        }
        return Err(e);
    }
    if let Err(e) = fs.remove_file(from) {
        let _ = fs.remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// Free space on the volume holding `path` (or its nearest existing ancestor)
#[cfg(unix)]
pub fn available_space(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let existing = path.ancestors().find(|p| p.exists())?;
    let c_path = CString::new(existing.as_os_str().as_bytes()).ok()?;

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return None;
    }
    let stat = unsafe { stat.assume_init() };
    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}

/// Free space on the volume holding `path`, from the mounted disk list
#[cfg(not(unix))]
pub fn available_space(path: &Path) -> Option<u64> {
    use sysinfo::Disks;

    let existing = path.ancestors().find(|p| p.exists())?;
    let target = existing.canonicalize().ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| target.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_available_space_of_temp_dir() {
        let dir = TempDir::new().unwrap();
        assert!(available_space(dir.path()).is_some());
        assert!(available_space(&dir.path().join("not/yet/created")).is_some());
    }

    #[test]
    fn test_copy_keeps_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        std::fs::write(&src, "hello").unwrap();
        let old = std::time::SystemTime::now() - std::time::Duration::from_secs(86_400 * 3);
        File::options().write(true).open(&src).unwrap().set_modified(old).unwrap();

        let dst = dir.path().join("b.txt");
        RealFs.copy(&src, &dst).unwrap();

        let src_m = std::fs::metadata(&src).unwrap().modified().unwrap();
        let dst_m = std::fs::metadata(&dst).unwrap().modified().unwrap();
        assert_eq!(src_m, dst_m);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello");
    }

    /// Writes half the file, then reports a full disk
    struct TruncatingFs;

    impl FileOps for TruncatingFs {
        fn available_space(&self, _path: &Path) -> Option<u64> {
            None
        }

        fn probe_exclusive(&self, path: &Path) -> io::Result<()> {
            RealFs.probe_exclusive(path)
        }

        fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
            let data = std::fs::read(from)?;
            std::fs::write(to, &data[..data.len() / 2])?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
            copy_then_remove(self, from, to)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            RealFs.remove_file(path)
        }
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("movie.mp4");
        std::fs::write(&src, "0123456789").unwrap();
        let dst = dir.path().join("sorted").join("movie.mp4");
        std::fs::create_dir_all(dst.parent().unwrap()).unwrap();

        assert!(TruncatingFs.move_path(&src, &dst).is_err());
        assert!(!dst.exists());
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "0123456789");
    }

    #[test]
    fn test_copy_then_remove_moves_contents() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        std::fs::write(&src, "hello").unwrap();
        let dst = dir.path().join("b.txt");

        copy_then_remove(&RealFs, &src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello");
    }

    #[test]
    fn test_missing_file_fails_probe() {
        let dir = TempDir::new().unwrap();
        assert!(RealFs.probe_exclusive(&dir.path().join("nope")).is_err());
    }
}
