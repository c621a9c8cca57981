use memmap2::MmapMut;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory under the user supplied root where backing files live.
const STORAGE_DIR: &str = ".cloudtoid/interprocess/mmf";

/// Extension of queue backing files.
const FILE_EXT: &str = "qu";

/// Returns the path of the backing file for `queue_name` under `root`.
pub fn queue_file_path(root: &Path, queue_name: &str) -> PathBuf {
    root.join(STORAGE_DIR).join(format!("{queue_name}.{FILE_EXT}"))
}

/// A read/write mapping of a queue's backing file.
///
/// The base address is captured once at mapping time and stays valid until
/// the view is dropped; moving the `MemoryView` value does not move the
/// mapping itself.
#[derive(Debug)]
pub struct MemoryView {
    /// File handle kept alive to maintain the memory map validity
    _file: File,
    mmap: MmapMut,
    base: *mut u8,
}

// The view is handed between threads together with the queue that owns it.
// The raw base pointer refers to an OS mapping, not to thread-local state.
unsafe impl Send for MemoryView {}

impl MemoryView {
    fn map(file: File) -> io::Result<Self> {
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        let base = mmap.as_mut_ptr();
        Ok(Self { _file: file, mmap, base })
    }

    /// Base address of the mapped region.
    #[inline]
    pub fn ptr(&self) -> *mut u8 {
        self.base
    }

    /// Total length of the mapped region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }
}

/// The backing file of a shared queue region, together with its mapping.
///
/// Exactly one attached process is the owner at any time: the one that
/// created the file, or the latest one that opened it with
/// `create_or_override`. The owner unlinks the file when dropped.
#[derive(Debug)]
pub struct MemoryFile {
    path: PathBuf,
    owns_file: bool,
    view: MemoryView,
}

impl MemoryFile {
    /// Creates or opens the backing file for `queue_name` under `root` and
    /// maps it read/write.
    ///
    /// The creation protocol:
    /// 1. Try to create the file exclusively. Success makes this instance
    ///    the owner; the file is sized to `total_bytes` and starts zeroed.
    /// 2. On collision, `create_or_override` unlinks the old path and
    ///    creates a fresh file (a new inode, so prior mappers keep the old
    ///    content) and takes ownership; otherwise the existing file is
    ///    attached non-destructively, after checking that its size matches.
    ///
    /// On any failure past file creation, partially acquired resources are
    /// rolled back; rollback errors are logged and swallowed so the original
    /// error is the one surfaced.
    pub fn create_or_open(
        root: &Path,
        queue_name: &str,
        total_bytes: u64,
        create_or_override: bool,
    ) -> io::Result<Self> {
        fs::create_dir_all(root.join(STORAGE_DIR))?;
        let path = queue_file_path(root, queue_name);

        let exclusive = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path);

        let (file, owns_file) = match exclusive {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if create_or_override {
                    // Unlink rather than truncate in place: truncating the
                    // existing inode would zero it under every process that
                    // already maps it. Unlinking leaves those mappings on
                    // the old inode and puts the new queue on a fresh one.
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e),
                    }
                    let file = OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .open(&path)?;
                    (file, true)
                } else {
                    let file = OpenOptions::new().read(true).write(true).open(&path)?;
                    let actual = file.metadata()?.len();
                    if actual != total_bytes {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!(
                                "existing queue file {} is {actual} bytes, expected {total_bytes}",
                                path.display()
                            ),
                        ));
                    }
                    (file, false)
                }
            }
            Err(e) => return Err(e),
        };

        if owns_file {
            if let Err(e) = file.set_len(total_bytes) {
                Self::unlink_best_effort(&path);
                return Err(e);
            }
        }

        match MemoryView::map(file) {
            Ok(view) => {
                debug!(
                    path = %path.display(),
                    bytes = total_bytes,
                    owner = owns_file,
                    "mapped queue backing file"
                );
                Ok(Self { path, owns_file, view })
            }
            Err(e) => {
                // `MemoryView::map` consumed and closed the file handle.
                if owns_file {
                    Self::unlink_best_effort(&path);
                }
                Err(e)
            }
        }
    }

    /// The mapped region.
    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Whether this instance deletes the backing file on drop.
    pub fn is_owner(&self) -> bool {
        self.owns_file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unlink_best_effort(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to unlink queue backing file");
        }
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        if self.owns_file {
            Self::unlink_best_effort(&self.path);
            debug!(path = %self.path.display(), "released owned queue backing file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_root(tag: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        PathBuf::from(format!("/tmp/basalt_mmap_{tag}_{ts}"))
    }

    #[test]
    fn create_write_reopen_roundtrip() {
        let root = test_root("roundtrip");

        {
            let owner = MemoryFile::create_or_open(&root, "q", 4096, false).unwrap();
            assert!(owner.is_owner());
            assert_eq!(owner.view().len(), 4096);
            unsafe {
                let p = owner.view().ptr();
                *p.add(0) = 0xAB;
                *p.add(4095) = 0xCD;
            }

            let attached = MemoryFile::create_or_open(&root, "q", 4096, false).unwrap();
            assert!(!attached.is_owner());
            unsafe {
                let p = attached.view().ptr();
                assert_eq!(*p.add(0), 0xAB);
                assert_eq!(*p.add(4095), 0xCD);
            }
        }

        // Both instances dropped; the owner unlinked the file.
        assert!(!queue_file_path(&root, "q").exists());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn attach_rejects_size_mismatch() {
        let root = test_root("mismatch");
        let _owner = MemoryFile::create_or_open(&root, "q", 4096, false).unwrap();

        let err = MemoryFile::create_or_open(&root, "q", 8192, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn override_takes_ownership() {
        let root = test_root("override");
        let first = MemoryFile::create_or_open(&root, "q", 4096, false).unwrap();
        unsafe { *first.view().ptr() = 0xEE };

        // Re-create destructively: the path now points at a fresh zeroed
        // inode and the new instance owns deletion.
        let second = MemoryFile::create_or_open(&root, "q", 4096, true).unwrap();
        assert!(second.is_owner());
        unsafe { assert_eq!(*second.view().ptr(), 0) };

        let path = queue_file_path(&root, "q");
        drop(second);
        assert!(!path.exists());

        // The first instance's mapping outlives the unlink.
        unsafe { assert_eq!(*first.view().ptr(), 0xEE) };
        drop(first);
        let _ = fs::remove_dir_all(&root);
    }
}
