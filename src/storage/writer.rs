use sha2::{Digest, Sha256};
use std::{
    fs,
    fs::{File, OpenOptions},
    io,
    io::Write,
    mem,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

/// Writes one cache entry into a temporary file beside its final path
///
/// Nothing is visible at the final path until [StorageWriter::commit()]
/// renames the finished file into place. A writer that is dropped without
/// being committed deletes its temporary file, along with any directories
/// it was told it created that are now empty. That happens on an error, a
/// timeout or a panic unwinding through the fetch.
#[derive(Debug)]
pub struct StorageWriter {
    temp_file: File,
    temp_path: Option<PathBuf>,
    created_dirs: Vec<PathBuf>,
    hasher: Sha256,
    len: u64,
    log_target: String,
}

/// Summary of a committed cache entry
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Committed {
    pub digest: String,
    pub len: u64,
}

impl StorageWriter {
    /// Create a new temporary file in the same directory as `dest`
    ///
    /// The parent directory must already exist.
    pub fn create(dest: &Path) -> io::Result<StorageWriter> {
        let temp_path = temp_path_for(dest);
        let temp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o444)
            .open(&temp_path)?;
        Ok(StorageWriter {
            temp_file,
            temp_path: Some(temp_path),
            created_dirs: Vec::new(),
            hasher: Sha256::new(),
            len: 0,
            log_target: module_path!().to_owned(),
        })
    }

    /// Directories to remove again, deepest first, if this entry is abandoned
    pub fn remove_on_discard(mut self, created_dirs: Vec<PathBuf>) -> Self {
        self.created_dirs = created_dirs;
        self
    }

    /// Log cleanup problems under another target
    pub fn log_target(mut self, target: &str) -> Self {
        self.log_target = target.to_owned();
        self
    }

    /// Number of bytes written so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the temporary file, until it's committed or discarded
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp_path.as_deref()
    }

    /// Flush everything to disk and atomically rename into place
    pub fn commit(mut self, dest: &Path) -> io::Result<Committed> {
        self.temp_file.flush()?;
        self.temp_file.sync_all()?;
        if let Some(temp_path) = self.temp_path.take() {
            if let Err(err) = fs::rename(&temp_path, dest) {
                self.temp_path = Some(temp_path);
                return Err(err);
            }
        }
        self.created_dirs.clear();
        let hasher = mem::take(&mut self.hasher);
        Ok(Committed {
            digest: format!("sha256:{:x}", hasher.finalize()),
            len: self.len,
        })
    }

    /// Delete the temporary file backing this writer
    pub fn discard(mut self) -> io::Result<()> {
        self.remove_temp()
    }

    fn remove_temp(&mut self) -> io::Result<()> {
        let removed = match self.temp_path.take() {
            Some(path) => fs::remove_file(path),
            None => Ok(()),
        };
        // Stops at the first directory somebody else is using
        for dir in self.created_dirs.drain(..) {
            if fs::remove_dir(&dir).is_err() {
                break;
            }
        }
        removed
    }
}

impl Write for StorageWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let actual_size = self.temp_file.write(buf)?;
        self.hasher.update(&buf[..actual_size]);
        self.len += actual_size as u64;
        Ok(actual_size)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp_file.flush()
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        if let Some(path) = self.temp_path.clone() {
            if let Err(err) = self.remove_temp() {
                log::warn!(
                    target: self.log_target.as_str(),
                    "error removing temp file at {:?}, {:?}",
                    path,
                    err
                );
            }
        }
    }
}

/// Hidden, uniquely named sibling of `dest`
fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(
        ".{}.{}-{:x}.tmp",
        name,
        std::process::id(),
        rand::random::<u64>()
    ))
}
