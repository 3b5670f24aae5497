//! Confined roots and the local source image cache

mod guard;
mod lock;
mod writer;

pub use guard::ConfinedRoot;
pub use lock::KeyedLocks;
pub use writer::{Committed, StorageWriter};

use crate::{errors::ResolverError, ident::Identifier, resolver::DEFAULT_LOG_TARGET};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// On-disk cache of source images, laid out by canonical identifier
///
/// An entry for identifier `foo/bar.tif` lives at `<root>/foo/bar.tif`. That
/// layout is the only contract with other components, which read returned
/// paths directly. Entries are read-only once visible and are never removed
/// here; eviction is somebody else's job.
#[derive(Clone, Debug)]
pub struct CacheStorage {
    root: ConfinedRoot,
    log_target: String,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Self {
        CacheStorage {
            root: ConfinedRoot::new(root),
            log_target: DEFAULT_LOG_TARGET.to_owned(),
        }
    }

    /// Emit log messages, including those of writers, under another target
    pub fn log_target(mut self, target: &str) -> Self {
        self.log_target = target.to_owned();
        self
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Location of the entry for an identifier, whether or not it exists yet
    pub fn entry_path(&self, ident: &Identifier) -> Result<PathBuf, ResolverError> {
        self.root.join(ident)
    }

    /// Is there a complete entry at `path`?
    pub fn contains(&self, ident: &Identifier, path: &Path) -> Result<bool, ResolverError> {
        self.root.is_file(ident, path)
    }

    /// Begin writing a new entry which will eventually live at `dest`
    ///
    /// Directories created here are removed again if the writer is dropped
    /// or discarded without committing, as long as they are empty.
    pub fn begin_write(&self, dest: &Path) -> Result<StorageWriter, ResolverError> {
        let mut attempts = 0;
        loop {
            let created = self.create_parent_dirs(dest)?;
            match StorageWriter::create(dest) {
                Ok(writer) => {
                    return Ok(writer
                        .remove_on_discard(created)
                        .log_target(&self.log_target))
                }
                // An abandoned write for a sibling entry removed the parent
                Err(err) if err.kind() == io::ErrorKind::NotFound && attempts < 3 => {
                    attempts += 1;
                }
                Err(source) => {
                    return Err(ResolverError::Storage {
                        path: dest.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    /// Promote a finished temporary file into the entry at `dest`
    pub fn commit_write(
        &self,
        writer: StorageWriter,
        dest: &Path,
    ) -> Result<Committed, ResolverError> {
        let committed = writer
            .commit(dest)
            .map_err(|source| ResolverError::Storage {
                path: dest.to_path_buf(),
                source,
            })?;
        log::debug!(
            target: self.log_target.as_str(),
            "storage commit, {} -> {:?}",
            committed.digest,
            dest
        );
        Ok(committed)
    }

    /// Create the parents of `path`, returning those below the root which
    /// did not exist yet, deepest first
    fn create_parent_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, ResolverError> {
        let parent = match path.parent() {
            Some(parent) => parent,
            None => return Ok(Vec::new()),
        };
        let root = self.root();
        let missing: Vec<PathBuf> = parent
            .ancestors()
            .take_while(|dir| *dir != root && dir.starts_with(root) && !dir.exists())
            .map(Path::to_path_buf)
            .collect();
        match fs::create_dir_all(parent) {
            Ok(()) => Ok(missing),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => {
                Ok(missing)
            }
            Err(source) => Err(ResolverError::Storage {
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}
