use crate::{errors::ResolverError, ident::Identifier};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

/// A root directory which joined identifiers may never leave
///
/// [ConfinedRoot::join()] is purely lexical and happens before any I/O: an
/// identifier with `..` segments, an absolute path, or nothing but separators
/// is rejected outright. Symbolic links can only be judged against the real
/// filesystem, so [ConfinedRoot::is_file()] repeats the check on resolved
/// paths before reporting an existing file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfinedRoot {
    path: PathBuf,
}

impl ConfinedRoot {
    pub fn new(path: PathBuf) -> Self {
        ConfinedRoot { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Join an identifier to this root, refusing anything that escapes it
    pub fn join(&self, ident: &Identifier) -> Result<PathBuf, ResolverError> {
        let mut joined = self.path.clone();
        let mut segments = 0;
        for component in Path::new(ident.as_str()).components() {
            match component {
                Component::Normal(segment) => {
                    joined.push(segment);
                    segments += 1;
                }
                Component::CurDir => (),
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(self.escape(ident))
                }
            }
        }
        if segments == 0 || !joined.starts_with(&self.path) {
            return Err(self.escape(ident));
        }
        Ok(joined)
    }

    /// Check for a regular file at a path produced by [ConfinedRoot::join()]
    ///
    /// Returns an error if the file exists but is reached through a symbolic
    /// link that points outside of the root.
    pub fn is_file(&self, ident: &Identifier, path: &Path) -> Result<bool, ResolverError> {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => (),
            Ok(_) => return Ok(false),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(ResolverError::Storage {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
        let storage_err = |source| ResolverError::Storage {
            path: path.to_path_buf(),
            source,
        };
        let real_root = fs::canonicalize(&self.path).map_err(storage_err)?;
        let real_path = fs::canonicalize(path).map_err(storage_err)?;
        if real_path.starts_with(&real_root) {
            Ok(true)
        } else {
            Err(self.escape(ident))
        }
    }

    fn escape(&self, ident: &Identifier) -> ResolverError {
        ResolverError::InvalidIdentifier {
            identifier: ident.to_string(),
            root: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn join(raw: &str) -> Result<PathBuf, ResolverError> {
        ConfinedRoot::new(PathBuf::from("/cache")).join(&Identifier::parse(raw).unwrap())
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("foo/bar.tif").unwrap(), Path::new("/cache/foo/bar.tif"));
        assert_eq!(join("foo%2Fbar.tif").unwrap(), Path::new("/cache/foo/bar.tif"));
        assert_eq!(join("./foo//bar.tif").unwrap(), Path::new("/cache/foo/bar.tif"));
        assert_eq!(join("foo/").unwrap(), Path::new("/cache/foo"));
        assert_eq!(join("..foo").unwrap(), Path::new("/cache/..foo"));
        assert_eq!(join("foo..").unwrap(), Path::new("/cache/foo.."));
    }

    #[test]
    fn reject_escapes() {
        for raw in &[
            "../etc/passwd",
            "..%2Fetc%2Fpasswd",
            "foo/../../etc/passwd",
            "foo/..",
            "/etc/passwd",
            "%2Fetc%2Fpasswd",
            "",
            "/",
            ".",
            "./.",
        ] {
            match join(raw) {
                Err(ResolverError::InvalidIdentifier { root, .. }) => {
                    assert_eq!(root, Path::new("/cache"))
                }
                other => panic!("{:?} joined as {:?}", raw, other),
            }
        }
    }

    #[test]
    fn reject_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.jpg"), b"secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        std::fs::write(root.path().join("inside.jpg"), b"fine").unwrap();

        let confined = ConfinedRoot::new(root.path().to_path_buf());
        let inside = Identifier::parse("inside.jpg").unwrap();
        let path = confined.join(&inside).unwrap();
        assert!(confined.is_file(&inside, &path).unwrap());

        let missing = Identifier::parse("missing.jpg").unwrap();
        let path = confined.join(&missing).unwrap();
        assert!(!confined.is_file(&missing, &path).unwrap());

        let escaping = Identifier::parse("link/secret.jpg").unwrap();
        let path = confined.join(&escaping).unwrap();
        assert!(matches!(
            confined.is_file(&escaping, &path),
            Err(ResolverError::InvalidIdentifier { .. })
        ));
    }
}
