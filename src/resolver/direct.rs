use crate::{
    errors::{ConfigError, ResolverError},
    ident::{Codec, FormatPolicy, Identifier},
    resolver::{ResolvedLocation, Resolver, DEFAULT_LOG_TARGET},
    storage::ConfinedRoot,
};
use std::path::PathBuf;

/// Serves source images in place from a single root directory
///
/// Identifiers map one to one onto paths below the root. Nothing is ever
/// written, so any number of concurrent calls is fine. Unless configured
/// otherwise, identifiers must carry a file extension naming their format.
#[derive(Clone, Debug)]
pub struct DirectResolver {
    root: ConfinedRoot,
    codec: Codec,
    formats: FormatPolicy,
    log_target: String,
}

impl DirectResolver {
    pub fn new(source_root: PathBuf) -> Result<Self, ConfigError> {
        if !source_root.is_absolute() {
            return Err(ConfigError::NotAbsolute {
                key: "source_root",
                value: source_root.display().to_string(),
            });
        }
        Ok(DirectResolver {
            root: ConfinedRoot::new(source_root),
            codec: Codec::default(),
            formats: FormatPolicy::extension_only(),
            log_target: DEFAULT_LOG_TARGET.to_owned(),
        })
    }

    /// Change how raw identifiers are decoded
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Change how formats are inferred
    pub fn format_policy(mut self, formats: FormatPolicy) -> Self {
        self.formats = formats;
        self
    }

    /// Emit all log messages from this resolver under another target
    pub fn log_target(mut self, target: &str) -> Self {
        self.log_target = target.to_owned();
        self
    }

    fn locate(&self, raw: &str) -> Result<(Identifier, PathBuf), ResolverError> {
        let ident = self.codec.canonicalize(raw)?;
        let path = self.root.join(&ident)?;
        Ok((ident, path))
    }
}

impl Resolver for DirectResolver {
    fn is_resolvable(&self, raw: &str) -> bool {
        match self
            .locate(raw)
            .and_then(|(ident, path)| self.root.is_file(&ident, &path))
        {
            Ok(found) => found,
            Err(err) => {
                log::debug!(target: self.log_target.as_str(), "not resolvable, {}", err);
                false
            }
        }
    }

    fn resolve(&self, raw: &str) -> Result<ResolvedLocation, ResolverError> {
        let (ident, path) = self.locate(raw)?;
        log::debug!(target: self.log_target.as_str(), "src image: {:?}", path);

        if !self.root.is_file(&ident, &path)? {
            let err = ResolverError::NotFound {
                identifier: ident.to_string(),
                location: path.display().to_string(),
            };
            log::warn!(target: self.log_target.as_str(), "{}", err);
            return Err(err);
        }

        let format = self.formats.infer(&ident)?;
        log::debug!(target: self.log_target.as_str(), "src format {}", format);
        Ok(ResolvedLocation::new(path, format))
    }
}
