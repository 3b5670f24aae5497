//! Resolvers map image identifiers to local source files
//!
//! Two variants are provided. A [DirectResolver] serves files in place from
//! a single root. A [CachingResolver] serves files from a local cache and
//! fills that cache on demand from a mounted filesystem or a content
//! repository, as decided by its [crate::source::SourceLocator] and
//! [crate::source::Fetcher].

mod caching;
mod direct;

pub use caching::{CachingResolver, CachingResolverBuilder};
pub use direct::DirectResolver;

use crate::{errors::ResolverError, ident::ImageFormat};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Log target used by resolvers that weren't given their own
pub const DEFAULT_LOG_TARGET: &str = "imgsrc::resolver";

/// A source image ready for decoding
///
/// Only the fact that a regular file exists at [ResolvedLocation::path()] is
/// promised; the layout of the directories above it is not.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedLocation {
    path: PathBuf,
    format: ImageFormat,
}

impl ResolvedLocation {
    pub fn new(path: PathBuf, format: ImageFormat) -> Self {
        ResolvedLocation { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    pub fn into_parts(self) -> (PathBuf, ImageFormat) {
        (self.path, self.format)
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.path.display(), self.format)
    }
}

/// Maps raw, caller-supplied identifiers to source images
///
/// All methods block on filesystem or network I/O. Implementations are safe
/// to call from any number of threads at once.
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Cheaply check whether an identifier can be served right now
    ///
    /// This never fails; any problem with the identifier is reported as
    /// `false`. Caching resolvers look only at their cache and never probe
    /// the origin.
    fn is_resolvable(&self, ident: &str) -> bool;

    /// Find the local file and declared format for an identifier
    fn resolve(&self, ident: &str) -> Result<ResolvedLocation, ResolverError>;
}

/// Run [Resolver::resolve()] on the async runtime's blocking thread pool
pub async fn resolve_async(
    resolver: Arc<dyn Resolver>,
    ident: String,
) -> Result<ResolvedLocation, ResolverError> {
    tokio::task::spawn_blocking(move || resolver.resolve(&ident)).await?
}

/// Run [Resolver::is_resolvable()] on the async runtime's blocking thread pool
pub async fn is_resolvable_async(
    resolver: Arc<dyn Resolver>,
    ident: String,
) -> Result<bool, ResolverError> {
    Ok(tokio::task::spawn_blocking(move || resolver.is_resolvable(&ident)).await?)
}
