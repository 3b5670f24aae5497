//! Locating and retrieving source images from their origin

mod file;
mod http;
mod locator;

pub use self::http::HttpFetcher;
pub use file::FileFetcher;
pub use locator::{SourceLocator, SourceTemplate, REPOSITORY_TEMPLATE};

use crate::errors::FetchError;
use std::{fmt, io::Write, path::PathBuf, time::Duration};
use url::Url;

/// Where a source image can be retrieved from
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Origin {
    Path(PathBuf),
    Url(Url),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Path(path) => write!(f, "{}", path.display()),
            Origin::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Strategy for copying a source image's bytes out of its origin
///
/// Implementations must give up once their configured timeout has passed,
/// reporting [FetchError::Timeout], and should report a missing origin as
/// [FetchError::NotFound]. Anything already written to `dest` is discarded
/// by the caller whenever an error is returned.
pub trait Fetcher: Send + Sync + fmt::Debug {
    /// Write the complete contents of `origin` to `dest`, returning its length
    fn fetch(&self, origin: &Origin, dest: &mut dyn Write) -> Result<u64, FetchError>;
}

/// The default [Fetcher], picking local copy or network retrieval per origin
#[derive(Clone, Debug)]
pub struct SourceFetcher {
    file: FileFetcher,
    http: Option<HttpFetcher>,
}

impl SourceFetcher {
    /// Fetcher for local origins only
    pub fn local(timeout: Duration) -> Self {
        SourceFetcher {
            file: FileFetcher::new(timeout),
            http: None,
        }
    }

    /// Fetcher for both local and network origins
    pub fn with_http(timeout: Duration, http: HttpFetcher) -> Self {
        SourceFetcher {
            file: FileFetcher::new(timeout),
            http: Some(http),
        }
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, origin: &Origin, dest: &mut dyn Write) -> Result<u64, FetchError> {
        match (origin, &self.http) {
            (Origin::Path(_), _) => self.file.fetch(origin, dest),
            (Origin::Url(_), Some(http)) => http.fetch(origin, dest),
            (Origin::Url(_), None) => Err(FetchError::UnsupportedOrigin(origin.to_string())),
        }
    }
}
