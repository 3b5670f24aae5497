use crate::{
    errors::{ConfigError, FetchError, ResolverError},
    ident::{Codec, FormatPolicy, Identifier},
    resolver::{ResolvedLocation, Resolver, DEFAULT_LOG_TARGET},
    source::{Fetcher, HttpFetcher, Origin, SourceFetcher, SourceLocator},
    storage::{CacheStorage, KeyedLocks},
};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// Builder for configuring [CachingResolver] instances
pub struct CachingResolverBuilder {
    cache_root: PathBuf,
    locator: SourceLocator,
    fetcher: Option<Arc<dyn Fetcher>>,
    codec: Codec,
    formats: Option<FormatPolicy>,
    fetch_timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    log_target: String,
}

impl CachingResolverBuilder {
    /// Start constructing a resolver caching into `cache_root`
    pub fn new(cache_root: PathBuf, locator: SourceLocator) -> Self {
        CachingResolverBuilder {
            cache_root,
            locator,
            fetcher: None,
            codec: Codec::default(),
            formats: None,
            fetch_timeout: CachingResolver::default_fetch_timeout(),
            connect_timeout: CachingResolver::default_connect_timeout(),
            user_agent: HttpFetcher::default_user_agent().to_owned(),
            log_target: DEFAULT_LOG_TARGET.to_owned(),
        }
    }

    /// Use a custom [Fetcher] instead of the default [SourceFetcher]
    ///
    /// Timeout and user agent settings on this builder only configure the
    /// default fetcher; a custom one enforces its own.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Change how raw identifiers are decoded
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Change how formats are inferred
    ///
    /// By default this follows the locator: repository templates default to
    /// jp2, joined roots require an extension.
    pub fn format_policy(mut self, formats: FormatPolicy) -> Self {
        self.formats = Some(formats);
        self
    }

    /// Limit how long retrieving one source image may take
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Limit the connect phase of each network request
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header used for network retrieval
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_owned();
        self
    }

    /// Emit all log messages from this resolver under another target
    pub fn log_target(mut self, target: &str) -> Self {
        self.log_target = target.to_owned();
        self
    }

    /// Construct a CachingResolver using the parameters from this Builder
    pub fn build(self) -> Result<CachingResolver, ConfigError> {
        if !self.cache_root.is_absolute() {
            return Err(ConfigError::NotAbsolute {
                key: "cache_root",
                value: self.cache_root.display().to_string(),
            });
        }
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None if self.locator.is_remote() => Arc::new(SourceFetcher::with_http(
                self.fetch_timeout,
                HttpFetcher::new(self.fetch_timeout, self.connect_timeout, &self.user_agent)?,
            )),
            None => Arc::new(SourceFetcher::local(self.fetch_timeout)),
        };
        let formats = match self.formats {
            Some(formats) => formats,
            None => self.locator.format_policy(),
        };
        log::debug!(
            target: self.log_target.as_str(),
            "using cache directory {:?}",
            self.cache_root
        );
        Ok(CachingResolver {
            storage: CacheStorage::new(self.cache_root).log_target(&self.log_target),
            formats,
            locator: self.locator,
            fetcher,
            codec: self.codec,
            locks: KeyedLocks::new(),
            log_target: self.log_target,
        })
    }
}

/// Serves source images from a local cache, populating it on demand
///
/// The first request for an identifier copies its source image from the
/// origin into the cache; later requests use the local copy and never touch
/// the origin again. Cache entries appear atomically, fully written, and at
/// most one thread per identifier retrieves a given source at a time.
pub struct CachingResolver {
    storage: CacheStorage,
    locator: SourceLocator,
    fetcher: Arc<dyn Fetcher>,
    codec: Codec,
    formats: FormatPolicy,
    locks: KeyedLocks<Identifier>,
    log_target: String,
}

impl CachingResolver {
    /// Construct a resolver with custom options, via CachingResolverBuilder
    pub fn builder(cache_root: PathBuf, locator: SourceLocator) -> CachingResolverBuilder {
        CachingResolverBuilder::new(cache_root, locator)
    }

    pub fn default_fetch_timeout() -> Duration {
        Duration::from_secs(300)
    }

    pub fn default_connect_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn cache_root(&self) -> &Path {
        self.storage.root()
    }

    fn target(&self) -> &str {
        &self.log_target
    }

    /// Copy the source for `ident` into the cache entry at `dest`
    ///
    /// Must be called with the identifier's lock held.
    fn populate(&self, ident: &Identifier, dest: &Path) -> Result<(), ResolverError> {
        let origin = self.locator.locate(ident)?;
        log::debug!(target: self.target(), "fetching src image from {}", origin);

        if let Some(false) = self.locator.probe(ident, &origin)? {
            return Err(self.fetch_failed(ident, &origin, FetchError::NotFound));
        }

        let mut writer = self.storage.begin_write(dest)?;
        match self.fetcher.fetch(&origin, &mut writer) {
            Ok(_) => {
                let committed = self.storage.commit_write(writer, dest)?;
                log::info!(
                    target: self.target(),
                    "copied {} to {:?}, {} bytes, {}",
                    origin,
                    dest,
                    committed.len,
                    committed.digest
                );
                Ok(())
            }
            Err(err) => {
                if let Err(discard_err) = writer.discard() {
                    log::warn!(
                        target: self.target(),
                        "error discarding partial copy of {}, {:?}",
                        origin,
                        discard_err
                    );
                }
                Err(self.fetch_failed(ident, &origin, err))
            }
        }
    }

    fn fetch_failed(&self, ident: &Identifier, origin: &Origin, err: FetchError) -> ResolverError {
        let identifier = ident.to_string();
        let location = origin.to_string();
        let err = match err {
            FetchError::NotFound => ResolverError::NotFound {
                identifier,
                location,
            },
            FetchError::Timeout(timeout) => ResolverError::FetchTimeout {
                identifier,
                location,
                timeout,
            },
            source => ResolverError::Fetch {
                identifier,
                location,
                source,
            },
        };
        log::warn!(target: self.target(), "{}", err);
        err
    }
}

impl Resolver for CachingResolver {
    fn is_resolvable(&self, raw: &str) -> bool {
        let found = self.codec.canonicalize(raw).and_then(|ident| {
            let path = self.storage.entry_path(&ident)?;
            self.storage.contains(&ident, &path)
        });
        match found {
            Ok(found) => found,
            Err(err) => {
                log::debug!(target: self.target(), "not resolvable, {}", err);
                false
            }
        }
    }

    fn resolve(&self, raw: &str) -> Result<ResolvedLocation, ResolverError> {
        let ident = self.codec.canonicalize(raw)?;
        let path = self.storage.entry_path(&ident)?;
        let format = self.formats.infer(&ident)?;

        if self.storage.contains(&ident, &path)? {
            log::debug!(target: self.target(), "src image from local disk: {:?}", path);
            return Ok(ResolvedLocation::new(path, format));
        }

        self.locks.with_lock(&ident, || -> Result<_, ResolverError> {
            if self.storage.contains(&ident, &path)? {
                log::debug!(
                    target: self.target(),
                    "src image cached by another request: {:?}",
                    path
                );
            } else {
                self.populate(&ident, &path)?;
            }
            log::debug!(target: self.target(), "src format {}", format);
            Ok(ResolvedLocation::new(path.clone(), format.clone()))
        })
    }
}

impl fmt::Debug for CachingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingResolver")
            .field("cache_root", &self.storage.root())
            .field("locator", &self.locator)
            .field("fetcher", &self.fetcher)
            .field("formats", &self.formats)
            .finish()
    }
}
