use crate::{
    errors::FetchError,
    source::{Fetcher, Origin},
};
use http::StatusCode;
use reqwest::blocking::Client;
use std::{
    error::Error as _,
    fmt, io,
    io::Write,
    time::{Duration, Instant},
};

/// Retrieves source images over HTTP from a content repository
///
/// Uses a blocking client; when embedded in an async runtime, calls must be
/// made from a blocking-safe context such as
/// [crate::resolver::resolve_async()].
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Return the default `User-Agent` that we use if no other is set
    pub fn default_user_agent() -> &'static str {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
    }

    /// Build a fetcher with its own connection pool
    ///
    /// `timeout` applies from the beginning of each request until its last
    /// byte has been received, `connect_timeout` to the connect phase only.
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(HttpFetcher { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, origin: &Origin, dest: &mut dyn Write) -> Result<u64, FetchError> {
        let url = match origin {
            Origin::Url(url) => url.clone(),
            Origin::Path(_) => return Err(FetchError::UnsupportedOrigin(origin.to_string())),
        };
        let started = Instant::now();
        let mut response = self.client.get(url).send().map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        match io::copy(&mut response, dest) {
            Ok(len) => Ok(len),
            Err(err) if is_body_timeout(&err) || started.elapsed() >= self.timeout => {
                Err(FetchError::Timeout(self.timeout))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Body reads report timeouts as an io error wrapping the client's error
fn is_body_timeout(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::TimedOut {
        return true;
    }
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .map_or(false, |inner| {
            inner.is_timeout()
                || inner
                    .source()
                    .and_then(|source| source.downcast_ref::<io::Error>())
                    .map_or(false, |source| source.kind() == io::ErrorKind::TimedOut)
        })
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.timeout)
            .finish()
    }
}
