//! Image identifiers and identifier canonicalization


mod format;

pub use format::{FormatPolicy, ImageFormat};

use crate::errors::{ConfigError, ResolverError};
use percent_encoding::percent_decode;
use std::{fmt, hash::Hash, str};

/// Canonical image identifier
///
/// This is the decoded form of an identifier supplied by a caller. Every path
/// or URL a resolver builds, and every cache lookup it performs, uses this
/// form. A canonical identifier never contains a `%`, a NUL, or the
/// substituted characters of its [Codec], so canonicalizing it again yields
/// the same value.
///
/// Structural separators like `/` survive unchanged. Whether the identifier
/// stays inside a root directory is checked later, when it is joined to one.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Identifier {
    canonical: String,
}

impl Identifier {
    /// Returns a reference to the canonical string form
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Parse a raw identifier with the default [Codec]
    pub fn parse(raw: &str) -> Result<Self, ResolverError> {
        Codec::default().canonicalize(raw)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Rules for turning raw identifiers into [Identifier]s
///
/// Percent-decoding is always performed. A backend may additionally require
/// every `:` to be replaced before the identifier is used to build a path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Codec {
    colon_substitute: Option<String>,
}

impl Codec {
    pub fn new() -> Self {
        Codec::default()
    }

    /// Replace every `:` in decoded identifiers with `substitute`
    ///
    /// The substitute may not itself contain `:` or `%`, otherwise the
    /// result of canonicalization would not be stable.
    pub fn colon_substitute(mut self, substitute: &str) -> Result<Self, ConfigError> {
        if substitute.contains(':') || substitute.contains('%') || substitute.contains('\0') {
            return Err(ConfigError::InvalidSubstitute(substitute.to_owned()));
        }
        self.colon_substitute = Some(substitute.to_owned());
        Ok(self)
    }

    /// Decode and normalize a raw identifier
    pub fn canonicalize(&self, raw: &str) -> Result<Identifier, ResolverError> {
        let malformed = |reason| ResolverError::MalformedIdentifier {
            identifier: raw.to_owned(),
            reason,
        };

        check_percent_escapes(raw.as_bytes()).map_err(malformed)?;
        let bytes: Vec<u8> = percent_decode(raw.as_bytes()).collect();
        let decoded =
            str::from_utf8(&bytes).map_err(|_| malformed("decoded bytes are not utf-8"))?;
        if decoded.contains('\0') {
            return Err(malformed("decoded identifier contains a nul character"));
        }
        if decoded.contains('%') {
            return Err(malformed("identifier is percent-encoded more than once"));
        }

        let canonical = match &self.colon_substitute {
            Some(substitute) => decoded.replace(':', substitute),
            None => decoded.to_owned(),
        };
        Ok(Identifier { canonical })
    }
}

/// Every `%` must introduce exactly two hex digits
fn check_percent_escapes(raw: &[u8]) -> Result<(), &'static str> {
    let mut iter = raw.iter();
    while let Some(byte) = iter.next() {
        if *byte == b'%' {
            let hi = iter.next();
            let lo = iter.next();
            match (hi, lo) {
                (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => (),
                _ => return Err("truncated or non-hex percent escape"),
            }
        }
    }
    Ok(())
}
