use crate::{errors::ResolverError, ident::Identifier};
use regex::Regex;
use std::{fmt, str::FromStr};

/// Declared format of a source image
///
/// The format is taken on trust from the identifier; image content is never
/// inspected. Extensions outside the well-known set are kept as
/// [ImageFormat::Other], lowercased.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ImageFormat {
    Jpg,
    Tif,
    Jp2,
    Png,
    Gif,
    Other(String),
}

impl ImageFormat {
    /// Format for a file extension, without its leading dot
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" => ImageFormat::Jpg,
            "tif" => ImageFormat::Tif,
            "jp2" => ImageFormat::Jp2,
            "png" => ImageFormat::Png,
            "gif" => ImageFormat::Gif,
            _ => ImageFormat::Other(ext),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Tif => "tif",
            ImageFormat::Jp2 => "jp2",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Other(ext) => ext,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        extension_of(s).map(ImageFormat::from_extension).ok_or(())
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How one backend derives an [ImageFormat] from an [Identifier]
///
/// The extension after the last `.` of the final path segment wins. Without
/// one, the backend's declared default is used; repository backends declare
/// [ImageFormat::Jp2] while plain filesystem backends declare nothing, in
/// which case inference fails.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormatPolicy {
    default: Option<ImageFormat>,
}

impl FormatPolicy {
    /// Policy without a default; identifiers must carry an extension
    pub fn extension_only() -> Self {
        FormatPolicy { default: None }
    }

    /// Policy falling back to `default` when there is no extension
    pub fn with_default(default: ImageFormat) -> Self {
        FormatPolicy {
            default: Some(default),
        }
    }

    /// Convention of content repositories, which serve jp2 access masters
    pub fn repository() -> Self {
        FormatPolicy::with_default(ImageFormat::Jp2)
    }

    pub fn default_format(&self) -> Option<&ImageFormat> {
        self.default.as_ref()
    }

    pub fn infer(&self, ident: &Identifier) -> Result<ImageFormat, ResolverError> {
        let last_segment = ident.as_str().rsplit('/').next().unwrap_or("");
        let suffix = match last_segment.rfind('.') {
            Some(dot) => extension_of(&last_segment[dot + 1..]),
            None => None,
        };
        match (suffix, &self.default) {
            (Some(ext), _) => Ok(ImageFormat::from_extension(ext)),
            (None, Some(default)) => Ok(default.clone()),
            (None, None) => Err(ResolverError::UnknownFormat(ident.to_string())),
        }
    }
}

/// Returns the input if it looks like a file extension
fn extension_of(s: &str) -> Option<&str> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^[a-zA-Z0-9]+$").unwrap();
    }
    if RE.is_match(s) {
        Some(s)
    } else {
        None
    }
}
