use crate::{
    errors::{ConfigError, ResolverError},
    ident::{FormatPolicy, Identifier},
    source::Origin,
    storage::ConfinedRoot,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use std::{fmt, fs, io, path::PathBuf};
use url::Url;

/// Template used by content repositories which serve an access master
/// datastream for each object
pub const REPOSITORY_TEMPLATE: &str = "{source_root}{ident}/datastreams/accessMaster/content";

/// Characters escaped when an identifier is placed into a URL
///
/// Path separators and colons are left alone since repository object IDs
/// depend on them.
const URL_IDENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Computes where the source image for an identifier comes from
#[derive(Clone, Debug)]
pub enum SourceLocator {
    /// Source tree mirrors the identifier layout, typically a network mount
    Join(ConfinedRoot),
    /// Repository path or URL expanded from a template
    Template(SourceTemplate),
}

impl SourceLocator {
    /// Locate sources by joining identifiers onto a root directory
    pub fn join(source_root: PathBuf) -> Self {
        SourceLocator::Join(ConfinedRoot::new(source_root))
    }

    /// Locate sources with a template, see [SourceTemplate::new()]
    pub fn template(source_root: &str, template: &str) -> Result<Self, ConfigError> {
        Ok(SourceLocator::Template(SourceTemplate::new(
            source_root,
            template,
        )?))
    }

    /// Locate sources in a content repository using [REPOSITORY_TEMPLATE]
    pub fn repository(source_root: &str) -> Result<Self, ConfigError> {
        SourceLocator::template(source_root, REPOSITORY_TEMPLATE)
    }

    /// Format convention of the backend this locator talks to
    pub fn format_policy(&self) -> FormatPolicy {
        match self {
            SourceLocator::Join(_) => FormatPolicy::extension_only(),
            SourceLocator::Template(_) => FormatPolicy::repository(),
        }
    }

    pub fn locate(&self, ident: &Identifier) -> Result<Origin, ResolverError> {
        match self {
            SourceLocator::Join(root) => Ok(Origin::Path(root.join(ident)?)),
            SourceLocator::Template(template) => template.expand(ident),
        }
    }

    /// Check whether a located origin exists, if that can be done cheaply
    ///
    /// Filesystem origins are checked, with the same symbolic link rules as
    /// the cache when joined onto a root. Network origins return `None`.
    pub fn probe(
        &self,
        ident: &Identifier,
        origin: &Origin,
    ) -> Result<Option<bool>, ResolverError> {
        match (self, origin) {
            (_, Origin::Url(_)) => Ok(None),
            (SourceLocator::Join(root), Origin::Path(path)) => {
                root.is_file(ident, path).map(Some)
            }
            (SourceLocator::Template(_), Origin::Path(path)) => match fs::metadata(path) {
                Ok(metadata) => Ok(Some(metadata.is_file())),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Some(false)),
                Err(source) => Err(ResolverError::Storage {
                    path: path.clone(),
                    source,
                }),
            },
        }
    }

    /// True when origins are fetched over the network
    pub fn is_remote(&self) -> bool {
        match self {
            SourceLocator::Join(_) => false,
            SourceLocator::Template(template) => template.is_remote(),
        }
    }
}

/// Template for a source location
///
/// Two placeholders are recognized: `{source_root}` and `{ident}`, the
/// latter being mandatory. When the expanded template is an `http` or
/// `https` URL, the identifier is percent-encoded where URL syntax requires
/// it. Otherwise the expansion must be an absolute filesystem path.
#[derive(Clone)]
pub struct SourceTemplate {
    expanded_root: String,
    root: ConfinedRoot,
    remote: bool,
}

impl SourceTemplate {
    pub fn new(source_root: &str, template: &str) -> Result<Self, ConfigError> {
        lazy_static! {
            static ref PLACEHOLDER: Regex = Regex::new(r"\{[^{}]*\}").unwrap();
        }
        let invalid = |reason| ConfigError::InvalidTemplate {
            template: template.to_owned(),
            reason,
        };

        for placeholder in PLACEHOLDER.find_iter(template) {
            match placeholder.as_str() {
                "{source_root}" | "{ident}" => (),
                _ => return Err(invalid("unknown placeholder")),
            }
        }
        if !template.contains("{ident}") {
            return Err(invalid("missing {ident} placeholder"));
        }

        let expanded_root = template.replace("{source_root}", source_root);
        let remote = looks_remote(&expanded_root);
        if remote {
            Url::parse(&expanded_root.replace("{ident}", "x"))
                .map_err(|_| invalid("expansion is not a valid url"))?;
        } else if !expanded_root.starts_with('/') {
            return Err(invalid("expansion is neither a url nor an absolute path"));
        }

        Ok(SourceTemplate {
            expanded_root,
            root: ConfinedRoot::new(PathBuf::from(source_root)),
            remote,
        })
    }

    /// True when expansions are fetched over the network
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn expand(&self, ident: &Identifier) -> Result<Origin, ResolverError> {
        // Only the lexical check; the joined path itself is not used.
        self.root.join(ident)?;

        if self.remote {
            let encoded = utf8_percent_encode(ident.as_str(), URL_IDENT).to_string();
            let expanded = self.expanded_root.replace("{ident}", &encoded);
            match Url::parse(&expanded) {
                Ok(url) => Ok(Origin::Url(url)),
                Err(_) => Err(ResolverError::InvalidIdentifier {
                    identifier: ident.to_string(),
                    root: self.root.path().to_path_buf(),
                }),
            }
        } else {
            let expanded = self.expanded_root.replace("{ident}", ident.as_str());
            Ok(Origin::Path(PathBuf::from(expanded)))
        }
    }
}

impl fmt::Debug for SourceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceTemplate({:?})", self.expanded_root)
    }
}

fn looks_remote(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    fn locate(locator: &SourceLocator, raw: &str) -> Result<Origin, ResolverError> {
        locator.locate(&Identifier::parse(raw).unwrap())
    }

    #[test]
    fn join_locator() {
        let locator = SourceLocator::join(PathBuf::from("/origin"));
        assert_eq!(
            locate(&locator, "foo%2Fbar.tif").unwrap(),
            Origin::Path(PathBuf::from("/origin/foo/bar.tif"))
        );
        assert!(matches!(
            locate(&locator, "../bar.tif"),
            Err(ResolverError::InvalidIdentifier { .. })
        ));
        assert_eq!(locator.format_policy(), FormatPolicy::extension_only());
    }

    #[test]
    fn repository_urls() {
        let locator =
            SourceLocator::repository("http://fedora.example.org/fedora/objects/").unwrap();
        assert_eq!(
            locate(&locator, "bpl-dev:k930cv929").unwrap().to_string(),
            "http://fedora.example.org/fedora/objects/bpl-dev:k930cv929/datastreams/accessMaster/content"
        );
        assert_eq!(
            locate(&locator, "with%20space%3Fquery").unwrap().to_string(),
            "http://fedora.example.org/fedora/objects/with%20space%3Fquery/datastreams/accessMaster/content"
        );
        assert!(matches!(
            locate(&locator, "..%2F..%2Fadmin"),
            Err(ResolverError::InvalidIdentifier { .. })
        ));
        assert_eq!(locator.format_policy(), FormatPolicy::repository());
    }

    #[test]
    fn repository_paths() {
        let locator = SourceLocator::repository("/mnt/repo/").unwrap();
        match locate(&locator, "obj:1").unwrap() {
            Origin::Path(path) => assert_eq!(
                path,
                Path::new("/mnt/repo/obj:1/datastreams/accessMaster/content")
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn custom_templates() {
        let locator =
            SourceLocator::template("https://iiif.example.org", "{source_root}/src/{ident}?raw=1")
                .unwrap();
        assert_eq!(
            locate(&locator, "a/b.jp2").unwrap().to_string(),
            "https://iiif.example.org/src/a/b.jp2?raw=1"
        );
        match &locator {
            SourceLocator::Template(template) => assert!(template.is_remote()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_templates() {
        for (root, template) in &[
            ("/origin", "{source_root}/no-ident"),
            ("/origin", "{source_root}/{ident}/{version}"),
            ("origin", "{source_root}/{ident}"),
            ("http://[bad/", "{source_root}{ident}"),
        ] {
            assert!(
                matches!(
                    SourceTemplate::new(root, template),
                    Err(ConfigError::InvalidTemplate { .. })
                ),
                "{} {}",
                root,
                template
            );
        }
    }
}
