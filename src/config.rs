//! Resolver configuration, validated once at startup

use crate::{
    errors::ConfigError,
    ident::{Codec, FormatPolicy, ImageFormat},
    resolver::{CachingResolver, DirectResolver, Resolver},
    source::{SourceLocator, REPOSITORY_TEMPLATE},
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

/// Which [Resolver] variant a configuration builds
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolverKind {
    /// [DirectResolver] over `source_root`
    Direct,
    /// [CachingResolver] copying from a mounted `source_root`, or from
    /// `source_template` when one is set
    Caching,
    /// [CachingResolver] retrieving access masters from a content
    /// repository at `source_root`
    Repository,
}

impl FromStr for ResolverKind {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ResolverKind::Direct),
            "caching" => Ok(ResolverKind::Caching),
            "repository" => Ok(ResolverKind::Repository),
            _ => Err(ConfigError::UnknownResolver(s.to_owned())),
        }
    }
}

/// Settings for one resolver
///
/// Usually loaded from JSON or built from a string map. Nothing is checked
/// until [ResolverConfig::build()], which reports every problem as a
/// [ConfigError] so that a bad configuration fails at startup rather than
/// on some later request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// `direct`, `caching`, or `repository`; inferred when absent
    pub resolver: Option<String>,
    /// Root directory (or repository base URL) holding source images
    #[serde(alias = "src_img_root")]
    pub source_root: Option<String>,
    /// Local directory source images are cached in
    pub cache_root: Option<String>,
    /// Origin template with `{source_root}` and `{ident}` placeholders
    pub source_template: Option<String>,
    /// Format for identifiers without an extension
    pub default_format: Option<String>,
    /// Replacement for `:` in identifiers
    pub colon_substitute: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub log_target: Option<String>,
}

impl ResolverConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        ResolverConfig::from_json_str(&fs::read_to_string(path)?)
    }

    /// Build a configuration from a map of string keys and values
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = ResolverConfig::default();
        for (key, value) in map {
            let value = value.clone();
            match key.as_str() {
                "resolver" => config.resolver = Some(value),
                "source_root" | "src_img_root" => config.source_root = Some(value),
                "cache_root" => config.cache_root = Some(value),
                "source_template" => config.source_template = Some(value),
                "default_format" => config.default_format = Some(value),
                "colon_substitute" => config.colon_substitute = Some(value),
                "fetch_timeout_secs" => {
                    config.fetch_timeout_secs = Some(parse_secs("fetch_timeout_secs", value)?)
                }
                "connect_timeout_secs" => {
                    config.connect_timeout_secs = Some(parse_secs("connect_timeout_secs", value)?)
                }
                "user_agent" => config.user_agent = Some(value),
                "log_target" => config.log_target = Some(value),
                _ => return Err(ConfigError::UnknownKey(key.clone())),
            }
        }
        Ok(config)
    }

    /// The variant this configuration builds
    pub fn kind(&self) -> Result<ResolverKind, ConfigError> {
        match &self.resolver {
            Some(kind) => kind.parse(),
            None if self.cache_root.is_some() => Ok(ResolverKind::Caching),
            None => Ok(ResolverKind::Direct),
        }
    }

    /// Validate this configuration and construct its resolver
    pub fn build(&self) -> Result<Arc<dyn Resolver>, ConfigError> {
        Ok(match self.kind()? {
            ResolverKind::Direct => Arc::new(self.build_direct()?),
            ResolverKind::Caching | ResolverKind::Repository => Arc::new(self.build_caching()?),
        })
    }

    /// Validate this configuration and construct a [DirectResolver]
    pub fn build_direct(&self) -> Result<DirectResolver, ConfigError> {
        let source_root = absolute_path("source_root", &self.source_root)?;
        let mut resolver = DirectResolver::new(source_root)?.codec(self.codec()?);
        if let Some(formats) = self.format_policy()? {
            resolver = resolver.format_policy(formats);
        }
        if let Some(target) = &self.log_target {
            resolver = resolver.log_target(target);
        }
        Ok(resolver)
    }

    /// Validate this configuration and construct a [CachingResolver]
    pub fn build_caching(&self) -> Result<CachingResolver, ConfigError> {
        let cache_root = absolute_path("cache_root", &self.cache_root)?;
        let source_root = self
            .source_root
            .as_deref()
            .ok_or(ConfigError::MissingKey("source_root"))?;

        let locator = match (self.kind()?, &self.source_template) {
            (_, Some(template)) => SourceLocator::template(source_root, template)?,
            (ResolverKind::Repository, None) => {
                SourceLocator::template(source_root, REPOSITORY_TEMPLATE)?
            }
            (_, None) => SourceLocator::join(absolute_path("source_root", &self.source_root)?),
        };

        let mut builder = CachingResolver::builder(cache_root, locator).codec(self.codec()?);
        if let Some(formats) = self.format_policy()? {
            builder = builder.format_policy(formats);
        }
        if let Some(secs) = self.fetch_timeout_secs {
            builder = builder.fetch_timeout(nonzero_secs("fetch_timeout_secs", secs)?);
        }
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(nonzero_secs("connect_timeout_secs", secs)?);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(target) = &self.log_target {
            builder = builder.log_target(target);
        }
        builder.build()
    }

    fn codec(&self) -> Result<Codec, ConfigError> {
        match &self.colon_substitute {
            Some(substitute) => Codec::new().colon_substitute(substitute),
            None => Ok(Codec::new()),
        }
    }

    fn format_policy(&self) -> Result<Option<FormatPolicy>, ConfigError> {
        match &self.default_format {
            None => Ok(None),
            Some(format) => match format.parse::<ImageFormat>() {
                Ok(format) => Ok(Some(FormatPolicy::with_default(format))),
                Err(()) => Err(ConfigError::InvalidValue {
                    key: "default_format",
                    value: format.clone(),
                }),
            },
        }
    }
}

fn absolute_path(key: &'static str, value: &Option<String>) -> Result<PathBuf, ConfigError> {
    match value {
        None => Err(ConfigError::MissingKey(key)),
        Some(value) if Path::new(value).is_absolute() => Ok(PathBuf::from(value)),
        Some(value) => Err(ConfigError::NotAbsolute {
            key,
            value: value.clone(),
        }),
    }
}

fn parse_secs(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

fn nonzero_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        Err(ConfigError::InvalidValue {
            key,
            value: secs.to_string(),
        })
    } else {
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn infer_kinds() {
        let config = ResolverConfig::from_map(&map(&[("source_root", "/origin")])).unwrap();
        assert_eq!(config.kind().unwrap(), ResolverKind::Direct);
        let config = ResolverConfig::from_map(&map(&[
            ("source_root", "/origin"),
            ("cache_root", "/cache"),
        ]))
        .unwrap();
        assert_eq!(config.kind().unwrap(), ResolverKind::Caching);
        let config = ResolverConfig::from_map(&map(&[("resolver", "repository")])).unwrap();
        assert_eq!(config.kind().unwrap(), ResolverKind::Repository);
        let config = ResolverConfig::from_map(&map(&[("resolver", "s3")])).unwrap();
        assert!(matches!(config.kind(), Err(ConfigError::UnknownResolver(_))));
    }

    #[test]
    fn legacy_source_key() {
        let config = ResolverConfig::from_map(&map(&[("src_img_root", "/origin")])).unwrap();
        assert_eq!(config.source_root.as_deref(), Some("/origin"));
        let config = ResolverConfig::from_json_str(r#"{"src_img_root": "/origin"}"#).unwrap();
        assert_eq!(config.source_root.as_deref(), Some("/origin"));
    }

    #[test]
    fn missing_keys() {
        let config = ResolverConfig::from_map(&map(&[("resolver", "direct")])).unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::MissingKey("source_root"))
        ));
        let config = ResolverConfig::from_map(&map(&[
            ("resolver", "caching"),
            ("source_root", "/origin"),
        ]))
        .unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::MissingKey("cache_root"))
        ));
        let config = ResolverConfig::from_map(&map(&[("cache_root", "/cache")])).unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::MissingKey("source_root"))
        ));
    }

    #[test]
    fn relative_roots() {
        let config = ResolverConfig::from_map(&map(&[("source_root", "images")])).unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::NotAbsolute {
                key: "source_root",
                ..
            })
        ));
        let config = ResolverConfig::from_map(&map(&[
            ("source_root", "/origin"),
            ("cache_root", "cache"),
        ]))
        .unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::NotAbsolute {
                key: "cache_root",
                ..
            })
        ));
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            ResolverConfig::from_map(&map(&[("fetch_timeout_secs", "soon")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ResolverConfig::from_map(&map(&[("cache_size", "10G")])),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            ResolverConfig::from_json_str(r#"{"cache_size": "10G"}"#),
            Err(ConfigError::Json(_))
        ));

        let config = ResolverConfig::from_map(&map(&[
            ("source_root", "/origin"),
            ("cache_root", "/cache"),
            ("fetch_timeout_secs", "0"),
        ]))
        .unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = ResolverConfig::from_map(&map(&[
            ("source_root", "/origin"),
            ("default_format", ".jp2"),
        ]))
        .unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = ResolverConfig::from_map(&map(&[
            ("source_root", "/origin"),
            ("colon_substitute", ":"),
        ]))
        .unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::InvalidSubstitute(_))
        ));
    }

    #[test]
    fn build_variants() {
        let direct = ResolverConfig::from_map(&map(&[("source_root", "/origin")]))
            .unwrap()
            .build()
            .unwrap();
        assert!(format!("{:?}", direct).starts_with("DirectResolver"));

        let repository = ResolverConfig::from_json_str(
            r#"{
                "resolver": "repository",
                "source_root": "http://fedora.example.org/fedora/objects/",
                "cache_root": "/cache",
                "fetch_timeout_secs": 60
            }"#,
        )
        .unwrap()
        .build_caching()
        .unwrap();
        assert_eq!(repository.cache_root(), Path::new("/cache"));

        let templated = ResolverConfig::from_json_str(
            r#"{
                "source_root": "/mnt/repo",
                "cache_root": "/cache",
                "source_template": "{source_root}/{ident}/master.jp2"
            }"#,
        )
        .unwrap();
        assert_eq!(templated.kind().unwrap(), ResolverKind::Caching);
        assert!(templated.build().is_ok());

        let bad_template = ResolverConfig::from_json_str(
            r#"{
                "source_root": "/mnt/repo",
                "cache_root": "/cache",
                "source_template": "{source_root}/{pid}"
            }"#,
        )
        .unwrap();
        assert!(matches!(
            bad_template.build(),
            Err(ConfigError::InvalidTemplate { .. })
        ));
    }
}
