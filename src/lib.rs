//! Resolve image identifiers to local source image files
//!
//! An image server hands this crate an opaque identifier and gets back a
//! path to a regular file plus the declared image format. Where the file
//! comes from depends on the [resolver::Resolver] in use: a
//! [resolver::DirectResolver] serves files in place, while a
//! [resolver::CachingResolver] keeps a local copy of images that live on a
//! network mount or in a content repository, fetching each one the first
//! time it's asked for.
//!
//! ```no_run
//! use imgsrc::{config::ResolverConfig, resolver::Resolver};
//!
//! let resolver = ResolverConfig::from_json_str(
//!     r#"{ "source_root": "/mnt/images", "cache_root": "/var/cache/images" }"#,
//! )?
//! .build()?;
//! let location = resolver.resolve("foo%2Fbar.tif")?;
//! assert_eq!(location.format().as_str(), "tif");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(not(unix))]
compile_error!("imgsrc only works on unix");

#[macro_use] extern crate lazy_static;
#[macro_use] extern crate serde;

pub mod config;
pub mod errors;
pub mod ident;
pub mod resolver;
pub mod source;
pub mod storage;

pub use crate::{
    config::ResolverConfig,
    ident::{Identifier, ImageFormat},
    resolver::{ResolvedLocation, Resolver},
};
