#[macro_use] extern crate clap;

use clap::{App, ArgMatches};
use env_logger::{from_env, Env};
use imgsrc::{errors::ConfigError, resolver::Resolver, ResolverConfig};
use std::{path::Path, process, sync::Arc};

fn main() {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml).get_matches();

    let log_level = matches.value_of("log_level").unwrap_or("warn");
    from_env(Env::default().default_filter_or(log_level)).init();

    let resolver = match build_resolver(&matches) {
        Ok(resolver) => resolver,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            process::exit(2);
        }
    };
    log::debug!("{:?}", resolver);

    let mut failed = false;
    for ident in matches.values_of("idents").into_iter().flatten() {
        if matches.is_present("probe") {
            println!("{}", resolver.is_resolvable(ident));
            continue;
        }
        match resolver.resolve(ident) {
            Ok(location) => println!("{}", location),
            Err(err) => {
                log::info!("{}: {}", ident, err);
                eprintln!("{}", err.public_message());
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}

fn build_resolver(matches: &ArgMatches) -> Result<Arc<dyn Resolver>, ConfigError> {
    let mut config = match matches.value_of("config") {
        Some(path) => ResolverConfig::from_json_file(Path::new(path))?,
        None => ResolverConfig::default(),
    };
    override_value(matches, "resolver", &mut config.resolver);
    override_value(matches, "source_root", &mut config.source_root);
    override_value(matches, "cache_root", &mut config.cache_root);
    override_value(matches, "template", &mut config.source_template);
    override_value(matches, "default_format", &mut config.default_format);
    override_value(matches, "colon_substitute", &mut config.colon_substitute);
    if let Some(secs) = matches.value_of("timeout") {
        config.fetch_timeout_secs = Some(secs.parse().map_err(|_| ConfigError::InvalidValue {
            key: "fetch_timeout_secs",
            value: secs.to_owned(),
        })?);
    }
    config.build()
}

fn override_value(matches: &ArgMatches, name: &str, slot: &mut Option<String>) {
    if let Some(value) = matches.value_of(name) {
        *slot = Some(value.to_owned());
    }
}
