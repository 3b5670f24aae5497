use imgsrc::{
    config::ResolverConfig,
    errors::ResolverError,
    ident::ImageFormat,
    resolver::{is_resolvable_async, resolve_async, Resolver},
};
use std::{fs, sync::Arc};

fn caching_resolver(origin: &std::path::Path, cache: &std::path::Path) -> Arc<dyn Resolver> {
    let mut map = std::collections::HashMap::new();
    map.insert("src_img_root".to_owned(), origin.display().to_string());
    map.insert("cache_root".to_owned(), cache.display().to_string());
    map.insert("fetch_timeout_secs".to_owned(), "5".to_owned());
    ResolverConfig::from_map(&map).unwrap().build().unwrap()
}

#[tokio::test]
async fn resolve_on_blocking_pool() {
    let origin = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    fs::create_dir(origin.path().join("scans")).unwrap();
    fs::write(origin.path().join("scans/one.tif"), b"one").unwrap();
    let resolver = caching_resolver(origin.path(), cache.path());

    assert!(!is_resolvable_async(resolver.clone(), "scans%2Fone.tif".into())
        .await
        .unwrap());

    let tasks: Vec<_> = (0..4)
        .map(|_| tokio::spawn(resolve_async(resolver.clone(), "scans%2Fone.tif".into())))
        .collect();
    for task in tasks {
        let location = task.await.unwrap().unwrap();
        assert_eq!(location.path(), cache.path().join("scans/one.tif"));
        assert_eq!(location.format(), &ImageFormat::Tif);
    }

    assert!(is_resolvable_async(resolver.clone(), "scans/one.tif".into())
        .await
        .unwrap());
}

#[tokio::test]
async fn errors_pass_through() {
    let origin = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let resolver = caching_resolver(origin.path(), cache.path());

    match resolve_async(resolver.clone(), "absent.jp2".into()).await {
        Err(ResolverError::NotFound { identifier, .. }) => assert_eq!(identifier, "absent.jp2"),
        other => panic!("unexpected {:?}", other),
    }
    match resolve_async(resolver, "..%2Fabsent.jp2".into()).await {
        Err(ResolverError::InvalidIdentifier { .. }) => (),
        other => panic!("unexpected {:?}", other),
    }
}
