use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs, process::Command};

fn imgsrc() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.arg("run")
        .arg("--quiet")
        .arg("-p")
        .arg("imgsrc-cli")
        .arg("--");
    cmd
}

#[test]
fn cli_no_args() {
    imgsrc()
        .assert()
        .failure()
        .stderr(predicate::str::contains("For more information try --help"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn cli_help() {
    imgsrc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("OPTIONS:"))
        .stdout(predicate::str::contains("--cache-root"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn cli_direct() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("foo")).unwrap();
    fs::write(root.path().join("foo/bar.tif"), b"tif").unwrap();

    imgsrc()
        .arg("--source-root")
        .arg(root.path())
        .arg("foo%2Fbar.tif")
        .assert()
        .success()
        .stdout(predicate::eq(format!(
            "{}\ttif\n",
            root.path().join("foo/bar.tif").display()
        )))
        .stderr(predicate::str::is_empty());
}

#[test]
fn cli_not_found() {
    let root = tempfile::tempdir().unwrap();

    imgsrc()
        .arg("-l")
        .arg("off")
        .arg("--source-root")
        .arg(root.path())
        .arg("missing.jp2")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::eq(
            "Source image not found for identifier: missing.jp2.\n",
        ));
}

#[test]
fn cli_bad_config() {
    imgsrc()
        .arg("--source-root")
        .arg("relative/images")
        .arg("foo.jpg")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn cli_caching_config_file() {
    let origin = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let settings = tempfile::tempdir().unwrap();
    fs::write(origin.path().join("coll:7"), b"jp2").unwrap();
    let config = settings.path().join("resolver.json");
    fs::write(
        &config,
        format!(
            r#"{{ "src_img_root": "{}", "cache_root": "{}", "default_format": "jp2" }}"#,
            origin.path().display(),
            cache.path().display()
        ),
    )
    .unwrap();

    imgsrc()
        .arg("-c")
        .arg(&config)
        .arg("--probe")
        .arg("coll%3A7")
        .assert()
        .success()
        .stdout(predicate::eq("false\n"));

    imgsrc()
        .arg("-c")
        .arg(&config)
        .arg("coll%3A7")
        .assert()
        .success()
        .stdout(predicate::eq(format!(
            "{}\tjp2\n",
            cache.path().join("coll:7").display()
        )))
        .stderr(predicate::str::is_empty());
    assert_eq!(fs::read(cache.path().join("coll:7")).unwrap(), b"jp2");

    imgsrc()
        .arg("-c")
        .arg(&config)
        .arg("--probe")
        .arg("coll%3A7")
        .arg("..%2Fcoll%3A7")
        .assert()
        .success()
        .stdout(predicate::eq("true\nfalse\n"));
}
