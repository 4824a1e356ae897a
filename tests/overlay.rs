//! Merging stacks of versioned archives.

use std::fs;

use anyhow::Result;
use regex::Regex;
use tempfile::TempDir;

use raf::result::RafError;
use raf::{Query, RafOverlay};

mod common;

/// Writes one archive under `root/<version>/Archive_1.raf`.
fn write_version(root: &std::path::Path, version: &str, files: &[(&str, &[u8])]) {
    let dir = root.join(version);
    fs::create_dir(&dir).unwrap();
    common::write_archive(&dir, "Archive_1.raf", files);
}

#[test]
fn versions_merge_oldest_to_newest() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    // Deliberately created out of order, with 1.9.0 after 1.10.0
    // to catch lexicographic sorting.
    write_version(root.path(), "1.10.0", &[("DATA/a.txt", b"a from 1.10.0")]);
    write_version(root.path(), "2.0.0", &[("DATA/b.txt", b"b from 2.0.0")]);
    write_version(root.path(), "1.0.0", &[("DATA/a.txt", b"a from 1.0.0")]);
    write_version(root.path(), "1.9.0", &[("DATA/c.txt", b"c from 1.9.0")]);

    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;
    let versions: Vec<String> = overlay
        .archives()
        .iter()
        .map(|(version, _)| version.to_string())
        .collect();
    assert_eq!(versions, vec!["1.0.0", "1.9.0", "1.10.0", "2.0.0"]);

    // Both releases of a.txt are visible, oldest first.
    let a_versions = &overlay.entries_by_path()["data/a.txt"];
    assert_eq!(a_versions.len(), 2);
    assert_eq!(a_versions[0].read()?, b"a from 1.0.0");
    assert_eq!(a_versions[1].read()?, b"a from 1.10.0");
    Ok(())
}

#[test]
fn the_newest_version_of_a_path_wins() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    write_version(root.path(), "1.0.0", &[("DATA/a.txt", b"original")]);
    write_version(root.path(), "1.10.0", &[("DATA/a.txt", b"patched")]);
    // The newest release doesn't touch a.txt at all.
    write_version(root.path(), "2.0.0", &[("DATA/b.txt", b"unrelated")]);

    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;
    assert_eq!(overlay.read(Query::path("DATA/a.txt"))?, b"patched");
    assert_eq!(overlay.read(Query::name("A.TXT"))?, b"patched");

    // A release that ships it again takes over.
    write_version(root.path(), "3.0.0", &[("DATA/a.txt", b"repatched")]);
    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;
    assert_eq!(overlay.read(Query::path("DATA/a.txt"))?, b"repatched");
    Ok(())
}

#[test]
fn name_queries_prefer_the_newest_archive() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    write_version(root.path(), "1.0.0", &[("DATA/Old/skin.dds", b"old")]);
    write_version(
        root.path(),
        "2.0.0",
        &[
            ("DATA/New/skin.dds", b"new"),
            ("DATA/Newer/skin.dds", b"newer"),
        ],
    );

    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;

    // Newest archive first; within it, the last same-named entry.
    let found = overlay.find(Query::name("skin.dds"))?;
    assert_eq!(found.path(), "DATA/Newer/skin.dds");

    // All three remain reachable through the aggregated tables.
    let lists = &overlay.entries_by_name()["skin.dds"];
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].len(), 1);
    assert_eq!(lists[1].len(), 2);
    Ok(())
}

#[test]
fn matching_yields_the_newest_of_each_path() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    write_version(root.path(), "1.0.0", &[("DATA/a.txt", b"old a")]);
    write_version(
        root.path(),
        "2.0.0",
        &[("DATA/a.txt", b"new a"), ("DATA/b.txt", b"only b")],
    );

    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;
    let everything = Regex::new(r"\.txt$")?;
    let matched: Vec<&[u8]> = overlay
        .find_matching(&everything)
        .map(|entry| entry.read())
        .collect::<Result<_, _>>()?;
    assert_eq!(matched, vec![b"new a".as_slice(), b"only b".as_slice()]);
    Ok(())
}

#[test]
fn loose_files_in_the_root_are_ignored() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    write_version(root.path(), "1.0.0", &[("DATA/a.txt", b"contents")]);
    fs::write(root.path().join("desktop.ini"), b"not a version")?;

    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;
    assert_eq!(overlay.archives().len(), 1);
    Ok(())
}

#[test]
fn a_directory_that_is_not_a_version_is_an_error() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    write_version(root.path(), "1.0.0", &[("DATA/a.txt", b"contents")]);
    fs::create_dir(root.path().join("backup"))?;

    let err = RafOverlay::open(root.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, RafError::VersionParse(_)));
    assert!(err.to_string().contains("backup"));
    Ok(())
}

#[test]
fn a_version_directory_needs_exactly_one_index() -> Result<()> {
    common::init_logging();

    // None at all:
    let root = TempDir::new()?;
    fs::create_dir(root.path().join("1.0.0"))?;
    let err = RafOverlay::open(root.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, RafError::MissingArchive(_)));
    assert!(err.to_string().contains("1.0.0"));

    // More than one:
    let root = TempDir::new()?;
    let dir = root.path().join("1.0.0");
    fs::create_dir(&dir)?;
    common::write_archive(&dir, "Archive_1.raf", &[("DATA/a.txt", b"a")]);
    common::write_archive(&dir, "Archive_2.raf", &[("DATA/b.txt", b"b")]);
    let err = RafOverlay::open(root.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(
        err,
        RafError::AmbiguousArchive { count: 2, .. }
    ));
    Ok(())
}

#[test]
fn index_discovery_ignores_case() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    let dir = root.path().join("1.0.0");
    fs::create_dir(&dir)?;
    common::write_archive(&dir, "ARCHIVE_1.RAF", &[("DATA/a.txt", b"shouty")]);

    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;
    assert_eq!(overlay.read(Query::path("DATA/a.txt"))?, b"shouty");
    Ok(())
}

#[test]
fn open_failures_name_the_archive() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    write_version(root.path(), "1.0.0", &[("DATA/a.txt", b"fine")]);
    write_version(root.path(), "2.0.0", &[("DATA/a.txt", b"about to break")]);

    // Stomp 2.0.0's magic number.
    let broken = root.path().join("2.0.0").join("Archive_1.raf");
    let broken = camino::Utf8PathBuf::from_path_buf(broken).unwrap();
    common::patch(&broken, 0, &[0xDE, 0xAD, 0xBE, 0xEF]);

    let err = RafOverlay::open(root.path().to_str().unwrap()).unwrap_err();
    match &err {
        RafError::Archive { path, source } => {
            assert!(path.as_str().contains("2.0.0"));
            assert!(matches!(**source, RafError::MagicMismatch { .. }));
        }
        other => panic!("expected an archive error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn an_empty_root_merges_to_nothing() -> Result<()> {
    common::init_logging();
    let root = TempDir::new()?;
    let overlay = RafOverlay::open(root.path().to_str().unwrap())?;

    assert!(overlay.archives().is_empty());
    assert!(matches!(
        overlay.find(Query::path("DATA/a.txt")),
        Err(RafError::NotFound(_))
    ));
    assert!(matches!(
        overlay.find(Query::default()),
        Err(RafError::NoSelector)
    ));
    Ok(())
}
