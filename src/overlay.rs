//! Merging a whole directory of versioned archives into one namespace.
//!
//! The game's release manager keeps one archive per release,
//! each in a directory named for the release's version:
//!
//! ```text
//! filearchives/
//!     1.0.0/Archive_1.raf, Archive_1.raf.dat
//!     1.9.0/Archive_1.raf, Archive_1.raf.dat
//!     1.10.0/Archive_1.raf, Archive_1.raf.dat
//! ```
//!
//! A release only ships the files it changed,
//! so reading "the game's files" means reading every archive
//! and taking the newest version of each path.
//! That's what [`RafOverlay`] does.
//!
//! [`RafOverlay`]: struct.RafOverlay.html

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use log::*;
use regex::Regex;

use crate::read::{Query, RafArchive, RafEntry};
use crate::result::*;

/// A directory name parsed as a dot-separated version, like `1.10.0`.
///
/// Versions order numerically, component by component,
/// so `1.9.0` comes before `1.10.0`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Vec<u32>);

impl Version {
    /// Parses a directory name as a version.
    /// Every dot-separated piece has to be a non-negative integer.
    pub fn parse(name: &str) -> RafResult<Self> {
        name.split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| RafError::VersionParse(name.to_owned()))
            })
            .collect::<RafResult<Vec<u32>>>()
            .map(Self)
    }

    /// The numeric components, most significant first.
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components = self.0.iter();
        if let Some(first) = components.next() {
            write!(f, "{first}")?;
        }
        for rest in components {
            write!(f, ".{rest}")?;
        }
        Ok(())
    }
}

/// Finds the one `.raf` index inside a version directory.
///
/// The extension check ignores case, like everything else here.
fn locate_index(directory: &Utf8Path) -> RafResult<Utf8PathBuf> {
    let mut found = Vec::new();
    for child in directory.read_dir_utf8()? {
        let child = child?;
        if !child.path().is_file() {
            continue;
        }
        if child.file_name().to_ascii_lowercase().ends_with(".raf") {
            found.push(child.into_path());
        }
    }
    if found.len() > 1 {
        return Err(RafError::AmbiguousArchive {
            dir: directory.to_owned(),
            count: found.len(),
        });
    }
    found
        .pop()
        .ok_or_else(|| RafError::MissingArchive(directory.to_owned()))
}

/// A stack of versioned archives merged into one namespace,
/// where the newest version of every path wins.
///
/// ```no_run
/// use raf::{Query, RafOverlay};
///
/// let overlay = RafOverlay::open("filearchives")?;
/// let newest_logo = overlay.read(Query::path("DATA/Menu/Logo.dds"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct RafOverlay {
    /// The merged archives and their versions, oldest first.
    archives: Vec<(Version, RafArchive)>,
    /// Every version of every path, oldest first.
    by_path: BTreeMap<String, Vec<Arc<RafEntry>>>,
    /// Per-archive name lists, oldest archive first.
    by_name: BTreeMap<String, Vec<Vec<Arc<RafEntry>>>>,
}

impl RafOverlay {
    /// Opens every versioned archive under `root`, oldest first.
    ///
    /// Each directory under `root` has to be named for a version and
    /// hold exactly one `.raf` index (with its `.raf.dat` beside it).
    /// Loose files directly under `root` are ignored.
    pub fn open<P: AsRef<Utf8Path>>(root: P) -> RafResult<Self> {
        let root = root.as_ref();
        info!("Opening versioned root {root}");

        let mut directories = Vec::new();
        for child in root.read_dir_utf8()? {
            let child = child?;
            if !child.path().is_dir() {
                continue;
            }
            let version = Version::parse(child.file_name())?;
            directories.push((version, child.into_path()));
        }
        directories.sort();
        debug!("{} version directories under {root}", directories.len());

        let mut archives = Vec::with_capacity(directories.len());
        for (version, directory) in directories {
            let index_path = locate_index(&directory)?;
            archives.push((version, RafArchive::open(index_path)?));
        }

        // Ascending version order makes "the newest holder of a path"
        // the last element of every list below.
        let mut by_path: BTreeMap<String, Vec<Arc<RafEntry>>> = BTreeMap::new();
        let mut by_name: BTreeMap<String, Vec<Vec<Arc<RafEntry>>>> = BTreeMap::new();
        for (_, archive) in &archives {
            for (path, entry) in archive.entries_by_path() {
                by_path
                    .entry(path.clone())
                    .or_default()
                    .push(Arc::clone(entry));
            }
            for (name, entries) in archive.entries_by_name() {
                by_name.entry(name.clone()).or_default().push(entries.clone());
            }
        }

        Ok(Self {
            archives,
            by_path,
            by_name,
        })
    }

    /// The merged archives and their versions, oldest first.
    pub fn archives(&self) -> &[(Version, RafArchive)] {
        &self.archives
    }

    /// Every version of every path,
    /// keyed by lower-cased path, oldest version first.
    pub fn entries_by_path(&self) -> &BTreeMap<String, Vec<Arc<RafEntry>>> {
        &self.by_path
    }

    /// Each archive's same-name entry list,
    /// keyed by lower-cased file name, oldest archive first.
    pub fn entries_by_name(&self) -> &BTreeMap<String, Vec<Vec<Arc<RafEntry>>>> {
        &self.by_name
    }

    /// Looks up the newest entry matching `query`.
    ///
    /// Releases only add or replace paths, never remove them,
    /// so a path missing from the newest archives still resolves
    /// to the newest release that shipped it.
    pub fn find(&self, query: Query<'_>) -> RafResult<&Arc<RafEntry>> {
        let found = if let Some(path) = query.path {
            self.by_path
                .get(&path.to_lowercase())
                .and_then(|versions| versions.last())
        } else if let Some(name) = query.name {
            self.by_name
                .get(&name.to_lowercase())
                .and_then(|versions| versions.last())
                .and_then(|entries| entries.last())
        } else {
            return Err(RafError::NoSelector);
        };
        found.ok_or_else(|| RafError::NotFound(query.to_string()))
    }

    /// Lazily yields the newest entry of each path whose lower-cased
    /// form matches `pattern`, in ascending path order.
    /// Every call scans the merged catalog afresh.
    pub fn find_matching<'a>(
        &'a self,
        pattern: &'a Regex,
    ) -> impl Iterator<Item = &'a Arc<RafEntry>> + 'a {
        self.by_path
            .iter()
            .filter(move |(path, _)| pattern.is_match(path.as_str()))
            .filter_map(|(_, versions)| versions.last())
    }

    /// Looks up the newest matching entry and reads its contents.
    pub fn read(&self, query: Query<'_>) -> RafResult<&[u8]> {
        self.find(query)?.read()
    }
}
