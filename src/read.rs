//! Tools for reading a RAF archive.
//!
//! To start reading one, create a [`RafArchive`] from its index file.
//! This library doesn't do any writing;
//! the game's patcher made these archives and nothing else touches them.
//!
//! [`RafArchive`]: struct.RafArchive.html

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};
use log::*;
use regex::Regex;

use crate::data::DataFile;
use crate::result::*;
use crate::spec::{self, RafIndex};

/// A single file in an archive, read and inflated on demand.
///
/// Entries hang onto their archive's data file,
/// so they stay readable for as long as you hold them.
pub struct RafEntry {
    path: Utf8PathBuf,
    data_offset: u64,
    data_size: u32,
    data: Arc<DataFile>,
    payload: OnceLock<Vec<u8>>,
}

impl RafEntry {
    /// The path the archive stores this entry under, in its original case.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Offset of the compressed payload in the data file.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Size of the compressed payload, in bytes.
    pub fn compressed_size(&self) -> u32 {
        self.data_size
    }

    /// Reads and inflates the entry's contents.
    ///
    /// The first successful read keeps the bytes for the life of the
    /// entry, and later calls return the same buffer without touching
    /// the data file. Failed reads keep nothing, so a read that fails
    /// (say, the data file was missing) can be retried.
    pub fn read(&self) -> RafResult<&[u8]> {
        if let Some(payload) = self.payload.get() {
            return Ok(payload.as_slice());
        }
        let payload = self.data.read(self.data_offset, self.data_size)?;
        // Racing readers might inflate the same entry twice;
        // whoever gets here first wins and everyone shares their buffer.
        Ok(self.payload.get_or_init(|| payload).as_slice())
    }
}

impl fmt::Debug for RafEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RafEntry")
            .field("path", &self.path)
            .field("data_offset", &self.data_offset)
            .field("compressed_size", &self.data_size)
            .field("cached", &self.payload.get().is_some())
            .finish()
    }
}

/// The last `/`-separated segment of an archive path.
fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lookup tables over an archive's entries.
///
/// All keys are lower-cased; archive paths aren't case-sensitive.
#[derive(Debug)]
pub(crate) struct EntryCatalog {
    /// Full path -> entry. Exclusive: a duplicate path is corruption.
    pub(crate) by_path: BTreeMap<String, Arc<RafEntry>>,
    /// File name -> every entry with that name, in file table order.
    pub(crate) by_name: BTreeMap<String, Vec<Arc<RafEntry>>>,
}

impl EntryCatalog {
    /// Resolves each file record against the path table
    /// and indexes the entries that fall out.
    pub(crate) fn build(index: &RafIndex, data: &Arc<DataFile>) -> RafResult<Self> {
        let mut by_path = BTreeMap::new();
        let mut by_name: BTreeMap<String, Vec<Arc<RafEntry>>> = BTreeMap::new();

        for record in &index.files {
            let path = index.paths.get(record.path_index as usize).ok_or(
                RafError::InvalidPathIndex {
                    index: record.path_index,
                    count: index.paths.len(),
                },
            )?;
            let entry = Arc::new(RafEntry {
                path: Utf8PathBuf::from(path),
                data_offset: u64::from(record.data_offset),
                data_size: record.data_size,
                data: Arc::clone(data),
                payload: OnceLock::new(),
            });

            if by_path
                .insert(path.to_lowercase(), Arc::clone(&entry))
                .is_some()
            {
                return Err(RafError::DuplicatePath(path.clone()));
            }
            by_name
                .entry(base_name(path).to_lowercase())
                .or_default()
                .push(entry);
        }

        Ok(Self { by_path, by_name })
    }

    /// Lazily yields `(lower-cased path, entry)` pairs whose path
    /// matches `pattern`, in ascending path order.
    pub(crate) fn iter_matching<'c>(
        &'c self,
        pattern: &'c Regex,
    ) -> impl Iterator<Item = (&'c str, &'c Arc<RafEntry>)> + 'c {
        self.by_path
            .iter()
            .filter(move |(path, _)| pattern.is_match(path.as_str()))
            .map(|(path, entry)| (path.as_str(), entry))
    }
}

/// Selects an entry by its full path, or by its file name alone.
///
/// Either way the lookup ignores case.
/// If both are given, the path wins and the name is ignored.
///
/// ```
/// use raf::Query;
///
/// let by_path = Query::path("DATA/Menu/LoadingScreen.dds");
/// let by_name = Query::name("loadingscreen.dds");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Query<'q> {
    /// The full archive path to look up.
    pub path: Option<&'q str>,
    /// The file name (last path segment) to look up.
    /// Ignored if `path` is also set.
    pub name: Option<&'q str>,
}

impl<'q> Query<'q> {
    /// Selects the entry stored under exactly this path.
    pub fn path(path: &'q str) -> Self {
        Self {
            path: Some(path),
            name: None,
        }
    }

    /// Selects entries with this file name, wherever they live.
    pub fn name(name: &'q str) -> Self {
        Self {
            path: None,
            name: Some(name),
        }
    }
}

impl fmt::Display for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.path, self.name) {
            (Some(path), _) => write!(f, "path {path:?}"),
            (None, Some(name)) => write!(f, "name {name:?}"),
            (None, None) => write!(f, "empty query"),
        }
    }
}

/// A RAF archive to be read: a parsed index plus its companion data file.
///
/// ```no_run
/// use raf::{Query, RafArchive};
///
/// let archive = RafArchive::open("Archive_184190283.raf")?;
/// let logo = archive.read(Query::path("DATA/Menu/Logo.dds"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct RafArchive {
    path: Utf8PathBuf,
    index: RafIndex,
    catalog: EntryCatalog,
    data: Arc<DataFile>,
}

impl RafArchive {
    /// Opens the index at `path` and catalogs its entries.
    ///
    /// The whole index is parsed and checked here, so every lookup
    /// after this point works against known-sound tables.
    /// The companion data file (`<path>.dat`) isn't touched until
    /// an entry is actually read.
    ///
    /// Any failure names the file it came from; nothing half-opened
    /// is ever returned.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> RafResult<Self> {
        let path = path.as_ref();
        info!("Opening archive {path}");
        Self::open_inner(path).map_err(|source| RafError::Archive {
            path: path.to_owned(),
            source: Box::new(source),
        })
    }

    fn open_inner(path: &Utf8Path) -> RafResult<Self> {
        let file = File::open(path)?;
        let index = spec::parse_index(&mut BufReader::new(file))?;
        let data = Arc::new(DataFile::for_index(path));
        let catalog = EntryCatalog::build(&index, &data)?;
        debug!(
            "{path}: {} entries, {} distinct file names",
            catalog.by_path.len(),
            catalog.by_name.len()
        );

        Ok(Self {
            path: path.to_owned(),
            index,
            catalog,
            data,
        })
    }

    /// The path of the index file this archive was opened from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The path of the companion data file.
    pub fn data_path(&self) -> &Utf8Path {
        self.data.path()
    }

    /// The format version stamped in the index header.
    pub fn version(&self) -> u32 {
        self.index.header.version
    }

    /// The release manager's slot for this archive. Opaque to readers.
    pub fn manager_index(&self) -> u32 {
        self.index.header.manager_index
    }

    /// Every entry, keyed by lower-cased path, in ascending path order.
    pub fn entries_by_path(&self) -> &BTreeMap<String, Arc<RafEntry>> {
        &self.catalog.by_path
    }

    /// Every entry, keyed by lower-cased file name.
    /// Entries sharing a name appear in file table order.
    pub fn entries_by_name(&self) -> &BTreeMap<String, Vec<Arc<RafEntry>>> {
        &self.catalog.by_name
    }

    /// Looks up a single entry.
    ///
    /// A name query with several matches returns the one latest in
    /// file table order.
    pub fn find(&self, query: Query<'_>) -> RafResult<&Arc<RafEntry>> {
        let found = if let Some(path) = query.path {
            self.catalog.by_path.get(&path.to_lowercase())
        } else if let Some(name) = query.name {
            self.catalog
                .by_name
                .get(&name.to_lowercase())
                .and_then(|entries| entries.last())
        } else {
            return Err(RafError::NoSelector);
        };
        found.ok_or_else(|| RafError::NotFound(query.to_string()))
    }

    /// Lazily yields each entry whose lower-cased path matches
    /// `pattern`, in ascending path order.
    /// Every call scans the catalog afresh.
    pub fn find_matching<'a>(
        &'a self,
        pattern: &'a Regex,
    ) -> impl Iterator<Item = &'a Arc<RafEntry>> + 'a {
        self.catalog.iter_matching(pattern).map(|(_, entry)| entry)
    }

    /// Looks up an entry and reads its contents.
    pub fn read(&self, query: Query<'_>) -> RafResult<&[u8]> {
        self.find(query)?.read()
    }
}
