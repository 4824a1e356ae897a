//! The companion data file (`<index>.raf.dat`) payloads are read from.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::ZlibDecoder;
use log::*;
use parking_lot::Mutex;

use crate::result::*;

/// An archive's data file, opened on first use.
///
/// Indices can be cataloged without their data files existing at all;
/// only reading an entry's payload needs one.
/// A seek and the read after it aren't atomic,
/// so the pair runs under a mutex.
#[derive(Debug)]
pub(crate) struct DataFile {
    path: Utf8PathBuf,
    handle: Mutex<Option<File>>,
}

impl DataFile {
    /// The data file paired with the given index:
    /// `foo.raf` goes with `foo.raf.dat`.
    pub(crate) fn for_index(index_path: &Utf8Path) -> Self {
        Self::new(format!("{index_path}.dat").into())
    }

    pub(crate) fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            handle: Mutex::new(None),
        }
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the compressed region at `offset` and inflates it.
    pub(crate) fn read(&self, offset: u64, size: u32) -> RafResult<Vec<u8>> {
        let mut compressed = vec![0u8; size as usize];
        {
            let mut guard = self.handle.lock();
            if guard.is_none() {
                debug!("Opening data file {}", self.path);
                let file = File::open(&self.path).map_err(|source| RafError::DataFileOpen {
                    path: self.path.clone(),
                    source,
                })?;
                *guard = Some(file);
            }
            let file = guard.as_mut().expect("handle was just opened");
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut compressed).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    RafError::TruncatedPayload {
                        path: self.path.clone(),
                        offset,
                        wanted: size,
                    }
                } else {
                    RafError::Io(e)
                }
            })?;
        }

        // Inflate outside the lock; other readers can seek meanwhile.
        let mut payload = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut payload)
            .map_err(|source| RafError::MalformedPayload {
                path: self.path.clone(),
                offset,
                source,
            })?;
        Ok(payload)
    }
}
