//! Code specific to the RAF index format.
//!
//! We try to keep the nitty gritty here,
//! and higher-level stuff in the [`read`] module.
//!
//! Nobody publishes a spec for this format;
//! the layout below was pieced together by community tooling
//! and confirmed against live game installs.
//! Everything is little-endian,
//! and the header points *forward* at two tables,
//! so parsing needs a seekable stream instead of a single pass.
//!
//! [`read`]: ../read/index.html

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::*;

use crate::result::*;

/// Magic number at the front of every RAF index
pub const INDEX_MAGIC: [u8; 4] = [0xF0, 0x0E, 0xBE, 0x18];

/// Reads a little-endian u32, turning EOF into `TruncatedStream`
/// for the structure we were in the middle of.
fn read_u32<R: Read>(reader: &mut R, whats_truncated: &'static str) -> RafResult<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated(e, whats_truncated))
}

fn truncated(err: io::Error, whats_truncated: &'static str) -> RafError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        RafError::TruncatedStream(whats_truncated)
    } else {
        RafError::Io(err)
    }
}

/// Seeks to `offset`, refusing targets past the end of the stream.
fn seek_to<R: Seek>(reader: &mut R, offset: u64, stream_len: u64) -> RafResult<()> {
    if offset > stream_len {
        return Err(RafError::OffsetOutOfRange {
            offset,
            len: stream_len,
        });
    }
    reader.seek(SeekFrom::Start(offset))?;
    Ok(())
}

/// Data from the fixed-size header at the front of the index
#[derive(Debug)]
pub struct Header {
    /// Format version. Live installs all carry 1.
    pub version: u32,
    /// The release manager's slot for this archive. Opaque to readers.
    pub manager_index: u32,
    /// Absolute offset of the file table.
    pub file_list_offset: u32,
    /// Absolute offset of the path table.
    pub paths_offset: u32,
}

impl Header {
    pub fn parse<R: Read>(reader: &mut R) -> RafResult<Self> {
        // Index header:
        //
        // magic number                    4 bytes  (f0 0e be 18)
        // format version                  4 bytes
        // manager index                   4 bytes
        // offset of the file table        4 bytes
        // offset of the path table        4 bytes
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| truncated(e, "index header"))?;
        if magic != INDEX_MAGIC {
            return Err(RafError::MagicMismatch { found: magic });
        }
        let version = read_u32(reader, "index header")?;
        let manager_index = read_u32(reader, "index header")?;
        let file_list_offset = read_u32(reader, "index header")?;
        let paths_offset = read_u32(reader, "index header")?;

        Ok(Self {
            version,
            manager_index,
            file_list_offset,
            paths_offset,
        })
    }
}

/// Data from one record of the file table
#[derive(Debug)]
pub struct FileRecord {
    /// Hash of the file's path. Carried but never consulted;
    /// lookups go through the path table instead.
    pub path_hash: u32,
    /// Absolute offset of the compressed payload in the data file.
    pub data_offset: u32,
    /// Size of the compressed payload in the data file.
    pub data_size: u32,
    /// Index of the file's path in the path table.
    pub path_index: u32,
}

impl FileRecord {
    fn parse<R: Read>(reader: &mut R) -> RafResult<Self> {
        Ok(Self {
            path_hash: read_u32(reader, "file table")?,
            data_offset: read_u32(reader, "file table")?,
            data_size: read_u32(reader, "file table")?,
            path_index: read_u32(reader, "file table")?,
        })
    }

    fn size_in_file() -> u64 {
        16
    }
}

/// Parses the file table the header points at.
fn parse_file_table<R: Read + Seek>(
    reader: &mut R,
    stream_len: u64,
    offset: u32,
) -> RafResult<Vec<FileRecord>> {
    // File table:
    //
    // file count                      4 bytes
    // file count records of:
    //   path hash                     4 bytes
    //   payload offset                4 bytes
    //   payload size                  4 bytes
    //   path table index              4 bytes
    seek_to(reader, u64::from(offset), stream_len)?;
    let count = read_u32(reader, "file table count")?;

    // Refuse counts the stream can't actually hold
    // before handing them to an allocator.
    let table_end = u64::from(offset) + 4 + u64::from(count) * FileRecord::size_in_file();
    if table_end > stream_len {
        return Err(RafError::TruncatedStream("file table"));
    }

    let mut files = Vec::with_capacity(count as usize);
    for _ in 0..count {
        files.push(FileRecord::parse(reader)?);
    }
    Ok(files)
}

/// Parses the path table the header points at.
fn parse_path_table<R: Read + Seek>(
    reader: &mut R,
    stream_len: u64,
    offset: u32,
) -> RafResult<Vec<String>> {
    // Path table:
    //
    // path table size                 4 bytes
    // path count                      4 bytes
    // path count locators of:
    //   string offset                 4 bytes  (relative to the table)
    //   string length                 4 bytes  (including the NUL)
    // followed by the strings themselves, NUL-terminated UTF-8.
    let table_start = u64::from(offset);
    seek_to(reader, table_start, stream_len)?;
    let table_size = read_u32(reader, "path table header")?;
    let count = read_u32(reader, "path table header")?;
    trace!("path table claims {table_size} bytes, {count} strings");

    let locators_end = table_start + 8 + u64::from(count) * 8;
    if locators_end > stream_len {
        return Err(RafError::TruncatedStream("path table"));
    }

    let mut locators = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let string_offset = read_u32(reader, "path table")?;
        let string_length = read_u32(reader, "path table")?;
        locators.push((string_offset, string_length));
    }

    let mut paths = Vec::with_capacity(locators.len());
    for (index, (string_offset, declared_length)) in locators.into_iter().enumerate() {
        paths.push(read_path_string(
            reader,
            stream_len,
            table_start,
            index,
            string_offset,
            declared_length,
        )?);
    }
    Ok(paths)
}

/// Reads one NUL-terminated path string.
///
/// The declared length counts the terminator,
/// so the NUL has to sit at exactly `declared_length - 1`.
fn read_path_string<R: Read + Seek>(
    reader: &mut R,
    stream_len: u64,
    table_start: u64,
    index: usize,
    string_offset: u32,
    declared_length: u32,
) -> RafResult<String> {
    let start = table_start + u64::from(string_offset);
    seek_to(reader, start, stream_len)?;
    if start + u64::from(declared_length) > stream_len {
        return Err(RafError::TruncatedStream("path string"));
    }

    let mut buf = vec![0u8; declared_length as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| truncated(e, "path string"))?;

    match memchr::memchr(0, &buf) {
        Some(nul) if nul + 1 == buf.len() => {}
        _ => {
            return Err(RafError::PathLengthMismatch {
                index,
                declared: declared_length,
            })
        }
    }
    let path = std::str::from_utf8(&buf[..buf.len() - 1])?;
    Ok(path.to_owned())
}

/// An entire parsed index: header, file table, and path table.
#[derive(Debug)]
pub struct RafIndex {
    pub header: Header,
    /// File records, in file table order.
    pub files: Vec<FileRecord>,
    /// Path strings, in path table order.
    /// File records refer to these by index.
    pub paths: Vec<String>,
}

/// Parses an entire RAF index.
///
/// Indices are a few hundred kilobytes at worst,
/// so there's no reason not to parse them up front.
pub fn parse_index<R: Read + Seek>(reader: &mut R) -> RafResult<RafIndex> {
    let stream_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let header = Header::parse(reader)?;
    trace!("{header:?}");
    let files = parse_file_table(reader, stream_len, header.file_list_offset)?;
    let paths = parse_path_table(reader, stream_len, header.paths_offset)?;
    debug!(
        "parsed index: {} file records, {} path strings",
        files.len(),
        paths.len()
    );

    Ok(RafIndex {
        header,
        files,
        paths,
    })
}
