//! Builds real `.raf` + `.raf.dat` pairs for the tests to chew on.
#![allow(dead_code)] // Not every test binary uses every helper.

use std::fs;
use std::io::Write;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::write::ZlibEncoder;
use flate2::Compression;

const INDEX_MAGIC: [u8; 4] = [0xF0, 0x0E, 0xBE, 0x18];

/// Junk at the front of every data file so payload offsets are never zero.
pub const DATA_PREAMBLE: &[u8] = b"RAFDAT-PREAMBLE-0123456789abcdef0123456789abcdef0123456789abcdef";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn deflate(plaintext: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plaintext).unwrap();
    encoder.finish().unwrap()
}

/// Writes `<name>` and `<name>.dat` under `dir`, holding the given
/// (path, plaintext) files. Returns the index's path.
///
/// Payloads are zlib-compressed and packed in order after
/// [`DATA_PREAMBLE`], so the first one sits at offset 64.
pub fn write_archive(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> Utf8PathBuf {
    let mut dat = DATA_PREAMBLE.to_vec();
    let mut records = Vec::new();
    for (path_index, (_, plaintext)) in files.iter().enumerate() {
        let compressed = deflate(plaintext);
        records.push((dat.len() as u32, compressed.len() as u32, path_index as u32));
        dat.extend_from_slice(&compressed);
    }

    let paths: Vec<&str> = files.iter().map(|&(path, _)| path).collect();
    let index = build_index(&records, &paths);

    let index_path = dir.join(name);
    fs::write(&index_path, index).unwrap();
    fs::write(dir.join(format!("{name}.dat")), dat).unwrap();
    Utf8PathBuf::from_path_buf(index_path).expect("temp paths are UTF-8")
}

/// Assembles raw index bytes: the 20-byte header, then the file table
/// (one (offset, size, path index) record per tuple), then the path table.
pub fn build_index(records: &[(u32, u32, u32)], paths: &[&str]) -> Vec<u8> {
    fn put_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    let file_list_offset = 20u32;
    let paths_offset = file_list_offset + 4 + records.len() as u32 * 16;

    let mut buf = Vec::new();
    buf.extend_from_slice(&INDEX_MAGIC);
    put_u32(&mut buf, 1); // version
    put_u32(&mut buf, 0); // manager index
    put_u32(&mut buf, file_list_offset);
    put_u32(&mut buf, paths_offset);

    put_u32(&mut buf, records.len() as u32);
    for (i, &(offset, size, path_index)) in records.iter().enumerate() {
        put_u32(&mut buf, 0xABAD1DEA ^ i as u32); // path hash, never consulted
        put_u32(&mut buf, offset);
        put_u32(&mut buf, size);
        put_u32(&mut buf, path_index);
    }

    let locators_len = 8 + paths.len() as u32 * 8;
    let strings_len: u32 = paths.iter().map(|p| p.len() as u32 + 1).sum();
    put_u32(&mut buf, locators_len + strings_len);
    put_u32(&mut buf, paths.len() as u32);
    let mut string_offset = locators_len;
    for path in paths {
        put_u32(&mut buf, string_offset);
        put_u32(&mut buf, path.len() as u32 + 1);
        string_offset += path.len() as u32 + 1;
    }
    for path in paths {
        buf.extend_from_slice(path.as_bytes());
        buf.push(0);
    }
    buf
}

/// The data file written beside the given index.
pub fn dat_path(index: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{index}.dat"))
}

/// Overwrites `bytes` of the file at `path`, starting at `at`.
pub fn patch(path: &Utf8Path, at: usize, bytes: &[u8]) {
    let mut contents = fs::read(path).unwrap();
    contents[at..at + bytes.len()].copy_from_slice(bytes);
    fs::write(path, contents).unwrap();
}
