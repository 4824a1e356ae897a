//! raf reads the RAF archives a League of Legends install keeps its
//! game assets in, using a simple API:
//!
//! ```no_run
//! # use raf::*;
//! let archive = RafArchive::open("Archive_184190283.raf")?;
//! let minimap = archive.read(Query::path("LEVELS/Map1/Scene/2x_minimap.dds"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! An archive is a pair of files: a small binary index (`foo.raf`)
//! listing every path, and a data file next to it (`foo.raf.dat`)
//! holding one zlib stream per file. The index is parsed and checked
//! up front; payloads are only read and inflated when asked for,
//! then cached, so opening a multi-gigabyte install costs almost
//! nothing until you want actual bytes.
//!
//! Installs hold one archive per release, in directories named for the
//! release's version. Opening the whole root merges them, newest
//! version of each path winning:
//!
//! ```no_run
//! # use raf::*;
//! # use regex::Regex;
//! let overlay = RafOverlay::open("filearchives")?;
//!
//! // The newest Annie, whichever release last touched her:
//! let annie = overlay.read(Query::name("Annie.skn"))?;
//!
//! // Or walk everything matching a pattern.
//! // Paths are matched lower-cased; lookups here aren't case-sensitive.
//! let particles = Regex::new(r"^data/particles/")?;
//! for entry in overlay.find_matching(&particles) {
//!     println!("{}: {} compressed bytes", entry.path(), entry.compressed_size());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod overlay;
pub mod read;
pub mod result;

pub use overlay::{RafOverlay, Version};
pub use read::{Query, RafArchive, RafEntry};

mod data;
mod spec;
