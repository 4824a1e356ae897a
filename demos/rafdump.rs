use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::*;
use log::*;
use regex::Regex;
use structopt::*;

use raf::*;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "rafdump",
    about = "Lists or extracts the contents of RAF archives"
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Treat the given path as a whole versioned root
    /// (directories of archives, newest version of each file winning)
    /// instead of a single .raf index.
    #[structopt(short, long)]
    root: bool,

    /// Only touch entries whose (lower-cased) path matches this
    /// regular expression. Defaults to everything.
    #[structopt(short, long)]
    pattern: Option<String>,

    /// Extract matching entries into the given directory instead of
    /// listing them. Existing files are overwritten.
    #[structopt(short, long)]
    out: Option<PathBuf>,

    #[structopt(name(".raf index (or versioned root)"))]
    path: String,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    let pattern = Regex::new(args.pattern.as_deref().unwrap_or(""))
        .context("Couldn't parse the pattern")?;

    if args.root {
        let overlay = RafOverlay::open(&args.path).context("Couldn't open versioned root")?;
        info!(
            "{}: {} archives merged",
            &args.path,
            overlay.archives().len()
        );
        dump(overlay.find_matching(&pattern), args.out.as_deref())
    } else {
        let archive = RafArchive::open(&args.path).context("Couldn't open archive")?;
        info!(
            "{}: {} entries, data in {}",
            archive.path(),
            archive.entries_by_path().len(),
            archive.data_path()
        );
        dump(archive.find_matching(&pattern), args.out.as_deref())
    }
}

fn dump<'a>(
    entries: impl Iterator<Item = &'a Arc<RafEntry>>,
    out: Option<&Path>,
) -> Result<()> {
    match out {
        None => {
            for entry in entries {
                println!("{}", entry.path());
            }
        }
        Some(out) => {
            for entry in entries {
                let target = out.join(entry.path().as_str());
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Couldn't create directory {}", parent.display())
                    })?;
                }
                debug!("Writing {}", target.display());
                let contents = entry.read()?;
                fs::write(&target, contents)
                    .with_context(|| format!("Couldn't write {}", target.display()))?;
            }
        }
    }
    Ok(())
}
