//! Main entry point for the blobpack CLI application.
//!
//! This binary maps a handful of commands onto the archive store: listing,
//! reading and writing single entries, packing files into a new archive and
//! extracting entries back to disk.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing_subscriber::EnvFilter;

use blobpack::cli::Command;
use blobpack::{ArchiveHandle, ArchiveStore, Cli, RecordEntry, Storage};

/// Application entry point.
///
/// Parses command-line arguments, installs the log subscriber and dispatches
/// to the handler for the chosen command.
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so entry data piped through stdout stays clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = ArchiveStore::new();

    match &cli.command {
        Command::List { archive } => {
            let handle = open(&store, archive, &cli)?;
            list_entries(&store, handle, cli.verbose)
        }
        Command::Cat { archive, name } => {
            let handle = open(&store, archive, &cli)?;
            cat_entry(&store, handle, name)
        }
        Command::Put {
            archive,
            name,
            file,
        } => put_entry(&store, archive, name, file.as_deref(), &cli),
        Command::Pack {
            archive,
            files,
            junk_paths,
        } => pack_files(&store, archive, files, *junk_paths, &cli),
        Command::Extract {
            archive,
            patterns,
            extract_dir,
            exclude,
            overwrite,
        } => {
            let handle = open(&store, archive, &cli)?;
            let options = ExtractOptions {
                patterns,
                exclude,
                extract_dir: extract_dir.as_deref(),
                overwrite: *overwrite,
            };
            extract_entries(&store, handle, &options, &cli)
        }
    }
}

/// Load an existing archive, honouring the `-z` flag.
fn open(store: &ArchiveStore, archive: &str, cli: &Cli) -> Result<ArchiveHandle> {
    store
        .load_from_path(archive, cli.compressed)
        .with_context(|| format!("Failed to open archive {}", archive))
}

/// List entries in the archive.
///
/// Supports two output formats:
/// - Simple format: just entry names, one per line
/// - Verbose format (`-v`): table of data sizes with a total line
fn list_entries(store: &ArchiveStore, handle: ArchiveHandle, verbose: bool) -> Result<()> {
    let entries = store.entries(handle)?;

    if verbose {
        println!("{:>10}  {:>10}  Name", "Length", "Offset");
        println!("{}", "-".repeat(50));
    }

    let mut total = 0u64;
    for entry in &entries {
        if verbose {
            println!(
                "{:>10}  {:>10}  {}",
                entry.data_len, entry.data_offset, entry.name
            );
            total += entry.data_len as u64;
        } else {
            println!("{}", entry.name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(50));
        println!(
            "{:>10}  {:>10}  {} entries ({})",
            total,
            "",
            entries.len(),
            format_size(total)
        );
    }

    Ok(())
}

/// Write one entry's data to stdout.
fn cat_entry(store: &ArchiveStore, handle: ArchiveHandle, name: &str) -> Result<()> {
    let Some(data) = store.get(handle, name)? else {
        bail!("Entry not found: {}", name);
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

/// Store a file (or stdin) under `name` and save the archive.
///
/// A missing archive file is treated as an empty archive.
fn put_entry(
    store: &ArchiveStore,
    archive: &str,
    name: &str,
    file: Option<&str>,
    cli: &Cli,
) -> Result<()> {
    let handle = match store.load_from_path(archive, cli.compressed) {
        Ok(handle) => handle,
        Err(e) if e.io_kind() == Some(std::io::ErrorKind::NotFound) => {
            store.create_from_bytes(&[], false)?
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to open archive {}", archive)),
    };

    let data = match file {
        Some(path) => store.storage().read_all(Path::new(path))?,
        None => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            data
        }
    };

    let replaced = store.put(handle, name, &data)?;
    if !cli.is_quiet() {
        let verb = if replaced { "replaced" } else { "added" };
        println!("  {}: {} ({})", verb, name, format_size(data.len() as u64));
    }
    store.save_to_path(handle, archive, cli.compressed)?;

    Ok(())
}

/// Create a new archive from a list of files.
///
/// With `junk_paths` entries are named after the file's base name;
/// otherwise the path is stored as given. Later files with the same entry
/// name replace earlier ones.
fn pack_files(
    store: &ArchiveStore,
    archive: &str,
    files: &[String],
    junk_paths: bool,
    cli: &Cli,
) -> Result<()> {
    let handle = store.create_from_bytes(&[], false)?;

    for file in files {
        let path = Path::new(file);
        let name = if junk_paths {
            path.file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| file.clone())
        } else {
            file.clone()
        };

        let data = store
            .storage()
            .read_all(path)
            .with_context(|| format!("Failed to read {}", file))?;

        if !cli.is_quiet() {
            println!("  adding: {} ({})", name, format_size(data.len() as u64));
        }
        store.put(handle, &name, &data)?;
    }

    store.save_to_path(handle, archive, cli.compressed)?;
    Ok(())
}

/// Selection and placement options for `extract`.
struct ExtractOptions<'a> {
    patterns: &'a [String],
    exclude: &'a [String],
    extract_dir: Option<&'a str>,
    overwrite: bool,
}

/// Extract entries matching the options to disk.
///
/// Each record is written from its own data, so repeated names are
/// extracted in archive order. Entries whose names are not UTF-8 or would
/// escape the output directory are skipped. Existing files are kept unless
/// `-o` is given.
fn extract_entries(
    store: &ArchiveStore,
    handle: ArchiveHandle,
    options: &ExtractOptions<'_>,
    cli: &Cli,
) -> Result<()> {
    let records = store.entries_with_data(handle)?;
    let base = PathBuf::from(options.extract_dir.unwrap_or("."));

    for (entry, data) in records.iter().filter(|(e, _)| is_selected(e, options)) {
        if !entry.has_utf8_name() {
            eprintln!("Skipping: {} (name is not valid UTF-8)", entry.name);
            continue;
        }
        if !is_safe_name(&entry.name) {
            eprintln!("Skipping: {} (unsafe path)", entry.name);
            continue;
        }

        let output_path = base.join(&entry.name);
        if output_path.exists() && !options.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
            }
            continue;
        }

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", entry.name);
        }
        store.storage().write_all(&output_path, data)?;
    }

    Ok(())
}

/// Apply the positional patterns and `-x` exclusions to one entry.
fn is_selected(entry: &RecordEntry, options: &ExtractOptions<'_>) -> bool {
    if !options.patterns.is_empty() {
        let matches = options.patterns.iter().any(|p| {
            if has_glob_chars(p) {
                glob_match(p, &entry.name)
            } else {
                entry.name == *p
            }
        });
        if !matches {
            return false;
        }
    }

    !options
        .exclude
        .iter()
        .any(|x| entry.name.contains(x.as_str()) || glob_match(x, &entry.name))
}

/// Reject empty, absolute and `..`-containing entry names.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// # Examples
///
/// ```ignore
/// assert!(glob_match("*.txt", "readme.txt"));
/// assert!(glob_match("file?.dat", "file1.dat"));
/// assert!(!glob_match("*.txt", "readme.md"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star: skip it, or consume one character and keep it
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
