use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blobpack")]
#[command(version)]
#[command(about = "Pack named blobs into a single archive file", long_about = None)]
#[command(after_help = "Examples:\n  \
  blobpack -z pack assets.pack *.png      pack images into a compressed archive\n  \
  blobpack -z cat assets.pack logo.png    write one entry to stdout\n  \
  blobpack put data.pack key value.bin    store value.bin under \"key\"")]
pub struct Cli {
    /// Archive file is zlib-compressed
    #[arg(short = 'z', long, global = true)]
    pub compressed: bool,

    /// Verbose listing and debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List entries
    List {
        /// Archive file
        archive: String,
    },

    /// Write one entry's data to stdout
    Cat {
        /// Archive file
        archive: String,
        /// Entry name
        name: String,
    },

    /// Store a file (or stdin) under a name, creating the archive if needed
    Put {
        /// Archive file
        archive: String,
        /// Entry name
        name: String,
        /// Input file (default: stdin)
        file: Option<String>,
    },

    /// Create a new archive from files
    Pack {
        /// Archive file to create
        archive: String,
        /// Files to add
        #[arg(required = true)]
        files: Vec<String>,
        /// Junk paths (store base names only)
        #[arg(short = 'j')]
        junk_paths: bool,
    },

    /// Extract entries to disk
    Extract {
        /// Archive file
        archive: String,
        /// Entries to extract, `*` and `?` allowed (default: all)
        patterns: Vec<String>,
        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR")]
        extract_dir: Option<String>,
        /// Exclude entries that follow
        #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
        exclude: Vec<String>,
        /// Overwrite files WITHOUT prompting
        #[arg(short = 'o')]
        overwrite: bool,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.is_very_quiet() {
            "error"
        } else {
            "warn"
        }
    }
}
