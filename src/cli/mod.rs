use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    /// Path to the hive spec file
    #[arg(short, long)]
    file: PathBuf,
}

impl Cli {
    /// Parses command line arguments. Exits non-zero on invalid or missing
    /// arguments.
    pub fn init_hive_cli() -> Self {
        Self::parse()
    }

    pub fn spec_path(&self) -> &Path {
        &self.file
    }
}
