//! C0 — CLI surface and the immutable `Config` it resolves into.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::format::Format;
use crate::hasher::DEFAULT_STREAM_SIZE;
use crate::registry::EnabledSet;

/// `hashit` argv surface. One struct for the single binary, mirroring the
/// teacher's per-binary `#[derive(Parser)] struct Cli` pattern.
#[derive(Parser, Debug)]
#[command(name = "hashit", version, about = "Concurrent multi-digest file hashing engine with a hashdeep/SQLite audit mode")]
pub struct Cli {
    /// Files or directories to hash. Ignored when `--input` or stdin-bytes
    /// mode applies.
    pub paths: Vec<PathBuf>,

    /// Comma-separated algorithm ids, or `all`. Default: md5,sha1,sha256,sha512.
    #[arg(long, value_delimiter = ',')]
    pub hash: Vec<String>,

    /// Output format: text, sum, hashonly, hashdeep, json, sqlite.
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Descend into directories.
    #[arg(short, long)]
    pub recursive: bool,

    /// Write formatted output to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable incremental/streamed output even when the format supports it.
    #[arg(long)]
    pub no_stream: bool,

    /// Files at or below this size (bytes) use the in-memory strategy.
    #[arg(long, default_value_t = DEFAULT_STREAM_SIZE)]
    pub stream_size: u64,

    /// Worker thread count. Defaults to available parallelism.
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Read newline-delimited paths from this manifest file.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Capture and record file modification times.
    #[arg(long)]
    pub mtime: bool,

    /// Reconcile the current run against a previously recorded corpus
    /// (hashdeep text or SQLite) instead of just emitting results.
    #[arg(long)]
    pub audit_file: Option<PathBuf>,

    /// Honor .gitignore/.git/info/exclude during directory descent.
    #[arg(long)]
    pub gitignore: bool,

    /// Honor .hashignore files during directory descent.
    #[arg(long)]
    pub hashignore: bool,

    /// Increase log verbosity. Repeatable: -v=VERBOSE, -vv=DEBUG, -vvv=TRACE.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the registry of supported algorithm ids and exit.
    #[arg(long)]
    pub list_hashes: bool,
}

/// Immutable, process-wide configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Vec<PathBuf>,
    pub enabled: EnabledSet,
    pub format: Format,
    pub recursive: bool,
    pub output: Option<PathBuf>,
    pub no_stream: bool,
    pub stream_size: u64,
    pub threads: Option<usize>,
    pub input: Option<PathBuf>,
    pub capture_mtime: bool,
    pub audit_file: Option<PathBuf>,
    pub gitignore: bool,
    pub hashignore: bool,
    pub verbosity: u8,
    pub list_hashes: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("manifest error: {0}")]
    Manifest(String),
    #[error("audit corpus load error: {0}")]
    CorpusLoad(String),
    #[error("output write error: {0}")]
    OutputWrite(String),
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let format = Format::parse(&self.format)
            .ok_or_else(|| ConfigError::UnknownFormat(self.format.clone()))?;

        let enabled = if self.hash.is_empty() {
            EnabledSet::default_selection()
        } else {
            EnabledSet::normalize(&self.hash)
        };

        Ok(Config {
            paths: self.paths,
            enabled,
            format,
            recursive: self.recursive,
            output: self.output,
            no_stream: self.no_stream,
            stream_size: self.stream_size,
            threads: self.threads,
            input: self.input,
            capture_mtime: self.mtime,
            audit_file: self.audit_file,
            gitignore: self.gitignore,
            hashignore: self.hashignore,
            verbosity: self.verbose,
            list_hashes: self.list_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            paths: vec![],
            hash: vec![],
            format: "text".to_string(),
            recursive: false,
            output: None,
            no_stream: false,
            stream_size: DEFAULT_STREAM_SIZE,
            threads: None,
            input: None,
            mtime: false,
            audit_file: None,
            gitignore: false,
            hashignore: false,
            verbose: 0,
            list_hashes: false,
        }
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut cli = base_cli();
        cli.format = "yaml".to_string();
        assert!(matches!(
            cli.into_config(),
            Err(ConfigError::UnknownFormat(_))
        ));
    }

    #[test]
    fn default_hash_selection_applies_when_unset() {
        let config = base_cli().into_config().unwrap();
        assert_eq!(config.enabled.len(), 4);
    }
}
