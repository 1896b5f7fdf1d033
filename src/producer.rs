//! C3 — path producer: resolve stdin/manifest/argument mode and enqueue paths
//! in a deterministic order.

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::config::ConfigError;

/// Fixed directory names never descended into, regardless of gitignore state.
const DENY_LIST: &[&str] = &[".git", ".svn", ".hg", "node_modules", "target"];

/// Name of the custom ignore file consulted when `--hashignore` is set.
const HASHIGNORE_FILE: &str = ".hashignore";

pub enum Source {
    /// Read raw bytes from stdin and hash them as a single unnamed input.
    StdinBytes,
    /// Paths listed one per line in a manifest file.
    Manifest(PathBuf),
    /// Paths (files or directories) given as CLI arguments.
    Arguments(Vec<PathBuf>),
}

/// Decide the input mode from the parsed CLI surface. Precedence:
/// stdin-bytes (no positional args and stdin isn't a terminal) > manifest >
/// arguments.
pub fn resolve_source(input: Option<PathBuf>, arguments: Vec<PathBuf>) -> Source {
    if arguments.is_empty() && !io::stdin().is_terminal() {
        return Source::StdinBytes;
    }
    if let Some(manifest) = input {
        return Source::Manifest(manifest);
    }
    Source::Arguments(arguments)
}

/// Produce the ordered list of paths to hash for a resolved `Source`.
/// `StdinBytes` never reaches this function; callers special-case it before
/// invoking the pipeline.
pub fn produce_paths(
    source: &Source,
    recursive: bool,
    gitignore: bool,
    hashignore: bool,
) -> Result<Vec<PathBuf>, ConfigError> {
    match source {
        Source::StdinBytes => Ok(Vec::new()),
        Source::Manifest(path) => read_manifest(path),
        Source::Arguments(paths) => {
            let mut out = Vec::new();
            for path in paths {
                if !path.exists() {
                    return Err(ConfigError::PathNotFound(path.display().to_string()));
                }
                if path.is_dir() {
                    if recursive {
                        out.extend(walk_directory(path, gitignore, hashignore));
                    } else {
                        log::warn!(
                            "{} is a directory, skipping (pass --recursive to descend)",
                            path.display()
                        );
                    }
                } else {
                    out.push(path.clone());
                }
            }
            Ok(out)
        }
    }
}

fn read_manifest(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let file = File::open(path)
        .map_err(|e| ConfigError::Manifest(format!("{}: {e}", path.display())))?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| ConfigError::Manifest(format!("{}: {e}", path.display())))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push(PathBuf::from(trimmed));
    }
    Ok(out)
}

/// Walk `root` deterministically (sorted by file name within each
/// directory), honoring gitignore rules, an optional `.hashignore` file, and
/// the fixed deny-list. Per-entry walk errors are logged and skipped rather
/// than aborting the whole run.
fn walk_directory(root: &Path, gitignore: bool, hashignore: bool) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(gitignore)
        .git_global(gitignore)
        .git_exclude(gitignore)
        .hidden(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    if hashignore {
        builder.add_custom_ignore_filename(HASHIGNORE_FILE);
    }

    builder.filter_entry(|entry| {
        !entry
            .file_name()
            .to_str()
            .map(|name| DENY_LIST.contains(&name))
            .unwrap_or(false)
    });

    let mut out = Vec::new();
    for result in builder.build() {
        match result {
            Ok(entry) => {
                if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                    out.push(entry.into_path());
                }
            }
            Err(err) => log::error!("walk error: {err}"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn manifest_skips_blank_lines() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "a.txt").unwrap();
        writeln!(tmp).unwrap();
        writeln!(tmp, "b.txt").unwrap();
        let paths = read_manifest(tmp.path()).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn walk_directory_is_sorted_and_skips_denylist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.txt"), b"z").unwrap();
        std::fs::write(dir.path().join("alpha.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("ignored"), b"x").unwrap();

        let found = walk_directory(dir.path(), false, false);
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["alpha.txt", "zeta.txt"]);
    }

    #[test]
    fn arguments_mode_reports_missing_path() {
        let result = produce_paths(
            &Source::Arguments(vec![PathBuf::from("/does/not/exist/anywhere")]),
            false,
            false,
            false,
        );
        assert!(matches!(result, Err(ConfigError::PathNotFound(_))));
    }
}
