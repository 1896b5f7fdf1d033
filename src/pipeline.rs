//! C4 — pipeline orchestrator: bounded path/result queues and a worker pool.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::Config;
use crate::hasher::{self, HashOptions};
use crate::producer::{self, Source};
use crate::record::HashRecord;
use crate::registry::EnabledSet;

const PATH_QUEUE_CAPACITY: usize = 1000;
const RESULT_QUEUE_CAPACITY: usize = 1000;

/// Run the full pipeline for a resolved `Config` and return every record
/// produced, in the order workers happened to finish (unordered by design —
/// formatters needing a stable order re-sort by path, as `text`/`hashdeep`
/// already do by iterating `BTreeMap`-backed structures). Thin wrapper over
/// `run_streaming` for callers that need the full set at once, e.g. audit
/// mode's two-phase reconciliation.
pub fn run(config: &Config) -> Result<Vec<HashRecord>, crate::config::ConfigError> {
    let mut records = Vec::new();
    run_streaming(config, |record| records.push(record))?;
    Ok(records)
}

/// Run the full pipeline, handing each record to `sink` as it arrives
/// (worker-completion order) rather than materializing the whole result set.
/// This is what lets a streaming formatter start writing to stdout before
/// the last file has even been read, and lets channel back-pressure reach
/// all the way back to the producer when the sink is slow.
pub fn run_streaming(
    config: &Config,
    mut sink: impl FnMut(HashRecord),
) -> Result<(), crate::config::ConfigError> {
    // Zero positional arguments with a terminal stdin default to `["."]`
    // with recursion implicitly on; a single argument also enables
    // recursion. This only applies in argument mode — a manifest or a
    // non-terminal stdin (stdin-bytes mode) is unaffected.
    let mut effective_paths = config.paths.clone();
    let mut recursive = config.recursive;
    if config.input.is_none() && effective_paths.is_empty() && std::io::stdin().is_terminal() {
        effective_paths.push(std::path::PathBuf::from("."));
        recursive = true;
    }
    if effective_paths.len() == 1 {
        recursive = true;
    }

    let source = producer::resolve_source(config.input.clone(), effective_paths);

    if let Source::StdinBytes = source {
        sink(hash_stdin(&config.enabled, config.capture_mtime));
        return Ok(());
    }

    let paths = producer::produce_paths(&source, recursive, config.gitignore, config.hashignore)?;

    let worker_count = config
        .threads
        .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

    let (path_tx, path_rx): (Sender<PathBuf>, Receiver<PathBuf>) = bounded(PATH_QUEUE_CAPACITY);
    let (result_tx, result_rx): (Sender<HashRecord>, Receiver<HashRecord>) =
        bounded(RESULT_QUEUE_CAPACITY);

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let path_rx = path_rx.clone();
        let result_tx = result_tx.clone();
        let enabled = config.enabled.clone();
        let options = HashOptions {
            capture_mtime: config.capture_mtime,
        };
        let stream_size = config.stream_size;
        workers.push(thread::spawn(move || {
            for path in path_rx {
                let outcome: anyhow::Result<HashRecord> =
                    hasher::hash_path(&path, &enabled, options, stream_size)
                        .with_context(|| format!("hashing {}", path.display()));
                match outcome {
                    Ok(record) => {
                        let _ = result_tx.send(record);
                    }
                    // Per-file failures are diagnostics, not propagated errors:
                    // the anyhow context is logged and the file is skipped.
                    Err(err) => log::error!("{err:#}"),
                }
            }
        }));
    }
    drop(result_tx);
    drop(path_rx);

    let feeder = thread::spawn(move || {
        for path in paths {
            if path_tx.send(path).is_err() {
                break;
            }
        }
    });

    for record in result_rx {
        sink(record);
    }

    let _ = feeder.join();
    for worker in workers {
        let _ = worker.join();
    }

    Ok(())
}

/// Stdin-bytes mode: hash the raw stream as one unnamed input (`file =
/// "stdin"`, per the data model's stdin-bytes contract).
fn hash_stdin(enabled: &EnabledSet, capture_mtime: bool) -> HashRecord {
    let mut buf = Vec::new();
    if let Err(err) = std::io::stdin().lock().read_to_end(&mut buf) {
        log::error!("stdin: {err}");
    }
    let mtime = if capture_mtime {
        Some(chrono::Utc::now())
    } else {
        None
    };
    let mut record = HashRecord::new("stdin".to_string(), buf.len() as u64, mtime);
    hasher::hash_bytes(&buf, enabled, &mut record);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AlgorithmId;

    #[test]
    fn single_directory_argument_implies_recursive_descent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();

        let mut config = crate::config::Cli {
            paths: vec![dir.path().to_path_buf()],
            hash: vec!["md5".to_string()],
            format: "text".to_string(),
            recursive: false,
            output: None,
            no_stream: false,
            stream_size: crate::hasher::DEFAULT_STREAM_SIZE,
            threads: Some(1),
            input: None,
            mtime: false,
            audit_file: None,
            gitignore: false,
            hashignore: false,
            verbose: 0,
            list_hashes: false,
        }
        .into_config()
        .unwrap();
        config.threads = Some(1);

        let mut records = Vec::new();
        run_streaming(&config, |r| records.push(r)).unwrap();
        assert_eq!(records.len(), 2, "single directory arg should recurse");
    }

    #[test]
    fn hash_bytes_produces_canonical_empty_digest() {
        // hash_stdin reads the real process stdin; exercise hash_bytes
        // directly so the test doesn't depend on the test runner's stdin.
        let enabled = EnabledSet::normalize(&["md5".to_string()]);
        let mut record = HashRecord::new("stdin".to_string(), 0, None);
        hasher::hash_bytes(&[], &enabled, &mut record);
        assert_eq!(
            record.digest(AlgorithmId::Md5),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
    }
}
