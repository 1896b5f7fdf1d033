//! C2 — per-file hashing: pick a strategy by size, drive the enabled digesters,
//! produce a `HashRecord`.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use memmap2::Mmap;
use rayon::prelude::*;

use crate::hexutil::hex_encode;
use crate::record::HashRecord;
use crate::registry::{new_digester, AlgorithmId, Digester, EnabledSet};

/// Files at or below this size use the in-memory strategy; above it they're
/// streamed. Configurable via `Config::stream_size` / `--stream-size`.
pub const DEFAULT_STREAM_SIZE: u64 = 1_000_000;

/// Within the in-memory strategy, reads below this size skip mmap and use a
/// plain `read_to_end`; at or above it the file is memory-mapped. Mirrors the
/// threshold the teacher used for choosing between `read` and `mmap`.
const MMAP_THRESHOLD: u64 = 64 * 1024;

/// Above this size with more than one digest enabled (and `all` not
/// selected), the in-memory strategy fans the buffer out across digesters
/// with rayon instead of looping sequentially.
const PARALLEL_FANOUT_THRESHOLD: u64 = 200_000;

/// Streaming reads happen in fixed 4 MiB chunks, each a fresh `Arc<[u8]>`
/// handed to every absorber so no absorber ever blocks the reader from
/// moving on to the next chunk, and no absorber can observe a buffer being
/// reused out from under it.
const STREAM_CHUNK_SIZE: usize = 4 * 1024 * 1024;
const ABSORBER_QUEUE_CAPACITY: usize = 10;

/// Whether mtime should be captured for this run (set once from `Config`).
#[derive(Debug, Clone, Copy)]
pub struct HashOptions {
    pub capture_mtime: bool,
}

/// Hash a file on disk, choosing strategy by its size against `stream_size`.
pub fn hash_path(
    path: &Path,
    enabled: &EnabledSet,
    options: HashOptions,
    stream_size: u64,
) -> std::io::Result<HashRecord> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;
    let bytes = metadata.len();
    // A stat failure here must abort this file the same way an open/read
    // failure does (`?` propagates to the caller, which logs and skips) —
    // the spec forbids emitting a Result with an unknown mtime when mtime
    // capture is enabled.
    let mtime = if options.capture_mtime {
        Some(chrono::DateTime::<chrono::Utc>::from(metadata.modified()?))
    } else {
        None
    };

    let mut record = HashRecord::new(path.display().to_string(), bytes, mtime);

    if enabled.is_empty() {
        return Ok(record);
    }

    if bytes > stream_size {
        hash_streaming(file, enabled, &mut record)?;
        return Ok(record);
    }

    if bytes >= MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file)? };
        hash_in_memory(&mmap, enabled, &mut record);
    } else {
        let mut buf = Vec::with_capacity(bytes as usize);
        file.read_to_end(&mut buf)?;
        hash_in_memory(&buf, enabled, &mut record);
    }
    Ok(record)
}

/// Hash bytes already read from stdin (stdin-bytes mode never mmaps).
pub fn hash_bytes(data: &[u8], enabled: &EnabledSet, record: &mut HashRecord) {
    hash_in_memory(data, enabled, record);
}

fn hash_in_memory(data: &[u8], enabled: &EnabledSet, record: &mut HashRecord) {
    let use_parallel = data.len() as u64 > PARALLEL_FANOUT_THRESHOLD
        && enabled.len() > 1
        && !enabled.selected_all();

    let ids: Vec<AlgorithmId> = enabled.iter().collect();

    let results: Vec<(AlgorithmId, String)> = if use_parallel {
        ids.par_iter()
            .map(|&id| {
                let mut digester = new_digester(id);
                digester.update(data);
                (id, hex_encode(&digester.finalize()))
            })
            .collect()
    } else {
        ids.iter()
            .map(|&id| {
                let mut digester = new_digester(id);
                digester.update(data);
                (id, hex_encode(&digester.finalize()))
            })
            .collect()
    };

    for (id, hex) in results {
        record.digests.insert(id, hex);
    }
}

/// Stream the file in fixed-size chunks, fanning each chunk out to one
/// long-lived absorber thread per enabled algorithm over a bounded channel.
/// The reader never waits for an absorber to finish with a chunk before
/// reading the next one beyond the channel's own backpressure, and every
/// chunk is a fresh allocation so no absorber ever observes a buffer being
/// mutated underneath it.
fn hash_streaming(
    mut file: File,
    enabled: &EnabledSet,
    record: &mut HashRecord,
) -> std::io::Result<()> {
    let ids: Vec<AlgorithmId> = enabled.iter().collect();

    let mut senders = Vec::with_capacity(ids.len());
    let mut handles = Vec::with_capacity(ids.len());

    for id in &ids {
        let (tx, rx) = bounded::<Arc<[u8]>>(ABSORBER_QUEUE_CAPACITY);
        senders.push(tx);
        let id = *id;
        handles.push(thread::spawn(move || {
            let mut digester = new_digester(id);
            for chunk in rx {
                digester.update(&chunk);
            }
            (id, hex_encode(&digester.finalize()))
        }));
    }

    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        let chunk: Arc<[u8]> = Arc::from(&buf[..read]);
        for tx in &senders {
            // An absorber thread only ever exits early on its own panic;
            // a send error here would mean one already died.
            let _ = tx.send(Arc::clone(&chunk));
        }
    }
    drop(senders);

    for handle in handles {
        if let Ok((id, hex)) = handle.join() {
            record.digests.insert(id, hex);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn hash_path_below_threshold_matches_in_memory() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let enabled = EnabledSet::normalize(&["sha256".to_string()]);
        let record = hash_path(
            tmp.path(),
            &enabled,
            HashOptions { capture_mtime: false },
            DEFAULT_STREAM_SIZE,
        )
        .unwrap();
        assert_eq!(record.bytes, 11);
        assert!(record.digest(AlgorithmId::Sha256).is_some());
    }

    #[test]
    fn hash_path_streaming_matches_in_memory_digest() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data = vec![0x42u8; STREAM_CHUNK_SIZE * 5 + 17];
        tmp.write_all(&data).unwrap();
        let enabled = EnabledSet::normalize(&["sha256".to_string()]);
        let record = hash_path(
            tmp.path(),
            &enabled,
            HashOptions { capture_mtime: false },
            1_000_000,
        )
        .unwrap();

        let mut expected = HashRecord::new("x".to_string(), 0, None);
        hash_in_memory(&data, &enabled, &mut expected);

        assert_eq!(
            record.digest(AlgorithmId::Sha256),
            expected.digest(AlgorithmId::Sha256)
        );
    }

    #[test]
    fn empty_file_produces_canonical_digests() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let enabled = EnabledSet::normalize(&["md5".to_string()]);
        let record = hash_path(
            tmp.path(),
            &enabled,
            HashOptions { capture_mtime: false },
            DEFAULT_STREAM_SIZE,
        )
        .unwrap();
        assert_eq!(
            record.digest(AlgorithmId::Md5),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
    }

    #[test]
    fn mtime_capture_populates_record_when_stat_succeeds() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();
        let enabled = EnabledSet::normalize(&["md5".to_string()]);
        let record = hash_path(
            tmp.path(),
            &enabled,
            HashOptions { capture_mtime: true },
            DEFAULT_STREAM_SIZE,
        )
        .unwrap();
        assert!(record.mtime.is_some());
    }
}
