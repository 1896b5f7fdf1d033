//! Audit mode: reconcile a hashing run against a previously recorded corpus.
//!
//! Two-phase algorithm: phase one classifies every incoming record as soon
//! as it arrives (`Matched`/`Modified(reason)` on a path hit, else deferred
//! as a move-detection `candidate`); phase two, after every record has been
//! seen, computes the corpus paths nobody hit (`Missing`) and resolves
//! candidates into `Moved`/`New` against what's left of that set.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use rusqlite::Connection;

use crate::config::ConfigError;
use crate::record::HashRecord;
use crate::registry::AlgorithmId;

#[derive(Debug, Clone)]
pub struct CorpusRecord {
    pub path: String,
    pub bytes: u64,
    pub digests: BTreeMap<AlgorithmId, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matched,
    /// Carries the name of the first field that failed to compare: `"bytes"`,
    /// an algorithm id (e.g. `"sha256"`), or `"no common hashes/size"` when
    /// no field was comparable at all.
    Modified(String),
    New,
    Moved { from: String },
    Missing,
}

/// Abstracts over the two on-disk corpus representations.
pub trait CorpusSource {
    fn lookup_by_path(&self, path: &str) -> Option<CorpusRecord>;
    /// All corpus records whose sha256 equals `digest`, for move detection.
    fn lookup_by_digest(&self, digest: &str) -> Vec<CorpusRecord>;
    /// Every known path not present in `seen`.
    fn missing_paths_after(&self, seen: &HashSet<String>) -> Vec<String>;
}

/// First 16 bytes of a SQLite database file.
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Load a corpus, sniffing its format from the first 16 bytes of the file.
pub fn load_corpus(path: &Path) -> Result<Box<dyn CorpusSource>, ConfigError> {
    let mut header = [0u8; 16];
    let mut file = File::open(path)
        .map_err(|e| ConfigError::CorpusLoad(format!("{}: {e}", path.display())))?;
    let read = file
        .read(&mut header)
        .map_err(|e| ConfigError::CorpusLoad(format!("{}: {e}", path.display())))?;

    if read == 16 && header == *SQLITE_MAGIC {
        Ok(Box::new(SqliteCorpus::open(path)?))
    } else {
        Ok(Box::new(HashdeepCorpus::parse_file(path)?))
    }
}

/// In-memory corpus parsed from a hashdeep-format text file.
pub struct HashdeepCorpus {
    by_path: BTreeMap<String, CorpusRecord>,
    by_sha256: BTreeMap<String, Vec<String>>,
}

impl HashdeepCorpus {
    pub fn parse_file(path: &Path) -> Result<HashdeepCorpus, ConfigError> {
        let file = File::open(path)
            .map_err(|e| ConfigError::CorpusLoad(format!("{}: {e}", path.display())))?;
        Self::parse_reader(BufReader::new(file))
    }

    fn parse_reader(reader: impl BufRead) -> Result<HashdeepCorpus, ConfigError> {
        let mut header: Vec<String> = Vec::new();
        let mut csv_started = false;
        let mut by_path = BTreeMap::new();
        let mut by_sha256: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for line in reader.lines() {
            let line = line.map_err(|e| ConfigError::CorpusLoad(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('%') {
                let rest = rest.trim_start_matches('%').trim();
                if rest.contains("size") {
                    header = rest.split(',').map(|s| s.trim().to_string()).collect();
                    csv_started = true;
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if !csv_started {
                continue;
            }

            let fields: Vec<&str> = line.split(',').collect();
            let mut record = CorpusRecord {
                path: String::new(),
                bytes: 0,
                digests: BTreeMap::new(),
            };
            for (i, col) in header.iter().enumerate() {
                let Some(value) = fields.get(i) else { break };
                match col.as_str() {
                    "size" => record.bytes = value.parse().unwrap_or(0),
                    "filename" => record.path = value.to_string(),
                    "md5" => {
                        record.digests.insert(AlgorithmId::Md5, value.to_string());
                    }
                    "sha256" => {
                        record
                            .digests
                            .insert(AlgorithmId::Sha256, value.to_string());
                    }
                    _ => {}
                }
            }
            if let Some(sha256) = record.digests.get(&AlgorithmId::Sha256) {
                by_sha256
                    .entry(sha256.clone())
                    .or_default()
                    .push(record.path.clone());
            }
            by_path.insert(record.path.clone(), record);
        }

        Ok(HashdeepCorpus { by_path, by_sha256 })
    }
}

impl CorpusSource for HashdeepCorpus {
    fn lookup_by_path(&self, path: &str) -> Option<CorpusRecord> {
        self.by_path.get(path).cloned()
    }

    fn lookup_by_digest(&self, digest: &str) -> Vec<CorpusRecord> {
        self.by_sha256
            .get(digest)
            .into_iter()
            .flatten()
            .filter_map(|path| self.by_path.get(path).cloned())
            .collect()
    }

    fn missing_paths_after(&self, seen: &HashSet<String>) -> Vec<String> {
        self.by_path
            .keys()
            .filter(|path| !seen.contains(*path))
            .cloned()
            .collect()
    }
}

/// `rusqlite`-backed corpus, paginated 1,000 rows per scan so
/// `missing_paths_after` never needs the full path set resident twice.
pub struct SqliteCorpus {
    conn: Connection,
}

const PAGE_SIZE: i64 = 1000;

impl SqliteCorpus {
    pub fn open(path: &Path) -> Result<SqliteCorpus, ConfigError> {
        let conn = Connection::open(path)
            .map_err(|e| ConfigError::CorpusLoad(format!("{}: {e}", path.display())))?;
        Ok(SqliteCorpus { conn })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CorpusRecord> {
        let path: String = row.get("filepath")?;
        let bytes: i64 = row.get("size")?;
        let mut digests = BTreeMap::new();
        for id in AlgorithmId::ALL {
            let column = sqlite_column_name(id);
            if let Ok(Some(hex)) = row.get::<_, Option<String>>(column) {
                digests.insert(id, hex);
            }
        }
        Ok(CorpusRecord {
            path,
            bytes: bytes as u64,
            digests,
        })
    }
}

impl CorpusSource for SqliteCorpus {
    fn lookup_by_path(&self, path: &str) -> Option<CorpusRecord> {
        self.conn
            .query_row(
                "SELECT * FROM file_hashes WHERE filepath = ?1",
                [path],
                Self::row_to_record,
            )
            .ok()
    }

    fn lookup_by_digest(&self, digest: &str) -> Vec<CorpusRecord> {
        let mut stmt = match self
            .conn
            .prepare("SELECT * FROM file_hashes WHERE sha256 = ?1")
        {
            Ok(stmt) => stmt,
            Err(_) => return Vec::new(),
        };
        stmt.query_map([digest], Self::row_to_record)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    fn missing_paths_after(&self, seen: &HashSet<String>) -> Vec<String> {
        let mut missing = Vec::new();
        let mut offset: i64 = 0;
        loop {
            let mut stmt = match self
                .conn
                .prepare("SELECT filepath FROM file_hashes LIMIT ?1 OFFSET ?2")
            {
                Ok(stmt) => stmt,
                Err(_) => break,
            };
            let rows: Vec<String> = match stmt.query_map([PAGE_SIZE, offset], |row| row.get(0)) {
                Ok(rows) => rows.filter_map(Result::ok).collect(),
                Err(_) => break,
            };
            if rows.is_empty() {
                break;
            }
            let page_len = rows.len();
            missing.extend(rows.into_iter().filter(|path| !seen.contains(path)));
            if (page_len as i64) < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        missing
    }
}

fn sqlite_column_name(id: AlgorithmId) -> &'static str {
    match id {
        AlgorithmId::Crc32 => "crc32",
        AlgorithmId::XxHash64 => "xxhash64",
        AlgorithmId::Md4 => "md4",
        AlgorithmId::Md5 => "md5",
        AlgorithmId::Sha1 => "sha1",
        AlgorithmId::Sha256 => "sha256",
        AlgorithmId::Sha512 => "sha512",
        AlgorithmId::Blake2b256 => "blake2b256",
        AlgorithmId::Blake2b512 => "blake2b512",
        AlgorithmId::Blake3 => "blake3",
        AlgorithmId::Sha3_224 => "sha3_224",
        AlgorithmId::Sha3_256 => "sha3_256",
        AlgorithmId::Sha3_384 => "sha3_384",
        AlgorithmId::Sha3_512 => "sha3_512",
        AlgorithmId::Ed2k => "ed2k",
    }
}

/// DDL for a freshly created `sqlite`-format output/corpus database.
pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS file_hashes (
    filepath TEXT PRIMARY KEY,
    size INTEGER NOT NULL,
    mtime TEXT,
    crc32 TEXT,
    xxhash64 TEXT,
    md4 TEXT,
    md5 TEXT,
    sha1 TEXT,
    sha256 TEXT,
    sha512 TEXT,
    blake2b256 TEXT,
    blake2b512 TEXT,
    blake3 TEXT,
    sha3_224 TEXT,
    sha3_256 TEXT,
    sha3_384 TEXT,
    sha3_512 TEXT,
    ed2k TEXT
)
"#;

/// Open (or create) a `sqlite`-format output database with the pragmas the
/// spec calls for: WAL journaling, relaxed synchronous durability, and a
/// 5 second busy timeout so concurrent writers back off instead of erroring.
pub fn open_output_db(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;
    conn.execute(SQLITE_SCHEMA, [])?;
    Ok(conn)
}

pub fn checkpoint_and_close(conn: Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA wal_checkpoint(TRUNCATE)", [])?;
    Ok(())
}

/// Aggregate outcome of one audit run.
#[derive(Debug, Default, Clone)]
pub struct AuditReport {
    pub examined: usize,
    pub known: usize,
    pub matched: usize,
    pub modified: usize,
    pub moved: usize,
    pub new: usize,
    pub missing: usize,
}

impl AuditReport {
    pub fn passed(&self) -> bool {
        self.modified == 0 && self.new == 0 && self.missing == 0
    }
}

/// Run the full two-phase reconciliation over `records` against `corpus`.
/// Move detection keys on sha256 and prefers the first corpus match whose
/// path is still in the missing set after phase one; a path-hit
/// modification always takes precedence over move detection, since
/// candidates are only ever built from path misses. Returns one
/// `(path, Verdict)` pair per examined record plus one per path left in
/// `missing`, so a caller can report every file by name, not just the
/// aggregate counts.
pub fn reconcile(
    records: &[HashRecord],
    corpus: &dyn CorpusSource,
) -> (Vec<(String, Verdict)>, AuditReport) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut verdicts: Vec<Verdict> = Vec::with_capacity(records.len());
    let mut candidates: Vec<(usize, &HashRecord)> = Vec::new();
    let mut report = AuditReport {
        examined: records.len(),
        ..Default::default()
    };

    for (i, record) in records.iter().enumerate() {
        seen.insert(record.path.clone());
        match corpus.lookup_by_path(&record.path) {
            Some(known) => match compare_record(record, &known) {
                Ok(()) => {
                    verdicts.push(Verdict::Matched);
                    report.matched += 1;
                }
                Err(reason) => {
                    verdicts.push(Verdict::Modified(reason));
                    report.modified += 1;
                }
            },
            None => {
                // Placeholder resolved in phase two.
                verdicts.push(Verdict::New);
                candidates.push((i, record));
            }
        }
    }

    let mut missing: HashSet<String> = corpus.missing_paths_after(&seen).into_iter().collect();
    report.known = report.matched + report.modified + missing.len();

    for (i, record) in candidates {
        let Some(sha256) = record.digest(AlgorithmId::Sha256) else {
            report.new += 1;
            continue;
        };
        let moved_from = corpus
            .lookup_by_digest(sha256)
            .into_iter()
            .find(|candidate| missing.contains(&candidate.path));

        match moved_from {
            Some(source) => {
                missing.remove(&source.path);
                verdicts[i] = Verdict::Moved { from: source.path };
                report.moved += 1;
            }
            None => {
                report.new += 1;
            }
        }
    }

    report.missing = missing.len();

    let mut paired: Vec<(String, Verdict)> = records
        .iter()
        .map(|record| record.path.clone())
        .zip(verdicts)
        .collect();
    for path in missing {
        paired.push((path, Verdict::Missing));
    }

    (paired, report)
}

/// Compares a live record against its corpus counterpart. Returns `Ok(())`
/// when every comparable field agreed, or `Err(field)` naming the first
/// field that diverged (`"bytes"` or an algorithm id) per the spec's
/// "Modified with the first failing field named" rule. If no field was
/// comparable at all, returns `Err("no common hashes/size")`.
fn compare_record(record: &HashRecord, known: &CorpusRecord) -> Result<(), String> {
    let mut comparable = true; // bytes is always present on both sides
    if record.bytes != known.bytes {
        return Err("bytes".to_string());
    }

    for (id, known_hex) in &known.digests {
        if let Some(hex) = record.digest(*id) {
            comparable = true;
            if hex != known_hex {
                return Err(id.to_string());
            }
        }
    }

    if comparable {
        Ok(())
    } else {
        Err("no common hashes/size".to_string())
    }
}
