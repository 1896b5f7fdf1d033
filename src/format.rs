//! C5 — output formatters: text, sum, hashonly, hashdeep, json, sqlite.

use std::fmt::Write as _;
use std::io::Write as IoWrite;

use chrono::{DateTime, Utc};

use crate::record::HashRecord;
use crate::registry::AlgorithmId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Sum,
    HashOnly,
    HashDeep,
    Json,
    Sqlite,
}

impl Format {
    pub fn parse(name: &str) -> Option<Format> {
        match name.to_ascii_lowercase().as_str() {
            "text" => Some(Format::Text),
            "sum" => Some(Format::Sum),
            "hashonly" => Some(Format::HashOnly),
            "hashdeep" => Some(Format::HashDeep),
            "json" => Some(Format::Json),
            "sqlite" => Some(Format::Sqlite),
            _ => None,
        }
    }

    /// Whether this format can be emitted incrementally, one record at a
    /// time, rather than needing every record buffered up front. `json`
    /// always buffers (it must close a single top-level array), matching
    /// the original tool's behavior of collecting every result before
    /// marshaling. `sqlite` batches internally but doesn't need the whole
    /// set resident at once, so it streams too.
    pub fn supports_streaming(self) -> bool {
        !matches!(self, Format::Json)
    }
}

/// Render one record as a `text`-format block: `path (N bytes)` followed by
/// one right-padded-to-11 `NAME hex` line per enabled digest, in registry
/// declaration order.
pub fn render_text(record: &HashRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} bytes)", record.path, record.bytes);
    for id in AlgorithmId::ALL {
        if let Some(hex) = record.digest(id) {
            let _ = writeln!(out, "{:>11} {}", id.display_name(), hex);
        }
    }
    out
}

/// `sum`-format: one `<hex>  <path>` line per enabled digest, BSD `*sum`
/// style (used when exactly one digest is active, or to emit every digest
/// on separate lines when more than one is).
pub fn render_sum(record: &HashRecord) -> String {
    let mut out = String::new();
    for id in AlgorithmId::ALL {
        if let Some(hex) = record.digest(id) {
            let _ = writeln!(out, "{}  {}", hex, record.path);
        }
    }
    out
}

/// `hashonly`-format: bare hex digests, one per line, no path or algorithm
/// label at all.
pub fn render_hashonly(record: &HashRecord) -> String {
    let mut out = String::new();
    for id in AlgorithmId::ALL {
        if let Some(hex) = record.digest(id) {
            let _ = writeln!(out, "{hex}");
        }
    }
    out
}

/// The hashdeep column spec depends on which of md5/sha256 are enabled:
/// only md5 -> `size,md5,filename`; only sha256 -> `size,sha256,filename`;
/// both (or neither, degenerate) -> `size,md5,sha256,filename`. An
/// `mtime` column is appended when mtime capture is on.
pub fn hashdeep_column_spec(has_md5: bool, has_sha256: bool, has_mtime: bool) -> String {
    let mut cols = match (has_md5, has_sha256) {
        (true, false) => "size,md5,filename".to_string(),
        (false, true) => "size,sha256,filename".to_string(),
        _ => "size,md5,sha256,filename".to_string(),
    };
    if has_mtime {
        cols.push_str(",mtime");
    }
    cols
}

pub fn hashdeep_header(version: &str, column_spec: &str, invoked_from: &str, argv: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "%%%% HASHIT-{version}");
    let _ = writeln!(out, "%%%% {column_spec}");
    let _ = writeln!(out, "## Invoked from: {invoked_from}");
    let _ = writeln!(out, "## $ {argv}");
    let _ = writeln!(out, "##");
    out
}

pub fn render_hashdeep_line(
    record: &HashRecord,
    has_md5: bool,
    has_sha256: bool,
    has_mtime: bool,
) -> String {
    let mut fields = vec![record.bytes.to_string()];
    if has_md5 {
        fields.push(record.digest(AlgorithmId::Md5).unwrap_or("").to_string());
    }
    if has_sha256 {
        fields.push(record.digest(AlgorithmId::Sha256).unwrap_or("").to_string());
    }
    fields.push(record.path.clone());
    if has_mtime {
        let rendered = record
            .mtime
            .map(render_mtime)
            .unwrap_or_default();
        fields.push(rendered);
    }
    format!("{}\n", fields.join(","))
}

fn render_mtime(mtime: DateTime<Utc>) -> String {
    mtime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `json`-format buffers every record and serializes the whole array at
/// once (mirrors the original tool's `toJSON`, which always collects into
/// a slice before marshaling — incremental array emission would need
/// fragile manual bracket/comma bookkeeping for no real benefit here).
pub fn render_json(records: &[HashRecord]) -> serde_json::Result<String> {
    serde_json::to_string(records)
}

/// Write a rendered blob to `writer`, used by both the streaming per-record
/// path and the buffered whole-output path.
pub fn write_blob(writer: &mut impl IoWrite, blob: &str) -> std::io::Result<()> {
    writer.write_all(blob.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_record() -> HashRecord {
        let mut digests = BTreeMap::new();
        digests.insert(AlgorithmId::Md5, "d41d8cd98f00b204e9800998ecf8427e".to_string());
        digests.insert(
            AlgorithmId::Sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".to_string(),
        );
        HashRecord {
            path: "foo.txt".to_string(),
            bytes: 0,
            mtime: None,
            digests,
        }
    }

    #[test]
    fn text_format_right_pads_display_names() {
        let rendered = render_text(&sample_record());
        assert!(rendered.contains("        MD5 d41d8cd98f00b204e9800998ecf8427e"));
        assert!(rendered.contains("     SHA256 e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"));
    }

    #[test]
    fn sum_format_emits_hex_then_path() {
        let rendered = render_sum(&sample_record());
        assert!(rendered.lines().next().unwrap().ends_with("  foo.txt"));
    }

    #[test]
    fn hashdeep_column_spec_picks_narrow_set() {
        assert_eq!(hashdeep_column_spec(true, false, false), "size,md5,filename");
        assert_eq!(hashdeep_column_spec(false, true, false), "size,sha256,filename");
        assert_eq!(hashdeep_column_spec(true, true, false), "size,md5,sha256,filename");
        assert_eq!(
            hashdeep_column_spec(true, true, true),
            "size,md5,sha256,filename,mtime"
        );
    }

    #[test]
    fn hashdeep_line_matches_column_spec_field_count() {
        let line = render_hashdeep_line(&sample_record(), true, true, false);
        assert_eq!(line.trim_end().split(',').count(), 4);
    }

    #[test]
    fn json_format_is_an_array_with_expected_fields() {
        let rendered = render_json(&[sample_record()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["MD5"], "d41d8cd98f00b204e9800998ecf8427e");
        assert!(arr[0].get("MTime").is_none());
    }
}
