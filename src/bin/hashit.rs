use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;

use hashit::audit;
use hashit::config::{Cli, Config};
use hashit::format::{self, Format};
use hashit::pipeline;
use hashit::registry::AlgorithmId;

fn main() -> ExitCode {
    let cli = Cli::parse();

    hashit::diag::init(cli.verbose);

    if cli.list_hashes {
        for id in AlgorithmId::ALL {
            println!("{}", id.as_str());
        }
        return ExitCode::SUCCESS;
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<ExitCode, hashit::config::ConfigError> {
    if let Some(audit_path) = &config.audit_file {
        // Audit's phase-two reconciliation needs the full record set before
        // it can know which corpus paths went unseen, so this path always
        // collects rather than streaming.
        let records = pipeline::run(config)?;
        let corpus = audit::load_corpus(audit_path)?;
        let (verdicts, report) = audit::reconcile(&records, corpus.as_ref());
        log_verdicts(&verdicts);
        print_audit_report(&report);
        return Ok(if report.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    emit(config)?;
    Ok(ExitCode::SUCCESS)
}

/// Per-file audit diagnostics, one line per examined or missing path.
/// `Matched` is logged at `DEBUG` (the "very verbose" tier); everything
/// else that contributed to a `Failed` aggregate is logged at `VERBOSE`
/// (`-v`) so a failing run names every offending file, not just the
/// aggregate counts.
fn log_verdicts(verdicts: &[(String, audit::Verdict)]) {
    for (path, verdict) in verdicts {
        match verdict {
            audit::Verdict::Matched => log::debug!("{path}: Ok"),
            audit::Verdict::Modified(reason) => {
                log::info!("{path}: File modified ({reason} mismatch)")
            }
            audit::Verdict::New => log::info!("{path}: File new"),
            audit::Verdict::Moved { from } => log::info!("{path}: File moved (from {from})"),
            audit::Verdict::Missing => log::info!("{path}: File expected but not found"),
        }
    }
}

fn print_audit_report(report: &audit::AuditReport) {
    println!(
        "hashit: Audit {}\n       Files examined: {}\nKnown files expecting: {}\n        Files matched: {}\n       Files modified: {}\n          Files moved: {}\n      New files found: {}\n        Files missing: {}",
        if report.passed() { "Passed" } else { "Failed" },
        report.examined,
        report.known,
        report.matched,
        report.modified,
        report.moved,
        report.new,
        report.missing,
    );
}

/// Dispatch to the streaming path (render-and-write each record as it
/// arrives) or the buffered path (collect everything, then render once),
/// per the spec's streaming rule: stream iff streaming isn't disabled, no
/// output file is configured, and the format supports it. `sqlite` never
/// goes through either text path — it always commits straight to its
/// database file as records arrive.
fn emit(config: &Config) -> Result<(), hashit::config::ConfigError> {
    if config.format == Format::Sqlite {
        let path = config
            .output
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("hashit.sqlite"));
        return write_sqlite_streaming(config, &path);
    }

    let stream = !config.no_stream && config.output.is_none() && config.format.supports_streaming();

    if stream {
        emit_streaming(config)
    } else {
        emit_buffered(config)
    }
}

/// The hashdeep column spec is a function of which digests are *enabled*
/// for the run, not of which ones happen to appear on any given record —
/// every record carries the same enabled set, so this can be (and must be,
/// to support streaming) computed once up front.
fn hashdeep_header_parts(config: &Config) -> (bool, bool, String) {
    let has_md5 = config.enabled.is_enabled(AlgorithmId::Md5);
    let has_sha256 = config.enabled.is_enabled(AlgorithmId::Sha256);
    let column_spec = format::hashdeep_column_spec(has_md5, has_sha256, config.capture_mtime);
    (has_md5, has_sha256, column_spec)
}

fn hashdeep_header_line(column_spec: &str) -> String {
    let invoked_from = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let argv = std::env::args().collect::<Vec<_>>().join(" ");
    format::hashdeep_header(env!("CARGO_PKG_VERSION"), column_spec, &invoked_from, &argv)
}

/// Render and write each record to stdout as soon as the pipeline produces
/// it. A single `BufWriter` around one stdout lock serializes every write,
/// so concurrent worker completions can never interleave mid-line.
fn emit_streaming(config: &Config) -> Result<(), hashit::config::ConfigError> {
    let mut out = BufWriter::new(io::stdout().lock());
    let io_err = |e: std::io::Error| hashit::config::ConfigError::OutputWrite(e.to_string());

    let (has_md5, has_sha256, column_spec) = hashdeep_header_parts(config);
    if config.format == Format::HashDeep {
        format::write_blob(&mut out, &hashdeep_header_line(&column_spec)).map_err(io_err)?;
    }

    let mut write_err = None;
    pipeline::run_streaming(config, |record| {
        if write_err.is_some() {
            return;
        }
        let blob = match config.format {
            Format::Text => format::render_text(&record),
            Format::Sum => format::render_sum(&record),
            Format::HashOnly => format::render_hashonly(&record),
            Format::HashDeep => {
                format::render_hashdeep_line(&record, has_md5, has_sha256, config.capture_mtime)
            }
            Format::Json | Format::Sqlite => unreachable!("handled by the buffered/sqlite paths"),
        };
        if let Err(e) = format::write_blob(&mut out, &blob) {
            write_err = Some(io_err(e));
        }
    })?;
    if let Some(err) = write_err {
        return Err(err);
    }

    out.flush().map_err(io_err)
}

/// Collect every record, then render and write the whole output at once.
/// Used for `json` (must close a single top-level array), and for any
/// format when `--no-stream` or `--output` is given.
fn emit_buffered(config: &Config) -> Result<(), hashit::config::ConfigError> {
    let records = pipeline::run(config)?;

    let mut sink: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .map_err(|e| hashit::config::ConfigError::OutputWrite(e.to_string()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let io_err = |e: std::io::Error| hashit::config::ConfigError::OutputWrite(e.to_string());

    match config.format {
        Format::Text => {
            for record in &records {
                format::write_blob(&mut sink, &format::render_text(record)).map_err(io_err)?;
            }
        }
        Format::Sum => {
            for record in &records {
                format::write_blob(&mut sink, &format::render_sum(record)).map_err(io_err)?;
            }
        }
        Format::HashOnly => {
            for record in &records {
                format::write_blob(&mut sink, &format::render_hashonly(record)).map_err(io_err)?;
            }
        }
        Format::HashDeep => {
            let (has_md5, has_sha256, column_spec) = hashdeep_header_parts(config);
            format::write_blob(&mut sink, &hashdeep_header_line(&column_spec)).map_err(io_err)?;
            for record in &records {
                let line = format::render_hashdeep_line(
                    record,
                    has_md5,
                    has_sha256,
                    config.capture_mtime,
                );
                format::write_blob(&mut sink, &line).map_err(io_err)?;
            }
        }
        Format::Json => {
            let blob = format::render_json(&records)
                .map_err(|e| hashit::config::ConfigError::OutputWrite(e.to_string()))?;
            format::write_blob(&mut sink, &blob).map_err(io_err)?;
        }
        Format::Sqlite => unreachable!("sqlite is dispatched before emit_buffered is reached"),
    }

    sink.flush().map_err(io_err)
}

/// `sqlite` output commits directly to the database as records stream in,
/// batched into 1,000-row transactions, with a final WAL checkpoint.
fn write_sqlite_streaming(
    config: &Config,
    path: &std::path::Path,
) -> Result<(), hashit::config::ConfigError> {
    let db_err = |e: rusqlite::Error| hashit::config::ConfigError::OutputWrite(e.to_string());
    const BATCH_SIZE: usize = 1000;
    let mut conn = audit::open_output_db(path).map_err(db_err)?;
    let mut batch: Vec<hashit::record::HashRecord> = Vec::with_capacity(BATCH_SIZE);
    let mut first_db_err = None;

    pipeline::run_streaming(config, |record| {
        if first_db_err.is_some() {
            return;
        }
        batch.push(record);
        if batch.len() >= BATCH_SIZE {
            if let Err(e) = insert_batch(&mut conn, &batch) {
                first_db_err = Some(e);
            }
            batch.clear();
        }
    })?;

    if let Some(err) = first_db_err {
        return Err(db_err(err));
    }
    if !batch.is_empty() {
        insert_batch(&mut conn, &batch).map_err(db_err)?;
    }
    audit::checkpoint_and_close(conn).map_err(db_err)
}

fn insert_batch(
    conn: &mut rusqlite::Connection,
    batch: &[hashit::record::HashRecord],
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for record in batch {
        tx.execute(
            "INSERT OR REPLACE INTO file_hashes \
             (filepath, size, mtime, crc32, xxhash64, md4, md5, sha1, sha256, sha512, \
              blake2b256, blake2b512, blake3, sha3_224, sha3_256, sha3_384, sha3_512, ed2k) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            rusqlite::params![
                record.path,
                record.bytes,
                record.mtime.map(|t| t.to_rfc3339()),
                record.digest(AlgorithmId::Crc32),
                record.digest(AlgorithmId::XxHash64),
                record.digest(AlgorithmId::Md4),
                record.digest(AlgorithmId::Md5),
                record.digest(AlgorithmId::Sha1),
                record.digest(AlgorithmId::Sha256),
                record.digest(AlgorithmId::Sha512),
                record.digest(AlgorithmId::Blake2b256),
                record.digest(AlgorithmId::Blake2b512),
                record.digest(AlgorithmId::Blake3),
                record.digest(AlgorithmId::Sha3_224),
                record.digest(AlgorithmId::Sha3_256),
                record.digest(AlgorithmId::Sha3_384),
                record.digest(AlgorithmId::Sha3_512),
                record.digest(AlgorithmId::Ed2k),
            ],
        )?;
    }
    tx.commit()
}
