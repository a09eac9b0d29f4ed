//! Batch mode: decodes every matching file of a directory into a sibling output file.

use crate::{DecodeOptions, container, decode_into, log_report};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use fortilog::{DecodeReport, FortilogParser};
use glob::Pattern;
use log::{error, info};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[cfg(feature = "multithreading")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub pattern: String,
    pub gzip: bool,
    /// 0 means one thread per core.
    pub num_threads: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub decoded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug)]
enum FileOutcome {
    Decoded(DecodeReport),
    AlreadyExists,
}

/// Regular files of `source_dir` whose name matches `pattern`, sorted by name.
fn matching_files(source_dir: &Path, pattern: &Pattern) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let entries = fs::read_dir(source_dir)
        .with_context(|| format!("failed to list `{}`", source_dir.display()))?;

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_some_and(|name| pattern.matches(name)) {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

fn output_path(settings: &BatchSettings, options: &DecodeOptions, input: &Path) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(options.output_format.extension());
    if settings.gzip {
        name.push(".gz");
    }
    settings.target_dir.join(name)
}

/// Decodes `input` into `output` through a temporary file, so a failure leaves nothing behind.
fn decode_file(
    input: &Path,
    output: &Path,
    target_dir: &Path,
    gzip: bool,
    options: &DecodeOptions,
) -> Result<DecodeReport> {
    let data = container::read_input(input)?;
    let parser =
        FortilogParser::from_buffer(data).with_configuration(options.parser_settings.clone());

    let tmp = NamedTempFile::new_in(target_dir)
        .with_context(|| format!("failed to create a temporary file in `{}`", target_dir.display()))?;
    let writer = BufWriter::new(tmp);

    let (report, writer) = if gzip {
        let encoder = GzEncoder::new(writer, Compression::default());
        let (report, encoder) = decode_into(&parser, options.output_format, encoder)?;
        (report, encoder.finish()?)
    } else {
        decode_into(&parser, options.output_format, writer)?
    };

    let tmp = writer.into_inner().map_err(|e| e.into_error())?;
    tmp.persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write `{}`", output.display()))?;

    Ok(report)
}

fn process_file(
    settings: &BatchSettings,
    options: &DecodeOptions,
    input: &Path,
) -> Result<FileOutcome> {
    let output = output_path(settings, options, input);
    if output.exists() {
        return Ok(FileOutcome::AlreadyExists);
    }

    info!("Decoding {}", input.display());
    let report = decode_file(input, &output, &settings.target_dir, settings.gzip, options)
        .with_context(|| format!("failed to decode `{}`", input.display()))?;
    Ok(FileOutcome::Decoded(report))
}

fn tally(
    summary: &mut BatchSummary,
    input: &Path,
    outcome: Result<FileOutcome>,
    options: &DecodeOptions,
) {
    let name = input.display().to_string();
    match outcome {
        Ok(FileOutcome::Decoded(report)) => {
            info!("Done {} {} logs", name, report.records_decoded);
            if options.print_report {
                log_report(&name, &report);
            }
            summary.decoded += 1;
        }
        Ok(FileOutcome::AlreadyExists) => {
            info!("Skipping {}, output already exists", name);
            summary.skipped += 1;
        }
        Err(e) => {
            error!("{:?}", e);
            summary.failed += 1;
        }
    }
}

#[cfg(feature = "multithreading")]
fn process_all(
    settings: &BatchSettings,
    options: &DecodeOptions,
    files: &[PathBuf],
) -> Result<Vec<Result<FileOutcome>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.num_threads)
        .build()
        .context("failed to build thread pool")?;

    Ok(pool.install(|| {
        files
            .par_iter()
            .map(|input| process_file(settings, options, input))
            .collect()
    }))
}

#[cfg(not(feature = "multithreading"))]
fn process_all(
    settings: &BatchSettings,
    options: &DecodeOptions,
    files: &[PathBuf],
) -> Result<Vec<Result<FileOutcome>>> {
    Ok(files
        .iter()
        .map(|input| process_file(settings, options, input))
        .collect())
}

pub fn run(settings: &BatchSettings, options: &DecodeOptions) -> Result<BatchSummary> {
    if !settings.source_dir.is_dir() {
        bail!(
            "Source `{}` is not a directory",
            settings.source_dir.display()
        );
    }

    let pattern = Pattern::new(&settings.pattern)
        .with_context(|| format!("invalid glob pattern `{}`", settings.pattern))?;

    fs::create_dir_all(&settings.target_dir).with_context(|| {
        format!(
            "failed to create target directory `{}`",
            settings.target_dir.display()
        )
    })?;

    let files = matching_files(&settings.source_dir, &pattern)?;
    info!(
        "Found {} files matching `{}` in {}",
        files.len(),
        settings.pattern,
        settings.source_dir.display()
    );

    let outcomes = process_all(settings, options, &files)?;

    let mut summary = BatchSummary::default();
    for (input, outcome) in files.iter().zip(outcomes) {
        tally(&mut summary, input, outcome, options);
    }

    Ok(summary)
}
