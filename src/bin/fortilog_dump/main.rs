mod batch;
mod container;

use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{Level, LevelFilter, error, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};

use fortilog::{
    DecodeReport, FortilogParser, JsonLinesOutput, LengthWidth, Magic, ParserSettings,
    TextOutput, TimestampFormat,
};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    JsonLines,
}

impl OutputFormat {
    /// Extension used for batch outputs.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "csv",
            OutputFormat::JsonLines => "jsonl",
        }
    }
}

/// Everything needed to decode one input, shared by both modes.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub parser_settings: ParserSettings,
    pub output_format: OutputFormat,
    pub print_report: bool,
}

/// Decodes the whole stream held by `parser` into `writer`, handing the writer back.
pub fn decode_into<W: Write>(
    parser: &FortilogParser,
    format: OutputFormat,
    writer: W,
) -> fortilog::err::Result<(DecodeReport, W)> {
    match format {
        OutputFormat::Text => {
            let mut output = TextOutput::with_writer(writer, parser.settings());
            let report = parser.dump(&mut output)?;
            Ok((report, output.into_writer()))
        }
        OutputFormat::JsonLines => {
            let mut output = JsonLinesOutput::with_writer(writer, parser.settings());
            let report = parser.dump(&mut output)?;
            Ok((report, output.into_writer()))
        }
    }
}

pub fn log_report(name: &str, report: &DecodeReport) {
    match serde_json::to_string(report) {
        Ok(json) => info!("Report {} {}", name, json),
        Err(e) => error!("Failed to serialize report for {}: {}", name, e),
    }
}

enum Mode {
    Single {
        input: PathBuf,
        output_target: Option<PathBuf>,
        confirm_overwrite: bool,
        log_file: String,
    },
    Batch(batch::BatchSettings),
}

struct FortilogDump {
    options: DecodeOptions,
    mode: Mode,
    verbosity_level: Option<Level>,
}

impl FortilogDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .ok_or_else(|| format_err!("INPUT is a required argument"))?,
        );

        let output_format = match matches.get_one::<String>("output-format").map(String::as_str) {
            Some("jsonl") => OutputFormat::JsonLines,
            _ => OutputFormat::Text,
        };

        let timestamp_format = match matches.get_one::<String>("timestamps").map(String::as_str) {
            Some("rfc3339") => TimestampFormat::Rfc3339,
            _ => TimestampFormat::EpochSeconds,
        };

        let mut parser_settings = ParserSettings::new()
            .resynchronize(!matches.get_flag("no-resync"))
            .timestamp_format(timestamp_format);

        for (arg, magic) in [
            ("eccf-length-width", Magic::Eccf),
            ("aa01-length-width", Magic::Aa01),
        ] {
            let width = match matches.get_one::<u8>(arg).copied() {
                None => continue,
                Some(1) => LengthWidth::One,
                Some(2) => LengthWidth::Two,
                Some(other) => bail!("Unsupported length width {} for `--{}`", other, arg),
            };
            parser_settings = parser_settings.length_width(magic, width);
        }

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let options = DecodeOptions {
            parser_settings,
            output_format,
            print_report: matches.get_flag("report"),
        };

        let mode = match matches.get_one::<String>("TARGET_DIR") {
            Some(target_dir) => {
                if matches.get_one::<String>("output-target").is_some() {
                    eprintln!("`--output` is ignored in batch mode");
                }

                let num_threads = matches.get_one::<usize>("num-threads").copied().unwrap_or(0);
                let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
                    (true, number) => number,
                    (false, 1) => 1,
                    (false, _) => {
                        eprintln!(
                            "turned on threads, but fortilog_dump was compiled without `multithreading` feature! decoding files one by one"
                        );
                        1
                    }
                };

                Mode::Batch(batch::BatchSettings {
                    source_dir: input,
                    target_dir: PathBuf::from(target_dir),
                    pattern: matches
                        .get_one::<String>("pattern")
                        .cloned()
                        .unwrap_or_else(|| "*".to_string()),
                    gzip: matches.get_flag("gzip"),
                    num_threads,
                })
            }
            None => Mode::Single {
                input,
                output_target: matches.get_one::<String>("output-target").map(PathBuf::from),
                confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
                log_file: matches
                    .get_one::<String>("log-file")
                    .cloned()
                    .unwrap_or_else(|| "fortilog_decoder.log".to_string()),
            },
        };

        Ok(FortilogDump {
            options,
            mode,
            verbosity_level,
        })
    }

    fn level_filter(&self) -> LevelFilter {
        let level = self.verbosity_level.unwrap_or(Level::Warn);
        // Reports and per-file summaries are logged at info.
        let level = if self.options.print_report || matches!(self.mode, Mode::Batch(_)) {
            level.max(Level::Info)
        } else {
            level
        };
        level.to_level_filter()
    }

    /// Main entry point for `FortilogDump`
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        match &self.mode {
            Mode::Single {
                input,
                output_target,
                confirm_overwrite,
                ..
            } => self
                .run_single(input, output_target.as_deref(), *confirm_overwrite)
                .inspect_err(|e| error!("Failed to decode file {}: {:#}", input.display(), e)),
            Mode::Batch(settings) => {
                let summary = batch::run(settings, &self.options)?;
                info!(
                    "Batch finished: {} decoded, {} skipped, {} failed",
                    summary.decoded, summary.skipped, summary.failed
                );
                Ok(())
            }
        }
    }

    fn run_single(
        &self,
        input: &Path,
        output_target: Option<&Path>,
        confirm_overwrite: bool,
    ) -> Result<()> {
        let data = container::read_input(input)?;
        let parser =
            FortilogParser::from_buffer(data).with_configuration(self.options.parser_settings.clone());

        // A bad header must fail before any output file is created or truncated.
        parser.records()?;

        let report = match output_target {
            Some(path) => {
                let f = Self::create_output_file(path, confirm_overwrite).with_context(|| {
                    format!(
                        "An error occurred while creating output file at `{}`",
                        path.display()
                    )
                })?;
                let (report, writer) =
                    decode_into(&parser, self.options.output_format, BufWriter::new(f))?;
                writer
                    .into_inner()
                    .map_err(|e| e.into_error())
                    .context("failed to flush output file")?;
                report
            }
            None => {
                let stdout = io::stdout();
                let (report, _) = decode_into(
                    &parser,
                    self.options.output_format,
                    BufWriter::new(stdout.lock()),
                )?;
                report
            }
        };

        if self.options.print_report {
            log_report(&input.display().to_string(), &report);
        }

        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => bail!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    ),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                    fs::create_dir_all(parent)?;
                    Ok(File::create(p)?)
                }
                Some(_) => Ok(File::create(p)?),
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn try_to_initialize_logging(&self) {
        let level = self.level_filter();

        let result = match &self.mode {
            Mode::Batch(_) => TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stdout,
                ColorChoice::Auto,
            ),
            Mode::Single { log_file, .. } if log_file == "-" => {
                WriteLogger::init(level, Config::default(), io::stderr())
            }
            Mode::Single { log_file, .. } => match File::create(log_file) {
                Ok(f) => WriteLogger::init(level, Config::default(), f),
                Err(e) => {
                    eprintln!("Failed to create log file {}: {}", log_file, e);
                    WriteLogger::init(level, Config::default(), io::stderr())
                }
            },
        };

        if let Err(e) = result {
            eprintln!("Failed to initialize logging: {}", e);
        }
    }
}

fn main() {
    let matches = Command::new("fortilog_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to decode FortiNet elog/tlog files")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("Log file to decode (`-` for stdin), or the source directory in batch mode."),
        )
        .arg(
            Arg::new("TARGET_DIR")
                .help("When set, decodes every matching file of INPUT into this directory."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["text", "jsonl"])
                .default_value("text")
                .help("Sets the output format")
                .long_help(indoc!(r#"
                    Sets the output format:
                        "text"  - one `name=value` line per record.
                        "jsonl" - one JSON object per record.
                "#)),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .value_name("FILE")
                .help("Writes output to the file specified instead of stdout, diagnostics still go to the log file. \
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                       Will create parent directories if needed."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("timestamps")
                .long("timestamps")
                .value_parser(["epoch", "rfc3339"])
                .default_value("epoch")
                .help("Renders timestamp fields as epoch seconds or RFC 3339 (UTC)."),
        )
        .arg(
            Arg::new("eccf-length-width")
                .long("eccf-length-width")
                .value_parser(clap::value_parser!(u8).range(1..=2))
                .help("Overrides the width (in bytes) of the chunk length field for 0xECCF streams."),
        )
        .arg(
            Arg::new("aa01-length-width")
                .long("aa01-length-width")
                .value_parser(clap::value_parser!(u8).range(1..=2))
                .help("Overrides the width (in bytes) of the chunk length field for 0xAA01 streams."),
        )
        .arg(
            Arg::new("no-resync")
                .long("no-resync")
                .action(ArgAction::SetTrue)
                .help("When set, the first corrupt chunk ends the stream instead of scanning for the next chunk."),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .action(ArgAction::SetTrue)
                .help("Logs the decode report of every file as JSON."),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .default_value("*")
                .help("Batch mode: only decodes file names matching this glob pattern."),
        )
        .arg(
            Arg::new("gzip")
                .long("gzip")
                .action(ArgAction::SetTrue)
                .help("Batch mode: gzip-compresses the outputs."),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Batch mode: sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .default_value("fortilog_decoder.log")
                .help("Single file mode: where diagnostics are written, `-` for stderr."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!(r#"
                -v   - info,
                -vv  - debug,
                -vvv - trace
                NOTE: trace output is only available in debug builds, as it is extremely verbose."#)),
        )
        .get_matches();

    let app = match FortilogDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{:?}", e);
            exit(1)
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{:?}", e);
        exit(1)
    }
}
