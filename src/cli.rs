// Command-line front end for gcdelta.
//
// Explicit subcommands over the file helpers: create a delta against one or
// more sources, apply it back, list its instructions, or report index stats.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::delta::instruction::{Instruction, InstructionIter};
use crate::delta::varint;
use crate::engine::DeltaOptions;
use crate::error::DeltaError;
use crate::hash::config::IndexConfig;
use crate::index::DeltaIndex;
use crate::io::{apply_delta_file, make_delta_file};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Group-compress delta encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "gcdelta",
    version,
    about = "Group-compress delta encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a delta of TARGET against one or more sources.
    Make(MakeArgs),
    /// Rebuild a target from its sources and a delta.
    Apply(ApplyArgs),
    /// List the instructions of a delta.
    Show(ShowArgs),
    /// Index sources and print table statistics.
    Index(IndexArgs),
}

#[derive(Args, Debug)]
struct IndexTuningArgs {
    /// Sampling budget per source in bytes; 0 samples every 16 bytes
    /// (supports K/M/G suffix).
    #[arg(long = "max-bytes-to-index", value_parser = parse_byte_size, default_value_t = 0)]
    max_bytes_to_index: u64,
}

#[derive(Args, Debug)]
struct MakeArgs {
    /// Source file to copy from (repeat for several, in order).
    #[arg(long = "source", short = 's', value_name = "SOURCE", value_hint = ValueHint::FilePath, action = ArgAction::Append)]
    sources: Vec<PathBuf>,

    /// Fail if the delta would exceed this size; 0 disables the cap
    /// (supports K/M/G suffix).
    #[arg(long = "max-delta-size", value_parser = parse_byte_size, default_value_t = 0)]
    max_delta_size: u64,

    #[command(flatten)]
    tuning: IndexTuningArgs,

    /// Target file to encode.
    #[arg(value_hint = ValueHint::FilePath)]
    target: PathBuf,

    /// Delta output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Source file to copy from (repeat for several, in the order used by `make`).
    #[arg(long = "source", short = 's', value_name = "SOURCE", value_hint = ValueHint::FilePath, action = ArgAction::Append)]
    sources: Vec<PathBuf>,

    /// Delta input file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Reconstructed output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Delta input file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

#[derive(Args, Debug)]
struct IndexArgs {
    #[command(flatten)]
    tuning: IndexTuningArgs,

    /// Source files to index, in order.
    #[arg(value_hint = ValueHint::FilePath, required = true)]
    sources: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Make,
    Apply,
    Show,
    Index,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    max_bytes_to_index: usize,
    max_delta_size: usize,
    source_files: Vec<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let (force, quiet, json_output) = (cli.force, cli.quiet, cli.json_output);
    let verbose = cli.verbose.min(3);
    let base = |command: Command| Options {
        command,
        force,
        quiet,
        verbose,
        json_output,
        max_bytes_to_index: 0,
        max_delta_size: 0,
        source_files: Vec::new(),
        input_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Make(args) => Options {
            max_bytes_to_index: saturate(args.tuning.max_bytes_to_index),
            max_delta_size: saturate(args.max_delta_size),
            source_files: args.sources,
            input_file: Some(args.target),
            output_file: Some(args.output),
            ..base(Command::Make)
        },
        Cmd::Apply(args) => Options {
            source_files: args.sources,
            input_file: Some(args.delta),
            output_file: Some(args.output),
            ..base(Command::Apply)
        },
        Cmd::Show(args) => Options {
            input_file: Some(args.delta),
            ..base(Command::Show)
        },
        Cmd::Index(args) => Options {
            max_bytes_to_index: saturate(args.tuning.max_bytes_to_index),
            source_files: args.sources,
            ..base(Command::Index)
        },
    }
}

fn saturate(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Default log filter for a `-v` count; `RUST_LOG` still wins.
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("gcdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn source_refs(opts: &Options) -> Vec<&Path> {
    opts.source_files.iter().map(PathBuf::as_path).collect()
}

/// Refuse to clobber an existing output unless `-f` was given.
fn check_output(opts: &Options, path: &Path) -> bool {
    if path.exists() && !opts.force {
        eprintln!(
            "gcdelta: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return false;
    }
    true
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("gcdelta: json: {e}"),
    }
}

fn hex(digest: Option<[u8; 32]>) -> Option<String> {
    digest.map(|d| d.iter().map(|b| format!("{b:02x}")).collect())
}

fn report_error(what: &str, e: &DeltaError) {
    match e {
        DeltaError::Io(inner) => eprintln!("gcdelta: {what}: {inner}"),
        other => eprintln!("gcdelta: {what} error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Make command
// ---------------------------------------------------------------------------

fn cmd_make(opts: &Options) -> i32 {
    let (Some(target), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("gcdelta: make requires a target and an output file");
        return 1;
    };
    if !check_output(opts, output) {
        return 1;
    }

    let delta_opts = DeltaOptions {
        max_bytes_to_index: opts.max_bytes_to_index,
        max_delta_size: opts.max_delta_size,
    };
    let stats = match make_delta_file(&source_refs(opts), target, output, &delta_opts) {
        Ok(s) => s,
        Err(e) => {
            report_error("make", &e);
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "gcdelta: make: sources: {}, source size: {}, target size: {}, delta size: {}",
            stats.sources, stats.source_size, stats.target_size, stats.delta_size
        );
        eprintln!(
            "gcdelta: make: {} copies ({} bytes), {} inserts ({} bytes)",
            stats.copies, stats.copy_bytes, stats.inserts, stats.insert_bytes
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "make",
            "sources": stats.sources,
            "source_size": stats.source_size,
            "target_size": stats.target_size,
            "delta_size": stats.delta_size,
            "copies": stats.copies,
            "copy_bytes": stats.copy_bytes,
            "inserts": stats.inserts,
            "insert_bytes": stats.insert_bytes,
            "source_sha256": hex(stats.source_sha256),
            "target_sha256": hex(stats.target_sha256),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let (Some(delta), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("gcdelta: apply requires a delta and an output file");
        return 1;
    };
    if !check_output(opts, output) {
        return 1;
    }

    let stats = match apply_delta_file(&source_refs(opts), delta, output) {
        Ok(s) => s,
        Err(e) => {
            report_error("apply", &e);
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "gcdelta: apply: source size: {}, delta size: {}, output size: {}",
            stats.source_size, stats.delta_size, stats.output_size
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "apply",
            "source_size": stats.source_size,
            "delta_size": stats.delta_size,
            "output_size": stats.output_size,
            "output_sha256": hex(stats.output_sha256),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Show command
// ---------------------------------------------------------------------------

fn cmd_show(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("gcdelta: show requires a delta file");
        return 1;
    };
    let delta = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("gcdelta: {}: {e}", path.display());
            return 1;
        }
    };
    let (target_len, pos) = match varint::read_usize(&delta) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("gcdelta: invalid delta header: {e}");
            return 1;
        }
    };

    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(BUF_SIZE, stdout.lock());
    let listed = write_listing(&mut out, &delta, target_len, pos);
    let flushed = out.flush();

    let (copies, inserts, produced) = match listed {
        Ok(counts) => counts,
        Err(ListingError::Delta(e)) => {
            eprintln!("gcdelta: instruction decode: {e}");
            return 1;
        }
        Err(ListingError::Io(e)) => {
            eprintln!("gcdelta: write error: {e}");
            return 1;
        }
    };
    if let Err(e) = flushed {
        eprintln!("gcdelta: write flush error: {e}");
        return 1;
    }

    if produced != target_len as u64 && !opts.quiet {
        eprintln!("gcdelta: warning: instructions produce {produced} bytes, header declares {target_len}");
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "show",
            "delta_size": delta.len(),
            "target_len": target_len,
            "copies": copies,
            "inserts": inserts,
        }));
    }

    0
}

enum ListingError {
    Delta(DeltaError),
    Io(io::Error),
}

/// Print one line per instruction; returns (copies, inserts, bytes produced).
fn write_listing<W: Write>(
    out: &mut W,
    delta: &[u8],
    target_len: usize,
    pos: usize,
) -> Result<(u64, u64, u64), ListingError> {
    let io_err = ListingError::Io;
    writeln!(out, "delta size:     {}", delta.len()).map_err(io_err)?;
    writeln!(out, "target length:  {target_len}").map_err(io_err)?;
    writeln!(out, "  Offset  Type    Size  Source").map_err(io_err)?;

    let (mut copies, mut inserts, mut offset) = (0u64, 0u64, 0u64);
    for ins in InstructionIter::new(delta, pos) {
        let ins = ins.map_err(ListingError::Delta)?;
        let len = ins.len() as u64;
        match ins {
            Instruction::Insert(literal) => {
                writeln!(out, "  {offset:06}  INS   {:6}", literal.len()).map_err(io_err)?;
                inserts += 1;
            }
            Instruction::Copy { offset: from, length } => {
                writeln!(out, "  {offset:06}  CPY   {length:6}  S@{from}").map_err(io_err)?;
                copies += 1;
            }
        }
        offset += len;
    }
    Ok((copies, inserts, offset))
}

// ---------------------------------------------------------------------------
// Index command
// ---------------------------------------------------------------------------

fn cmd_index(opts: &Options) -> i32 {
    let mut sources = Vec::with_capacity(opts.source_files.len());
    for path in &opts.source_files {
        match std::fs::read(path) {
            Ok(data) => sources.push(data),
            Err(e) => {
                eprintln!("gcdelta: source file: {}: {e}", path.display());
                return 1;
            }
        }
    }

    let mut index = DeltaIndex::with_config(IndexConfig::with_max_bytes_to_index(opts.max_bytes_to_index));
    for data in &sources {
        if let Err(e) = index.add_source(data, index.source_offset()) {
            report_error("index", &e);
            return 1;
        }
    }
    index.ensure_built();

    let source_size = index.source_offset();
    let entries = index.num_entries();
    let buckets = index.hash_size();
    let memory = index.memory_size();

    if !opts.quiet {
        println!("sources:        {}", index.num_sources());
        println!("source size:    {source_size}");
        println!("entries:        {entries}");
        println!("buckets:        {buckets}");
        println!("memory:         {memory}");
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "index",
            "sources": index.num_sources(),
            "source_size": source_size,
            "entries": entries,
            "buckets": buckets,
            "memory_size": memory,
            "max_bytes_to_index": index.max_bytes_to_index(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(opts.verbose)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Make => cmd_make(&opts),
        Command::Apply => cmd_apply(&opts),
        Command::Show => cmd_show(&opts),
        Command::Index => cmd_index(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
