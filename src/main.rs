use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, ValueEnum};

use chip::board::StorageMode;
use chip::diagnostic::render_diagnostics;
use chip::driver::{self, unescape, Config};
use chip::generate::Generator;
use chip::lexeme::Registry;
use chip::{parser, render};

#[derive(Parser)]
#[command(
    name = "chip",
    version,
    about = "An interpreter for Chip, a language of two-dimensional circuit pictures",
    override_usage = "chip [options] <chipspec>"
)]
struct Cli {
    /// A Chip specification file
    chipspec: Option<PathBuf>,
    /// Stop processing and halt after N bytes; applies to both stdin
    /// and generated bytes
    #[arg(short = 'c', long = "cutoff", value_name = "N", default_value_t = -1)]
    cutoff: i64,
    /// Use these characters as an escape sequence for input; may be
    /// given more than once, and an empty sequence clears the raw-tty
    /// defaults (^C, ^D)
    #[arg(short = 'e', long = "escape", value_name = "SEQ", action = ArgAction::Append)]
    escape: Vec<String>,
    /// When input is exhausted, generate bytes from the template XX:
    /// two base-16 digits, or 'I' (count up), 'J' (count down), 'K'
    /// (random) in either position
    #[arg(short = 'g', long = "generate", value_name = "XX")]
    generate: Option<String>,
    /// Flush stdout after each cycle and read input in raw mode
    #[arg(short = 'i', long = "immediate")]
    immediate: bool,
    /// Write an extra newline to stdout at the end of execution
    #[arg(short = 'n', long = "extra-newline")]
    extra_newline: bool,
    /// Generate one values (0xff) when input is exhausted; equivalent
    /// to --generate=FF
    #[arg(short = 'o', long = "generate-one")]
    generate_one: bool,
    /// Storage discipline for the shared byte container
    #[arg(long = "storage", value_enum, default_value = "stack")]
    storage: StorageArg,
    /// Verbose output; cumulative. One -v shows per-cycle I/O, two
    /// add the parsed circuitry and statistics, three add a heatmap
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
    /// Use the generated value instead of reading STDIN; by itself,
    /// implies --generate=00
    #[arg(short = 'w', long = "without-stdin")]
    without_stdin: bool,
    /// Generate zero values (0x00) when input is exhausted;
    /// equivalent to --generate=00
    #[arg(short = 'z', long = "generate-zero")]
    generate_zero: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StorageArg {
    Stack,
    Queue,
}

impl From<StorageArg> for StorageMode {
    fn from(arg: StorageArg) -> StorageMode {
        match arg {
            StorageArg::Stack => StorageMode::Stack,
            StorageArg::Queue => StorageMode::Queue,
        }
    }
}

fn main() {
    let registry = match Registry::build() {
        Ok(registry) => registry,
        Err(errors) => {
            for error in errors {
                eprintln!("error: {error}");
            }
            process::exit(1);
        }
    };

    let mut command = Cli::command().after_help(registry.element_table());
    let cli = match Cli::from_arg_matches(&command.clone().get_matches()) {
        Ok(cli) => cli,
        Err(error) => error.exit(),
    };

    let Some(ref chipspec) = cli.chipspec else {
        command.print_help().ok();
        process::exit(2);
    };

    let source = match fs::read_to_string(chipspec) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: cannot read {}: {error}", chipspec.display());
            process::exit(1);
        }
    };

    let template = cli
        .generate
        .clone()
        .or_else(|| cli.generate_one.then(|| "FF".to_string()))
        .or_else(|| cli.generate_zero.then(|| "00".to_string()))
        .or_else(|| cli.without_stdin.then(|| "00".to_string()));
    let generator = match template.as_deref().map(Generator::from_template).transpose() {
        Ok(generator) => generator,
        Err(error) => {
            eprintln!("error: {error}");
            process::exit(2);
        }
    };

    let raw_tty = cli.immediate && io::stdin().is_terminal();
    let escapes = escape_sequences(&cli, raw_tty);

    let (mut board, warnings) =
        chip::build_board(&source, &registry, StorageMode::from(cli.storage));
    for warning in &warnings {
        eprintln!("{}", warning.brief());
    }
    if cli.verbose > 0 && !warnings.is_empty() {
        let filename = chipspec.display().to_string();
        render_diagnostics(&warnings, &filename, parser::strip_shebang(&source));
    }
    if cli.verbose > 1 {
        eprint!("{}", render::render(&board, render::terminal_columns()));
        eprintln!();
    }

    let cfg = Config {
        cutoff: cli.cutoff,
        escapes,
        ignore_eof: generator.is_some(),
        generator,
        extra_newline: cli.extra_newline,
        immediate: cli.immediate,
        raw_tty,
        verbose: cli.verbose,
        without_stdin: cli.without_stdin,
    };

    let mut input = io::stdin().lock();
    let mut output = io::BufWriter::new(io::stdout().lock());
    match driver::run(&mut board, cfg, &mut input, &mut output) {
        Ok(driver::Outcome::Completed) => {}
        Ok(driver::Outcome::Interrupted) => process::exit(130),
        Err(error) => {
            eprintln!("error: {error}");
            process::exit(1);
        }
    }
}

/// Default escapes (^C, ^D) apply in raw mode; `-e` adds sequences,
/// and an empty `-e` clears the defaults.
fn escape_sequences(cli: &Cli, raw_tty: bool) -> Vec<Vec<u8>> {
    let mut sequences: Vec<Vec<u8>> = Vec::new();
    if raw_tty {
        sequences.push(vec![0x03]);
        sequences.push(vec![0x04]);
    }
    if !cli.escape.is_empty() {
        if cli.escape.iter().any(String::is_empty) {
            sequences.clear();
        }
        for seq in &cli.escape {
            if !seq.is_empty() {
                sequences.push(unescape(seq));
            }
        }
    }
    sequences.sort();
    sequences.dedup();
    if raw_tty || !cli.escape.is_empty() {
        let shown: Vec<String> = sequences
            .iter()
            .map(|seq| seq.iter().map(|b| format!("\\x{b:02x}")).collect())
            .collect();
        eprintln!("Escape sequences are: [{}]", shown.join(", "));
    }
    sequences
}
