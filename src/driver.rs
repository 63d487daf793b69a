//! The run loop: one input byte in, one clock cycle, one output
//! byte out, until the stream ends or the circuit says stop.
//!
//! The driver owns the input history. A cycle's byte is served from
//! `history[index]`; fresh bytes are read (or generated) and appended
//! first. A circuit jump moves `index` — absolutely for non-negative
//! jumps, relatively (clamped at zero) for negative ones — so a
//! bookmarked stretch of input can be replayed.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use crossterm::terminal;

use crate::board::{Board, DebugRecord, StorageMode};
use crate::generate::Generator;
use crate::render;

/// Driver configuration, assembled by the CLI.
pub struct Config {
    /// Stop after this many input bytes when positive; stdin and
    /// generated bytes both count.
    pub cutoff: i64,
    /// Byte sequences that end the run when the history ends with one.
    pub escapes: Vec<Vec<u8>>,
    pub generator: Option<Generator>,
    /// Fall back to the generator at EOF instead of halting.
    pub ignore_eof: bool,
    /// Write a final newline no matter how the run ends.
    pub extra_newline: bool,
    /// Flush stdout after every cycle.
    pub immediate: bool,
    /// Toggle the terminal into raw mode around each read.
    pub raw_tty: bool,
    pub verbose: u8,
    /// Never read the input; use the generator from the start.
    pub without_stdin: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            cutoff: -1,
            escapes: Vec::new(),
            generator: None,
            ignore_eof: false,
            extra_newline: false,
            immediate: false,
            raw_tty: false,
            verbose: 0,
            without_stdin: false,
        }
    }
}

pub fn byte_to_bits(byte: u8) -> [u8; 8] {
    let mut bits = [0; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> i) & 1;
    }
    bits
}

pub fn bits_to_byte(bits: &[u8; 8]) -> u8 {
    bits.iter()
        .enumerate()
        .fold(0, |byte, (i, &bit)| byte | (bit << i))
}

/// Process backslash escapes in an `-e` argument (`\x03`, `\n`, ...).
pub fn unescape(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut out, c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('e') => out.push(0x1b),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let hi = chars.next().and_then(|c| c.to_digit(16));
                let lo = chars.next().and_then(|c| c.to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push(((hi << 4) | lo) as u8),
                    // Malformed: keep it literal.
                    _ => out.extend_from_slice(b"\\x"),
                }
            }
            Some(other) => {
                out.push(b'\\');
                push_char(&mut out, other);
            }
            None => out.push(b'\\'),
        }
    }
    out
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// How a run ended: normally (EOF, cutoff, a plain escape sequence,
/// or TERMINATE), or through the interrupt escape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Interrupted,
}

/// Run the circuit against `input`, writing one byte per cycle to
/// `output`. Returns after EOF, cutoff, an escape sequence, or a
/// TERMINATE status.
pub fn run(
    board: &mut Board,
    mut cfg: Config,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> io::Result<Outcome> {
    let mut status: u8 = 0;
    let mut total_bytes: i64 = 0;
    let mut current: u8 = 0xFE;
    let mut history: Vec<u8> = Vec::new();
    let mut index: usize = 0;
    let mut interrupted = false;
    let mut last_debug: Vec<DebugRecord> = Vec::new();

    if cfg.verbose > 0 {
        eprintln!("        HGFEDCBA        hgfedcba");
    }

    'cycles: loop {
        if status & Board::READ_HOLD == 0 {
            if cfg.cutoff > 0 && total_bytes >= cfg.cutoff {
                break;
            }
            if index < history.len() {
                current = history[index];
            } else {
                if cfg.without_stdin {
                    match cfg.generator.as_mut() {
                        Some(generator) => current = generator.next_byte(),
                        None => break,
                    }
                } else {
                    match read_one(input, cfg.raw_tty)? {
                        Some(byte) => current = byte,
                        None => {
                            // EOF: switch over to the generator, or stop.
                            if !cfg.ignore_eof {
                                break;
                            }
                            match cfg.generator.as_mut() {
                                Some(generator) => {
                                    current = generator.next_byte();
                                    cfg.without_stdin = true;
                                }
                                None => break,
                            }
                        }
                    }
                }
                history.push(current);
                if let Some(seq) =
                    cfg.escapes.iter().find(|s| !s.is_empty() && history.ends_with(s))
                {
                    // ^C carries interrupt semantics; other sequences
                    // are a clean stop.
                    interrupted = seq.as_slice() == &[0x03][..];
                    break 'cycles;
                }
            }
            index += 1;
            total_bytes += 1;
        }

        let inbits = byte_to_bits(current);
        if cfg.verbose > 0 {
            if status & Board::READ_HOLD == 0 {
                eprint!("     {}\t{}  →", display_byte(current), bit_string(&inbits));
            } else {
                eprint!("                  →");
            }
        }

        let result = board.run(inbits);
        status = result.status;
        let outbyte = bits_to_byte(&result.outbits);

        if cfg.verbose > 0 {
            if status & Board::WRITE_HOLD == 0 {
                eprint!("  {}\t{}", display_byte(outbyte), bit_string(&result.outbits));
            } else {
                eprint!("             ");
            }
            if cfg.verbose > 1 {
                print_debug(&result.debug);
                if board.storage_len() > 0 {
                    eprint!("\n\t\t\t\t\t");
                    print_storage(board, false);
                }
            }
            eprintln!();
        }
        last_debug = result.debug;

        if status & Board::WRITE_HOLD == 0 {
            output.write_all(&[outbyte])?;
            if cfg.immediate {
                output.flush()?;
            }
        }

        if status & Board::TERMINATE != 0 {
            break;
        }

        if result.sleep > 0.0 {
            thread::sleep(Duration::from_secs_f64(result.sleep));
        }

        if let Some(jump) = result.jump {
            if jump >= 0 {
                index = jump as usize;
            } else {
                index = index.saturating_sub(jump.unsigned_abs() as usize);
            }
        }
    }

    output.flush()?;
    if interrupted {
        dump_interrupt(board, cfg.verbose, &last_debug);
    } else if cfg.verbose > 1 {
        dump_summary(board, cfg.verbose);
    }
    if cfg.extra_newline {
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(if interrupted { Outcome::Interrupted } else { Outcome::Completed })
}

/// Read a single byte, toggling the terminal into raw mode around
/// the read when asked to. `None` is end of input.
fn read_one(input: &mut dyn Read, raw: bool) -> io::Result<Option<u8>> {
    let _guard = if raw { Some(RawModeGuard::enable()?) } else { None };
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<RawModeGuard> {
        terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn display_byte(byte: u8) -> char {
    if (0x20..0x7f).contains(&byte) {
        byte as char
    } else {
        '�'
    }
}

/// Bits rendered most significant first, matching the `HGFEDCBA`
/// header.
fn bit_string(bits: &[u8; 8]) -> String {
    bits.iter().rev().map(|b| b.to_string()).collect()
}

fn print_debug(debug: &[DebugRecord]) {
    let mut sorted: Vec<&DebugRecord> = debug.iter().collect();
    sorted.sort_by_key(|d| (d.lexeme, d.z, d.y, d.x, d.message.clone()));
    for record in sorted {
        eprint!(
            "\n\t\t\t\t\t{}({},{},{}): {}",
            record.lexeme, record.z, record.y, record.x, record.message
        );
    }
}

/// Storage snapshot, newest word first, bits most significant first.
/// Long containers are elided unless `full` is set.
fn print_storage(board: &Board, full: bool) {
    let label = match board.mode() {
        StorageMode::Stack => "Stack:",
        StorageMode::Queue => "Queue:",
    };
    eprint!("{label} ");
    let words = board.storage_words();
    if words.is_empty() {
        eprint!("empty");
        return;
    }
    let shown: Vec<String> = words
        .iter()
        .rev()
        .take(if full || words.len() < 9 { words.len() } else { 8 })
        .map(|word| word.iter().rev().map(|b| b.to_string()).collect())
        .collect();
    eprint!("{}", shown.join(" "));
    if !full && words.len() >= 9 {
        eprint!(" ... {}more", words.len() - 8);
    }
}

/// The diagnostic dump printed when an interrupt escape ends the run.
fn dump_interrupt(board: &Board, verbose: u8, last_debug: &[DebugRecord]) {
    if !last_debug.is_empty() {
        print_debug(last_debug);
    }
    if verbose > 2 {
        eprint!("\n{}", render::heatmap(board, render::terminal_columns()));
    }
    eprint!("\n");
    print_storage(board, verbose > 1);
    eprint!("\nAge: {}", board.age());
    print_stats(board);
    eprintln!();
}

/// The end-of-run summary for `-v 2` and up.
fn dump_summary(board: &Board, verbose: u8) {
    if verbose > 2 {
        eprint!("\n{}", render::heatmap(board, render::terminal_columns()));
    }
    eprint!("\nAge: {}", board.age());
    print_stats(board);
    eprintln!();
}

fn print_stats(board: &Board) {
    let entries = board.stats.entries(board.mode());
    if entries.is_empty() {
        return;
    }
    eprint!("\nStats: ");
    for (key, value) in entries {
        eprint!("\n{value:>24} {key}");
    }
}
