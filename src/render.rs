//! Verbose-mode views of a parsed board: the framed layer picture
//! (`-v 2`) and the ANSI heatmap of per-element poll counts (`-v 3`).
//! Neither participates in circuit semantics.

use crossterm::terminal;

use crate::board::Board;

const RAMP: [&str; 5] = ["\x1b[36m", "\x1b[34m", "\x1b[32m", "\x1b[33m", "\x1b[31m"];
const RESET: &str = "\x1b[0m";

pub fn terminal_columns() -> usize {
    terminal::size().map(|(w, _)| w as usize).unwrap_or(80)
}

/// Layers per frame row: as many as fit in `columns`, then balanced
/// so the rows come out even.
fn chunk_size(board: &Board, columns: usize) -> usize {
    let mut n = columns.saturating_sub(2) / (board.width() + 1);
    if n == 0 {
        n = 1;
    }
    n = board.depth().div_ceil(n);
    board.depth().div_ceil(n)
}

/// The board as framed layer pictures, side by side.
pub fn render(board: &Board, columns: usize) -> String {
    frames(board, columns, |board, x, y, z| {
        board
            .element_at(x, y, z)
            .map(|e| e.lexeme.to_string())
            .unwrap_or_default()
    })
}

/// The board with each element colored by how often it was polled.
pub fn heatmap(board: &Board, columns: usize) -> String {
    if board.depth() * board.height() * board.width() == 0 {
        return String::new();
    }
    let mut max_calls: u64 = 0;
    for_each_element(board, |e| max_calls = max_calls.max(e.calls.get()));
    let max_calls = max_calls.max(1);
    let scale = (RAMP.len() as f64 * 0.999) / max_calls as f64;

    let legend: Vec<String> = RAMP
        .iter()
        .enumerate()
        .rev()
        .map(|(index, color)| format!("{color}{}", (index as f64 / scale) as u64))
        .collect();
    let header = format!("({max_calls}) {}{RESET}\n", legend.join(" "));

    let body = frames(board, columns, |board, x, y, z| match board.element_at(x, y, z) {
        Some(e) => {
            let heat = (e.calls.get() as f64 * scale) as usize;
            format!("{}{}{RESET}", RAMP[heat.min(RAMP.len() - 1)], e.lexeme)
        }
        None => String::new(),
    });
    header + &body
}

fn for_each_element(board: &Board, mut f: impl FnMut(&crate::element::Element)) {
    for z in 0..board.depth() {
        for y in 0..board.height() {
            for x in 0..board.width() {
                if let Some(e) = board.element_at(x, y, z) {
                    f(e);
                }
            }
        }
    }
}

fn frames(
    board: &Board,
    columns: usize,
    cell: impl Fn(&Board, usize, usize, usize) -> String,
) -> String {
    let chunk = chunk_size(board, columns);
    let horizontal = "═".repeat(board.width());
    let mut out = String::new();
    let layers: Vec<usize> = (0..board.depth()).collect();
    for group in layers.chunks(chunk) {
        let bars: Vec<&str> = group.iter().map(|_| horizontal.as_str()).collect();
        out.push_str(&format!(" ╔{}╗\n", bars.join("╦")));
        for y in 0..board.height() {
            out.push_str(" ║");
            for &z in group {
                for x in 0..board.width() {
                    out.push_str(&cell(board, x, y, z));
                }
                out.push('║');
            }
            out.push('\n');
        }
        out.push_str(&format!(" ╚{}╝\n", bars.join("╩")));
    }
    out
}
