//! The spec reader: from raw text to a rectangular 3D glyph grid.
//!
//! Everything here is best-effort. Bad characters, stray `=` or `;`,
//! and misplaced comments are reported as warnings and replaced with
//! spaces; the reader never fails.

use crate::diagnostic::Diagnostic;
use crate::lexeme::Registry;
use crate::span::Span;

/// The parsed spec: `cells[z][y][x]`, all layers padded to the same
/// height and width.
pub struct Layout {
    pub cells: Vec<Vec<Vec<char>>>,
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

/// Drop a leading `#!` line, if any.
pub fn strip_shebang(source: &str) -> &str {
    if let Some(rest) = source.strip_prefix("#!") {
        match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => "",
        }
    } else {
        source
    }
}

pub fn parse(source: &str, registry: &Registry) -> (Layout, Vec<Diagnostic>) {
    Reader { registry, diagnostics: Vec::new() }.read(source)
}

struct Reader<'r> {
    registry: &'r Registry,
    diagnostics: Vec<Diagnostic>,
}

impl Reader<'_> {
    fn read(mut self, source: &str) -> (Layout, Vec<Diagnostic>) {
        let source = strip_shebang(source).replace("\r\n", "\n").replace('\r', "\n");
        let mut chars: Vec<char> = source.chars().collect();
        self.scrub(&mut chars);

        let text: String = chars.into_iter().collect();
        let mut lines: Vec<String> =
            text.split('\n').map(|line| line.trim_end().to_string()).collect();

        // A spec that opens with a separator has an empty first layer;
        // drop it.
        if lines.first().map(String::as_str) == Some("=") {
            lines.remove(0);
        }

        let mut layers: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for line in lines {
            if line == "=" {
                layers.push(std::mem::take(&mut current));
            } else {
                current.push(line);
            }
        }
        layers.push(current);

        for layer in &mut layers {
            // One optional blank line directly under the separator,
            // and any trailing blank lines, are decoration.
            if layer.first().is_some_and(String::is_empty) {
                layer.remove(0);
            }
            while layer.last().is_some_and(String::is_empty) {
                layer.pop();
            }
            if layer.is_empty() {
                layer.push(String::new());
            }
        }

        let depth = layers.len();
        let height = layers.iter().map(Vec::len).max().unwrap_or(1);
        let width = layers
            .iter()
            .flat_map(|layer| layer.iter().map(|row| row.chars().count()))
            .max()
            .unwrap_or(0);

        let cells = layers
            .into_iter()
            .map(|mut layer| {
                layer.resize(height, String::new());
                layer
                    .into_iter()
                    .map(|row| {
                        let mut cells: Vec<char> = row.chars().collect();
                        cells.resize(width, ' ');
                        cells
                    })
                    .collect()
            })
            .collect();

        (Layout { cells, depth, height, width }, self.diagnostics)
    }

    /// Blank out comments in place and warn on anything the registry
    /// does not know. A layer comment is `=` at column 0 through end
    /// of line; a block comment is `:` through the matching `;`.
    fn scrub(&mut self, chars: &mut [char]) {
        let mut block_comment = false;
        let mut layer_comment = false;
        let mut row = 1usize;
        let mut line_start = 0usize;
        for i in 0..chars.len() {
            let c = chars[i];
            if c == '\n' {
                layer_comment = false;
                row += 1;
                line_start = i + 1;
            } else if block_comment && c == ';' {
                block_comment = false;
                chars[i] = ' ';
            } else if c == '=' && (i == 0 || chars[i - 1] == '\n') {
                layer_comment = true;
            } else if !layer_comment && c == ':' {
                block_comment = true;
                chars[i] = ' ';
            } else if block_comment || layer_comment {
                chars[i] = ' ';
            } else {
                let message = if c == '=' {
                    Some(
                        "'=' must only be found at the beginning of a line, or in a comment"
                            .to_string(),
                    )
                } else if c == ';' {
                    Some(
                        "';' must only be used to terminate a block comment, or found within a \
                         layer comment"
                            .to_string(),
                    )
                } else if !self.registry.contains(c) {
                    Some(format!("'{}' ({}) is not a valid character", c, c as u32))
                } else {
                    None
                };
                if let Some(message) = message {
                    let col = i - line_start + 1;
                    self.diagnostics.push(Diagnostic::warning(
                        message,
                        Span::new(i as u32, i as u32 + 1),
                        row,
                        col,
                    ));
                    chars[i] = ' ';
                }
            }
        }
    }
}
