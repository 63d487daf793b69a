pub mod board;
pub mod diagnostic;
pub mod driver;
pub mod element;
pub mod generate;
pub mod lexeme;
pub mod parser;
pub mod render;
pub mod span;

pub use board::{Board, RunResult, StorageMode};
pub use driver::Config;
pub use generate::Generator;
pub use lexeme::Registry;
pub use parser::Layout;

use diagnostic::Diagnostic;

/// Parse a spec and wire it onto a fresh board.
pub fn build_board(
    source: &str,
    registry: &Registry,
    mode: StorageMode,
) -> (Board, Vec<Diagnostic>) {
    let (layout, warnings) = parser::parse(source, registry);
    (Board::new(layout, registry, mode), warnings)
}
