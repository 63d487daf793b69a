use crate::span::Span;

/// A spec-reader diagnostic. Everything the reader reports is a
/// warning: the offending character is replaced with a space and
/// parsing continues.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// 1-based position in the spec text, after shebang stripping.
    pub row: usize,
    pub col: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    pub fn warning(message: String, span: Span, row: usize, col: usize) -> Self {
        Self { severity: Severity::Warning, message, span, row, col }
    }

    pub fn error(message: String, span: Span, row: usize, col: usize) -> Self {
        Self { severity: Severity::Error, message, span, row, col }
    }

    /// The one-line `row:col WARN: message` form.
    pub fn brief(&self) -> String {
        let label = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        format!("{}:{} {}: {}", self.row, self.col, label, self.message)
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(color),
            )
            .finish()
            .eprint((filename, Source::from(source)))
            .unwrap();
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
