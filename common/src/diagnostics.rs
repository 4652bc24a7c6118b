use crate::Span;
use codespan_reporting::diagnostic as cs;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
pub use cs::Severity;
use term::termcolor::{BufferWriter, ColorChoice};

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

impl From<LabelStyle> for cs::LabelStyle {
    fn from(style: LabelStyle) -> Self {
        match style {
            LabelStyle::Primary => cs::LabelStyle::Primary,
            LabelStyle::Secondary => cs::LabelStyle::Secondary,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Label {
    pub style: LabelStyle,
    pub span: Span,
    pub message: String,
}

impl Label {
    /// Create a primary label with the given message. This will underline the
    /// given span with carets (`^^^^`).
    pub fn primary<S: Into<String>>(span: Span, message: S) -> Self {
        Label {
            style: LabelStyle::Primary,
            span,
            message: message.into(),
        }
    }

    /// Create a secondary label with the given message. This will underline
    /// the given span with hyphens (`----`).
    pub fn secondary<S: Into<String>>(span: Span, message: S) -> Self {
        Label {
            style: LabelStyle::Secondary,
            span,
            message: message.into(),
        }
    }

    fn into_cs_label(self, file_id: usize) -> cs::Label<usize> {
        cs::Label {
            style: self.style.into(),
            file_id,
            range: self.span.into(),
            message: self.message,
        }
    }
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, labels: Vec<Label>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            labels,
            notes: vec![],
        }
    }

    fn into_cs(self, file_id: usize) -> cs::Diagnostic<usize> {
        cs::Diagnostic {
            severity: self.severity,
            code: None,
            message: self.message,
            labels: self
                .labels
                .into_iter()
                .map(|label| label.into_cs_label(file_id))
                .collect(),
            notes: self.notes,
        }
    }
}

/// Format a diagnostic against a single named source as a string.
pub fn diagnostic_string(diagnostic: &Diagnostic, source_name: &str, content: &str) -> String {
    let mut files = SimpleFiles::new();
    let file_id = files.add(source_name, content);

    let writer = BufferWriter::stderr(ColorChoice::Never);
    let mut buffer = writer.buffer();
    let config = term::Config::default();

    term::emit(&mut buffer, &config, &files, &diagnostic.clone().into_cs(file_id))
        .expect("failed to emit diagnostic");
    std::str::from_utf8(buffer.as_slice())
        .expect("diagnostic output is not utf8")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{diagnostic_string, Diagnostic, Label};
    use crate::Span;

    #[test]
    fn renders_primary_label() {
        let diag = Diagnostic::error(
            "unknown name",
            vec![Label::primary(Span::new(9, 12), "not found")],
        );
        let out = diagnostic_string(&diag, "main", "contract foo {}");
        assert!(out.contains("unknown name"));
        assert!(out.contains("not found"));
    }
}
