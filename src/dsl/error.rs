use super::ast::Span;

/// A compilation error with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexer,
    Parser,
    Macro,
    Validation,
    Internal,
}

/// Where a VU lives in its documentation source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub file: String,
    /// Line of the first line of the VU text.
    pub line: usize,
    /// Columns preceding the VU text (indentation stripped before parsing).
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// `file:line:` prefix used for warnings that are not tied to a node.
    pub fn prefix(&self) -> String {
        format!("{}:{}:", self.file, self.line)
    }
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Lexer,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Parser,
        }
    }

    pub fn macro_error(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Macro,
        }
    }

    pub fn validation(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Validation,
        }
    }

    pub fn internal(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Internal,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self.kind, ErrorKind::Lexer | ErrorKind::Parser)
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let (line, col) = offset_to_line_col(source, self.span.start);
        format!(
            "[{}] line {}:{}: {}",
            self.kind_name(),
            line,
            col,
            self.message,
        )
    }

    /// Format the error against the VU's place in its file, followed by the
    /// offending line and a caret under the error column.
    pub fn format_at(&self, source: &str, location: &Location) -> String {
        let (line, col) = offset_to_line_col(source, self.span.start);
        let file_line = location.line + line - 1;
        let mut out = format!(
            "{}:{}:{}: {}",
            location.file,
            file_line,
            col + location.column,
            self.message,
        );
        if let Some(text) = source.lines().nth(line - 1) {
            out.push_str("\n    ");
            out.push_str(text);
            out.push_str("\n    ");
            out.push_str(&" ".repeat(col - 1));
            out.push('^');
        }
        out
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            ErrorKind::Lexer => "lexer",
            ErrorKind::Parser => "parser",
            ErrorKind::Macro => "macro",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn format_with_source_reports_line_and_column() {
        let err = CompileError::parser("Unexpected token", Span::new(9, 10));
        assert_eq!(
            err.format_with_source("if a:\n  b c"),
            "[parser] line 2:4: Unexpected token"
        );
    }

    #[test]
    fn format_at_offsets_by_location() {
        let err = CompileError::validation("bad", Span::new(8, 9));
        let loc = Location::new("renderpass.adoc", 100, 4);
        let text = err.format_at("require(x)", &loc);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("renderpass.adoc:100:13: bad"));
        assert_eq!(lines.next(), Some("    require(x)"));
        assert_eq!(lines.next(), Some("            ^"));
    }
}
