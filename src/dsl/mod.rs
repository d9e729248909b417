#[allow(
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
)]
pub mod ast;
#[allow(
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::module_name_repetitions,
)]
pub mod error;
#[allow(
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::module_name_repetitions,
)]
pub mod lexer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod parser;
pub mod builtins;
#[allow(
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
)]
pub mod macros;
#[allow(
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod typeck;
#[allow(
    clippy::wildcard_imports,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod optimize;
#[allow(
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
)]
pub mod format;
#[allow(
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
)]
pub mod prose;
#[allow(
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
)]
pub mod tag;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use ast::{Module, Span};
use error::{CompileError, Location};
use macros::MacroTable;
use optimize::Build;

/// A VU's text after bullet, indentation and grep tag removal.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedVu {
    /// The text handed to the lexer.
    pub source: String,
    /// Columns removed from every line.
    pub indent: usize,
    /// Lines dropped from the top (the grep tag).
    pub skipped_lines: usize,
}

impl PreparedVu {
    /// Where `source` starts, given where the VU text starts.
    pub fn location(&self, file: &str, line: usize, column_offset: usize) -> Location {
        Location::new(file, line + self.skipped_lines, self.indent + column_offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVu {
    pub prepared: PreparedVu,
    pub module: Module,
}

/// Replace a leading `*` bullet with spaces, keeping columns intact.
pub fn remove_bullet(text: &str) -> String {
    let indent = text.len() - text.trim_start_matches(' ').len();
    let rest = text.get(indent..).unwrap_or_default();
    match rest.strip_prefix('*') {
        Some(after) => {
            let gap = after.len() - after.trim_start_matches(' ').len();
            format!("{}{}", " ".repeat(indent + 1 + gap), after.trim_start_matches(' '))
        }
        None => text.to_string(),
    }
}

/// Strip the first line's indentation from every line and skip the grep
/// tag. Every non-blank line must be indented at least as much as the first.
pub fn prepare_vu(text: &str) -> Result<PreparedVu, CompileError> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    let indent = lines
        .first()
        .map_or(0, |l| l.len() - l.trim_start_matches(' ').len());

    let mut skipped_lines = 0;
    if lines.first().is_some_and(|l| l.trim() == format::GREP_TAG) {
        lines.remove(0);
        skipped_lines = 1;
    }

    let mut source = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            source.push('\n');
        }
        if line.trim().is_empty() {
            continue;
        }
        match line.get(..indent) {
            Some(prefix) if prefix.trim().is_empty() => source.push_str(line.get(indent..).unwrap_or_default()),
            _ => {
                let start = source.len();
                source.push_str(line.trim_start());
                return Err(CompileError::parser(
                    "VU line is indented less than the first line",
                    Span::new(start, source.len()),
                ));
            }
        }
    }

    Ok(PreparedVu {
        source,
        indent,
        skipped_lines,
    })
}

/// Parse a VU paragraph (bullet already removed) into its AST, without
/// expanding macros.
pub fn parse_vu(text: &str) -> Result<ParsedVu, Vec<CompileError>> {
    let prepared = prepare_vu(text).map_err(|e| vec![e])?;
    let tokens = lexer::lex(&prepared.source)?;
    let module = parser::parse(tokens)?;
    Ok(ParsedVu { prepared, module })
}

/// Rendering options shared by every VU of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Columns between the start of the source line and the VU text, added
    /// to diagnostic columns.
    pub column_offset: usize,
    /// Line width for boolean operations; 0 always wraps them.
    pub max_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            column_offset: 4,
            max_width: 0,
        }
    }
}

/// One VU to compile, as handed over by the documentation build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VuRequest {
    /// Struct or command the VU validates; may be a `{macro}`.
    pub api: String,
    pub file: String,
    pub line: usize,
    /// `name$value$name$value...`, possibly empty.
    #[serde(default)]
    pub macros: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VuOutcome {
    Failed {
        diagnostics: Vec<String>,
    },
    /// Nothing of the VU applies to this build.
    Eliminated {
        warnings: Vec<String>,
    },
    Compiled {
        /// Reformatted documentation source, macros unexpanded.
        source: String,
        markup: String,
        prose: String,
        warnings: Vec<String>,
    },
}

impl VuOutcome {
    pub fn warnings(&self) -> &[String] {
        match self {
            VuOutcome::Failed { diagnostics } => diagnostics,
            VuOutcome::Eliminated { warnings } | VuOutcome::Compiled { warnings, .. } => warnings,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, VuOutcome::Failed { .. })
    }
}

/// A VU that parsed, expanded and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedVu {
    pub prepared: PreparedVu,
    pub location: Location,
    /// As written, macros unexpanded.
    pub module: Module,
    pub expanded: Module,
    /// The API the VU is attached to, with any macro resolved.
    pub api: String,
}

/// Parse, expand and validate a VU. Errors come back formatted against
/// the documentation source.
pub fn verify_vu(request: &VuRequest, schema: &Schema, column_offset: usize) -> Result<VerifiedVu, Vec<String>> {
    let text = remove_bullet(&request.text);
    let prepared = prepare_vu(&text).map_err(|e| {
        let location = Location::new(&request.file, request.line, column_offset);
        vec![format!("{} {}", location.prefix(), e.message)]
    })?;
    let location = prepared.location(&request.file, request.line, column_offset);
    let fail = |errors: Vec<CompileError>| -> Vec<String> {
        errors
            .iter()
            .map(|e| e.format_at(&prepared.source, &location))
            .collect()
    };

    let module = lexer::lex(&prepared.source)
        .and_then(parser::parse)
        .map_err(fail)?;
    let table = MacroTable::from_decl(&request.macros).map_err(|e| fail(vec![e]))?;
    let expanded = macros::expand(&module, &table).map_err(fail)?;
    let api = table.resolve_api_name(&request.api).map_err(|e| fail(vec![e]))?;
    typeck::validate(&expanded, schema, &api).map_err(fail)?;

    Ok(VerifiedVu {
        prepared,
        location,
        module,
        expanded,
        api,
    })
}

/// The whole pipeline for one VU:
/// text → parse → expand macros → validate → strip for build → DCE → render.
pub fn compile_vu(request: &VuRequest, schema: &Schema, build: &Build, options: RenderOptions) -> VuOutcome {
    let vu = match verify_vu(request, schema, options.column_offset) {
        Ok(vu) => vu,
        Err(diagnostics) => return VuOutcome::Failed { diagnostics },
    };
    let prefix = vu.location.prefix();

    let mut warnings = Vec::new();
    let (cleaned, has_dead_code) = optimize::remove_dead_code(&vu.expanded);
    if has_dead_code {
        let cleaned = cleaned.map_or_else(|| "<empty>".to_string(), |m| format::render_source(&m, 0));
        warnings.push(format!(
            "{prefix} VU has dead code\nOriginal VU:\n{}\nVU after dead code elimination:\n{cleaned}",
            vu.prepared.source
        ));
    }

    let elimination = match optimize::eliminate(&vu.expanded, schema, build) {
        Ok(e) => e,
        Err(e) => {
            return VuOutcome::Failed {
                diagnostics: vec![e.format_at(&vu.prepared.source, &vu.location)],
            }
        }
    };
    warnings.extend(elimination.warnings.iter().map(|w| format!("{prefix} {w}")));

    match elimination.module {
        None => VuOutcome::Eliminated { warnings },
        Some(stripped) => VuOutcome::Compiled {
            source: format::render_vu_source(&vu.module, options.max_width),
            markup: format::render_markup(&stripped, schema, options.max_width),
            prose: prose::render_prose(&stripped, schema),
            warnings,
        },
    }
}
