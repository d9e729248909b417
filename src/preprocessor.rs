//! Line protocol spoken with the documentation build, which spawns the
//! compiler once and streams every codified VU through it.
//!
//! ```text
//! VERSIONS                      FORMAT-VU
//! <versions>                    <api>
//! <extensions>                  <file>
//! VERSIONS-END                  <line>
//!                               <macros>
//! EXIT                          <vu lines...>
//!                               FORMAT-VU-END
//! ```
//!
//! Responses are flushed one at a time. Diagnostics go to a separate stream.

use std::io::{BufRead, Write};

use crate::dsl::optimize::Build;
use crate::dsl::tag::is_codified;
use crate::dsl::{compile_vu, RenderOptions, VuOutcome, VuRequest};
use crate::error::AppError;
use crate::schema::Schema;

pub const VERSIONS: &str = "VERSIONS";
pub const VERSIONS_END: &str = "VERSIONS-END";
pub const VERSIONS_SUCCESS: &str = "VERSIONS-SUCCESS";
pub const FORMAT_VU: &str = "FORMAT-VU";
pub const FORMAT_VU_END: &str = "FORMAT-VU-END";
pub const FORMAT_VU_TEXT: &str = "FORMAT-VU-TEXT";
pub const EXIT: &str = "EXIT";

/// Session state: the build the documentation is being generated for.
pub struct Preprocessor<'a> {
    schema: &'a Schema,
    build: Build,
    options: RenderOptions,
}

/// Reply lines plus the diagnostics to print alongside them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub lines: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(schema: &'a Schema, build: Build, options: RenderOptions) -> Self {
        Self {
            schema,
            build,
            options,
        }
    }

    pub fn build(&self) -> &Build {
        &self.build
    }

    /// `VERSIONS`: space-separated versions, then extensions (may be empty).
    pub fn versions(&mut self, command: &[String]) -> Response {
        let versions = command.first().map_or("", String::as_str);
        let extensions = command.get(1).map_or("", String::as_str);
        self.build = Build::new(versions.split(' '), extensions.split(' '));
        Response {
            lines: vec![VERSIONS_SUCCESS.to_string()],
            diagnostics: Vec::new(),
        }
    }

    /// `FORMAT-VU`: compile one VU for the current build.
    pub fn format_vu(&self, command: &[String]) -> Response {
        let request = match parse_format_command(command) {
            Ok(request) => request,
            Err(message) => {
                return Response {
                    lines: respond(command.get(4..).unwrap_or_default().to_vec(), "FAIL"),
                    diagnostics: vec![message],
                };
            }
        };
        let vu_lines: Vec<String> = request.text.lines().map(str::to_string).collect();
        if !is_codified(&vu_lines) {
            return Response {
                lines: respond(vu_lines, "FAIL"),
                diagnostics: vec![format!(
                    "{}:{}: VU is not codified",
                    request.file, request.line
                )],
            };
        }

        match compile_vu(&request, self.schema, &self.build, self.options) {
            VuOutcome::Failed { diagnostics } => Response {
                lines: respond(vu_lines, "FAIL"),
                diagnostics,
            },
            VuOutcome::Eliminated { warnings } => Response {
                lines: respond(Vec::new(), "ELIMINATED"),
                diagnostics: warnings,
            },
            VuOutcome::Compiled {
                markup,
                prose,
                warnings,
                ..
            } => Response {
                lines: respond(vec![markup, FORMAT_VU_TEXT.to_string(), prose], "SUCCESS"),
                diagnostics: warnings,
            },
        }
    }
}

fn respond(mut body: Vec<String>, status: &str) -> Vec<String> {
    body.insert(0, FORMAT_VU.to_string());
    body.push(format!("{FORMAT_VU}-{status}"));
    body
}

fn parse_format_command(command: &[String]) -> Result<VuRequest, String> {
    let [api, file, line, macros, text @ ..] = command else {
        return Err(format!("{FORMAT_VU} request is missing fields"));
    };
    if text.is_empty() {
        return Err(format!("{file}:{line}: {FORMAT_VU} request has no VU text"));
    }
    let line = line
        .trim()
        .parse()
        .map_err(|_| format!("{file}: invalid line number \"{line}\""))?;
    Ok(VuRequest {
        api: api.clone(),
        file: file.clone(),
        line,
        macros: macros.clone(),
        text: text.join("\n"),
    })
}

/// Read lines up to (not including) `end`. `None` if the input ends first.
fn read_command<R: BufRead>(input: &mut R, end: &str) -> Result<Option<Vec<String>>, AppError> {
    let mut command = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line == end {
            return Ok(Some(command));
        }
        command.push(line.to_string());
    }
}

/// Serve requests until `EXIT` or end of input, even mid-command. An
/// unknown command is answered with an error line and ends the session
/// with an error.
pub fn serve<R, W, D>(
    preprocessor: &mut Preprocessor<'_>,
    mut input: R,
    mut output: W,
    mut diagnostics: D,
) -> Result<(), AppError>
where
    R: BufRead,
    W: Write,
    D: Write,
{
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();

        let response = match command.as_str() {
            EXIT => return Ok(()),
            VERSIONS => {
                let Some(command) = read_command(&mut input, VERSIONS_END)? else {
                    return Ok(());
                };
                preprocessor.versions(&command)
            }
            FORMAT_VU => {
                let Some(command) = read_command(&mut input, FORMAT_VU_END)? else {
                    return Ok(());
                };
                preprocessor.format_vu(&command)
            }
            _ => {
                let err = AppError::ProtocolError {
                    message: format!("invalid command \"{command}\""),
                };
                writeln!(output, "{err}")?;
                output.flush()?;
                return Err(err);
            }
        };

        for diagnostic in &response.diagnostics {
            for text in diagnostic.lines() {
                writeln!(diagnostics, "[vu] {text}")?;
            }
        }
        writeln!(output, "{}", response.lines.join("\n"))?;
        output.flush()?;
    }
}
