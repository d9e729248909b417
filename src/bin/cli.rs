use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use vu_compiler::batch::{self, Summary};
use vu_compiler::config::{config_schema, BuildConfig};
use vu_compiler::dsl::error::CompileError;
use vu_compiler::dsl::tag::{param_tag, reformat_paragraph};
use vu_compiler::dsl::{self, remove_bullet, VuOutcome, VuRequest};
use vu_compiler::preprocessor::{self, Preprocessor};
use vu_compiler::{AppError, Schema};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vu-compiler", about = "Codified valid usage compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Registry XML (vk.xml)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// JSON build configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Versions in the build, space or comma separated (e.g. "1.0 1.1")
    #[arg(long, global = true)]
    versions: Option<String>,

    /// Extensions in the build, space or comma separated
    #[arg(long, global = true)]
    extensions: Option<String>,

    /// Line width for boolean chains (0 always wraps)
    #[arg(long, global = true)]
    max_width: Option<usize>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Speak the preprocessor protocol on stdin/stdout
    Serve,
    /// Parse and validate a VU
    Check {
        file: PathBuf,
        #[command(flatten)]
        vu: VuArgs,
    },
    /// Compile a VU for the build and print it
    Format {
        file: PathBuf,
        #[command(flatten)]
        vu: VuArgs,
        #[arg(long, value_enum, default_value_t = Style::Markup)]
        style: Style,
    },
    /// Reformat a VU paragraph of documentation source
    Reflow {
        file: PathBuf,
        /// Lines containing this are kept as the VUID line
        #[arg(long, default_value = "VUID-")]
        vuid_prefix: String,
    },
    /// Print the parameter a VU's VUID is tagged with
    Tag { file: PathBuf },
    /// Compile a JSON array of VU requests
    Batch {
        file: PathBuf,
        /// Worker threads (default: one per core)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the JSON schema of the build configuration
    ConfigSchema,
}

#[derive(clap::Args)]
struct VuArgs {
    /// Struct or command the VU is attached to
    #[arg(long)]
    api: String,
    /// Macro declaration, name$value$name$value...
    #[arg(long, default_value = "")]
    macros: String,
    /// Line of the VU in its documentation source
    #[arg(long, default_value_t = 1)]
    line: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Style {
    Source,
    Markup,
    Prose,
}

// ── Setup ────────────────────────────────────────────────────────

fn exit_with(err: &AppError, json: bool) -> ! {
    if json {
        println!("{}", serde_json::to_string_pretty(err).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
    }
    process::exit(1);
}

fn load_config(cli: &Cli) -> Result<BuildConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };
    if let Some(registry) = &cli.registry {
        config.registry = Some(registry.clone());
    }
    if let Some(versions) = &cli.versions {
        config.set_versions(versions);
    }
    if let Some(extensions) = &cli.extensions {
        config.set_extensions(extensions);
    }
    if let Some(max_width) = cli.max_width {
        config.max_width = max_width;
    }
    Ok(config)
}

fn load_schema(config: &BuildConfig) -> Result<Schema, AppError> {
    let path = config.registry_path()?;
    if !path.exists() {
        return Err(AppError::NotFound {
            what: format!("Registry {}", path.display()),
        });
    }
    Schema::load(path)
}

fn read_text(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|e| AppError::IoError {
        message: format!("{}: {e}", path.display()),
    })
}

fn request_for(file: &Path, vu: &VuArgs) -> Result<VuRequest, AppError> {
    Ok(VuRequest {
        api: vu.api.clone(),
        file: file.display().to_string(),
        line: vu.line,
        macros: vu.macros.clone(),
        text: read_text(file)?,
    })
}

fn print_diagnostics(diagnostics: &[String]) {
    for diagnostic in diagnostics {
        eprintln!("[vu] {diagnostic}");
    }
}

/// Locate errors from parsing a whole file as one VU.
fn syntax_diagnostics(file: &Path, text: &str, errors: &[CompileError]) -> Vec<String> {
    match dsl::prepare_vu(&remove_bullet(text)) {
        Ok(prepared) => {
            let location = prepared.location(&file.display().to_string(), 1, 0);
            errors
                .iter()
                .map(|e| e.format_at(&prepared.source, &location))
                .collect()
        }
        Err(_) => errors
            .iter()
            .map(|e| format!("{}: {e}", file.display()))
            .collect(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// ── Commands ─────────────────────────────────────────────────────

fn run(cli: &Cli) -> Result<bool, AppError> {
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Serve => {
            let schema = load_schema(&config)?;
            let mut pp = Preprocessor::new(&schema, config.build(), config.options());
            preprocessor::serve(&mut pp, io::stdin().lock(), io::stdout().lock(), io::stderr().lock())?;
            Ok(true)
        }
        Commands::Check { file, vu } => {
            let schema = load_schema(&config)?;
            let request = request_for(file, vu)?;
            let result = dsl::verify_vu(&request, &schema, config.column_offset);
            let diagnostics = result.as_ref().err().cloned().unwrap_or_default();
            if cli.json {
                print_json(&serde_json::json!({ "valid": result.is_ok(), "diagnostics": diagnostics }));
            } else if result.is_ok() {
                println!("{}: ok", request.file);
            } else {
                print_diagnostics(&diagnostics);
            }
            Ok(result.is_ok())
        }
        Commands::Format { file, vu, style } => {
            let schema = load_schema(&config)?;
            let request = request_for(file, vu)?;
            let outcome = dsl::compile_vu(&request, &schema, &config.build(), config.options());
            if cli.json {
                print_json(&outcome);
                return Ok(!outcome.is_failed());
            }
            print_diagnostics(outcome.warnings());
            match &outcome {
                VuOutcome::Failed { .. } => {}
                VuOutcome::Eliminated { .. } => eprintln!("[vu] VU is eliminated for this build"),
                VuOutcome::Compiled {
                    source,
                    markup,
                    prose,
                    ..
                } => match style {
                    Style::Source => println!("{source}"),
                    Style::Markup => println!("{markup}"),
                    Style::Prose => println!("{prose}"),
                },
            }
            Ok(!outcome.is_failed())
        }
        Commands::Reflow { file, vuid_prefix } => {
            let text = read_text(file)?;
            let lines: Vec<&str> = text.lines().collect();
            match reformat_paragraph(&lines, vuid_prefix) {
                Ok(out) => {
                    println!("{}", out.join("\n"));
                    Ok(true)
                }
                Err(errors) => {
                    print_diagnostics(&syntax_diagnostics(file, &text, &errors));
                    Ok(false)
                }
            }
        }
        Commands::Tag { file } => {
            let text = read_text(file)?;
            match dsl::parse_vu(&remove_bullet(&text)) {
                Ok(parsed) => {
                    let tag = param_tag(&parsed.module);
                    if cli.json {
                        print_json(&serde_json::json!({ "tag": tag }));
                    } else if let Some(tag) = tag {
                        println!("{tag}");
                    }
                    Ok(true)
                }
                Err(errors) => {
                    print_diagnostics(&syntax_diagnostics(file, &text, &errors));
                    Ok(false)
                }
            }
        }
        Commands::Batch { file, workers } => {
            let schema = load_schema(&config)?;
            let requests: Vec<VuRequest> = serde_json::from_str(&read_text(file)?)?;
            let workers = workers.unwrap_or_else(batch::default_workers);
            let outcomes = batch::compile_all(&requests, &schema, &config.build(), config.options(), workers);
            let summary = Summary::of(&outcomes);
            if cli.json {
                print_json(&outcomes);
            } else {
                for (request, outcome) in requests.iter().zip(&outcomes) {
                    let status = match outcome {
                        VuOutcome::Failed { .. } => "failed",
                        VuOutcome::Eliminated { .. } => "eliminated",
                        VuOutcome::Compiled { .. } => "compiled",
                    };
                    println!("{}:{}: {status}", request.file, request.line);
                    print_diagnostics(outcome.warnings());
                }
                println!(
                    "{} compiled, {} eliminated, {} failed",
                    summary.compiled, summary.eliminated, summary.failed
                );
            }
            Ok(summary.failed == 0)
        }
        Commands::ConfigSchema => {
            print_json(&config_schema());
            Ok(true)
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => exit_with(&e, cli.json),
    }
}
