//! Schema Reference Resolver CLI
//!
//! Command-line interface for dereferencing JSON Schema documents.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use schemaref::{
    dereference, load_schema_auto, LoaderOptions, ResolveError, ResolvedSchema, SchemaLoader,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemaref")]
#[command(about = "Resolve $ref references and JSON Pointers in JSON Schema documents")]
#[command(version)]
struct Cli {
    /// Log resolution progress to stderr (repeat for more detail)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Schema source: file path or URL (http:// or https://)
    schema: String,

    /// Resolve relative references against this URI instead of the source location
    #[arg(long)]
    base_uri: Option<String>,

    /// Accept documents regardless of the content type they are served with
    #[arg(long)]
    no_media_type_check: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Dereference every $ref and print the resulting schema
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Dereference the schema and print the node at a JSON pointer
    Pointer {
        #[command(flatten)]
        source: SourceArgs,

        /// JSON pointer, e.g. /definitions/address (a leading # is allowed)
        pointer: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check that every $ref in the schema resolves
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Resolve {
            source,
            output,
            pretty,
        } => run_resolve(&source, output, pretty),
        Commands::Pointer {
            source,
            pointer,
            pretty,
        } => run_pointer(&source, &pointer, pretty),
        Commands::Check { source, json } => run_check(&source, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(format!("schemaref={default_level}"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the source and dereference it.
fn load_and_resolve(args: &SourceArgs) -> Result<ResolvedSchema, ResolveError> {
    let options = LoaderOptions::new()
        .check_media_type(!args.no_media_type_check)
        .http_timeout(std::time::Duration::from_secs(args.timeout));
    let loader = SchemaLoader::new(options);

    let (schema, location) = load_schema_auto(&args.schema, &loader)?;
    let base_uri = args.base_uri.clone().unwrap_or(location);
    tracing::debug!(base_uri = %base_uri, "dereferencing schema");
    dereference(&schema, &base_uri, &loader)
}

fn to_json(value: &Value, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn run_resolve(source: &SourceArgs, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let resolved = load_and_resolve(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = to_json(&resolved.to_value(), pretty)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_pointer(source: &SourceArgs, pointer: &str, pretty: bool) -> Result<(), u8> {
    let resolved = load_and_resolve(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let Some(value) = resolved.pointer(pointer).and_then(|node| resolved.value_at(node)) else {
        eprintln!("Error: pointer \"{}\" does not resolve", pointer);
        return Err(2);
    };

    println!("{}", to_json(&value, pretty)?);
    Ok(())
}

#[derive(Serialize)]
struct CheckReport {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_check(source: &SourceArgs, json_output: bool) -> Result<(), u8> {
    let result = load_and_resolve(source);
    let report = CheckReport {
        valid: result.is_ok(),
        error: result.as_ref().err().map(ToString::to_string),
    };

    if json_output {
        let output = serde_json::to_string(&report).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else if let Some(error) = &report.error {
        eprintln!("Error: {}", error);
    } else {
        println!("OK: all references resolve");
    }

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(e.exit_code() as u8),
    }
}
