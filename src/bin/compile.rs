//! Schema Compile CLI
//!
//! Compiles CQL statements and default documents from a JSON schema
//! declaration.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cql_schema::{Projection, QueryCompiler, Schema, SchemaConfig};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-compile")]
#[command(about = "Compile CQL statements from a JSON schema declaration")]
struct Cli {
    /// Path to the JSON schema declaration
    #[arg(short, long)]
    schema: PathBuf,

    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Derive lower-cased column names (overrides config)
    #[arg(long)]
    insensitive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List declared paths with their columns and types
    Paths,

    /// Compile a SELECT statement
    Select {
        /// Table name
        #[arg(short, long)]
        table: String,

        /// Criteria as JSON, or @file
        #[arg(short = 'w', long = "where")]
        criteria: Option<String>,

        /// Comma-separated columns to project
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Row limit (0 = none)
        #[arg(short, long, default_value_t = 0)]
        limit: u64,
    },

    /// Compile an INSERT statement
    Insert {
        /// Table name
        #[arg(short, long)]
        table: String,

        /// Record as JSON, or @file
        #[arg(short, long)]
        record: String,

        /// Comma-separated fields to write
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Build a default document
    Build {
        /// Projection as JSON, or @file
        #[arg(short, long)]
        projection: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the compiled statement carries validation errors
fn run(cli: Cli) -> Result<bool> {
    let mut config = SchemaConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    if cli.insensitive {
        config.schema.insensitive = true;
    }

    let text = fs::read_to_string(&cli.schema)
        .with_context(|| format!("failed to read {}", cli.schema.display()))?;
    let declaration: Value = serde_json::from_str(&text).context("invalid schema JSON")?;
    let schema = Schema::with_options(&declaration, config.schema)
        .with_context(|| format!("invalid schema {}", cli.schema.display()))?;
    let compiler = QueryCompiler::new(&schema).with_settings(config.compiler.clone());

    match cli.command {
        Commands::Paths => {
            for path in schema.leaf_paths() {
                if let Some(typed) = schema.paths().get(&path) {
                    let required = if typed.is_required() { " (required)" } else { "" };
                    println!("{:<30} {:<30} {}{}", path, typed.column(), typed.instance(), required);
                }
            }
            Ok(true)
        }

        Commands::Select { table, criteria, fields, limit } => {
            let criteria = match criteria {
                Some(arg) => read_json(&arg)?,
                None => Value::Null,
            };
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let compiled = compiler.select(&table, &criteria, &fields, limit)?;
            println!("{}", serde_json::to_string_pretty(&compiled)?);
            Ok(true)
        }

        Commands::Insert { table, record, fields } => {
            let record = read_json(&record)?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let compiled = compiler.insert(&table, &record, &fields)?;
            println!("{}", serde_json::to_string_pretty(&compiled)?);
            Ok(compiled.is_valid())
        }

        Commands::Build { projection } => {
            let projection = projection
                .map(|arg| read_json(&arg).and_then(|v| Ok(Projection::from_json(&v)?)))
                .transpose()?;
            let doc = schema.build(projection.as_ref());
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(true)
        }
    }
}

/// Parse inline JSON, or the contents of a file when prefixed with `@`
fn read_json(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("invalid JSON")
}
