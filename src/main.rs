//! nosql-params CLI - inspect and render parameterized queries

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use nosql_params::{BindConfig, FixSuggestion, ParamError, Query, Value};

#[derive(Parser)]
#[command(name = "nosql-params")]
#[command(about = "Deferred parameter binding for NoSQL query values")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the @parameters a query declares
    Inspect {
        /// Query text, e.g. "select * from God where name = @name"
        query: String,
    },

    /// Bind values and print the rendered query
    Render {
        /// Query text
        query: String,

        /// Binding as name=value (value parsed as JSON, else taken as a string)
        #[arg(short, long = "bind", value_name = "NAME=VALUE")]
        bind: Vec<String>,

        /// JSON or YAML file holding an object of name: value
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Skip bindings for names the query does not declare
        #[arg(long)]
        ignore_unknown: bool,
    },
}

fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { query } => inspect(&query),
        Commands::Render {
            query,
            bind,
            file,
            ignore_unknown,
        } => render(&query, &bind, file.as_deref(), ignore_unknown),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<ParamError>().and_then(|p| p.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn inspect(text: &str) -> anyhow::Result<()> {
    let query = Query::parse(text)?;
    let names = query.names();

    if names.is_empty() {
        println!("{} No parameters", "✓".green());
        return Ok(());
    }

    println!("{} {} parameter(s)", "→".cyan(), names.len());
    for name in names {
        println!("  @{}", name);
    }
    Ok(())
}

fn render(text: &str, binds: &[String], file: Option<&Path>, ignore_unknown: bool) -> anyhow::Result<()> {
    let mut config = BindConfig::from_env();
    if ignore_unknown {
        config = config.with_ignore_unknown(true);
    }

    let query = Query::parse_with(text, config)?;

    if let Some(path) = file {
        let bindings = load_bindings(path)?;
        query.params().bind_json(&bindings)?;
    }

    for raw in binds {
        let (name, value) = parse_binding(raw)?;
        query.bind(name, value)?;
    }

    println!("{}", query.render()?);
    Ok(())
}

/// Read a binding file; `.yaml`/`.yml` as YAML, anything else as JSON
fn load_bindings(path: &Path) -> Result<serde_json::Value, ParamError> {
    let content = fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

/// Split `name=value`; the value is JSON when it parses, else a plain string
fn parse_binding(raw: &str) -> Result<(&str, Value), ParamError> {
    let (name, value) = raw.split_once('=').ok_or_else(|| ParamError::InvalidBindings {
        details: format!("'{}' is not NAME=VALUE", raw),
    })?;
    let value = serde_json::from_str::<serde_json::Value>(value)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(value));
    Ok((name.trim(), value))
}
