//! squall: run statements against configured databases.
//!
//! # Usage
//!
//! ```bash
//! # Run a statement against a database named in squall.toml
//! squall exec local "SELECT title FROM test WHERE id = ?" --bind 10
//!
//! # Show how a dialect quotes an identifier
//! squall quote mysql "order"
//!
//! # List compiled-in backends
//! squall backends
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use squall::compiler::dialects;
use squall::compiler::state::CompileState;
use squall::config::SquallConfig;
use squall::database::{Connection, ConnectionDescriptor, RawStatement};
use squall::value::{Row, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "squall")]
#[command(version)]
#[command(about = "Dialect-aware SQL runner", long_about = None)]
#[command(after_help = "EXAMPLES:
    squall exec local 'SELECT * FROM test WHERE id = ?' --bind 10
    squall exec app.db 'UPDATE test SET title = ? WHERE id = ?' --bind x --bind 1 --commit
    squall quote postgres 'with space'")]
struct Cli {
    /// Config file with [databases.<name>] tables
    #[arg(short, long, env = "SQUALL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one statement and print its rows
    Exec {
        /// Configured database name, or a path to a SQLite file
        database: String,
        /// SQL text with `?` placeholders
        sql: String,
        /// Parameter values, in placeholder order
        #[arg(short, long)]
        bind: Vec<String>,
        /// Commit instead of rolling back afterwards
        #[arg(long)]
        commit: bool,
    },
    /// Quote an identifier the way a dialect renders it
    Quote {
        dialect: String,
        identifier: String,
    },
    /// List the backends compiled into this build
    Backends,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("squall=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("squall=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Exec {
            database,
            sql,
            bind,
            commit,
        } => {
            let config = SquallConfig::discover(cli.config.as_deref())?;
            exec(&config, &database, &sql, &bind, commit).await
        }
        Commands::Quote {
            dialect,
            identifier,
        } => {
            let compiler = dialects::by_name(&dialect)?;
            let quoted = compiler.render_token(&identifier, &mut CompileState::new())?;
            println!("{quoted}");
            Ok(())
        }
        Commands::Backends => {
            for (name, enabled) in squall::backends::BACKENDS {
                let status = if *enabled {
                    "available".green()
                } else {
                    "not built".dimmed()
                };
                println!("{:10} {}", name.white().bold(), status);
            }
            Ok(())
        }
    }
}

/// Names not found in the config are taken as SQLite file paths.
fn resolve(config: &SquallConfig, name: &str) -> ConnectionDescriptor {
    match config.databases.get(name) {
        Some(descriptor) => descriptor.clone(),
        None => ConnectionDescriptor::new("sqlite").database(name),
    }
}

async fn exec(
    config: &SquallConfig,
    name: &str,
    sql: &str,
    bindings: &[String],
    commit: bool,
) -> Result<()> {
    let descriptor = resolve(config, name);
    tracing::debug!(?descriptor, "resolved database");

    let database = squall::create_database(&descriptor)?;
    let mut connection = Connection::open(database)
        .await
        .with_context(|| format!("connecting to '{name}'"))?;

    let statement = bindings
        .iter()
        .fold(RawStatement::new(sql), |statement, raw| statement.bind(parse_binding(raw)));

    {
        let mut result = connection.execute(statement).await?;
        let headers: Vec<String> = result.columns().iter().map(|c| c.name.clone()).collect();
        let affected = result.rows_affected();
        let rows = result.get_all()?;
        if headers.is_empty() {
            println!("{} {} rows affected", "✓".green(), affected);
        } else {
            print_table(&headers, &rows);
        }
    }

    if commit {
        connection.commit().await?;
        println!("{}", "committed".green());
    } else {
        connection.rollback().await?;
    }
    connection.close().await?;
    Ok(())
}

fn parse_binding(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw == "true" || raw == "false" {
        Value::Bool(raw == "true")
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn print_table(headers: &[String], rows: &[Row]) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();
    for row in &cells {
        for (width, text) in widths.iter_mut().zip(row) {
            *width = (*width).max(text.chars().count());
        }
    }

    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{h:w$}"))
        .collect();
    println!("{}", header.join(" │ ").white().bold());
    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());
    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(text, &w)| format!("{text:w$}"))
            .collect();
        println!("{}", line.join(" │ "));
    }

    println!();
    println!("{} row(s) returned", rows.len().to_string().cyan());
}
