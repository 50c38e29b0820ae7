//! obj2sql CLI - Inspect the catalog of an obj2sql database.

use clap::{Parser, Subcommand};
use obj2sql::{Config, Mapper, MapperError};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "obj2sql")]
#[command(about = "Inspect tables and stored objects of an obj2sql database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "obj2sql.yaml")]
    config: PathBuf,

    /// Database file to inspect (overrides database.path from the config)
    #[arg(short, long)]
    database: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine, database name and database size
    Info,

    /// List user tables
    Tables,

    /// Show the columns of a table
    Structure {
        /// Table name, e.g. geometry$Point
        table: String,
    },

    /// Estimate the data size of a table in bytes
    Size {
        /// Table name, e.g. builtins$int
        table: String,
    },

    /// Show one stored row with its decoded cells
    Show {
        /// Table name, e.g. geometry$Point
        table: String,

        /// Row id
        id: i64,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), MapperError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MapperError::Config)?;

    let config = load_config(&cli)?;
    let mut mapper = Mapper::open(&config)?;

    let result = execute(&mapper, &cli);
    mapper.close()?;
    result
}

/// Resolve the configuration: an explicit `--database` needs no config file.
fn load_config(cli: &Cli) -> Result<Config, MapperError> {
    let mut config = match &cli.database {
        Some(path) if !cli.config.exists() => Config::for_path(path.clone()),
        Some(path) => {
            let mut config = Config::load(&cli.config)?;
            config.database.path = path.clone();
            config
        }
        None => {
            let config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);
            config
        }
    };
    // Inspection never creates a database.
    config.database.create_if_missing = false;
    config.validate()?;
    debug!("Inspecting {}", config.database.path);
    Ok(config)
}

fn execute(mapper: &Mapper, cli: &Cli) -> Result<(), MapperError> {
    match &cli.command {
        Commands::Info => {
            let engine = mapper.engine()?;
            let name = mapper.db_name()?;
            let size = mapper.db_size()?;
            let tables = mapper.tables()?;

            if cli.output_json {
                let out = json!({
                    "engine": engine,
                    "db_name": name,
                    "db_size": size,
                    "tables": tables.len(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Engine: {} {}", engine.name, engine.version);
                println!("Database: {}", name);
                println!("Size: {} bytes", size);
                println!("Tables: {}", tables.len());
            }
        }

        Commands::Tables => {
            let tables = mapper.tables()?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in &tables {
                    println!("{}", table);
                }
            }
        }

        Commands::Structure { table } => {
            if !mapper.table_exists(table)? {
                return Err(MapperError::UnknownTable(table.clone()));
            }
            let columns = mapper.table_structure(table)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else {
                println!("{}:", table);
                for column in &columns {
                    println!("  {:>3}  {:<40} {}", column.id, column.name, column.decl_type);
                }
            }
        }

        Commands::Size { table } => {
            let size = mapper.table_size(table)?;
            if cli.output_json {
                println!("{}", json!({ "table": table, "bytes": size }));
            } else {
                println!("{}: {} bytes", table, size);
            }
        }

        Commands::Show { table, id } => {
            let row = mapper.fetch_row(table, *id)?.ok_or_else(|| {
                MapperError::invalid(format!("{} has no row {}", table, id))
            })?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                println!("{} row {}", row.table, row.id);
                if let Some(origin) = row.origin_id {
                    println!("  origin_id = {}", origin);
                }
                for cell in &row.cells {
                    println!(
                        "  {} = {}",
                        cell.column,
                        cell.raw.as_deref().unwrap_or("NULL")
                    );
                }
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity {:?}", other)),
    };

    // Logs go to stderr so that stdout stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format {:?}", other)),
    }

    Ok(())
}
