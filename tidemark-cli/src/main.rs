//! Tidemark Migration CLI Tool
//!
//! Command-line interface for managing file-based SQL migrations.
//! Supports both interactive use and CI/CD pipelines.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tidemark::migration::{
    list_applied, resolve_down, resolve_up, state_table_exists, Migrator, TimestampKey,
};
use tidemark::{connect, MayPostgresExecutor, MigrateConfig};

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Ordered, reversible SQL migrations for PostgreSQL")]
#[command(version = "0.1.0")]
struct Cli {
    /// Database connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Migrations directory path
    #[arg(long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the bookkeeping table (idempotent)
    Setup,

    /// Generate a new apply/revert migration pair
    Generate {
        /// Migration name (e.g., "create users table")
        name: String,
    },

    /// Apply pending migrations in ascending order
    Up {
        /// Apply only units at or before this 14-digit timestamp key
        boundary: Option<String>,

        /// Show what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Revert applied migrations in descending order
    Down {
        /// Revert only units at or after this 14-digit timestamp key
        boundary: Option<String>,

        /// Show what would be reverted without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status (applied vs pending)
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match run(cli) {
        Ok(()) => {
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    log::debug!("using migrations directory {}", cli.migrations_dir.display());

    let migrator = Migrator::new(&cli.migrations_dir);

    // Generate needs no connection.
    if let Commands::Generate { name } = &cli.command {
        return handle_generate(&migrator, name);
    }

    let database_url = resolve_database_url(cli.database_url.clone())?;
    let client = connect(&database_url).context("failed to connect to database")?;
    let executor = MayPostgresExecutor::new(client);

    match cli.command {
        Commands::Setup => handle_setup(&migrator, &executor),
        Commands::Up { boundary, dry_run } => handle_up(&migrator, &executor, boundary, dry_run),
        Commands::Down { boundary, dry_run } => {
            handle_down(&migrator, &executor, boundary, dry_run)
        }
        Commands::Status { json } => handle_status(&migrator, &executor, json),
        Commands::Generate { .. } => unreachable!("handled above"),
    }
}

/// Connection URL resolution: flag, then `TIDEMARK_DATABASE_URL`, then
/// `DATABASE_URL`, then the config file's connection descriptor.
fn resolve_database_url(flag: Option<String>) -> anyhow::Result<String> {
    if let Some(url) = flag {
        return Ok(url);
    }
    if let Ok(url) = std::env::var("TIDEMARK_DATABASE_URL") {
        return Ok(url);
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }

    let config = MigrateConfig::load()
        .context("no --database-url, TIDEMARK_DATABASE_URL, or DATABASE_URL set, and loading config/config.toml failed")?;
    Ok(config.database.connection_string())
}

fn parse_boundary(boundary: Option<String>) -> anyhow::Result<Option<TimestampKey>> {
    boundary
        .map(|raw| {
            TimestampKey::parse(&raw)
                .with_context(|| format!("invalid boundary timestamp '{}'", raw))
        })
        .transpose()
}

fn handle_setup(migrator: &Migrator, executor: &MayPostgresExecutor) -> anyhow::Result<()> {
    migrator.bootstrap(executor)?;
    println!("{} bookkeeping table ready", "ok:".green().bold());
    Ok(())
}

fn handle_generate(migrator: &Migrator, name: &str) -> anyhow::Result<()> {
    let generated = migrator.catalog().generate(name)?;
    println!("{} generated migration pair:", "ok:".green().bold());
    println!("  {}", generated.apply_path.display());
    println!("  {}", generated.revert_path.display());
    println!("  Edit both files before running `up`.");
    Ok(())
}

fn handle_up(
    migrator: &Migrator,
    executor: &MayPostgresExecutor,
    boundary: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let boundary = parse_boundary(boundary)?;

    if dry_run {
        migrator.bootstrap(executor)?;
        let units = migrator.catalog().list_units()?;
        let applied = list_applied(executor)?;
        let plan = resolve_up(&units, &applied, boundary.as_ref());

        if plan.is_empty() {
            println!("No pending migrations to apply");
            return Ok(());
        }

        println!("Would apply {} migration(s):", plan.len());
        for (i, unit) in plan.iter().enumerate() {
            println!("  {}. {}", i + 1, unit.filename());
        }
        return Ok(());
    }

    let applied = migrator.up(executor, boundary.as_ref())?;

    if applied > 0 {
        println!(
            "{} applied {} migration(s)",
            "ok:".green().bold(),
            applied
        );
    } else {
        println!("{} nothing to apply", "ok:".green().bold());
    }

    Ok(())
}

fn handle_down(
    migrator: &Migrator,
    executor: &MayPostgresExecutor,
    boundary: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let boundary = parse_boundary(boundary)?;

    if dry_run {
        if !state_table_exists(executor)? {
            anyhow::bail!("bookkeeping table does not exist; run `setup` first");
        }
        let applied = list_applied(executor)?;
        let plan = resolve_down(&applied, boundary.as_ref())?;

        if plan.is_empty() {
            println!("No applied migrations to revert");
            return Ok(());
        }

        println!("Would revert {} migration(s):", plan.len());
        for (i, unit) in plan.iter().enumerate() {
            println!("  {}. {}", i + 1, unit.filename());
        }
        return Ok(());
    }

    let reverted = migrator.down(executor, boundary.as_ref())?;

    if reverted > 0 {
        println!(
            "{} reverted {} migration(s)",
            "ok:".green().bold(),
            reverted
        );
    } else {
        println!("{} nothing to revert", "ok:".green().bold());
    }

    Ok(())
}

fn handle_status(
    migrator: &Migrator,
    executor: &MayPostgresExecutor,
    json: bool,
) -> anyhow::Result<()> {
    let status = migrator.status(executor)?;

    if json {
        let payload = serde_json::json!({
            "applied": status
                .applied
                .iter()
                .map(|record| {
                    serde_json::json!({
                        "filename": record.filename,
                        "applied_at": record.applied_at.to_rfc3339(),
                    })
                })
                .collect::<Vec<_>>(),
            "pending": status
                .pending
                .iter()
                .map(|unit| unit.filename())
                .collect::<Vec<_>>(),
            "applied_count": status.applied_count,
            "pending_count": status.pending_count,
            "total": status.total,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("\nMigration Status\n");

    if status.applied.is_empty() {
        println!("Applied: none");
    } else {
        println!("Applied ({}):", status.applied_count);
        for record in &status.applied {
            println!(
                "  {} {} ({})",
                "✓".green(),
                record.filename,
                record.applied_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    println!();

    if status.pending.is_empty() {
        println!("Pending: none");
    } else {
        println!("Pending ({}):", status.pending_count);
        for unit in &status.pending {
            println!("  {} {}", "…".yellow(), unit.filename());
        }
    }

    println!(
        "\nSummary: {} applied, {} pending",
        status.applied_count, status.pending_count
    );

    Ok(())
}
