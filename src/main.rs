use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repomirror::cli::{Cli, Commands};
use repomirror::driver;
use repomirror::{Bitbucket, Config, GitCli, GitHub, Platform, Settings};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting repomirror v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Github(args) => {
            let settings = Settings::for_github(&config, args)?;
            let platform = GitHub::new(&settings)?;
            cmd_mirror(&platform, &settings, args.common.dry_run).await
        }
        Commands::Bitbucket(args) => {
            let settings = Settings::for_bitbucket(&config, args)?;
            let platform = Bitbucket::new()?;
            cmd_mirror(&platform, &settings, args.common.dry_run).await
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries the summary
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

async fn cmd_mirror(platform: &dyn Platform, settings: &Settings, dry_run: bool) -> Result<ExitCode> {
    println!(
        "🔍 Discovering {} repositories for '{}'...",
        platform.kind(),
        settings.account.identifier()
    );

    if dry_run {
        let plan = driver::dry_run(platform, settings).await?;
        println!("   Found {} repositories", plan.len());
        println!("\n📋 Dry run - no changes will be made:");
        for entry in &plan {
            println!("   {} {} -> {}", entry.action, entry.name, entry.path.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let summary = driver::run(platform, Arc::new(GitCli::new()), settings).await?;

    println!("\n📊 Sync Summary:");
    println!("   {}", summary);
    println!("   Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("   Mirrors: {}", settings.destination.display());

    if summary.has_failures() {
        println!("\n❌ Failed repositories:");
        for (name, reason) in &summary.failed {
            println!("   {}: {}", name, reason);
        }
        return Ok(ExitCode::FAILURE);
    }

    println!("\n✅ All repositories synchronized");
    Ok(ExitCode::SUCCESS)
}
