use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use crucible::commands::register_builtins;
use crucible::config::Config;
use crucible::registry::CommandRegistry;
use crucible::repl::{tokenize, Repl};

/// Crucible - An extensible command shell with runtime-loadable plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Plugin to load on startup (repeatable)
    #[arg(short, long)]
    load: Vec<String>,

    /// Run a single command line and exit
    #[arg(short, long)]
    execute: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging to stderr instead of stdout
    // so log lines never mix with command output
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        Config::load_from_file(config_path)?
    } else {
        Config::load_default()?
    };

    let mut registry = CommandRegistry::new();
    registry.set_script_budget(config.script_budget());
    register_builtins(&mut registry, config.script_budget())?;

    // Plugins named in the config load first, then the command line's.
    for path in config.startup_plugins().iter().chain(args.load.iter()) {
        if let Err(error) = registry.load_plugin(Path::new(path)) {
            warn!("Skipping startup plugin {}: {}", path, error);
        }
    }

    if let Some(line) = &args.execute {
        let tokens = tokenize(line);
        if !tokens.is_empty() {
            registry.dispatch(&tokens);
        }
        return Ok(());
    }

    let mut repl = Repl::new(registry, &config);
    repl.run()
}
