//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init` for inspecting
//! `~/.webimage/config.ini`.

use clap::Subcommand;
use webimage::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// List the effective configuration settings
    Show,

    /// Show the configuration file path
    Path,

    /// Write a commented configuration file with default values
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init => run_init(),
    }
}

/// List all configuration settings.
fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    for line in render(&config) {
        println!("{}", line);
    }
    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() {
        println!("Configuration already exists: {}", path.display());
        return Ok(());
    }
    let path = ConfigFile::ensure_exists()?;
    println!("Created {}", path.display());
    Ok(())
}

fn render(config: &ConfigFile) -> Vec<String> {
    let cache = &config.cache;
    let gc = if cache.gc_interval == 0 {
        "disabled".to_string()
    } else {
        format!("{}s", cache.gc_interval)
    };

    vec![
        "[cache]".to_string(),
        format!("  directory = {}", cache.directory.display()),
        format!("  namespace = {}", cache.namespace),
        format!("  memory_cost = {}", format_size(cache.memory_cost)),
        format!("  memory_count = {}", cache.memory_count),
        format!("  disk_size = {}", format_size(cache.disk_size)),
        format!("  disk_age_days = {}", cache.disk_age_days),
        format!("  in_memory = {}", cache.in_memory),
        format!("  decompress = {}", cache.decompress),
        format!("  gc_interval = {}", gc),
        String::new(),
        "[download]".to_string(),
        format!("  timeout = {}s", config.download.timeout),
    ]
}
