//! Cache management CLI commands.

use clap::Subcommand;
use webimage::config::format_size;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show disk cache statistics
    Stats,
    /// Clear the disk cache, removing all cached images
    Clear,
    /// Delete expired images, then shrink the cache below its size limit
    Reclaim,
    /// Print the cache file path an address maps to
    Path {
        /// Image address
        url: String,
    },
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, verbose: bool) -> Result<(), CliError> {
    let mut runner = CliRunner::new(verbose)?;
    runner.log_startup("cache");

    let result = run_action(&mut runner, action);
    runner.finish();
    result
}

fn run_action(runner: &mut CliRunner, action: CacheAction) -> Result<(), CliError> {
    let directory = runner.config().cache.directory.clone();
    let app = runner.app()?;
    let engine = app.engine();
    let handle = app.runtime_handle();

    match action {
        CacheAction::Stats => {
            let stats = handle.block_on(engine.calculate_size());
            println!("Disk cache: {}", engine.disk().primary_root().display());
            println!("  Files: {}", stats.file_count);
            println!("  Size:  {}", format_size(stats.total_bytes));
            println!("  Limit: {}", format_size(engine.config().max_disk_size()));
        }
        CacheAction::Clear => {
            println!("Clearing disk cache under: {}", directory.display());
            let before = handle.block_on(engine.calculate_size());
            handle.block_on(engine.clear_disk())?;
            println!(
                "Deleted {} files, freed {}",
                before.file_count,
                format_size(before.total_bytes)
            );
        }
        CacheAction::Reclaim => {
            let result = handle.block_on(engine.reclaim_old());
            println!("{}", result);
        }
        CacheAction::Path { url } => {
            let key = app.loader().cache_key_for(&url);
            println!("{}", engine.default_path(&key).display());
        }
    }

    Ok(())
}
