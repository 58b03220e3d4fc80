//! Fetch command - load one image through the cache.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use webimage::decode::RasterImage;
use webimage::fetch::{Progress, ProgressSink};
use webimage::load::{LoadError, LoadEvent, LoadOptions};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub url: String,
    pub output: Option<String>,
    pub memory_only: bool,
    pub refresh: bool,
    pub retry_failed: bool,
    pub progressive: bool,
    pub verbose: bool,
}

impl FetchArgs {
    fn options(&self) -> LoadOptions {
        let mut options = LoadOptions::default();
        if self.memory_only {
            options = options.cache_memory_only();
        }
        if self.refresh {
            options = options.refresh_cached();
        }
        if self.retry_failed {
            options = options.retry_failed();
        }
        if self.progressive {
            options = options.progressive_download();
        }
        options
    }
}

/// Run the fetch command.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let mut runner = CliRunner::new(args.verbose)?;
    runner.log_startup("fetch");

    let result = fetch(&mut runner, &args);
    runner.finish();
    result
}

fn fetch(runner: &mut CliRunner, args: &FetchArgs) -> Result<(), CliError> {
    let app = runner.app()?;

    let bar = progress_bar();
    let sink_bar = bar.clone();
    let progress: ProgressSink = Arc::new(move |report: Progress| {
        if let Some(expected) = report.expected {
            sink_bar.set_length(expected);
        }
        sink_bar.set_position(report.received);
    });

    println!("Loading {}", args.url);
    let start = Instant::now();

    let handle = app.loader().load(args.url.as_str(), args.options(), Some(progress));
    let events = app.runtime_handle().block_on(handle.collect_all());
    bar.finish_and_clear();

    let partials = events.iter().filter(|event| !event.finished).count();
    if partials > 0 {
        println!("  Partial images: {}", partials);
    }

    let Some(event) = events.into_iter().rev().find(|event| event.finished) else {
        return Err(CliError::Load(LoadError::Cancelled));
    };
    if let Some(error) = event.error {
        return Err(CliError::Load(error));
    }

    report(&event, start);

    if let Some(output) = &args.output {
        save(&event, Path::new(output))?;
        println!("Saved to {}", output);
    }

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

fn report(event: &LoadEvent<RasterImage>, start: Instant) {
    println!(
        "Loaded in {:.2}s from {}",
        start.elapsed().as_secs_f64(),
        event.source
    );
    if let Some(image) = &event.image {
        println!("  Size:   {}x{}", image.width(), image.height());
        println!("  Frames: {}", image.frame_count());
        if let Some(format) = image.format() {
            println!("  Format: {:?}", format);
        }
    }
    if let Some(data) = &event.data {
        println!("  Bytes:  {}", data.len());
    }
}

/// Write the downloaded bytes when present, otherwise re-encode the image
/// in the format implied by the output extension.
fn save(event: &LoadEvent<RasterImage>, path: &Path) -> Result<(), CliError> {
    if let Some(data) = &event.data {
        return std::fs::write(path, data).map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        });
    }

    let image = event.image.as_ref().ok_or_else(|| CliError::ImageWrite {
        path: path.display().to_string(),
        reason: "no image was produced".to_string(),
    })?;
    image
        .pixels()
        .save(path)
        .map_err(|e| CliError::ImageWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> FetchArgs {
        FetchArgs {
            url: "https://example.com/a.png".to_string(),
            output: None,
            memory_only: false,
            refresh: false,
            retry_failed: false,
            progressive: false,
            verbose: false,
        }
    }

    #[test]
    fn test_default_flags_map_to_default_options() {
        assert_eq!(args().options(), LoadOptions::default());
    }

    #[test]
    fn test_flags_map_to_options() {
        let options = FetchArgs {
            memory_only: true,
            refresh: true,
            ..args()
        }
        .options();

        assert!(options.cache_memory_only);
        assert!(options.refresh_cached);
        assert!(!options.retry_failed);
        assert!(!options.progressive_download);
    }
}
