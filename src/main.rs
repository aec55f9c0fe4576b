use animopt::anim::{OptimizeMode, optimize};
use animopt::config::OptimizerConfig;
use animopt::io::{self, IoError, manifest::SequenceManifest};
use clap::Parser;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "animopt")]
#[command(
    about = "Shrinks animations by storing only what changes between frames",
    long_about = None
)]
struct Args {
    /// Animated GIF, or a directory of PNG frames, to process
    #[arg(value_name = "INPUT", required_unless_present = "watch")]
    input: Option<PathBuf>,

    /// Where to write the result (defaults to <input>.<suffix>.gif)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to produce from the frames
    #[arg(short, long, value_enum)]
    mode: Option<OptimizeMode>,

    /// Also write a JSON description of the output frames
    #[arg(long)]
    manifest: bool,

    /// Watch a directory and process every GIF written into it
    #[arg(short, long, value_name = "DIRECTORY", conflicts_with_all = ["input", "output"])]
    watch: Option<PathBuf>,

    /// Config file (defaults to <config dir>/animopt/config.json when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let mut config = OptimizerConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.manifest {
        config.write_manifest = true;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(directory) = args.watch {
        watch_directory(&directory, &config);
    } else if let Some(input) = args.input {
        match process(&input, args.output, &config) {
            Ok(output) => tracing::info!("Created: {}", output.display()),
            Err(e) => {
                tracing::error!("Error processing {}: {e}", input.display());
                std::process::exit(1);
            }
        }
    }
}

/// Optimize one animation and write the result. Returns the output path.
fn process(
    input: &Path,
    output: Option<PathBuf>,
    config: &OptimizerConfig,
) -> Result<PathBuf, IoError> {
    if !input.exists() {
        return Err(IoError::Unsupported(format!(
            "Input '{}' does not exist",
            input.display()
        )));
    }

    let stack = if input.is_dir() {
        io::load_png_frames(input)?
    } else {
        io::load_gif(input)?
    };

    let mut report = |fraction: f64| tracing::debug!("Progress: {:.0}%", fraction * 100.0);
    let sequence = optimize(&stack, config.mode, &mut report)?;

    let output = output.unwrap_or_else(|| io::default_output_path(input, &config.output_suffix));
    io::write_gif(&sequence, &output, config.loop_forever)?;

    if config.write_manifest {
        let manifest_path = output.with_extension("json");
        SequenceManifest::from_sequence(&sequence, config.mode).write(&manifest_path)?;
        tracing::info!("Manifest: {}", manifest_path.display());
    }

    Ok(output)
}

/// True for files this tool wrote itself, which must not be fed back in.
fn is_own_output(path: &Path, suffix: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with(&format!(".{suffix}")))
}

fn watch_directory(directory: &Path, config: &OptimizerConfig) {
    if !directory.is_dir() {
        tracing::error!("'{}' is not a directory", directory.display());
        std::process::exit(1);
    }

    tracing::info!("Watching directory: {}", directory.display());
    tracing::info!("Press Ctrl+C to stop...");

    let (tx, rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(tx, Config::default()).unwrap_or_else(|e| {
        tracing::error!("Failed to create file watcher: {e}");
        std::process::exit(1);
    });

    if let Err(e) = watcher.watch(directory, RecursiveMode::Recursive) {
        tracing::error!("Failed to watch directory: {e}");
        std::process::exit(1);
    }

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                if let EventKind::Modify(_) | EventKind::Create(_) = event.kind {
                    for path in event.paths {
                        let is_gif = path
                            .extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
                        let skip = !is_gif
                            || !path.exists()
                            || is_own_output(&path, &config.output_suffix);
                        if skip {
                            continue;
                        }

                        tracing::info!("Processing: {}", path.display());
                        match process(&path, None, config) {
                            Ok(output) => tracing::info!("Created: {}", output.display()),
                            Err(e) => tracing::error!("Error processing {}: {e}", path.display()),
                        }
                    }
                }
            }
            Ok(Err(e)) => tracing::warn!("Watch error: {e}"),
            Err(e) => {
                tracing::error!("Channel error: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_files_are_recognized() {
        assert!(is_own_output(Path::new("a/walk.optimized.gif"), "optimized"));
        assert!(!is_own_output(Path::new("a/walk.gif"), "optimized"));
    }

    #[test]
    fn cli_parses_mode_and_watch_conflict() {
        let args = Args::try_parse_from(["animopt", "in.gif", "-m", "find-backdrop"]).unwrap();
        assert_eq!(args.mode, Some(OptimizeMode::FindBackdrop));
        assert!(Args::try_parse_from(["animopt", "in.gif", "--watch", "dir"]).is_err());
        assert!(Args::try_parse_from(["animopt"]).is_err());
    }
}
