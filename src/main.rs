use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use redub::app::{RunOverrides, run_batch_command};
use redub::cli::{Cli, Commands, ConfigAction};
use redub::config::Config;
use redub::diagnostics::check_dependencies;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!("redub {}", redub::version_string());

    match cli.command {
        Commands::Run {
            input_dir,
            output_dir,
            target_language,
            limit,
            debug,
            no_denoise,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let overrides = RunOverrides {
                target_language,
                limit,
                debug,
                no_denoise,
            };
            let summary = run_batch_command(config, input_dir, output_dir, &overrides)?;

            let line = format!(
                "{} discovered, {} completed, {} failed, {} skipped",
                summary.discovered, summary.completed, summary.failed, summary.skipped
            );
            if summary.failed > 0 {
                eprintln!("{} {}", "⚠".yellow(), line);
            } else {
                eprintln!("{} {}", "✓".green(), line);
            }
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            if !check_dependencies(&config) {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "redub", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over the -q/-v flags.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},whisper_rs=warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 0)
        .init();
}

fn config_path(custom_path: Option<&Path>) -> Option<PathBuf> {
    custom_path.map(Path::to_path_buf).or_else(Config::default_path)
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        // An explicit path must exist
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        },
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show { key } => {
            let config = load_config(custom_path)?;
            match key {
                Some(key) => println!("{}", config.get_value_by_path(&key)?),
                None => print!("{}", config.to_display_toml()?),
            }
        }
        ConfigAction::Path => match config_path(custom_path) {
            Some(path) => {
                let note = if path.exists() { "" } else { " (not created yet)" };
                println!("{}{}", path.display(), note.dimmed());
            }
            None => anyhow::bail!("Could not determine config directory"),
        },
    }
    Ok(())
}
