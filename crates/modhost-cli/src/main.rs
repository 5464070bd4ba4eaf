mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_RESOLVE_ERROR};
use modhost_core::{install_signal_handler, ModHostConfig, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "modhost",
    version,
    about = "Discover, order, check and hot-reload mod packages"
)]
struct Cli {
    /// Path to a modhost.toml config file (default: ./modhost.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mods directory; overrides the config file.
    #[arg(long, global = true)]
    mods: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the packages found in the mods directory.
    List,
    /// Print the dependency-resolved load order.
    Order,
    /// Load every package and report registered assets and failures.
    Check,
    /// Load every package, then reload packages as their files change.
    Watch {
        /// Milliseconds between ticks.
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        /// Stop after this many ticks instead of waiting for Ctrl-C.
        #[arg(long)]
        ticks: Option<u64>,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MODHOST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref(), cli.mods).and_then(|config| {
        let json = cli.json;
        match cli.command {
            Commands::List => commands::list::run(&config, json),
            Commands::Order => commands::order::run(&config, json),
            Commands::Check => commands::check::run(config, json),
            Commands::Watch { interval_ms, ticks } => {
                install_signal_handler();
                commands::watch::run(config, interval_ms, ticks, json)
            }
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("failed to parse manifest")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("resolve error:") {
                EXIT_RESOLVE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn load_config(path: Option<&Path>, mods: Option<PathBuf>) -> Result<ModHostConfig, String> {
    let mut config = match path {
        Some(path) => ModHostConfig::load(path).map_err(|e| e.to_string())?,
        None if Path::new(CONFIG_FILE_NAME).is_file() => {
            ModHostConfig::load(Path::new(CONFIG_FILE_NAME)).map_err(|e| e.to_string())?
        }
        None => ModHostConfig::default(),
    };
    if let Some(mods) = mods {
        config.mods_root = mods;
    }
    Ok(config)
}
