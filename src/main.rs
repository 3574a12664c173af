//! steam-search - command-line host
//!
//! Drives the library the way a launcher would: search, launch, and
//! inspect what was discovered.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use steam_search::logging::{init_logger, log_error, set_debug};
use steam_search::{steam, ActionToken, AppId, PluginConfig, RefreshOutcome, SteamSearch};

#[derive(Parser)]
#[command(name = "steam-search", version, about = "Search and launch installed Steam games")]
struct Cli {
    /// Path to a config.json (defaults to the data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug messages
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank indexed games against a query
    Search {
        /// Query text, used as given
        query: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch a game by id (steam:<n>, shortcut:<hex> or a bare app id)
    Launch { id: String },

    /// List every indexed record in scan order
    List,

    /// Show the discovered library roots
    Roots,

    /// Rescan all libraries and update the index cache
    Refresh,

    /// Add a library folder to the config file
    AddLibrary { path: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logger();
    let mut config = match &cli.config {
        Some(path) => PluginConfig::load_from(path),
        None => PluginConfig::load(),
    };
    if cli.debug {
        config.debug = true;
    }
    set_debug(config.debug);

    match run(cli.command, cli.config, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log_error(&message);
            ExitCode::FAILURE
        }
    }
}

/// A host with a usable index; scans once when no cache exists yet
fn open(config: PluginConfig) -> SteamSearch {
    let plugin = SteamSearch::without_worker(config);
    if plugin.index().is_empty() {
        let _ = plugin.refresh_blocking();
    }
    plugin
}

fn run(command: Commands, config_path: Option<PathBuf>, config: PluginConfig) -> Result<(), String> {
    match command {
        Commands::Search { query, json } => {
            let items = open(config).query(&query);
            if json {
                let out = serde_json::to_string_pretty(&items).map_err(|e| e.to_string())?;
                println!("{}", out);
            } else {
                for item in &items {
                    let id = match &item.action {
                        ActionToken::Launch { id } => id.to_string(),
                        _ => "-".to_string(),
                    };
                    println!("{:>6}  {:<24}  {}  ({})", item.score, id, item.title, item.subtitle);
                }
            }
        }

        Commands::Launch { id } => {
            let id: AppId = id.parse()?;
            open(config)
                .activate(&ActionToken::Launch { id })
                .map_err(|e| e.to_string())?;
        }

        Commands::List => {
            let plugin = open(config);
            for record in plugin.index().records() {
                println!("{:<24}  {}", record.id.to_string(), record.name);
            }
        }

        Commands::Roots => {
            let roots = steam::discover(&config).map_err(|e| e.to_string())?;
            for root in roots {
                println!("{:?}\t{}", root.source, root.path.display());
            }
        }

        Commands::Refresh => {
            let plugin = SteamSearch::without_worker(config);
            match plugin.refresh_blocking().map_err(|e| e.to_string())? {
                RefreshOutcome::Completed(report) => {
                    println!(
                        "Indexed {} record(s) from {} root(s) in {:?}",
                        report.records, report.roots, report.duration
                    );
                    for skip in &report.skipped {
                        println!("  skipped {}", skip);
                    }
                    for root in &report.timed_out {
                        println!("  timed out {}", root.display());
                    }
                }
                RefreshOutcome::Coalesced => println!("A refresh is already running"),
            }
        }

        Commands::AddLibrary { path } => {
            let config_path = config_path.unwrap_or_else(PluginConfig::default_path);
            // Start from the file so --debug is not written back
            let mut stored = PluginConfig::load_from(&config_path);
            if stored.add_extra_library_path(path.clone()) {
                stored
                    .save_to(&config_path)
                    .map_err(|e| format!("Failed to save {}: {}", config_path.display(), e))?;
                println!("Added {}", path.display());
            } else {
                println!("{} is already listed", path.display());
            }
        }
    }

    Ok(())
}
