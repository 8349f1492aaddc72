#![forbid(unsafe_code)]

use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use adradar_tools::logging;
use adradar_tools::replay_cli::{
    execute_defaults, execute_replay, execute_validate, load_accessors, resolve_accessors_path,
    ACCESSORS_PATH_ENV,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adradar")]
#[command(about = "Check accessors configurations and replay recorded ad auction events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level unless ADRADAR_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an accessors configuration file
    Validate {
        file: PathBuf,
    },

    /// Print the built-in accessors configuration
    Defaults,

    /// Replay page events, one JSON object per line
    Replay {
        events: PathBuf,

        /// Accessors configuration (falls back to ADRADAR_ACCESSORS_PATH, then built-in)
        #[arg(long)]
        accessors: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli.command) {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run(command: Commands) -> Result<(), String> {
    let output = match command {
        Commands::Validate { file } => {
            let text = fs::read_to_string(&file)
                .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
            execute_validate(&text)?
        }
        Commands::Defaults => execute_defaults()?,
        Commands::Replay { events, accessors } => {
            let path = resolve_accessors_path(accessors, env::var_os(ACCESSORS_PATH_ENV));
            let config = load_accessors(path.as_deref())?;
            let file = File::open(&events)
                .map_err(|e| format!("failed to open {}: {e}", events.display()))?;
            execute_replay(config, BufReader::new(file))?
        }
    };
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
