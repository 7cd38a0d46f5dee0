//! coderun - sandboxed code execution service.
//!
//! Usage:
//!   coderun [serve] [--port 5000]                      # Start HTTP server
//!   coderun run --language cpp main.cpp [--stdin-file in.txt]   # One-shot CLI mode

use clap::{Parser, Subcommand};
use coderun::config::Config;
use coderun::http_server;
use coderun::{AppState, ExecutionOutcome};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coderun")]
#[command(about = "Sandboxed multi-language code execution service")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Compile and run one source file, printing its output
    Run {
        /// Language tag: cpp, java or python
        #[arg(long)]
        language: String,

        /// File whose contents are fed to the program's stdin
        #[arg(long)]
        stdin_file: Option<PathBuf>,

        /// Source file to execute
        source: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    use std::process::exit;

    // Before parsing, so .env values act as flag fallbacks.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = args.config.validate() {
        eprintln!("Error: {}", e);
        exit(2);
    }

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let state = AppState::from_config(&args.config);
            if let Err(e) = http_server::run_server(args.config.addr(), state).await {
                error!(error = %e, "Server stopped");
                exit(1);
            }
        }
        Commands::Run {
            language,
            stdin_file,
            source,
        } => {
            let code = run_once(&args.config, &language, &source, stdin_file.as_deref()).await;
            exit(code);
        }
    }
}

/// Execute one file through the same pipeline the server uses. Returns the
/// process exit code.
async fn run_once(
    config: &Config,
    language: &str,
    source: &Path,
    stdin_file: Option<&Path>,
) -> i32 {
    let registry = config.registry();
    let toolchain = match registry.resolve(language) {
        Ok(toolchain) => toolchain,
        Err(e) => {
            eprintln!("Error: {} ({})", e, language);
            return 2;
        }
    };

    let code = match tokio::fs::read_to_string(source).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: read {}: {}", source.display(), e);
            return 2;
        }
    };
    let stdin = match stdin_file {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(stdin) => stdin,
            Err(e) => {
                eprintln!("Error: read {}: {}", path.display(), e);
                return 2;
            }
        },
        None => String::new(),
    };

    match config.pipeline().execute(toolchain, &code, &stdin).await {
        Ok(ExecutionOutcome::Success { output }) => {
            print!("{}", output);
            0
        }
        Ok(ExecutionOutcome::LaunchFailure { message }) => {
            eprintln!("Error: {}", message);
            3
        }
        Ok(failure) => {
            eprint!("{}", failure.error_message().unwrap_or_default());
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            3
        }
    }
}
