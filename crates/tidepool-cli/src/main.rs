use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tidepool::{Console, EvalLimits, LanguageMode, TreeWalkBackend, dispatch, evaluate_source};

#[derive(ClapParser)]
#[command(name = "tidepool")]
#[command(about = "Tidepool playground engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate inline source
    Eval {
        /// The source to evaluate
        source: String,
        /// Language mode: script, typed-script, markup, or stylesheet
        #[arg(long, default_value = "script")]
        mode: LanguageMode,
        /// Print the result as JSON instead of plain lines
        #[arg(long)]
        json: bool,
        /// Evaluation step budget
        #[arg(long)]
        fuel: Option<u64>,
    },
    /// Run a source file
    Run {
        /// Path to the file; mode is inferred from its extension unless set
        file: PathBuf,
        /// Language mode override
        #[arg(long)]
        mode: Option<LanguageMode>,
        /// Print the result as JSON instead of plain lines
        #[arg(long)]
        json: bool,
        /// Evaluation step budget
        #[arg(long)]
        fuel: Option<u64>,
    },
    /// Check that a file parses, without running it
    Check {
        /// Path to the file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Eval {
            source,
            mode,
            json,
            fuel,
        } => eval_source(mode, &source, json, fuel),
        Commands::Run {
            file,
            mode,
            json,
            fuel,
        } => match fs::read_to_string(&file) {
            Ok(source) => {
                let mode = mode.unwrap_or_else(|| mode_from_extension(&file));
                eval_source(mode, &source, json, fuel)
            }
            Err(error) => {
                eprintln!("Error reading {}: {error}", file.display());
                ExitCode::FAILURE
            }
        },
        Commands::Check { file } => match fs::read_to_string(&file) {
            Ok(source) => check_source(&file, &source),
            Err(error) => {
                eprintln!("Error reading {}: {error}", file.display());
                ExitCode::FAILURE
            }
        },
    }
}

fn eval_source(mode: LanguageMode, source: &str, json: bool, fuel: Option<u64>) -> ExitCode {
    let mut limits = EvalLimits::default();
    if let Some(fuel) = fuel {
        limits.fuel = fuel;
    }
    let backend = TreeWalkBackend { limits };
    let dispatched = dispatch(mode, source, &backend);

    if json {
        match serde_json::to_string_pretty(&dispatched.result) {
            Ok(serialized) => println!("{serialized}"),
            Err(error) => {
                eprintln!("Error serializing result: {error}");
                return ExitCode::FAILURE;
            }
        }
        return if dispatched.result.is_failure() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    match &dispatched.result {
        tidepool::ExecutionResult::Success { entries, .. } => {
            for entry in entries {
                println!("{}", entry.text);
            }
            ExitCode::SUCCESS
        }
        tidepool::ExecutionResult::Failure { message, .. } => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn check_source(file: &Path, source: &str) -> ExitCode {
    // Markup and stylesheet content have no parse stage worth checking; the
    // script dialects do.
    let mode = mode_from_extension(file);
    if !mode.is_script() {
        println!("{}: nothing to check for {mode} content", file.display());
        return ExitCode::SUCCESS;
    }
    match parse_only(source) {
        Ok(()) => {
            println!("{}: OK", file.display());
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn parse_only(source: &str) -> Result<(), String> {
    // A zero-fuel evaluation parses but executes nothing.
    let console = Console::new();
    let limits = EvalLimits {
        fuel: 0,
        ..EvalLimits::default()
    };
    match evaluate_source(source, &console, limits) {
        tidepool::EvalOutcome::ParseFailed { message } => Err(message),
        tidepool::EvalOutcome::Completed { .. } => Ok(()),
    }
}

fn mode_from_extension(file: &Path) -> LanguageMode {
    match file
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default()
    {
        "html" | "htm" => LanguageMode::Markup,
        "css" => LanguageMode::Stylesheet,
        "tts" => LanguageMode::TypedScript,
        _ => LanguageMode::Script,
    }
}
