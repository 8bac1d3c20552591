use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use novelweave::cli::commands::generate::GenerateOptions;

#[derive(Parser)]
#[command(name = "novelweave")]
#[command(
    version,
    about = "Resumable LLM pipeline for long-form serialized web novels"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a novel, or resume an interrupted run
    Generate {
        #[arg(help = "What the novel should be about")]
        input: Option<String>,
        #[arg(long, short = 'i', help = "Read the request from a file")]
        input_file: Option<PathBuf>,
        #[arg(long, short = 'r', value_name = "RUN_ID", help = "Resume a run from its checkpoint")]
        resume: Option<String>,
        #[arg(long, help = "Number of volumes")]
        volumes: Option<u32>,
        #[arg(long, help = "Chapters per volume")]
        chapters: Option<u32>,
        #[arg(long, help = "How many prior outlines/chapters to feed back (0 = none)")]
        window: Option<usize>,
        #[arg(long, help = "Target words per chapter")]
        words: Option<u32>,
        #[arg(long, help = "Polish every chapter with an extra LLM call")]
        optimize: bool,
        #[arg(long, help = "Summarize finished volumes with an LLM call")]
        summarize: bool,
        #[arg(long, help = "LLM provider (openai, ollama)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, short = 'w', help = "Workspace directory for runs")]
        workspace: Option<PathBuf>,
        #[arg(long = "no-health-check", help = "Skip the provider reachability check")]
        no_health_check: bool,
    },

    /// Show the runs in the workspace
    Status {
        #[arg(help = "Show a single run")]
        run_id: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(long, short = 'w', help = "Workspace directory for runs")]
        workspace: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a default configuration file
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mNovelWeave encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        eprintln!("\n\x1b[33mCheckpoints are kept; rerun with --resume <RUN_ID> to continue.\x1b[0m");
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            input,
            input_file,
            resume,
            volumes,
            chapters,
            window,
            words,
            optimize,
            summarize,
            provider,
            model,
            workspace,
            no_health_check,
        } => {
            novelweave::cli::commands::generate::run(GenerateOptions {
                input,
                input_file,
                resume,
                volumes,
                chapters,
                window,
                words,
                optimize,
                summarize,
                provider,
                model,
                workspace,
                skip_health_check: no_health_check,
                quiet: cli.quiet,
            })?;
        }
        Commands::Status {
            run_id,
            format,
            workspace,
        } => {
            novelweave::cli::commands::status::run(run_id.as_deref(), &format, workspace)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                novelweave::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                novelweave::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                novelweave::cli::commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
