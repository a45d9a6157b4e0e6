//! Halcyon IDE CLI
//!
//! A terminal host for the Halcyon compile and run pipeline.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use halcyon_ide::{
    Config, Console, ConsoleRenderer, EXAMPLE_CONFIG, Pipeline, SandboxLimits, TextBuffer,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "halcyon-ide")]
#[command(about = "Compile and run Halcyon programs in a sandbox")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: halcyon.toml)
        #[arg(short, long, default_value = "halcyon.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Compile a source file and report diagnostics
    Compile {
        /// Source file to compile
        #[arg(value_name = "FILE")]
        source: PathBuf,
    },

    /// Run a program (compile, then execute in the sandbox)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Maximum linear memory in 64 KiB pages
        #[arg(long)]
        max_memory_pages: Option<u32>,

        /// Maximum number of output lines
        #[arg(long)]
        max_output_lines: Option<usize>,
    },

    /// Interactive session driven by commands on stdin
    Session {
        /// Source file loaded into the editor
        #[arg(value_name = "FILE")]
        source: PathBuf,
    },

    /// Show the active configuration
    ShowConfig,
}

/// Mirrors the console on stdout
struct TerminalRenderer {
    separator: bool,
}

impl ConsoleRenderer for TerminalRenderer {
    fn clear(&mut self) {
        if self.separator {
            println!("----");
        }
    }

    fn write_line(&mut self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Compile { source } => run_compile(&config, &source).await,
        Commands::Run {
            source,
            max_memory_pages,
            max_output_lines,
        } => {
            let overrides = SandboxLimits {
                max_memory_pages,
                max_output_lines,
            };
            run_execute(&config, &source, &overrides).await
        }
        Commands::Session { source } => run_session(&config, &source).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn open_pipeline(
    config: &Config,
    source: &Path,
    separator: bool,
) -> Result<Pipeline<TextBuffer>> {
    let text = read_source(source).await?;

    let console = Console::with_history_limit(config.console.history_limit);
    console.set_renderer(TerminalRenderer { separator });

    Pipeline::initialize(config, TextBuffer::new(text), console)
        .await
        .context("failed to initialize pipeline")
}

async fn read_source(source: &Path) -> Result<String> {
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("failed to read source file {}", source.display()))
}

async fn run_compile(config: &Config, source: &Path) -> Result<()> {
    let mut pipeline = open_pipeline(config, source, false).await?;

    info!(source = %source.display(), "compiling");
    match pipeline.compile() {
        Ok(artifact) => {
            info!(bytes = artifact.len(), "compilation finished");
            Ok(())
        }
        Err(_) => std::process::exit(1),
    }
}

async fn run_execute(config: &Config, source: &Path, overrides: &SandboxLimits) -> Result<()> {
    let mut pipeline = open_pipeline(config, source, false).await?;
    pipeline
        .sandbox_mut()
        .set_limits(config.effective_limits(Some(overrides)));

    info!(source = %source.display(), "running program");
    match pipeline.run() {
        Ok(report) => {
            info!(
                lines = report.lines_written(),
                wall_time = format_args!("{:.3}s", report.execution.wall_time.as_secs_f64()),
                "execution result"
            );
            Ok(())
        }
        Err(failure) => {
            debug!(%failure, "run failed");
            std::process::exit(1);
        }
    }
}

const SESSION_HELP: &str = "\
commands:
  compile  compile the editor contents
  run      run the program, compiling first if needed
  reload   re-read the source file into the editor
  state    show the pipeline state
  help     show this message
  quit     leave the session";

async fn run_session(config: &Config, source: &Path) -> Result<()> {
    let mut pipeline = open_pipeline(config, source, true).await?;
    eprintln!("{SESSION_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match line.trim() {
            "" => {}
            "compile" => {
                if let Err(diagnostic) = pipeline.compile() {
                    debug!(lines = diagnostic.lines().len(), "compile failed");
                }
            }
            "run" => match pipeline.run() {
                Ok(report) => debug!(lines = report.lines_written(), "run finished"),
                Err(failure) => debug!(%failure, "run failed"),
            },
            "reload" => {
                let text = read_source(source).await?;
                pipeline.edit(|buffer| buffer.set_text(text));
                eprintln!("reloaded {}", source.display());
            }
            "state" => eprintln!("{}", pipeline.state()),
            "help" => eprintln!("{SESSION_HELP}"),
            "quit" | "exit" => break,
            other => eprintln!("unknown command '{other}', type 'help' for a list"),
        }
    }

    Ok(())
}

fn show_config(config: &Config) {
    println!("Compiler:");
    println!("  Command: {}", config.compiler.command.join(" "));
    println!("  Source file: {}", config.compiler.source_name);
    println!("  Output file: {}", config.compiler.output_name);
    println!();
    println!("Sandbox:");
    println!("  Namespace: {}", config.sandbox.namespace);
    println!("  Entry point: {:?}", config.sandbox.entry_point);
    println!(
        "  Max memory pages: {:?}",
        config.sandbox.limits.max_memory_pages
    );
    println!(
        "  Max output lines: {:?}",
        config.sandbox.limits.max_output_lines
    );
    println!();
    println!("Console history limit: {:?}", config.console.history_limit);
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
