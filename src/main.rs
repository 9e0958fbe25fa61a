use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use exarch::common::load_config;
use exarch::export::{ExportState, FilterSet, Selection};
use exarch::indicator::TermIndicatorHub;
use exarch::power::NoopPower;
use exarch::session::{ExportSession, Notification, SessionDeps};
use exarch::worker::FsWorkerFactory;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exarch")]
#[command(about = "Export data to an archive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a data root (or one container inside it) into an archive
    Export {
        #[arg(help = "Path to the data root to export from")]
        source: PathBuf,

        #[arg(long, help = "Container inside the root to export; defaults to everything")]
        select: Option<String>,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Content kinds to include: messages,images,videos,audio,files"
        )]
        kinds: Option<Vec<String>>,

        #[arg(long, default_value = ".", help = "Directory (or file path) for the archive")]
        out: PathBuf,

        #[arg(long, help = "Emit notifications as JSON lines")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never fight the progress bar.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Export {
            source,
            select,
            kinds,
            out,
            json,
        } => run_export(source, select, kinds, out, json).await,
    }
}

async fn run_export(
    source: PathBuf,
    select: Option<String>,
    kinds: Option<Vec<String>>,
    out: PathBuf,
    json: bool,
) -> Result<()> {
    if !source.is_dir() {
        anyhow::bail!("Data root not found: {}", source.display());
    }

    let config = load_config()?;
    let deps = SessionDeps {
        workers: Arc::new(FsWorkerFactory::new(&source)),
        indicators: Arc::new(TermIndicatorHub),
        power: Arc::new(NoopPower),
    };
    let (handle, mut notifications) = ExportSession::spawn(deps, config.session_settings());

    let selection = match select {
        Some(id) => Selection::Space(id),
        None => Selection::Everything,
    };
    handle.discover(selection);

    let mut started = false;
    let mut failed = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received - cancelling export");
                handle.cancel();
                handle.stop();
                failed = true;
                break;
            }
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                if json {
                    println!("{}", serde_json::to_string(&notification)?);
                }
                match notification {
                    Notification::State { state: ExportState::Waiting, stats } if !started => {
                        started = true;
                        if !json {
                            println!(
                                "Discovered {} message(s), {}",
                                stats.messages,
                                human_bytes(stats.filtered_bytes(&FilterSet::all()))
                            );
                        }
                        if let Some(tokens) = &kinds {
                            handle.configure_tokens(tokens.clone());
                        }
                        handle.start(out.clone());
                    }
                    Notification::State { state: ExportState::Done, .. } => {
                        if !json {
                            println!("{} Export complete", style("✓").green().bold());
                        }
                        handle.stop();
                    }
                    Notification::State { state: ExportState::Error, .. } => {
                        failed = true;
                        handle.stop();
                    }
                    Notification::Error { message } => {
                        if !json {
                            eprintln!("{} {}", style("✗").red().bold(), message);
                        }
                        failed = true;
                    }
                    _ => {}
                }
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
