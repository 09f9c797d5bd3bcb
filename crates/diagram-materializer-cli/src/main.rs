#![forbid(unsafe_code)]

mod logging;
mod pages;

use clap::{Parser, Subcommand};
use diagram_materializer::{
    CommandLoader, DisplayMode, Materializer, MaterializerConfig, Normalizer, PassReport,
    PassStatus, RendererLoader, inspect,
};
use logging::LogFormat;
use pages::PageFile;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum CliError {
    Io(std::io::Error),
    Materializer(diagram_materializer::Error),
    Json(serde_json::Error),
    Aborted { path: PathBuf, reason: String },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Materializer(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Aborted { path, reason } => {
                write!(f, "{}: render pass aborted: {reason}", path.display())
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<diagram_materializer::Error> for CliError {
    fn from(value: diagram_materializer::Error) -> Self {
        Self::Materializer(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Turns diagram source blocks in built documentation pages into inline SVG.
#[derive(Debug, Parser)]
#[command(name = "diagram-materializer", version, about)]
struct Cli {
    /// YAML configuration file (selectors, themes, renderer command).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render diagram blocks of HTML files in place (directories are walked recursively).
    Render {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Write results under this directory instead of rewriting the inputs.
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Force a display mode instead of the page's `data-theme`.
        #[arg(long, value_name = "light|dark")]
        theme: Option<DisplayMode>,
    },
    /// Print the normalized form of a diagram source (`-` or no path reads stdin).
    Normalize {
        #[arg(value_name = "PATH")]
        input: Option<String>,
    },
    /// Print the diagram blocks found in an HTML file as JSON.
    Blocks {
        #[arg(value_name = "FILE")]
        input: String,

        #[arg(long)]
        pretty: bool,
    },
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MaterializerConfig, CliError> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            Ok(MaterializerConfig::load(path)?)
        }
        None => Ok(MaterializerConfig::default()),
    }
}

fn summary(page: &PageFile, report: &PassReport) -> String {
    format!(
        "{}: {} rendered, {} failed, {} skipped",
        page.path.display(),
        report.succeeded(),
        report.failed(),
        report.skipped()
    )
}

async fn render_pages(
    config: MaterializerConfig,
    paths: &[PathBuf],
    out_dir: Option<&Path>,
    theme: Option<DisplayMode>,
) -> Result<(), CliError> {
    let pages = pages::collect(paths)?;
    if pages.is_empty() {
        warn!("no HTML files found");
        return Ok(());
    }

    // One renderer for the whole run; every page gets its own session.
    let renderer = CommandLoader::new(config.renderer.clone()).load().await?;

    let (mut rendered, mut failed) = (0, 0);
    for page in &pages {
        let original = std::fs::read_to_string(&page.path)?;
        let session =
            Materializer::with_renderer(config.clone(), Arc::clone(&renderer), original.as_str());
        if let Some(mode) = theme {
            session.set_display_mode(mode)?;
        }

        let outcome = session.ready().await;
        let Some(report) = outcome.last() else {
            continue;
        };
        if let PassStatus::Aborted { reason } = &report.status {
            return Err(CliError::Aborted {
                path: page.path.clone(),
                reason: reason.clone(),
            });
        }
        rendered += report.succeeded();
        failed += report.failed();

        let html = session.html();
        let target = page.target(out_dir);
        if out_dir.is_some() || html != original {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, html)?;
        }
        println!("{}", summary(page, report));
    }

    info!(pages = pages.len(), rendered, failed, "render finished");
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Render {
            paths,
            out_dir,
            theme,
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(render_pages(config, &paths, out_dir.as_deref(), theme))
        }
        Command::Normalize { input } => {
            let text = read_input(input.as_deref())?;
            println!("{}", Normalizer::new().normalize(&text));
            Ok(())
        }
        Command::Blocks { input, pretty } => {
            let html = read_input(Some(input.as_str()))?;
            write_json(&inspect(&html, &config)?, pretty)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format, cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
