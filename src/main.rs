//! vcs-helper - background git/Subversion actions
//!
//! Console front end for the helper actions a file manager context menu
//! offers: add, diff, properties and status.
//!
//! # Execution Flow
//!
//! 1. Parse the command line (clap)
//! 2. Load `vcs-helper.yaml` + `VCS_HELPER_*` overrides from the per-user
//!    config directory (never the working copy)
//! 3. Initialize logging (daily log file + optional stderr console)
//! 4. Create the tokio runtime that hosts operation workers
//! 5. Build the capability factory for the command and start one operation
//! 6. Run the foreground loop on the main thread until the outcome arrives;
//!    Ctrl-C requests cancellation of the live operation
//!
//! Exit codes: 0 success, 1 failure, 130 cancelled.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use vcs_helper::controller::{Begin, CapabilityFactory, OperationController, OperationRequest};
use vcs_helper::error::ControllerError;
use vcs_helper::models::{FileSelection, HelperConfig, OperationState, SelectionNode, StatusFlags};
use vcs_helper::services::{
    AddFactory, Backend, DiffFactory, GitCli, PropertiesFactory, PropertyDepth, PropertyEdit,
    StatusQuery, SvnCli,
};
use vcs_helper::{APP_NAME, ConfigManager, ConsolePresenter, Metrics, VERSION};

const EXIT_CANCELLED: u8 = 130;

/// Background git/Subversion actions for file manager context menus.
#[derive(Debug, Parser)]
#[command(name = "vcs-helper", author, version, about)]
struct Cli {
    /// Directory holding vcs-helper.yaml and, by default, the logs
    /// [default: $XDG_CONFIG_HOME/vcs-helper]
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Print output without colours
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add modified and unversioned files to the git index
    Add(PathArgs),
    /// Show the working copy diff
    Diff(DiffArgs),
    /// List (and optionally change) Subversion properties of a path
    Properties(PropertiesArgs),
    /// Print the working copy status as a tree
    Status(StatusArgs),
}

#[derive(Debug, Args)]
struct PathArgs {
    /// Paths to operate on (default: current directory)
    paths: Vec<Utf8PathBuf>,
}

#[derive(Debug, Args)]
struct DiffArgs {
    /// Use Subversion instead of git
    #[arg(long)]
    svn: bool,

    #[command(flatten)]
    paths: PathArgs,
}

#[derive(Debug, Args)]
struct PropertiesArgs {
    /// Versioned path whose properties are shown
    path: Utf8PathBuf,

    /// Set a property before listing
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value, conflicts_with = "delete")]
    set: Option<(String, String)>,

    /// Delete a property before listing
    #[arg(long, value_name = "KEY")]
    delete: Option<String>,

    /// How far the change reaches below PATH
    #[arg(long, default_value_t = PropertyDepth::Empty)]
    depth: PropertyDepth,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Use Subversion instead of git
    #[arg(long)]
    svn: bool,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,

    /// Include unchanged files
    #[arg(long)]
    unchanged: bool,

    /// Include ignored files
    #[arg(long)]
    ignored: bool,

    #[command(flatten)]
    paths: PathArgs,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => vcs_helper::config::default_config_dir()
            .context("No per-user config directory available; pass --config-dir")?,
    };
    let config_manager = ConfigManager::new(&config_dir)?;
    let config = config_manager.load()?;

    let log_dir = resolve_log_dir(config_manager.config_dir(), &config.log.dir);
    let _log_guard = vcs_helper::logging::setup_logging_with_console(
        &log_dir,
        &config.log.prefix,
        cli.debug || config.log.debug,
        config.log.console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    config_manager.log_source(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("vcs-helper-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let color = !cli.no_color;
    let code = match cli.command {
        Command::Add(args) => run_add(args, &config, &runtime, color)?,
        Command::Diff(args) => {
            let backend = if args.svn {
                Backend::Svn(SvnCli::from_config(&config))
            } else {
                Backend::Git(GitCli::from_config(&config))
            };
            let request = OperationRequest::new(default_paths(args.paths.paths));
            run_operation(Box::new(DiffFactory::new(backend)), request, &config, &runtime, color)?
        }
        Command::Properties(args) => run_properties(args, &config, &runtime, color)?,
        Command::Status(args) => run_status(args, &config)?,
    };

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");
    Ok(code)
}

fn run_add(args: PathArgs, config: &HelperConfig, runtime: &Runtime, color: bool) -> Result<ExitCode> {
    let git = GitCli::from_config(config);

    let records = git
        .status(&args.paths, config.status)
        .context("Failed to query git status")?;
    let selection = FileSelection::from_records(records, config.status);
    for entry in selection.entries() {
        tracing::debug!("Add candidate: {} ({})", entry.path, entry.text_status.as_str());
    }

    let request = OperationRequest::new(selection.selected_paths());

    // Status paths are relative to the working tree root.
    let git = git
        .at_toplevel()
        .context("Failed to locate the git working tree root")?;
    run_operation(Box::new(AddFactory::new(git)), request, config, runtime, color)
}

fn run_properties(
    args: PropertiesArgs,
    config: &HelperConfig,
    runtime: &Runtime,
    color: bool,
) -> Result<ExitCode> {
    let edit = match (args.set, args.delete) {
        (Some((key, value)), _) => Some(PropertyEdit::set(key, value)),
        (None, Some(key)) => Some(PropertyEdit::delete(key)),
        (None, None) => None,
    }
    .map(|edit| edit.with_depth(args.depth));

    let mut request = OperationRequest::new(vec![args.path]);
    if let Some(edit) = edit {
        request = request.with_edit(edit);
    }

    let store = Arc::new(SvnCli::from_config(config));
    run_operation(Box::new(PropertiesFactory::new(store)), request, config, runtime, color)
}

fn run_status(args: StatusArgs, config: &HelperConfig) -> Result<ExitCode> {
    let mut flags = config.status;
    flags.set(StatusFlags::RECURSIVE, args.recursive);
    flags.set(StatusFlags::UNCHANGED, args.unchanged);
    flags.set(StatusFlags::IGNORED, args.ignored);

    let records = if args.svn {
        SvnCli::from_config(config).status(&args.paths.paths, flags)
    } else {
        GitCli::from_config(config).status(&args.paths.paths, flags)
    }
    .context("Failed to query status")?;

    let selection = FileSelection::from_records(records, flags);
    if selection.is_empty() {
        println!("Nothing to report.");
    }
    for node in selection.tree() {
        print_node(&node, 0);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_node(node: &SelectionNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match &node.entry {
        Some(entry) => println!(
            "{indent}{:<12} {:<12} {}",
            entry.text_status.as_str(),
            entry.prop_status.as_str(),
            node.name
        ),
        None => println!("{indent}{:<25} {}/", "", node.name),
    }
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

/// Start one operation and run the foreground loop until it ends.
fn run_operation(
    factory: Box<dyn CapabilityFactory>,
    request: OperationRequest,
    config: &HelperConfig,
    runtime: &Runtime,
    color: bool,
) -> Result<ExitCode> {
    let metrics = Arc::new(Metrics::new());
    let presenter = ConsolePresenter::stdio(color);
    let mut controller = OperationController::new(
        presenter,
        factory,
        runtime.handle().clone(),
        config,
        Arc::clone(&metrics),
    );

    match controller.begin_with(request) {
        Ok(Begin::Started) => {}
        Ok(Begin::NothingSelected) => {
            eprintln!("Nothing to do.");
            return Ok(ExitCode::SUCCESS);
        }
        // Already shown by the presenter.
        Err(ControllerError::Launch(_)) => return Ok(ExitCode::FAILURE),
        Err(e) => return Err(e.into()),
    }

    let cancel_token = controller.token();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, cancelling operation...");
            cancel_token.request_cancel();
        }
    });

    let state = controller.wait_blocking();
    metrics.log_summary();

    Ok(match state {
        Some(OperationState::Succeeded) => ExitCode::SUCCESS,
        Some(OperationState::Cancelled) => ExitCode::from(EXIT_CANCELLED),
        _ => ExitCode::FAILURE,
    })
}

fn default_paths(paths: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    if paths.is_empty() {
        vec![Utf8PathBuf::from(".")]
    } else {
        paths
    }
}

/// Relative log directories live inside the config directory.
fn resolve_log_dir(config_dir: &Utf8Path, log_dir: &str) -> Utf8PathBuf {
    let log_dir = Utf8Path::new(log_dir);
    if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        config_dir.join(log_dir)
    }
}
