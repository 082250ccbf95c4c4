use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vsproj_manifest::{absolutize, ManifestCache, WorkspaceRoots};
use vsproj_sync::{ignore_file_path, IgnoreList, ProjectSync, SyncConfig, SyncOutcome};

mod prompt;
mod report;
mod watch;

#[derive(Parser)]
#[command(name = "vsproj")]
#[command(
    about = "Keep Visual Studio project files in step with the files on disk",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: `.vsproj.toml` in the first workspace folder)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace folder bounding the manifest search
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add files or folders to the project that contains them
    Add(AddArgs),
    /// Remove files or folders from the project that lists them
    Remove(RemoveArgs),
    /// Follow file-system changes and keep projects in sync until interrupted
    Watch(WatchArgs),
    /// Forget every path previously answered with "never"
    #[command(name = "clear-ignored")]
    ClearIgnored,
}

#[derive(Args)]
struct AddArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Ask before adding each file
    #[arg(short, long)]
    interactive: bool,
}

#[derive(Args)]
struct RemoveArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct WatchArgs {
    /// Workspace folders to watch (default: --workspace)
    workspaces: Vec<PathBuf>,

    /// Ask before adding each new file
    #[arg(short, long)]
    interactive: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Add(ref args) => run_add(&cli, args).await,
        Commands::Remove(ref args) => run_remove(&cli, args).await,
        Commands::Watch(ref args) => run_watch(&cli, args).await,
        Commands::ClearIgnored => run_clear_ignored(&cli).await,
    }
}

async fn run_add(cli: &Cli, args: &AddArgs) -> Result<()> {
    let folders = workspace_folders(std::slice::from_ref(&cli.workspace))?;
    let config = load_config(cli.config.as_deref(), &folders)?;
    let sync = build_sync(config, &folders, args.interactive).await?;

    let mut outcomes = Vec::new();
    for path in &args.paths {
        let path = absolutize(path).with_context(|| format!("resolve {}", path.display()))?;
        outcomes.extend(sync.add_path(&path).await?);
    }
    print_outcomes(&outcomes)
}

async fn run_remove(cli: &Cli, args: &RemoveArgs) -> Result<()> {
    let folders = workspace_folders(std::slice::from_ref(&cli.workspace))?;
    let config = load_config(cli.config.as_deref(), &folders)?;
    let sync = build_sync(config, &folders, false).await?;

    let mut outcomes = Vec::new();
    for path in &args.paths {
        let path = absolutize(path).with_context(|| format!("resolve {}", path.display()))?;
        outcomes.push(sync.remove_path(&path, false).await?);
    }
    print_outcomes(&outcomes)
}

async fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<()> {
    let requested = if args.workspaces.is_empty() {
        std::slice::from_ref(&cli.workspace)
    } else {
        args.workspaces.as_slice()
    };
    let folders = workspace_folders(requested)?;
    let mut config = load_config(cli.config.as_deref(), &folders)?;
    config.activate = true;
    if !config.is_active() {
        bail!("synchronization is disabled in the configuration");
    }

    let sync = build_sync(config, &folders, args.interactive).await?;
    watch::run(sync, folders).await
}

async fn run_clear_ignored(cli: &Cli) -> Result<()> {
    let folders = workspace_folders(std::slice::from_ref(&cli.workspace))?;
    let config = load_config(cli.config.as_deref(), &folders)?;
    let sync = build_sync(config, &folders, false).await?;

    let count = sync.ignored_paths().await.len();
    sync.clear_ignored_paths().await?;
    println!("cleared {count} ignored path(s)");
    Ok(())
}

fn workspace_folders(requested: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::with_capacity(requested.len());
    for folder in requested {
        let folder = absolutize(folder)
            .with_context(|| format!("resolve workspace {}", folder.display()))?;
        if !folder.is_dir() {
            bail!("workspace folder {} does not exist", folder.display());
        }
        folders.push(folder);
    }
    Ok(folders)
}

fn load_config(explicit: Option<&Path>, folders: &[PathBuf]) -> Result<SyncConfig> {
    let config = match (explicit, folders.first()) {
        (Some(path), _) => SyncConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        (None, Some(first)) => SyncConfig::discover(first)?,
        (None, None) => SyncConfig::default(),
    };
    if !config.enabled {
        bail!("synchronization is disabled in the configuration");
    }
    Ok(config)
}

async fn build_sync(
    config: SyncConfig,
    folders: &[PathBuf],
    interactive: bool,
) -> Result<Arc<ProjectSync>> {
    let roots = WorkspaceRoots::from_workspace_folders(folders)?;
    let ignore = match folders.first() {
        Some(first) => IgnoreList::load(ignore_file_path(first)).await?,
        None => IgnoreList::ephemeral(),
    };

    let mut sync = ProjectSync::new(config, Arc::new(ManifestCache::new()), roots, ignore)?;
    if interactive {
        sync = sync.with_prompt(Arc::new(prompt::TerminalPrompt));
    }
    Ok(Arc::new(sync))
}

fn print_outcomes(outcomes: &[SyncOutcome]) -> Result<()> {
    for outcome in outcomes {
        println!("{}", report::describe(outcome));
    }
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, SyncOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        bail!("{failed} path(s) could not be synchronized");
    }
    Ok(())
}
