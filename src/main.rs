//! trove - Locate, copy, move and enumerate entries across mounted repositories.
//!
//! Usage:
//!   trove -w repos.json tree [LOCATION]              Print repository trees
//!   trove -w repos.json resolve LOCATION             Resolve a location
//!   trove -w repos.json relative LOCATION BASE       Render LOCATION relative to BASE
//!   trove -w repos.json copy SOURCE... DESTINATION   Copy entries
//!   trove -w repos.json move SOURCE... DESTINATION   Move entries
//!   trove -w repos.json mkdir LOCATION               Create folders recursively
//!   trove -w repos.json rm LOCATION...               Delete entries
//!   trove -w repos.json rename LOCATION NAME         Rename an entry

mod workspace;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use trove_core::{
    DataKind, Entry, EntryKind, Location, LocationBuilder, LocationType, Repository,
    RepositoryLookup,
};
use trove_ops::{
    OperationComplete, OperationExecutor, OperationType, ProgressListener, RepositoryOperation,
    Resolution, require_folder, resolve,
};
use trove_registry::{Registry, load_config, load_default_config};

use crate::workspace::WorkspaceDescription;

#[derive(Parser)]
#[command(
    name = "trove",
    version,
    about = "Repository namespace tool",
    long_about = "trove addresses folders and data entries across mounted repositories.\n\n\
                  Repositories are loaded from a JSON workspace description. Mutating \
                  commands print the resulting tree, or write it back with --write."
)]
struct Cli {
    /// Workspace description (JSON)
    #[arg(short, long, global = true, default_value = "repositories.json")]
    workspace: PathBuf,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the modified workspace back to its description file
    #[arg(long, global = true)]
    write: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print repository trees
    Tree {
        /// Folder to print (defaults to every repository)
        location: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Resolve a location to an entry
    Resolve {
        /// Absolute location, e.g. //Local/a/b
        location: String,

        /// Expected shape of the entry
        #[arg(short = 't', long = "type", default_value = "unknown")]
        location_type: LocationType,

        /// Expected data kind (e.g. process, io_object)
        #[arg(short, long)]
        kind: Option<DataKind>,

        /// Fail when several data entries share the name
        #[arg(long)]
        strict: bool,

        /// Do not refresh stale folders
        #[arg(long)]
        fail_fast: bool,
    },

    /// Render a location relative to a base folder
    Relative {
        /// Location to render
        location: String,

        /// Base folder
        base: String,
    },

    /// Copy entries into a folder
    Copy {
        /// Source locations followed by the destination folder
        #[arg(required = true, num_args = 2..)]
        locations: Vec<String>,

        /// Replace conflicting entries instead of renaming the copy
        #[arg(long)]
        overwrite: bool,
    },

    /// Move entries into a folder
    Move {
        /// Source locations followed by the destination folder
        #[arg(required = true, num_args = 2..)]
        locations: Vec<String>,

        /// Replace conflicting entries instead of renaming
        #[arg(long)]
        overwrite: bool,
    },

    /// Create a folder and its missing ancestors
    Mkdir {
        /// Folder location
        location: String,
    },

    /// Delete entries
    Rm {
        /// Locations to delete
        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Rename an entry in place
    Rename {
        /// Entry location
        location: String,

        /// New name
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_config(path).wrap_err("Failed to load configuration")?,
        None => load_default_config(),
    };
    let strict = config.strict_on_duplicate;
    let registry = Registry::new(config);
    let description = WorkspaceDescription::load(&cli.workspace)?;
    description.mount(&registry)?;

    let operation = match cli.command {
        Command::Tree { location, format } => {
            return run_tree(&registry, location.as_deref(), format);
        }
        Command::Resolve {
            location,
            location_type,
            kind,
            strict: strict_flag,
            fail_fast,
        } => {
            let builder = LocationBuilder::new()
                .with_location_type(location_type)
                .with_expected_kind(kind.unwrap_or_default())
                .with_strict_on_duplicate(strict || strict_flag);
            return run_resolve(&registry, &builder.build_from_absolute(&location)?, fail_fast);
        }
        Command::Relative { location, base } => {
            return run_relative(&registry, &location, &base);
        }
        Command::Copy {
            locations,
            overwrite,
        } => {
            let (sources, destination) = split_destination(&locations)?;
            let operation = RepositoryOperation::copy(sources, destination);
            if overwrite {
                operation.overwriting()
            } else {
                operation
            }
        }
        Command::Move {
            locations,
            overwrite,
        } => {
            let (sources, destination) = split_destination(&locations)?;
            let operation = RepositoryOperation::move_to(sources, destination);
            if overwrite {
                operation.overwriting()
            } else {
                operation
            }
        }
        Command::Mkdir { location } => RepositoryOperation::create_folders(
            LocationBuilder::new()
                .with_location_type(LocationType::Folder)
                .build_from_absolute(&location)?,
        ),
        Command::Rm { locations } => RepositoryOperation::delete(parse_all(&locations)?),
        Command::Rename { location, name } => {
            RepositoryOperation::rename(Location::parse(&location)?, name)
        }
    };

    let complete = run_operation(&registry, &operation);

    if cli.write {
        WorkspaceDescription::capture(&registry)?.save(&cli.workspace)?;
        eprintln!("Wrote {}", cli.workspace.display());
    } else {
        print_all(&registry)?;
    }

    if !complete.is_success() {
        bail!("{}", complete.summary());
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print one folder, or every repository.
fn run_tree(registry: &Registry, location: Option<&str>, format: OutputFormat) -> Result<()> {
    match (location, format) {
        (None, OutputFormat::Text) => print_all(registry),
        (None, OutputFormat::Json) => {
            let description = WorkspaceDescription::capture(registry)?;
            println!("{}", serde_json::to_string_pretty(&description)?);
            Ok(())
        }
        (Some(text), format) => {
            let location = Location::parse(text)?.to_folder();
            let (repository, folder) = require_folder(registry, &location)?;
            match format {
                OutputFormat::Text => {
                    println!("{location}");
                    print_folder(&repository, &folder, 1)
                }
                OutputFormat::Json => {
                    let entries = repository.list_complete(&folder)?;
                    println!("{}", serde_json::to_string_pretty(entries.entries())?);
                    Ok(())
                }
            }
        }
    }
}

fn run_resolve(registry: &Registry, location: &Location, fail_fast: bool) -> Result<()> {
    match resolve(registry, location, fail_fast)? {
        Resolution::Found(entry) => {
            let repository = registry.repository(location.repository_name())?;
            let resolved = repository.location_of(&entry)?;
            println!("{resolved}\t{}", describe_kind(&entry.kind));
            if let Some(revision) = repository.revision(&entry)? {
                println!("revision\t{revision}");
            }
        }
        Resolution::NotFound => bail!("Entry not found: {location}"),
        Resolution::WouldBlock => bail!("{location} needs a refresh; retry without --fail-fast"),
    }
    Ok(())
}

fn run_relative(registry: &Registry, location: &str, base: &str) -> Result<()> {
    let location = Location::parse(location)?;
    let base = Location::parse(base)?.to_folder();
    let rendered = match registry.get(base.repository_name()) {
        Some(repository) => {
            location.make_relative_with(&base, |name| repository.is_connections_folder_name(name))
        }
        None => location.make_relative(&base),
    };
    println!("{rendered}");
    Ok(())
}

fn run_operation(registry: &Registry, operation: &RepositoryOperation) -> OperationComplete {
    let executor = OperationExecutor::new(registry)
        .with_progress_total(registry.config().progress_total);
    let mut progress = StderrProgress::new(operation.operation_type());
    let complete = executor.execute(operation, &mut progress);

    eprintln!("{}", complete.summary());
    for produced in &complete.produced {
        eprintln!("  -> {produced}");
    }
    for error in &complete.errors {
        eprintln!("  ! {error}");
    }
    complete
}

/// Reports progress on stderr in whole percent steps.
struct StderrProgress {
    operation_type: OperationType,
    total: u64,
    last_percent: Option<u64>,
}

impl StderrProgress {
    fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            total: 0,
            last_percent: None,
        }
    }
}

impl ProgressListener for StderrProgress {
    fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    fn set_completed(&mut self, completed: u64) {
        if self.total == 0 {
            return;
        }
        let percent = completed.saturating_mul(100) / self.total;
        if self.last_percent.is_none_or(|last| percent >= last + 10) {
            eprintln!("{}: {percent}%", self.operation_type);
            self.last_percent = Some(percent);
        }
    }

    fn set_message(&mut self, message: &str) {
        tracing::debug!(operation = %self.operation_type, "{message}");
    }

    fn complete(&mut self) {
        if self.last_percent != Some(100) {
            eprintln!("{}: done", self.operation_type);
        }
    }
}

fn parse_all(locations: &[String]) -> Result<Vec<Location>> {
    locations
        .iter()
        .map(|text| Location::parse(text).wrap_err_with(|| format!("Invalid location '{text}'")))
        .collect()
}

/// Split `SOURCE... DESTINATION`.
fn split_destination(locations: &[String]) -> Result<(Vec<Location>, Location)> {
    let Some((destination, sources)) = locations.split_last() else {
        bail!("Missing destination");
    };
    let destination = Location::parse(destination)?.to_folder();
    Ok((parse_all(sources)?, destination))
}

fn print_all(registry: &Registry) -> Result<()> {
    for repository in registry.repositories() {
        let root = repository.root()?;
        let marker = if repository.is_read_only() { " (read-only)" } else { "" };
        println!("//{}/  [{}]{marker}", repository.name(), repository.kind());
        print_folder(&repository, &root, 1)?;
    }
    Ok(())
}

fn print_folder(repository: &Repository, folder: &Entry, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    let snapshot = repository.list_complete(folder)?;

    for sub in snapshot.folders() {
        println!("{indent}{}/", sub.name);
        print_folder(repository, sub, depth + 1)?;
    }
    for entry in snapshot.data_entries() {
        let size = repository.read(entry).map(|p| p.len()).unwrap_or(0);
        println!(
            "{indent}{:<32} {:<16} {:>10}",
            entry.name,
            describe_kind(&entry.kind),
            format_size(size as u64)
        );
    }
    Ok(())
}

fn describe_kind(kind: &EntryKind) -> String {
    match kind {
        EntryKind::Folder => "folder".to_string(),
        EntryKind::Data {
            kind,
            format: Some(format),
        } => format!("{kind}({format})"),
        EntryKind::Data { kind, format: None } => kind.to_string(),
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_destination() {
        let args = vec!["//R/a".to_string(), "//R/b".to_string(), "//R/x".to_string()];
        let (sources, destination) = split_destination(&args).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(destination.to_absolute_string(), "//R/x");
        assert_eq!(destination.location_type(), LocationType::Folder);
    }

    #[test]
    fn test_describe_kind() {
        assert_eq!(describe_kind(&EntryKind::Folder), "folder");
        assert_eq!(
            describe_kind(&EntryKind::data_with_format(DataKind::IoObject, "table")),
            "io_object(table)"
        );
    }

    #[test]
    fn test_progress_steps() {
        let mut progress = StderrProgress::new(OperationType::Copy);
        progress.set_total(1_000);
        progress.set_completed(50);
        assert_eq!(progress.last_percent, Some(5));
        progress.set_completed(100);
        assert_eq!(progress.last_percent, Some(5));
        progress.set_completed(1_000);
        assert_eq!(progress.last_percent, Some(100));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "trove", "-w", "ws.json", "copy", "//R/a", "//R/b", "--overwrite",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Copy { overwrite: true, .. }));

        let cli = Cli::try_parse_from(["trove", "move", "//R/a", "//R/b"]).unwrap();
        assert!(matches!(cli.command, Command::Move { overwrite: false, .. }));
    }
}
