//! # dip CLI Interface (Module)
//!
//! This module implements the command line interface for dip-ui: argument
//! parsing, DIP directory resolution, dispatch to `dip-core`, and rendering of
//! results to stdout.
//!
//! All package logic (layout, registry, attributes, packaging, deposit and
//! status tracking) lives in the [`dip_core`] crate; this module is strictly
//! glue.
//!
//! ## How To Use
//! - From a shell: the installed `dip` binary, see `dip --help`.
//! - Programmatically: build a [`Cli`] and call [`run`]. The returned integer
//!   is the process exit status; failures carry a [`DipError`] whose status
//!   code the binary exits with.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dip_core::attributes::{self, DcAttribute};
use dip_core::deposit::{obscure, DepositClient, Endpoint, Password};
use dip_core::error::{DipError, DIP_SUCCESS};
use dip_core::package::{self, Package};
use dip_core::packager::{self, SIMPLE_ZIP};
use dip_core::registry::{self, normalise};
use dip_core::status::{DepositStatus, StatusTracker};
use dip_core::submission::{self, DepositOptions};
use dip_core::sword::SwordClient;
use std::path::{Path, PathBuf};

use crate::config_store::{CollectionConfig, ConfigStore, DipConfig};

/// Default format tag for `add-metadata`.
pub const DEFAULT_METADATA_FORMAT: &str = "metadata";

/// Create, manipulate and deposit deposit information packages (DIPs).
#[derive(Parser, Debug)]
#[clap(
    name = "dip",
    version,
    about = "Create, manipulate or submit deposit information packages",
    after_help = "On successful creation of a new DIP, its directory is written to standard output.\n\
                  On successful deposit of a DIP, its token is written to standard output."
)]
pub struct Cli {
    /// Directory of the DIP, relative to the working directory
    #[clap(short = 'd', long, global = true)]
    pub dip: Option<PathBuf>,

    /// Add or remove files recursively (scan nested subdirectories)
    #[clap(short = 'r', long, global = true)]
    pub recursive: bool,

    /// Run with full debug output enabled
    #[clap(long, global = true)]
    pub debug: bool,

    /// Directory holding dip_config.json and deposit status records
    #[clap(long, global = true, env = "DIP_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// SWORD collection details given on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct CollectionArgs {
    #[clap(long, alias = "collection_uri")]
    pub collection_uri: Option<String>,
    #[clap(long, alias = "servicedoc_uri")]
    pub servicedoc_uri: Option<String>,
    #[clap(long)]
    pub username: Option<String>,
    #[clap(long)]
    pub password: Option<String>,
}

impl CollectionArgs {
    fn is_empty(&self) -> bool {
        self.collection_uri.is_none()
            && self.servicedoc_uri.is_none()
            && self.username.is_none()
            && self.password.is_none()
    }

    fn cached_fields(&self) -> CollectionConfig {
        CollectionConfig {
            servicedoc_uri: self.servicedoc_uri.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or update the configuration (default DIP, SWORD collection details)
    Config {
        #[clap(flatten)]
        collection: CollectionArgs,
    },
    /// Create a new, empty DIP
    Create,
    /// Select an existing DIP as the default
    Use,
    /// Describe the files, metadata and endpoint of a DIP
    Show,
    /// Delete a DIP and everything in it
    Remove,
    /// Register content files with a DIP
    #[clap(alias = "add-file")]
    AddFiles { files: Vec<PathBuf> },
    /// Deregister content files from a DIP
    #[clap(alias = "remove-file")]
    RemoveFiles { files: Vec<PathBuf> },
    /// Register metadata documents with a DIP
    AddMetadata {
        #[clap(long, default_value = DEFAULT_METADATA_FORMAT)]
        format: String,
        files: Vec<PathBuf>,
    },
    /// Deregister metadata documents from a DIP
    RemoveMetadata { files: Vec<PathBuf> },
    /// Print the stored values of Dublin Core terms (exit 2 if one has none)
    ShowAttributes { terms: Vec<String> },
    /// Set Dublin Core attributes, given as dc:term=value
    #[clap(alias = "add-attribute")]
    AddAttributes { assignments: Vec<String> },
    /// Remove every value of the given Dublin Core terms
    #[clap(alias = "remove-attribute")]
    RemoveAttributes { terms: Vec<String> },
    /// Build a zip package from the DIP
    Package {
        /// Base directory for the archive paths of content files
        #[clap(long)]
        basedir: Option<PathBuf>,
        /// Package format URI
        #[clap(long, default_value = SIMPLE_ZIP)]
        format: String,
    },
    /// Package the DIP and deposit it to a SWORD collection
    Deposit {
        #[clap(flatten)]
        collection: CollectionArgs,
        #[clap(long)]
        basedir: Option<PathBuf>,
        #[clap(long, default_value = SIMPLE_ZIP)]
        format: String,
    },
    /// Report the state of an earlier deposit
    Status { token: String },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Config { .. } => "config",
            Commands::Create => "create",
            Commands::Use => "use",
            Commands::Show => "show",
            Commands::Remove => "remove",
            Commands::AddFiles { .. } => "add_files",
            Commands::RemoveFiles { .. } => "remove_files",
            Commands::AddMetadata { .. } => "add_metadata",
            Commands::RemoveMetadata { .. } => "remove_metadata",
            Commands::ShowAttributes { .. } => "show_attributes",
            Commands::AddAttributes { .. } => "add_attributes",
            Commands::RemoveAttributes { .. } => "remove_attributes",
            Commands::Package { .. } => "package",
            Commands::Deposit { .. } => "deposit",
            Commands::Status { .. } => "status",
        }
    }
}

/// State shared by every command of one invocation.
struct Session {
    cwd: PathBuf,
    store: ConfigStore,
    dip: Option<PathBuf>,
}

impl Session {
    /// `--dip` joined to the working directory, else (when allowed) the
    /// configured default.
    fn resolve_dip(&self, config: &DipConfig, allow_default: bool) -> Result<PathBuf, DipError> {
        let dipref = match (&self.dip, allow_default) {
            (Some(dip), _) => dip.clone(),
            (None, true) => config.dipdir.clone().ok_or(DipError::NoDipGiven)?,
            (None, false) => return Err(DipError::NoDipGiven),
        };
        Ok(normalise(&self.cwd, &dipref))
    }

    fn open(&self, allow_default: bool) -> Result<Package> {
        let config = self.store.load()?;
        let dipdir = self.resolve_dip(&config, allow_default)?;
        Ok(package::validate(&dipdir)?)
    }

    fn remember(&self, dipdir: Option<&Path>) -> Result<()> {
        let cwd = self.cwd.clone();
        self.store.update(|config| {
            config.dipbase = Some(cwd);
            config.dipdir = dipdir.map(Path::to_path_buf);
        })?;
        Ok(())
    }

    fn require_files(&self, command: &str, package: &Package, files: &[PathBuf]) -> Result<(), DipError> {
        if files.is_empty() {
            return Err(DipError::NoFiles {
                command: command.to_string(),
                dipdir: package.path().to_path_buf(),
            });
        }
        Ok(())
    }
}

fn print_collection(uri: &str, cached: Option<&CollectionConfig>) {
    println!("collection_uri=\"{uri}\"");
    if let Some(cached) = cached {
        if let Some(sd) = &cached.servicedoc_uri {
            println!("servicedoc_uri=\"{sd}\"");
        }
        if let Some(user) = &cached.username {
            println!("username=\"{user}\"");
        }
        if let Some(password) = &cached.password {
            println!("password=\"{}\"", obscure(password));
        }
    }
}

fn print_dip_settings(config: &DipConfig) {
    if let Some(dipdir) = &config.dipdir {
        println!("dipdir=\"{}\"", dipdir.display());
    }
    if let Some(dipbase) = &config.dipbase {
        println!("dipbase=\"{}\"", dipbase.display());
    }
}

fn print_attribute(attr: &DcAttribute, indent: &str) {
    println!("{indent}{attr}");
}

/// Runs one parsed command line and returns the exit status.
pub async fn run(cli: Cli) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let config_dir = cli
        .config_dir
        .clone()
        .map(|dir| normalise(&cwd, &dir))
        .or_else(ConfigStore::default_dir)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine a configuration directory; use --config-dir"))?;
    let session = Session {
        cwd,
        store: ConfigStore::new(config_dir),
        dip: cli.dip.clone(),
    };
    let recursive = cli.recursive;

    tracing::info!(command = cli.command.name(), "Running command");
    match cli.command {
        Commands::Config { collection } => config(&session, collection),

        Commands::Create => {
            let config = session.store.load()?;
            let dipdir = session.resolve_dip(&config, false)?;
            let package = package::create(&dipdir)?;
            session.remember(Some(package.path()))?;
            println!(
                "Created deposit information package at {}",
                package.path().display()
            );
            Ok(DIP_SUCCESS)
        }

        Commands::Use => {
            let package = session.open(true)?;
            session.remember(Some(package.path()))?;
            println!("{}", package.path().display());
            Ok(DIP_SUCCESS)
        }

        Commands::Show => {
            let package = session.open(true)?;
            let summary = package.summary()?;
            println!(
                "Deposit information package at {}",
                summary.path.display()
            );
            println!("Files:");
            for file in &summary.files {
                println!("  {}", file.display_line());
            }
            println!("Metadata files:");
            for meta in &summary.metadata_files {
                println!("  {}", meta.display_line());
            }
            println!("Dublin Core:");
            for attr in &summary.attributes {
                print_attribute(attr, "  ");
            }
            println!("Endpoints:");
            if let Some(endpoint) = &summary.endpoint {
                println!("  {endpoint}");
            }
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::Remove => {
            let config = session.store.load()?;
            let dipdir = session.resolve_dip(&config, false)?;
            package::remove(&dipdir)?;
            session.remember(None)?;
            println!("Removed deposit information package at {}", dipdir.display());
            Ok(DIP_SUCCESS)
        }

        Commands::AddFiles { files } => {
            let package = session.open(true)?;
            session.require_files("add_files", &package, &files)?;
            println!(
                "Adding files to deposit information package at {} ...",
                package.path().display()
            );
            registry::add_files(&package, &files, recursive, &session.cwd, |path| {
                println!("  {}", path.display())
            })?;
            if files.len() > 1 || recursive {
                println!("Done.");
            }
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::RemoveFiles { files } => {
            let package = session.open(true)?;
            session.require_files("remove_files", &package, &files)?;
            println!(
                "Removing files from deposit information package at {}",
                package.path().display()
            );
            registry::remove_files(&package, &files, recursive, &session.cwd, |path| {
                println!("  {}", path.display())
            })?;
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::AddMetadata { format, files } => {
            let package = session.open(true)?;
            session.require_files("add_metadata", &package, &files)?;
            println!(
                "Adding metadata files to deposit information package at {} ...",
                package.path().display()
            );
            registry::add_metadata_files(&package, &files, &format, &session.cwd, |path| {
                println!("  {} ({format})", path.display())
            })?;
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::RemoveMetadata { files } => {
            let package = session.open(true)?;
            session.require_files("remove_metadata", &package, &files)?;
            println!(
                "Removing metadata files from deposit information package at {}",
                package.path().display()
            );
            registry::remove_metadata_files(&package, &files, &session.cwd, |path| {
                println!("  {}", path.display())
            })?;
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::ShowAttributes { terms } => {
            let package = session.open(true)?;
            if terms.is_empty() {
                return Err(DipError::NoAttributes {
                    command: "show_attributes".to_string(),
                }
                .into());
            }
            let mut missing = None;
            for term in &terms {
                let found = attributes::get_attribute(&package, term)?;
                if found.is_empty() && missing.is_none() {
                    missing = Some(term.clone());
                }
                for attr in found {
                    print_attribute(&attr, "");
                }
            }
            session.remember(Some(package.path()))?;
            match missing {
                Some(term) => Err(DipError::AttributeNotFound { term }.into()),
                None => Ok(DIP_SUCCESS),
            }
        }

        Commands::AddAttributes { assignments } => {
            let package = session.open(true)?;
            if assignments.is_empty() {
                return Err(DipError::NoAttributes {
                    command: "add_attributes".to_string(),
                }
                .into());
            }
            let parsed = assignments
                .iter()
                .map(|a| attributes::parse_assignment(a))
                .collect::<Result<Vec<_>, _>>()?;
            println!(
                "Adding attributes to deposit information package at {}",
                package.path().display()
            );
            for (term, value) in &parsed {
                let attr = attributes::set_attribute(&package, term, value)?;
                print_attribute(&attr, "  ");
            }
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::RemoveAttributes { terms } => {
            let package = session.open(true)?;
            if terms.is_empty() {
                return Err(DipError::NoAttributes {
                    command: "remove_attributes".to_string(),
                }
                .into());
            }
            let parsed = terms
                .iter()
                .map(|t| attributes::parse_term(t))
                .collect::<Result<Vec<_>, _>>()?;
            println!(
                "Removing attributes from deposit information package at {}",
                package.path().display()
            );
            for term in &parsed {
                attributes::remove_attribute(&package, term)?;
                println!("  {term}");
            }
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::Package { basedir, format } => {
            let package = session.open(true)?;
            println!(
                "Packaging deposit information package at {}",
                package.path().display()
            );
            let basedir = basedir.map(|dir| normalise(&session.cwd, &dir));
            let artifact = packager::package(&package, Some(&format), basedir.as_deref())?;
            println!("{}", artifact.path.display());
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::Deposit {
            collection,
            basedir,
            format,
        } => {
            let package = session.open(true)?;
            let config = session.store.load()?;
            let options = deposit_options(&config, collection, format)?;
            let options = DepositOptions {
                basedir: basedir.map(|dir| normalise(&session.cwd, &dir)),
                ..options
            };

            let transport = SwordClient::new().map_err(|e| DipError::DepositFailed {
                status: None,
                headers: Default::default(),
                message: e.to_string(),
            })?;
            let mut client = DepositClient::new(transport);
            let tracker = StatusTracker::new(session.store.dir());
            let outcome = submission::deposit(&package, options, &mut client, &tracker).await?;

            println!("token={}", outcome.token);
            session.remember(Some(package.path()))?;
            Ok(DIP_SUCCESS)
        }

        Commands::Status { token } => {
            let tracker = StatusTracker::new(session.store.dir());
            let status = tracker.query_status(&token)?;
            match &status {
                DepositStatus::Pending => println!("pending"),
                DepositStatus::Complete { location: Some(location) } => println!("{location}"),
                DepositStatus::Complete { location: None } => println!("complete"),
            }
            Ok(status.status_code())
        }
    }
}

fn config(session: &Session, collection: CollectionArgs) -> Result<i32> {
    if let Some(dip) = &session.dip {
        let dipdir = normalise(&session.cwd, dip);
        let cwd = session.cwd.clone();
        let config = session.store.update(|config| {
            config.dipbase = Some(cwd);
            config.dipdir = Some(dipdir);
        })?;
        print_dip_settings(&config);
    }

    if !collection.is_empty() {
        let current = session.store.load()?;
        let uri = collection
            .collection_uri
            .clone()
            .or(current.collection_uri)
            .ok_or(DipError::NoCollection)?;
        let fields = collection.cached_fields();
        let config = session.store.update(|config| {
            config.collection_uri = Some(uri.clone());
            config.collections.entry(uri.clone()).or_default().merge(fields);
        })?;
        print_collection(&uri, config.collections.get(&uri));
    }

    if session.dip.is_none() && collection.is_empty() {
        let config = session.store.load()?;
        print_dip_settings(&config);
        if let Some(uri) = &config.collection_uri {
            print_collection(uri, config.collections.get(uri));
        }
    }
    Ok(DIP_SUCCESS)
}

/// Merges command line collection details over the cached ones.
fn deposit_options(
    config: &DipConfig,
    args: CollectionArgs,
    format: String,
) -> Result<DepositOptions, DipError> {
    let uri = args
        .collection_uri
        .or_else(|| config.collection_uri.clone())
        .ok_or(DipError::NoCollection)?;
    let cached = config.collections.get(&uri);
    if cached.is_none() && args.username.is_none() {
        return Err(DipError::UnknownCollection {
            collection_uri: uri,
        });
    }
    let cached = cached.cloned().unwrap_or_default();

    let endpoint = Endpoint::new(uri)
        .with_servicedoc(args.servicedoc_uri.or(cached.servicedoc_uri))
        .with_username(args.username.or(cached.username))
        .with_package(format);
    Ok(DepositOptions {
        endpoint,
        password: args.password.or(cached.password).map(Password::new),
        format: None,
        basedir: None,
    })
}
