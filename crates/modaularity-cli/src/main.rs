//! Command-line interface for Modaularity module catalogs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use modaularity_codegen::{GeneratedCatalog, GeneratedCatalogOptions};
use modaularity_core::{
    BinaryImage, CatalogConfigLoader, CatalogDefaults, ConverterRegistry, CriteriaBuilder, DirectoryCatalog,
    DirectoryCatalogOptions, FinderOptions, HostBinaryPolicy, HostEnvironment, LoadContextOptions, Module,
    ModuleCatalog,
};

/// Modaularity - discover modules in binaries, directories and source.
#[derive(Parser, Debug)]
#[command(name = "modaularity")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the metadata of a module binary.
    Inspect {
        /// Path to a `.modb` file.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// List the modules found in a directory.
    Scan {
        /// Directory to scan.
        #[arg(required = true)]
        dir: PathBuf,
        /// File name patterns (default: every module binary).
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,
        /// Do not descend into subdirectories.
        #[arg(long)]
        no_recursive: bool,
        /// Type name glob modules must match.
        #[arg(short, long)]
        name: Option<String>,
        /// Tags given to matching modules.
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Host binary policy: never, selected, always or prefer-module.
        #[arg(long, default_value = "always")]
        policy: String,
    },
    /// Build the catalogs declared in a JSON or TOML file and list their modules.
    Config {
        /// Path to the configuration file.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Compile a source file and list the modules it declares.
    Compile {
        /// Path to the source file.
        #[arg(required = true)]
        path: PathBuf,
        /// Tags given to every module.
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
}

/// One module as printed by the CLI.
#[derive(Debug, Serialize)]
struct ModuleSummary {
    name: String,
    version: String,
    type_name: String,
    binary: String,
    description: String,
    tags: Vec<String>,
}

impl From<&Module> for ModuleSummary {
    fn from(module: &Module) -> Self {
        Self {
            name: module.name.clone(),
            version: module.version.to_string(),
            type_name: module.module_type.full_name(),
            binary: module.module_type.binary().name().to_string(),
            description: module.description.clone(),
            tags: module.tags.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Inspect { path } => inspect(&path, args.json),
        Command::Scan {
            dir,
            patterns,
            no_recursive,
            name,
            tags,
            policy,
        } => {
            let mut options = DirectoryCatalogOptions::default()
                .with_include_subfolders(!no_recursive)
                .with_load_context(load_context(parse_policy(&policy)?));
            if !patterns.is_empty() {
                options = options.with_search_patterns(patterns);
            }
            let mut criteria = CriteriaBuilder::new().tags(tags);
            if let Some(name) = name {
                criteria = criteria.has_name(name);
            }
            options = options.with_finder(FinderOptions::new().with_criteria(criteria.build()));

            let mut catalog = DirectoryCatalog::new(&dir, options)?;
            catalog
                .initialize()
                .await
                .with_context(|| format!("Failed to scan {}", dir.display()))?;
            print_modules(&catalog.modules(), args.json)
        }
        Command::Config { path } => {
            let configurations = CatalogConfigLoader::from_file(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let defaults = CatalogDefaults::new().with_load_context(load_context(HostBinaryPolicy::default()));
            let mut catalog = ConverterRegistry::new().build_composite(&configurations, &defaults)?;
            tracing::info!(catalogs = catalog.len(), "Initializing configured catalogs");
            catalog.initialize().await?;
            print_modules(&catalog.modules(), args.json)
        }
        Command::Compile { path, tags } => {
            let code = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            let mut options = GeneratedCatalogOptions::default().with_load_context(load_context(HostBinaryPolicy::default()));
            for tag in tags {
                options = options.with_tag(tag);
            }
            let mut catalog = GeneratedCatalog::new(code, options)?;
            catalog.initialize().await?;
            print_modules(&catalog.modules(), args.json)
        }
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("MODAULARITY_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "modaularity=debug" } else { "modaularity=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    // Logs go to stderr so JSON results on stdout stay parseable.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn parse_policy(policy: &str) -> Result<HostBinaryPolicy> {
    match policy.to_ascii_lowercase().replace('_', "-").as_str() {
        "never" => Ok(HostBinaryPolicy::Never),
        "selected" => Ok(HostBinaryPolicy::Selected),
        "always" => Ok(HostBinaryPolicy::Always),
        "prefer-module" | "prefermodule" => Ok(HostBinaryPolicy::PreferModule),
        other => anyhow::bail!("Unknown host binary policy '{}'", other),
    }
}

fn load_context(policy: HostBinaryPolicy) -> LoadContextOptions {
    LoadContextOptions::new(Arc::new(HostEnvironment::current())).with_policy(policy)
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    let image = BinaryImage::inspect(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .with_context(|| format!("{} is not a module binary", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&image)?);
        return Ok(());
    }

    println!("Name:            {}", image.name);
    if let Some(version) = &image.version {
        println!("Version:         {}", version);
    }
    if let Some(description) = &image.description {
        println!("Description:     {}", description);
    }
    println!();
    println!("Types ({}):", image.types.len());
    for descriptor in &image.types {
        let kind = if descriptor.is_interface {
            "trait"
        } else if descriptor.is_abstract {
            "abstract"
        } else {
            "type"
        };
        let visibility = if descriptor.is_public { "pub " } else { "" };
        println!("  {}{} {}", visibility, kind, descriptor.full_name());
    }
    if !image.dependencies.is_empty() {
        println!();
        println!("Dependencies ({}):", image.dependencies.len());
        for dependency in &image.dependencies {
            let native = if dependency.is_native { " (native)" } else { "" };
            println!("  {} -> {}{}", dependency.name, dependency.path, native);
        }
    }
    Ok(())
}

fn print_modules(modules: &[Arc<Module>], json: bool) -> Result<()> {
    let summaries: Vec<ModuleSummary> = modules.iter().map(|module| ModuleSummary::from(module.as_ref())).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No modules found.");
        return Ok(());
    }

    println!("Found {} module(s):", summaries.len());
    for summary in &summaries {
        print!("  {} {} ({} in {})", summary.name, summary.version, summary.type_name, summary.binary);
        if !summary.tags.is_empty() {
            print!(" [{}]", summary.tags.join(", "));
        }
        println!();
    }
    Ok(())
}
