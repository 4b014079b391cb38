//! Profile Router CLI - Turn delimited import files into profile updates
//!
//! # Main Commands
//!
//! ```bash
//! profile-router import people.csv --config crm.json   # Run an import job (JSONL on stdout)
//! profile-router serve                                 # Start HTTP server (port 3000)
//! profile-router config list                           # Manage stored import configurations
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! profile-router line "Jane,Doe" --index 1 --config crm.json   # Transform a single line
//! ```
//!
//! Property types are read from `--schema-dir`, `PROFILE_ROUTER_SCHEMA_DIR`
//! or `./property-types`, in that order.

use clap::{Parser, Subcommand, ValueEnum};
use profile_router::api::{InMemoryEvents, InMemoryProfiles};
use profile_router::models::PROFILES_TARGET;
use profile_router::{
    import_file, transform_line, ConfigRegistry, ErrorPolicy, FilePropertyTypes,
    ImportConfiguration, JsonLinesSink, LineOutcome, SchemaSnapshot,
};
use profile_router::server::AppState;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA_DIR_ENV: &str = "PROFILE_ROUTER_SCHEMA_DIR";
const DEFAULT_SCHEMA_DIR: &str = "property-types";

#[derive(Parser)]
#[command(name = "profile-router")]
#[command(about = "Turn delimited import files into typed profile updates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an import job over a file
    Import {
        /// Input file
        input: PathBuf,

        /// Import configuration JSON file or stored configuration ID
        #[arg(short, long)]
        config: String,

        /// Directory of property type definitions
        #[arg(long)]
        schema_dir: Option<PathBuf>,

        /// Output file for JSONL envelopes (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// What to do with rejected lines
        #[arg(long, value_enum, default_value = "collect")]
        policy: PolicyArg,
    },

    /// Transform a single line and print the result
    Line {
        /// Raw line text
        text: String,

        /// 0-based line index (0 is the header when the configuration has one)
        #[arg(short, long, default_value = "1")]
        index: usize,

        /// Import configuration JSON file or stored configuration ID
        #[arg(short, long)]
        config: String,

        /// Directory of property type definitions
        #[arg(long)]
        schema_dir: Option<PathBuf>,
    },

    /// Manage stored import configurations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Directory of property type definitions
        #[arg(long)]
        schema_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List all stored configurations
    List,

    /// Import a configuration JSON file
    Import {
        /// Configuration JSON file to import
        file: PathBuf,
        /// Name for the configuration
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a configuration
    Show {
        /// Configuration ID
        id: String,
    },

    /// Delete a configuration
    Delete {
        /// Configuration ID
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Skip,
    Abort,
    Collect,
}

impl From<PolicyArg> for ErrorPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => ErrorPolicy::SkipAndLog,
            PolicyArg::Abort => ErrorPolicy::Abort,
            PolicyArg::Collect => ErrorPolicy::Collect,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            input,
            config,
            schema_dir,
            output,
            policy,
        } => cmd_import(&input, &config, schema_dir, output.as_deref(), policy.into()),

        Commands::Line {
            text,
            index,
            config,
            schema_dir,
        } => cmd_line(&text, index, &config, schema_dir),

        Commands::Config { action } => cmd_config(action),

        Commands::Serve { port, schema_dir } => cmd_serve(port, schema_dir).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn schema_provider(schema_dir: Option<PathBuf>) -> FilePropertyTypes {
    let dir = schema_dir
        .or_else(|| std::env::var(SCHEMA_DIR_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_DIR));
    FilePropertyTypes::new(dir)
}

/// Load a configuration from a file path, falling back to a registry ID.
///
/// Returns the registry ID when the configuration is a stored one.
fn resolve_config(
    reference: &str,
    registry: &ConfigRegistry,
) -> Result<(ImportConfiguration, Option<String>), Box<dyn std::error::Error>> {
    let path = Path::new(reference);
    if path.is_file() {
        return Ok((ImportConfiguration::load(path)?, None));
    }
    let stored = registry.require(reference)?;
    Ok((stored.configuration.clone(), Some(stored.id.clone())))
}

fn cmd_import(
    input: &Path,
    config: &str,
    schema_dir: Option<PathBuf>,
    output: Option<&Path>,
    policy: ErrorPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = ConfigRegistry::new();
    let (config, stored_id) = resolve_config(config, &registry)?;
    let provider = schema_provider(schema_dir);

    let writer: Box<dyn Write> = match output {
        Some(p) => Box::new(BufWriter::new(fs::File::create(p)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = JsonLinesSink::new(writer);

    let report = import_file(input, &config, &provider, &mut sink, policy)?;

    if let Some(p) = output {
        eprintln!("💾 {} envelopes written to: {}", sink.written(), p.display());
    }
    if let Some(id) = stored_id {
        registry.record_run(&id, &report)?;
    }

    for failure in report.errors.iter().take(5) {
        eprintln!("   - [{}] {}", failure.kind, failure.message);
    }

    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_line(
    text: &str,
    index: usize,
    config: &str,
    schema_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ConfigRegistry::new();
    let (config, _) = resolve_config(config, &registry)?;
    let provider = schema_provider(schema_dir);
    let schema = SchemaSnapshot::resolve(&provider, PROFILES_TARGET)?;

    match transform_line(text, index, &config, &schema)? {
        LineOutcome::Skipped => eprintln!("⏭️  Header line skipped"),
        LineOutcome::Profile(profile) => {
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
    }
    Ok(())
}

async fn cmd_serve(port: u16, schema_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let profiles = Arc::new(InMemoryProfiles::new());
    let state = AppState {
        profiles: profiles.clone(),
        events: Arc::new(InMemoryEvents::new(profiles)),
        property_types: Arc::new(schema_provider(schema_dir)),
        registry: Arc::new(Mutex::new(ConfigRegistry::new())),
    };
    profile_router::server::start_server(port, state).await?;
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = ConfigRegistry::new();

    match action {
        ConfigAction::List => {
            let configurations = registry.list();
            if configurations.is_empty() {
                eprintln!("📋 No configurations stored yet.");
                eprintln!("   Use 'profile-router config import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored configurations ({}):\n", configurations.len());
            for c in configurations {
                println!("  📄 {} ({})", c.name, c.id);
                println!(
                    "     Mapping: {}",
                    c.configuration
                        .mapping()
                        .iter()
                        .map(|(field, column)| format!("{}={}", field, column))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!("     Runs: {}", c.run_count);
                if let Some(ref last) = c.last_run {
                    println!("     Last run: {}", last);
                }
                if let Some(ref status) = c.last_status {
                    println!("     Last status: {}", status);
                }
                println!();
            }
        }

        ConfigAction::Import { file, name } => {
            eprintln!("📥 Importing configuration from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Configuration saved with ID: {}", id);
        }

        ConfigAction::Show { id } => {
            let c = registry.require(&id)?;
            println!("📄 Configuration: {} ({})\n", c.name, c.id);
            println!("Created: {}", c.created_at);
            println!("Runs: {}", c.run_count);
            println!("\nDefinition:");
            println!("{}", c.configuration.to_json()?);
        }

        ConfigAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Configuration deleted: {}", id);
        }
    }

    Ok(())
}
