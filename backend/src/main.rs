//! Reconcile CLI - import spreadsheets into a contact store and reconcile them
//!
//! # Main Commands
//!
//! ```bash
//! reconcile serve                          # Start HTTP server (port 3000)
//! reconcile import contacts.csv --group X  # Import rows as new contacts
//! reconcile match contacts.csv -o out.json # Find existing contacts per row
//! reconcile apply --ids a,b,c              # Delete the reviewed contacts
//! reconcile mapping list                   # Manage stored mappings
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! reconcile parse contacts.csv             # Parse CSV to {headers, rows}
//! reconcile suggest contacts.csv           # Show the proposed mapping
//! ```

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use reconcile::api::logs::LOG_BROADCASTER;
use reconcile::config::AppConfig;
use reconcile::{
    apply_bulk, find_sheet_matches, import_sheet, parse_csv_file_auto, ActionResponse,
    BulkAction, BulkActionRequest, FieldMapping, JsonFileStore, MappingPurpose, MappingRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(about = "Import and reconcile contact spreadsheets", long_about = None)]
struct Cli {
    /// Record store file (overrides RECONCILE_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Mapping registry directory (overrides RECONCILE_REGISTRY_DIR)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PurposeArg {
    Import,
    Reconcile,
}

impl From<PurposeArg> for MappingPurpose {
    fn from(arg: PurposeArg) -> Self {
        match arg {
            PurposeArg::Import => MappingPurpose::Import,
            PurposeArg::Reconcile => MappingPurpose::Reconcile,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output {headers, rows} JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the mapping proposed for a CSV file
    Suggest {
        /// Input CSV file
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "reconcile")]
        purpose: PurposeArg,

        /// Ignore stored mappings
        #[arg(long)]
        no_registry: bool,
    },

    /// Import every row as a new contact
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Associated group (default: RECONCILE_DEFAULT_GROUP)
        #[arg(short, long)]
        group: Option<String>,

        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Find existing contacts matching each row
    Match {
        /// Input CSV file
        input: PathBuf,

        /// Only compare with contacts of this group ("All" for every group)
        #[arg(short, long)]
        group: Option<String>,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Output file for the match groups (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a bulk action to reviewed contact ids
    Apply {
        /// Contact ids, comma separated ("ignore" entries are skipped)
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,

        /// Set a reminder (RFC 3339) instead of deleting
        #[arg(long, conflicts_with = "clear_reminder")]
        reminder: Option<String>,

        /// Clear the reminder instead of deleting
        #[arg(long)]
        clear_reminder: bool,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: RECONCILE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage stored column mappings
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },
}

/// How the approved mapping is chosen
#[derive(clap::Args)]
struct MappingArgs {
    /// JSON file of {header: field} overrides applied to the suggestion
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Stored mapping to apply on top of the suggestion
    #[arg(long, conflicts_with = "mapping")]
    mapping_id: Option<String>,

    /// Save the approved mapping under this name
    #[arg(long)]
    save_mapping: Option<String>,
}

#[derive(Subcommand)]
enum MappingAction {
    /// List all stored mappings
    List,

    /// Show details of a mapping
    Show {
        /// Mapping ID
        id: String,
    },

    /// Store a {header: field} JSON file as a mapping
    Save {
        /// Mapping JSON file
        file: PathBuf,

        /// Name for the mapping
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long, value_enum, default_value = "reconcile")]
        purpose: PurposeArg,
    },

    /// Delete a mapping
    Delete {
        /// Mapping ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(registry) = cli.registry {
        config.registry_dir = registry;
    }

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Suggest {
            input,
            purpose,
            no_registry,
        } => cmd_suggest(&config, &input, purpose.into(), no_registry),

        Commands::Import {
            input,
            group,
            mapping,
        } => cmd_import(&config, &input, group.as_deref(), &mapping).await,

        Commands::Match {
            input,
            group,
            mapping,
            output,
        } => cmd_match(&config, &input, group.as_deref(), &mapping, output.as_deref()).await,

        Commands::Apply {
            ids,
            reminder,
            clear_reminder,
        } => cmd_apply(&config, ids, reminder.as_deref(), clear_reminder).await,

        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            cmd_serve(config).await
        }

        Commands::Mapping { action } => cmd_mapping(&config, action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.sheet.headers.join(", "));
    eprintln!("✅ Parsed {} rows", result.sheet.rows.len());

    let json = serde_json::to_string_pretty(&result.sheet)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_suggest(
    config: &AppConfig,
    input: &Path,
    purpose: MappingPurpose,
    no_registry: bool,
) -> CliResult {
    let parsed = parse_csv_file_auto(input)?;
    parsed.require_rows()?;

    let (mapping, stored_id) = if no_registry {
        (reconcile::suggest_mapping_for(&parsed.sheet.headers, purpose), None)
    } else {
        MappingRegistry::with_dir(&config.registry_dir)
            .suggest_with_registry(&parsed.sheet.headers, purpose)
    };

    eprintln!("📋 Suggested {} mapping for {} columns:", purpose, mapping.len());
    if let Some(id) = stored_id {
        eprintln!("   (from stored mapping {})", id);
    }
    for (header, field) in mapping.iter() {
        eprintln!("   {:<30} → {}", header, field);
    }

    println!("{}", serde_json::to_string_pretty(&mapping)?);
    Ok(())
}

async fn cmd_import(
    config: &AppConfig,
    input: &Path,
    group: Option<&str>,
    args: &MappingArgs,
) -> CliResult {
    let group = config
        .group_or_default(group)
        .ok_or("An associated group is required (--group or RECONCILE_DEFAULT_GROUP)")?;

    eprintln!("📄 Importing: {} into {}", input.display(), group);
    let parsed = parse_csv_file_auto(input)?;

    let mut registry = MappingRegistry::with_dir(&config.registry_dir);
    let mapping = resolve_mapping(
        &mut registry,
        &parsed.sheet.headers,
        MappingPurpose::Import,
        args,
    )?;

    let store = JsonFileStore::new(&config.store_path);
    let response = import_sheet(&store, &parsed.sheet, &mapping, &group).await;
    finish(&response)?;

    remember(&mut registry, args, mapping, MappingPurpose::Import, parsed.sheet.headers)?;
    eprintln!("\n✨ {}", response.message);
    if let Some(skipped) = response.skipped_count.filter(|n| *n > 0) {
        eprintln!("   ⚠️  {} rows skipped", skipped);
    }
    Ok(())
}

async fn cmd_match(
    config: &AppConfig,
    input: &Path,
    group: Option<&str>,
    args: &MappingArgs,
    output: Option<&Path>,
) -> CliResult {
    if output.is_none() {
        LOG_BROADCASTER.set_echo(false);
    }

    eprintln!("📄 Reconciling: {}", input.display());
    let parsed = parse_csv_file_auto(input)?;

    let mut registry = MappingRegistry::with_dir(&config.registry_dir);
    let mapping = resolve_mapping(
        &mut registry,
        &parsed.sheet.headers,
        MappingPurpose::Reconcile,
        args,
    )?;

    let store = JsonFileStore::new(&config.store_path);
    let response = find_sheet_matches(&store, &parsed.sheet, &mapping, group).await;
    finish(&response)?;

    remember(&mut registry, args, mapping, MappingPurpose::Reconcile, parsed.sheet.headers)?;

    let groups = response.matches.unwrap_or_default();
    eprintln!("\n🔎 {}", response.message);
    for g in groups.iter().take(5) {
        let names: Vec<String> = g
            .options
            .iter()
            .map(|c| {
                let reasons: Vec<&str> = c.reasons.iter().map(|r| r.as_str()).collect();
                format!("{} [{}]", c.connection.name, reasons.join(", "))
            })
            .collect();
        eprintln!("   Row {}: {}", g.source_row + 1, names.join("; "));
    }

    let json = serde_json::to_string_pretty(&groups)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_apply(
    config: &AppConfig,
    ids: Vec<String>,
    reminder: Option<&str>,
    clear_reminder: bool,
) -> CliResult {
    let action = match (reminder, clear_reminder) {
        (Some(date), _) => BulkAction::SetReminder {
            reminder_date: Some(
                DateTime::parse_from_rfc3339(date)
                    .map_err(|e| format!("Invalid reminder date '{}': {}", date, e))?
                    .with_timezone(&Utc),
            ),
        },
        (None, true) => BulkAction::SetReminder { reminder_date: None },
        (None, false) => BulkAction::Delete,
    };

    let request = BulkActionRequest {
        connection_ids: ids,
        action,
    };

    let store = JsonFileStore::new(&config.store_path);
    let response = apply_bulk(&store, &request).await;
    finish(&response)?;

    eprintln!("✅ {}", response.message);
    Ok(())
}

async fn cmd_serve(config: AppConfig) -> CliResult {
    reconcile::server::start_server(config).await?;
    Ok(())
}

fn cmd_mapping(config: &AppConfig, action: MappingAction) -> CliResult {
    let mut registry = MappingRegistry::with_dir(&config.registry_dir);

    match action {
        MappingAction::List => {
            let stored = registry.list();
            if stored.is_empty() {
                eprintln!("📋 No mappings stored yet.");
                eprintln!("   Use 'reconcile mapping save <file>' or --save-mapping to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored mappings ({}):\n", stored.len());
            for m in stored {
                println!("  📄 {} ({})", m.name, m.id);
                println!("     Purpose: {}", m.purpose);
                println!("     Columns: {}", m.columns.join(", "));
                println!("     Uses: {}", m.use_count);
                if let Some(last) = m.last_used {
                    println!("     Last used: {}", last.to_rfc3339());
                }
                println!();
            }
        }

        MappingAction::Show { id } => {
            let m = registry
                .get(&id)
                .ok_or_else(|| format!("Mapping not found: {}", id))?;
            println!("📄 Mapping: {} ({})\n", m.name, m.id);
            println!("Purpose: {}", m.purpose);
            println!("Columns: {}", m.columns.join(", "));
            println!("Created: {}", m.created_at.to_rfc3339());
            println!("Uses: {}", m.use_count);
            println!("\nMapping:");
            println!("{}", serde_json::to_string_pretty(&m.mapping)?);
        }

        MappingAction::Save {
            file,
            name,
            purpose,
        } => {
            eprintln!("📥 Saving mapping from: {}", file.display());
            let id = registry.import(&file, name.as_deref(), purpose.into())?;
            eprintln!("✅ Mapping saved with ID: {}", id);
        }

        MappingAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Mapping deleted: {}", id);
        }
    }

    Ok(())
}

/// Suggestion for `headers`, then the stored mapping or the override file
/// on top.
fn resolve_mapping(
    registry: &mut MappingRegistry,
    headers: &[String],
    purpose: MappingPurpose,
    args: &MappingArgs,
) -> Result<FieldMapping, Box<dyn std::error::Error>> {
    let mapping = if let Some(path) = &args.mapping {
        let overrides: FieldMapping = serde_json::from_str(&fs::read_to_string(path)?)?;
        reconcile::suggest_mapping_for(headers, purpose).with_overrides(&overrides)
    } else if let Some(id) = &args.mapping_id {
        let stored = registry
            .get(id)
            .ok_or_else(|| format!("Mapping not found: {}", id))?
            .mapping
            .clone();
        registry.record_use(id)?;
        reconcile::suggest_mapping_for(headers, purpose).with_overrides(&stored)
    } else {
        let (mapping, stored_id) = registry.suggest_with_registry(headers, purpose);
        if let Some(id) = stored_id {
            eprintln!("   Using stored mapping {}", id);
            registry.record_use(&id)?;
        }
        mapping
    };

    eprintln!("   Mapping:");
    for (header, field) in mapping.iter().filter(|(_, f)| !f.is_ignore()) {
        eprintln!("     {:<28} → {}", header, field);
    }
    Ok(mapping)
}

fn remember(
    registry: &mut MappingRegistry,
    args: &MappingArgs,
    mapping: FieldMapping,
    purpose: MappingPurpose,
    headers: Vec<String>,
) -> CliResult {
    if let Some(name) = &args.save_mapping {
        let id = registry.save(mapping, name, purpose, headers)?;
        eprintln!("   💾 Mapping saved as {}", id);
    }
    Ok(())
}

/// Turn a failed envelope into an error for the exit code
fn finish(response: &ActionResponse) -> CliResult {
    if response.success {
        Ok(())
    } else {
        Err(response.message.clone().into())
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
