//! ctqflow CLI - QC inspection workbooks to tidy, spec-checked records
//!
//! # Main Commands
//!
//! ```bash
//! ctqflow transform sheet.xlsx --master master.xlsx      # Tidy records (CSV)
//! ctqflow verify sheet.xlsx --master master.xlsx         # Records with spec_over
//! ctqflow serve                                          # HTTP server (port 3000)
//! ctqflow profile list                                   # Stored master profiles
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! ctqflow scan sheet.xlsx          # Show the detected date header and blocks
//! ctqflow analyze sheet.xlsx -m master.xlsx   # Capability / control reports
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use ctqflow::config::Settings;
use ctqflow::error::ExportResult;
use ctqflow::export::{suggest_filename, to_file, write_json, write_records_csv, write_verified_csv};
use ctqflow::parser::{self, workbook};
use ctqflow::transform::{date_mapping, locate_header, segment_blocks};
use ctqflow::{
    summarize, transform_files, verify_output, MasterSchema, ProfileRegistry, StoredProfile, TransformOptions,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "ctqflow")]
#[command(about = "Extract CTQ measurements from inspection workbooks and check them against spec", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: workbook → tidy records with management codes
    Transform {
        #[command(flatten)]
        run: RunArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        /// Output file or directory (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transform, then flag values outside USL / LSL
    Verify {
        #[command(flatten)]
        run: RunArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        /// Output file or directory for the full dataset (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the violations subset here
        #[arg(long)]
        violations: Option<PathBuf>,
    },

    /// Show the detected date header and measurement blocks
    Scan {
        /// Measurement workbook or CSV grid
        input: PathBuf,

        /// Marker token opening a block
        #[arg(long)]
        marker: Option<String>,

        /// Year for month/day-only headers
        #[arg(long)]
        default_year: Option<i32>,
    },

    /// Per-characteristic statistics of verified records (JSON)
    Analyze {
        #[command(flatten)]
        run: RunArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CTQFLOW_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage master column profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

/// Inputs and options shared by the pipeline commands.
#[derive(Args)]
struct RunArgs {
    /// Measurement workbook (.xlsx) or CSV grid
    input: PathBuf,

    /// Specification master (.xlsx or .csv)
    #[arg(short, long)]
    master: PathBuf,

    /// Information mapping (JSON or Contents/Value CSV), required for CSV grids
    #[arg(short, long)]
    info: Option<PathBuf>,

    /// Keep measurements on or after this date
    #[arg(long)]
    start: Option<String>,

    /// Keep measurements on or before this date
    #[arg(long)]
    end: Option<String>,

    /// Marker token opening a block
    #[arg(long)]
    marker: Option<String>,

    /// Year for month/day-only headers
    #[arg(long)]
    default_year: Option<i32>,

    /// Stored master profile ID
    #[arg(long)]
    profile: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List all stored profiles
    List,

    /// Import a master schema from a JSON file
    Import {
        /// JSON file with `sheet` and `renames`
        file: PathBuf,
        /// Profile name (default: file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show profile details
    Show {
        /// Profile ID
        id: String,
    },

    /// Delete a profile
    Delete {
        /// Profile ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let settings = Settings::from_env();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform { run, format, output } => cmd_transform(&settings, &run, format, output.as_deref()),

        Commands::Verify {
            run,
            format,
            output,
            violations,
        } => cmd_verify(&settings, &run, format, output.as_deref(), violations.as_deref()),

        Commands::Scan {
            input,
            marker,
            default_year,
        } => cmd_scan(&settings, &input, marker, default_year),

        Commands::Analyze { run, output } => cmd_analyze(&settings, &run, output.as_deref()),

        Commands::Serve { port } => cmd_serve(port.unwrap_or(settings.port)).await,

        Commands::Profile { action } => cmd_profile(&settings, action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Environment options, then profile, then flags.
fn build_options(settings: &Settings, run: &RunArgs) -> Result<TransformOptions, Box<dyn std::error::Error>> {
    let mut options = settings.transform_options();

    let mut registry = ProfileRegistry::with_dir(&settings.profile_dir);
    if let Some(id) = &run.profile {
        let profile = registry.get(id)?;
        eprintln!("📋 Using profile: {} ({})", profile.name, profile.id);
        options.schema = profile.schema.clone();
        registry.record_use(id)?;
    } else if let Some(profile) = suggest_profile(&registry, &run.master, &options.schema) {
        eprintln!("💡 Master columns match stored profile: {} ({})", profile.name, profile.id);
        options.schema = profile.schema.clone();
        let id = profile.id.clone();
        registry.record_use(&id)?;
    }
    if let Some(marker) = &run.marker {
        options.marker = marker.clone();
    }
    if run.default_year.is_some() {
        options.default_year = run.default_year;
    }

    Ok(options.with_date_bounds(run.start.as_deref(), run.end.as_deref())?)
}

/// A stored profile for a master the current schema cannot join.
///
/// An unreadable master is left for the pipeline to report.
fn suggest_profile<'a>(registry: &'a ProfileRegistry, master: &Path, schema: &MasterSchema) -> Option<&'a StoredProfile> {
    if registry.list().is_empty() {
        return None;
    }
    let table = parser::read_table_file(master, &schema.sheet).ok()?;
    registry.suggest(&table, schema)
}

fn cmd_transform(settings: &Settings, run: &RunArgs, format: Format, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Processing: {}", run.input.display());
    let options = build_options(settings, run)?;

    let result = transform_files(&run.input, run.info.as_deref(), &run.master, &options)?;
    let records = &result.output.records;
    let summary = &result.output.summary;

    eprintln!("   Blocks: {}", summary.blocks.len());
    eprintln!("   Records: {} ({} filtered by date)", summary.records, summary.filtered_out);
    if summary.unmatched == 0 {
        eprintln!("✅ Every record matched a management code");
    } else {
        eprintln!("⚠️  {} record(s) without a management code", summary.unmatched);
    }

    let path = resolve_output(output, &suggest_filename(records, today()), format);
    match format {
        Format::Csv => write_output(path.as_deref(), |out| write_records_csv(out, records)),
        Format::Json => write_output(path.as_deref(), |out| write_json(out, records)),
    }
}

fn cmd_verify(
    settings: &Settings,
    run: &RunArgs,
    format: Format,
    output: Option<&Path>,
    violations: Option<&Path>,
) -> CliResult {
    eprintln!("📄 Processing: {}", run.input.display());
    let options = build_options(settings, run)?;

    let result = transform_files(&run.input, run.info.as_deref(), &run.master, &options)?;
    let verification = verify_output(&result.output.records, &result.master, &options)?;

    if verification.violations.is_empty() {
        eprintln!("✅ All {} records within spec", verification.full.len());
    } else {
        eprintln!(
            "⚠️  {} of {} records out of spec",
            verification.violation_count(),
            verification.full.len()
        );
    }

    let path = resolve_output(output, &suggest_filename(&result.output.records, today()), format);
    match format {
        Format::Csv => write_output(path.as_deref(), |out| write_verified_csv(out, &verification.full))?,
        Format::Json => write_output(path.as_deref(), |out| write_json(out, &verification.full))?,
    }

    if let Some(path) = violations {
        match format {
            Format::Csv => write_output(Some(path), |out| write_verified_csv(out, &verification.violations))?,
            Format::Json => write_output(Some(path), |out| write_json(out, &verification.violations))?,
        }
    }

    Ok(())
}

fn cmd_scan(settings: &Settings, input: &Path, marker: Option<String>, default_year: Option<i32>) -> CliResult {
    eprintln!("🔍 Scanning: {}", input.display());

    let mut options = settings.transform_options();
    if let Some(marker) = marker {
        options.marker = marker;
    }
    if default_year.is_some() {
        options.default_year = default_year;
    }

    let grid = if parser::has_extension(input, "csv") {
        parser::read_csv_grid(&std::fs::read(input)?)?
    } else {
        workbook::read_measurement_workbook(input)?.1
    };
    eprintln!("   Grid: {} rows × {} columns", grid.height(), grid.width());

    let date_parser = options.date_parser();
    let header = locate_header(
        &grid,
        options.sample_rows,
        options.min_date_count,
        options.max_row_check,
        &date_parser,
    )?;
    let mapping = date_mapping(&grid, header.row, header.col, &date_parser);
    let blocks = segment_blocks(&grid, header.row, &mapping, &options.search_cols, &options.marker);

    println!("Date header: row {}, column {}", header.row, header.col);
    println!("Dates: {}", mapping.len());
    if let (Some((_, first)), Some((_, last))) = (mapping.iter().next(), mapping.iter().last()) {
        println!("   {} .. {}", first, last);
    }
    println!("\nBlocks ({}):", blocks.len());
    for block in &blocks {
        println!("  📦 {} (rows {}..{})", block.ctq_name, block.start_row, block.end_row);
    }

    Ok(())
}

fn cmd_analyze(settings: &Settings, run: &RunArgs, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Processing: {}", run.input.display());
    let options = build_options(settings, run)?;

    let result = transform_files(&run.input, run.info.as_deref(), &run.master, &options)?;
    let verification = verify_output(&result.output.records, &result.master, &options)?;
    let reports = summarize(&verification.full);

    eprintln!("📊 {} characteristic(s)", reports.len());
    for report in &reports {
        if let Some(cap) = &report.capability {
            eprintln!("   {}: Cpk {} (n = {})", report.ctq_name, format_index(cap.cpk), cap.n);
        }
    }

    write_output(output, |out| write_json(out, &reports))
}

/// Two decimals, or `n/a` when a limit was missing.
fn format_index(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

async fn cmd_serve(port: u16) -> CliResult {
    ctqflow::server::start_server(port).await?;
    Ok(())
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// An existing directory receives the suggested file name.
fn resolve_output(output: Option<&Path>, suggested: &str, format: Format) -> Option<PathBuf> {
    let path = output?;
    if !path.is_dir() {
        return Some(path.to_path_buf());
    }
    let name = match format {
        Format::Csv => suggested.to_string(),
        Format::Json => Path::new(suggested).with_extension("json").display().to_string(),
    };
    Some(path.join(name))
}

fn write_output<F>(path: Option<&Path>, write: F) -> CliResult
where
    F: FnOnce(&mut dyn Write) -> ExportResult<()>,
{
    match path {
        Some(p) => {
            to_file(p, |out| write(out))?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

fn cmd_profile(settings: &Settings, action: ProfileAction) -> CliResult {
    let mut registry = ProfileRegistry::with_dir(&settings.profile_dir);

    match action {
        ProfileAction::List => {
            let profiles = registry.list();
            if profiles.is_empty() {
                eprintln!("📋 No profiles stored yet.");
                eprintln!("   Use 'ctqflow profile import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored profiles ({}):\n", profiles.len());
            for p in profiles {
                println!("  📄 {} ({})", p.name, p.id);
                println!("     Sheet: {}", p.schema.sheet);
                println!("     Columns: {}", p.master_columns.join(", "));
                println!("     Uses: {}", p.use_count);
                if let Some(ref last) = p.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        ProfileAction::Import { file, name } => {
            eprintln!("📥 Importing profile from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Profile saved with ID: {}", id);
        }

        ProfileAction::Show { id } => {
            let p = registry.get(&id)?;
            println!("📄 Profile: {} ({})\n", p.name, p.id);
            println!("Master columns: {}", p.master_columns.join(", "));
            println!("Created: {}", p.created_at);
            println!("Uses: {}", p.use_count);
            println!("\nSchema:");
            println!("{}", p.schema.to_json()?);
        }

        ProfileAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Profile deleted: {}", id);
        }
    }

    Ok(())
}
