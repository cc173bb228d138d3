use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use geojson_to_sqlite::{Database, FeatureReader, ImportOptions, import_features};

#[derive(Parser)]
#[command(version, about = "Import GeoJSON into a SQLite database")]
struct Cli {
    /// SQLite database file to create or extend
    db_path: PathBuf,

    /// Table to import features into
    table: String,

    /// GeoJSON files to import, or "-" for standard input
    #[arg(required = true)]
    geojson: Vec<PathBuf>,

    /// Treat input as newline-delimited GeoJSON features
    #[arg(long)]
    nl: bool,

    /// Column to use as a primary key
    #[arg(long)]
    pk: Option<String>,

    /// Add any missing columns
    #[arg(long)]
    alter: bool,

    /// Bundle properties into a single JSON column, optionally renamed
    #[arg(long, value_name = "COLNAME", num_args = 0..=1, default_missing_value = "properties")]
    properties: Option<String>,

    /// Convert geometry into a SpatiaLite geometry
    #[arg(long)]
    spatialite: bool,

    /// Create a spatial index on the geometry column (implies --spatialite)
    #[arg(long)]
    spatial_index: bool,

    /// Path to the SpatiaLite module, for if it cannot be found automatically
    #[arg(long = "spatialite_mod", value_name = "PATH")]
    spatialite_mod: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let db = Database::open(&cli.db_path)
        .with_context(|| format!("cannot open database {}", cli.db_path.display()))?;
    let options = ImportOptions {
        pk: cli.pk.clone(),
        alter: cli.alter,
        properties: cli.properties.clone(),
        spatialite: cli.spatialite,
        spatial_index: cli.spatial_index,
        spatialite_mod: cli.spatialite_mod.clone(),
    };

    for path in &cli.geojson {
        let input = open_input(path)?;
        let count = if cli.nl {
            import_features(&db, &cli.table, FeatureReader::from_lines(input), &options)?
        } else {
            import_features(
                &db,
                &cli.table,
                FeatureReader::from_document(input)?,
                &options,
            )?
        };
        tracing::info!("{}: imported {count} features into {}", path.display(), cli.table);
    }
    Ok(())
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}
