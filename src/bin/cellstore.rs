//! cellstore: CLI tool for building, inspecting and querying cell tower stores.

use cellstore::binary::{BlockStoreReader, Schema};
use cellstore::converter::{build_store, CsvParser};
use cellstore::{CellRecord, Config, QueryEngine, QueryEngineConfig};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cellstore")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Build and query offline cell tower stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file (mcc,mnc,lac,cid,lon,lat) to a store file
    Build {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output store file
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the header and block metadata of a store file
    Info {
        /// Store file
        db: PathBuf,

        /// Print every block's metadata
        #[arg(short, long)]
        blocks: bool,
    },

    /// Decode every block and check bounds and ordering
    Verify {
        /// Store file
        db: PathBuf,
    },

    /// Look up a cell
    Query {
        #[command(flatten)]
        source: Source,

        /// Mobile country code
        #[arg(long)]
        mcc: Option<i32>,

        /// Mobile network code
        #[arg(long)]
        mnc: Option<i32>,

        /// Location or tracking area code
        #[arg(long)]
        lac: i32,

        /// Cell id
        #[arg(long)]
        cid: i32,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store file
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            input,
            output,
            verbose,
        } => build(&input, &output, verbose),
        Commands::Info { db, blocks } => info(&db, blocks),
        Commands::Verify { db } => verify(&db),
        Commands::Query {
            source,
            mcc,
            mnc,
            lac,
            cid,
            json,
        } => query(&source, mcc, mnc, lac, cid, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build(input: &Path, output: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if verbose {
        println!("Reading input file: {:?}", input);
    }

    let records = CsvParser::parse(fs::File::open(input)?)?;

    if verbose {
        println!("Parsed {} records", records.len());
    }

    let data = build_store(&records)?;

    if verbose {
        println!("Writing output file: {:?} ({} bytes)", output, data.len());
    }

    let mut file = fs::File::create(output)?;
    file.write_all(&data)?;

    println!("Successfully converted {:?} -> {:?}", input, output);
    Ok(())
}

fn info(db: &Path, blocks: bool) -> Result<(), Box<dyn std::error::Error>> {
    let reader = BlockStoreReader::open(db, Schema::cell_towers())?;
    let schema = reader.schema();

    println!("File: {:?}", db);
    println!("Blocks: {}", reader.block_count());
    println!("Records: {}", reader.record_count()?);
    println!("Data start: {}", schema.data_start(reader.block_count()));

    if blocks {
        for id in 0..reader.block_count() {
            let meta = reader.block_meta(id)?;
            println!("{}", meta.display(schema));
        }
    }
    Ok(())
}

fn verify(db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let reader = BlockStoreReader::open(db, Schema::cell_towers())?;
    let report = reader.verify()?;
    println!(
        "OK: {} blocks, {} records",
        report.blocks, report.records
    );
    Ok(())
}

fn query(
    source: &Source,
    mcc: Option<i32>,
    mnc: Option<i32>,
    lac: i32,
    cid: i32,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = match (&source.config, &source.db) {
        (Some(path), _) => {
            let config = Config::load(path)?;
            QueryEngine::open_with_config(&config.database, config.engine_config())?
        }
        (None, Some(db)) => QueryEngine::open_with_config(db, QueryEngineConfig::default())?,
        (None, None) => return Err("either --config or --db is required".into()),
    };

    let records = engine.query(mcc, mnc, cid, lac)?;

    if json {
        let records: &[CellRecord] = &records;
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No match");
    } else {
        for record in records.iter() {
            println!("{}", record);
        }
    }
    Ok(())
}
