use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};

use sa_address_gen::distribution::DistributionWeights;
use sa_address_gen::generator::{summarize, AddressGenerator};
use sa_address_gen::geocode::{GeocodeError, Geocoder, MapboxGeocoder};
use sa_address_gen::geocode_cache::{CoordinateCache, DEFAULT_CACHE_FILE};
use sa_address_gen::lookup::lookup;
use sa_address_gen::record::AddressRecord;
use sa_address_gen::suburbs::{Remoteness, SuburbTable};

#[derive(Parser)]
#[command(
    name = "sa-address-gen",
    version,
    about = "synthetic South Australian address generator and lookup"
)]
struct Cli {
    /// csv file overriding the bundled suburb table
    #[arg(long, global = true, value_name = "FILE")]
    data: Option<PathBuf>,
    /// where resolved coordinates persist between runs
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_CACHE_FILE)]
    cache: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// generate synthetic addresses
    Generate(GenerateArgs),
    /// resolve a suburb, postcode or street address query
    Lookup(LookupArgs),
    /// show the suburbs, councils and levels the generator knows
    Options(OptionsArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// how many addresses to generate
    count: usize,
    /// fix the rng seed for reproducible batches
    #[arg(long)]
    seed: Option<u64>,
    /// named weight preset
    #[arg(long, conflicts_with_all = ["weights", "remoteness", "socio"])]
    preset: Option<String>,
    /// json file with remoteness and socio-economic weights
    #[arg(long, value_name = "FILE", conflicts_with_all = ["remoteness", "socio"])]
    weights: Option<PathBuf>,
    /// draw from a single remoteness category
    #[arg(long, conflicts_with = "socio")]
    remoteness: Option<Remoteness>,
    /// draw from a single socio-economic level
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=5))]
    socio: Option<u8>,
    /// restrict to one suburb
    #[arg(long)]
    suburb: Option<String>,
    /// restrict to one council
    #[arg(long)]
    council: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// also save the batch to a csv file
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// print how the batch actually distributed itself
    #[arg(long)]
    summary: bool,
}

#[derive(Args)]
struct LookupArgs {
    /// free-text query: suburb name, postcode or street address
    query: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args)]
struct OptionsArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    match run().await {
        Err(e) => {
            log::error!("Error: {:?}", e);
            std::process::exit(1);
        }
        _ => {}
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let table = SuburbTable::load(cli.data.as_deref())?;
    let mut cache = CoordinateCache::load(&cli.cache);
    cache.seed_from_table(&table);

    match cli.command {
        Command::Generate(args) => generate_command(&table, &mut cache, args).await?,
        Command::Lookup(args) => {
            let found = lookup_command(&table, &mut cache, args).await?;
            if !found {
                println!("Address not found or not in South Australia.");
                cache.flush()?;
                std::process::exit(1);
            }
        }
        Command::Options(args) => options_command(&table, args)?,
    }
    cache.flush()?;
    Ok(())
}

async fn generate_command(
    table: &SuburbTable,
    cache: &mut CoordinateCache,
    args: GenerateArgs,
) -> anyhow::Result<()> {
    if args.count == 0 {
        bail!("count must be at least 1");
    }

    let mut table = table.clone();
    if let Some(name) = &args.suburb {
        table = table.retain_suburb(name);
    }
    if let Some(name) = &args.council {
        table = table.retain_council(name);
    }
    if table.is_empty() {
        bail!("no suburbs match the requested filters");
    }

    let weights = resolve_weights(&args)?;
    weights.validate()?;

    let geocoder = match MapboxGeocoder::from_env() {
        Ok(geocoder) => Some(geocoder),
        Err(err) => {
            warn!("{}; relying on cached coordinates only", err);
            None
        }
    };

    let mut generator = AddressGenerator::new(&table, weights, args.seed);
    let records = generator
        .generate(args.count, cache, geocoder.as_ref().map(|g| g as &dyn Geocoder))
        .await?;

    print_records(&records, args.format)?;
    if let Some(path) = &args.output {
        save_records(&records, path)?;
    }
    if args.summary {
        let stats = summarize(&records);
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            _ => {
                println!();
                println!("{}", stats);
            }
        }
    }
    Ok(())
}

/// resolves to true when the query matched something
async fn lookup_command(
    table: &SuburbTable,
    cache: &mut CoordinateCache,
    args: LookupArgs,
) -> anyhow::Result<bool> {
    let geocoder = match MapboxGeocoder::from_env() {
        Ok(geocoder) => Some(geocoder),
        Err(GeocodeError::MissingApiKey) => {
            debug!("no geocoder available, matching against the table only");
            None
        }
        Err(err) => return Err(err.into()),
    };

    let record = lookup(
        table,
        cache,
        geocoder.as_ref().map(|g| g as &dyn Geocoder),
        &args.query,
    )
    .await?;

    match record {
        Some(record) => {
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Csv => {
                    let mut writer = csv::Writer::from_writer(std::io::stdout());
                    writer.serialize(&record)?;
                    writer.flush()?;
                }
                OutputFormat::Text => println!("{}", record),
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

fn options_command(table: &SuburbTable, args: OptionsArgs) -> anyhow::Result<()> {
    let suburbs = table.suburb_names();
    let councils = table.council_names();
    let remoteness: Vec<String> = table
        .remoteness_levels()
        .iter()
        .map(|category| category.to_string())
        .collect();
    let socio = table.socio_levels();

    match args.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "suburbs": suburbs,
                "councils": councils,
                "remoteness_categories": remoteness,
                "socio_economic_levels": socio,
                "presets": DistributionWeights::preset_names(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("Suburbs [{}]:", suburbs.len());
            for name in &suburbs {
                println!("  {}", name);
            }
            println!("Councils [{}]:", councils.len());
            for name in &councils {
                println!("  {}", name);
            }
            println!("Remoteness categories:");
            for name in &remoteness {
                println!("  {}", name);
            }
            println!(
                "Socio-economic levels: {}",
                socio
                    .iter()
                    .map(|level| level.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("Presets:");
            for name in DistributionWeights::preset_names() {
                println!("  {}", name);
            }
        }
    }
    Ok(())
}

fn resolve_weights(args: &GenerateArgs) -> anyhow::Result<DistributionWeights> {
    if let Some(name) = &args.preset {
        return DistributionWeights::preset(name).ok_or_else(|| {
            anyhow!(
                "unknown preset [{}], available: {}",
                name,
                DistributionWeights::preset_names().join(", ")
            )
        });
    }
    if let Some(path) = &args.weights {
        return DistributionWeights::from_path(path);
    }
    if let Some(category) = args.remoteness {
        return Ok(DistributionWeights::pinned_remoteness(category));
    }
    if let Some(level) = args.socio {
        return Ok(DistributionWeights::pinned_socio(level));
    }
    Ok(DistributionWeights::balanced())
}

fn print_records(records: &[AddressRecord], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for (idx, record) in records.iter().enumerate() {
                if records.len() > 1 {
                    println!("=== Address {} ===", idx + 1);
                }
                println!("{}", record);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// write the batch to a csv file
fn save_records(records: &[AddressRecord], save_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = save_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    info!("saving [{}] records to [{}]", records.len(), save_path.display());
    let mut writer = csv::Writer::from_path(save_path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
