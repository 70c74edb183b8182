use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use city_linker::config::LinkerConfig;
use city_linker::linking::{
    derive_city_facts, link_records, summarize, AddressQuery, CityResolver, PostalCodeIndex,
};
use city_linker::loader::{self, FactsReport};

/// City Linker: attach canonical city entities to company addresses.
///
/// Builds a postal-code index from a city dataset and resolves each
/// address's (city name, postal code) pair by normalized edit distance.
///
/// Examples:
///   citylink link --cities wikidata_cities.csv --addresses lei.csv --out linked.csv
///   citylink resolve --cities wikidata_cities.csv --city Zürich --postal-code 8001
///   citylink stats --cities wikidata_cities.csv
///   citylink serve --cities wikidata_cities.csv --port 8080
#[derive(Parser)]
#[command(name = "citylink", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (JSON). Defaults to <config_dir>/citylink/config.json if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum normalized edit distance accepted as a match (0..1).
    #[arg(long, global = true, env = "CITYLINK_THRESHOLD")]
    threshold: Option<f64>,

    /// Range separator character used in postal-code tokens.
    #[arg(long, global = true)]
    range_separator: Option<char>,

    /// Keep ranges wider than this unexpanded.
    #[arg(long, global = true)]
    max_range_span: Option<u64>,

    /// Debug logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Link every address record and write the results.
    Link {
        #[arg(long)]
        cities: PathBuf,
        #[arg(long)]
        addresses: PathBuf,
        /// Linked CSV output. Stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
        /// City facts JSON output.
        #[arg(long)]
        facts: Option<PathBuf>,
    },
    /// Resolve a single city name / postal code pair.
    Resolve {
        #[arg(long)]
        cities: PathBuf,
        #[arg(long)]
        city: String,
        #[arg(long)]
        postal_code: String,
        /// Debug: show the top-K candidates with their distances.
        #[arg(long)]
        topk: Option<usize>,
    },
    /// Print index statistics.
    Stats {
        #[arg(long)]
        cities: PathBuf,
    },
    /// Serve resolution over HTTP.
    Serve {
        #[arg(long)]
        cities: PathBuf,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<LinkerConfig> {
    let mut config = LinkerConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(t) = cli.threshold {
        config.threshold = t;
    }
    if let Some(sep) = cli.range_separator {
        config.range_separator = sep;
    }
    if let Some(span) = cli.max_range_span {
        config.max_range_span = Some(span);
    }
    config.validate().context("Invalid settings")?;
    Ok(config)
}

fn build_index(path: &Path, config: &LinkerConfig) -> Result<PostalCodeIndex> {
    let records = loader::load_city_records(path, config)
        .with_context(|| format!("Failed to load city dataset '{}'", path.display()))?;
    let index = PostalCodeIndex::build_with_options(&records, &config.index_options());
    let stats = index.stats();
    tracing::info!(
        postal_codes = stats.postal_codes,
        entries = stats.entries,
        entities = stats.entities,
        retained = stats.retained_tokens,
        "postal-code index built"
    );
    Ok(index)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Link {
            cities,
            addresses,
            out,
            facts,
        } => {
            let index = build_index(&cities, &config)?;
            let records = loader::load_address_records(&addresses)
                .with_context(|| format!("Failed to load addresses '{}'", addresses.display()))?;

            let resolver = CityResolver::new(&index, config.threshold);
            let linked = link_records(&records, &resolver);
            let summary = summarize(&records, &linked);
            tracing::info!(
                records = summary.records,
                legal_matched = summary.legal_matched,
                headquarters_matched = summary.headquarters_matched,
                reused = summary.reused,
                "addresses linked"
            );

            match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Cannot create '{}'", path.display()))?;
                    loader::write_linked_csv(BufWriter::new(file), &linked)?;
                }
                None => loader::write_linked_csv(io::stdout().lock(), &linked)?,
            }

            if let Some(path) = facts {
                let cities = derive_city_facts(&records, &linked, &config.same_as_base);
                let stats = index.stats();
                let report = FactsReport {
                    generated_at: chrono::Utc::now(),
                    index: &stats,
                    summary: &summary,
                    cities: &cities,
                };
                let file = File::create(&path)
                    .with_context(|| format!("Cannot create '{}'", path.display()))?;
                loader::write_facts_json(BufWriter::new(file), &report)?;
                tracing::info!(cities = cities.len(), path = %path.display(), "city facts written");
            }
        }

        Command::Resolve {
            cities,
            city,
            postal_code,
            topk,
        } => {
            let index = build_index(&cities, &config)?;
            let resolver = CityResolver::new(&index, config.threshold);
            let query = AddressQuery::new(Some(city.as_str()), Some(postal_code.as_str()));

            if let Some(k) = topk {
                let ranked = resolver.ranked_candidates(&query);
                eprintln!("  Top-{} candidates for '{}' @ {}:", k, city, postal_code);
                for (i, c) in ranked.iter().enumerate().take(k) {
                    eprintln!(
                        "    {}. {} [{}] distance={:.3}",
                        i + 1,
                        c.label,
                        c.entity_id,
                        c.distance
                    );
                }
            }

            let result = resolver.resolve(&query);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Stats { cities } => {
            let index = build_index(&cities, &config)?;
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
        }

        Command::Serve { cities, host, port } => {
            let index = build_index(&cities, &config)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(city_linker::server::start(index, config.threshold, &host, port))?;
        }
    }

    Ok(())
}
