use std::error::Error;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, error::ErrorKind};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::catalog::{Catalog, OllamaEmbedder};
use crate::config::{
    CatalogConfig, ContextConfig, DEFAULT_CONTEXTS_FILE, DEFAULT_DEPOSITS_FILE,
    DEFAULT_ENRICHED_FILE, DEFAULT_REFINED_FILE, EnrichmentConfig, ExtractionConfig, LensConfig,
    OllamaConfig, RefineConfig, SearchConfig,
};
use crate::constants::{catalog, enrichment, lens};
use crate::extract::Extractor;
use crate::generation::OllamaGenerator;
use crate::metrics::repository_shares;
use crate::pipeline::{
    run_catalog, run_context, run_count, run_enrichment, run_extraction, run_refine,
};
use crate::reconcile::Reconciler;
use crate::retry::RetryPolicy;
use crate::source::LensSource;

#[derive(Debug, Parser)]
#[command(
    name = "biobroker",
    disable_help_subcommand = true,
    about = "Mine expired biological patents for liberated deposits",
    long_about = "Scan expired biological patents for culture-collection deposits, keep the ones named in the claims, describe them with a local model, and build a searchable catalog.",
    after_help = "Stages read the previous stage's output file and resume from their own output when rerun."
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Tracing filter, e.g. info or biobroker=debug"
    )]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report how many patents match the deposit query.
    Count {
        #[command(flatten)]
        lens: LensArgs,
    },
    /// Stage 1: extract deposits and classify claim membership.
    Extract {
        #[command(flatten)]
        lens: LensArgs,
        #[arg(long, default_value = DEFAULT_DEPOSITS_FILE)]
        output: PathBuf,
        #[arg(long, help = "Stop after this many result pages")]
        max_pages: Option<usize>,
    },
    /// Stage 2: context snippets for liberated deposits.
    Context {
        #[command(flatten)]
        lens: LensArgs,
        #[arg(long, default_value = DEFAULT_DEPOSITS_FILE)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_CONTEXTS_FILE)]
        output: PathBuf,
        #[arg(long, default_value_t = 50, value_parser = parse_positive_usize)]
        batch_size: usize,
        #[arg(long, default_value_t = 1000, help = "Characters kept on each side")]
        window: usize,
        #[arg(long, default_value_t = 500)]
        pause_ms: u64,
    },
    /// Stage 3: structured descriptions from the local model.
    Enrich {
        #[command(flatten)]
        ollama: OllamaArgs,
        #[arg(long, default_value = DEFAULT_CONTEXTS_FILE)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_ENRICHED_FILE)]
        output: PathBuf,
        #[arg(long, default_value_t = 10, value_parser = parse_positive_usize)]
        flush_every: usize,
        #[arg(long, help = "Skip the readiness prompt")]
        no_probe: bool,
    },
    /// Stage 4: rescue failed answers and clean generic names.
    Refine {
        #[arg(long, default_value = DEFAULT_ENRICHED_FILE)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_REFINED_FILE)]
        output: PathBuf,
    },
    /// Stage 5: embed refined assets into a catalog file.
    Catalog {
        #[command(flatten)]
        ollama: OllamaArgs,
        #[arg(long, default_value = DEFAULT_REFINED_FILE)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_CONTEXTS_FILE)]
        contexts: PathBuf,
        #[arg(long, help = "Embed without context snippets")]
        no_contexts: bool,
        #[arg(long, default_value = catalog::DEFAULT_CATALOG_FILE)]
        output: PathBuf,
        #[arg(long, default_value_t = 100, value_parser = parse_positive_usize)]
        batch_size: usize,
    },
    /// Search the catalog in natural language.
    Search {
        #[command(flatten)]
        ollama: OllamaArgs,
        #[arg(long, default_value = catalog::DEFAULT_CATALOG_FILE)]
        catalog: PathBuf,
        #[arg(long = "category", help = "Keep only this category; repeat as needed")]
        categories: Vec<String>,
        #[arg(long, default_value_t = 10, value_parser = parse_positive_usize)]
        limit: usize,
        #[arg(required = true)]
        query: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct LensArgs {
    #[arg(long, env = lens::API_KEY_ENV, default_value = "", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = lens::ENDPOINT_ENV, default_value = lens::DEFAULT_ENDPOINT)]
    endpoint: String,
    #[arg(long, default_value_t = 100, value_parser = parse_positive_usize)]
    page_size: usize,
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
    #[arg(long, default_value_t = 5, value_parser = parse_positive_usize)]
    max_attempts: usize,
    #[arg(long, default_value_t = lens::DEFAULT_MAX_BODY_BYTES, help = "Largest response body accepted")]
    max_body_bytes: u64,
}

impl LensArgs {
    fn into_config(self) -> LensConfig {
        LensConfig {
            endpoint: self.endpoint,
            api_key: self.api_key,
            page_size: self.page_size,
            timeout_secs: self.timeout_secs,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..RetryPolicy::default()
            },
            max_body_bytes: self.max_body_bytes,
            ..LensConfig::default()
        }
    }
}

#[derive(Debug, Args)]
struct OllamaArgs {
    #[arg(long = "ollama-endpoint", env = enrichment::ENDPOINT_ENV, default_value = enrichment::DEFAULT_ENDPOINT)]
    endpoint: String,
    #[arg(long, default_value = enrichment::DEFAULT_MODEL)]
    model: String,
    #[arg(long, default_value = catalog::DEFAULT_EMBED_MODEL)]
    embed_model: String,
    #[arg(long = "ollama-timeout-secs", default_value_t = 300)]
    timeout_secs: u64,
}

impl OllamaArgs {
    fn into_config(self) -> OllamaConfig {
        OllamaConfig {
            endpoint: self.endpoint,
            generation_model: self.model,
            embedding_model: self.embed_model,
            timeout_secs: self.timeout_secs,
            ..OllamaConfig::default()
        }
    }
}

/// Parse `args` and run the selected stage.
///
/// Help and version requests print and return `Ok(())`.
pub fn run<I>(args: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    let Some(cli) = parse_cli::<Cli, _>(args)? else {
        return Ok(());
    };
    init_tracing(&cli.log_level);
    dispatch(cli.command)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

fn dispatch(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Count { lens } => {
            let source = LensSource::new(lens.into_config())?;
            let total = run_count(&source, &Extractor::builtin()?)?;
            println!("Expired biological patents with deposit language: {total}");
        }
        Command::Extract {
            lens,
            output,
            max_pages,
        } => {
            let source = LensSource::new(lens.into_config())?;
            let config = ExtractionConfig { output, max_pages };
            let summary = run_extraction(&source, &Extractor::builtin()?, &config)?;
            println!(
                "Scanned {} documents over {} pages; wrote {} deposit events ({} liberated, {} already present).",
                summary.documents_scanned,
                summary.pages,
                summary.deposits_written,
                summary.liberated,
                summary.skipped_resumed
            );
            for share in repository_shares(&summary.per_repository) {
                println!(
                    "  {:<12} {:>6}  {:>5.1}%",
                    share.repository,
                    share.count,
                    share.share * 100.0
                );
            }
            println!("Output: {}", config.output.display());
        }
        Command::Context {
            lens,
            input,
            output,
            batch_size,
            window,
            pause_ms,
        } => {
            let source = LensSource::new(lens.into_config())?;
            let config = ContextConfig {
                input,
                output,
                batch_size,
                window,
                pause_ms,
            };
            let summary = run_context(&source, &config)?;
            println!(
                "Saved {} of {} pending snippets ({} empty, {} failed batches) to {}",
                summary.snippets_written,
                summary.pending,
                summary.empty_snippets,
                summary.failed_batches,
                config.output.display()
            );
        }
        Command::Enrich {
            ollama,
            input,
            output,
            flush_every,
            no_probe,
        } => {
            let mut generator = OllamaGenerator::new(&ollama.into_config());
            let config = EnrichmentConfig {
                input,
                output,
                flush_every,
                probe_generator: !no_probe,
                ..EnrichmentConfig::default()
            };
            let summary = run_enrichment(&mut generator, &Reconciler::new()?, &config)?;
            println!(
                "Enriched {} rows: {} success, {} skipped, {} JSON failed. Output: {}",
                summary.written,
                summary.success,
                summary.skipped_empty,
                summary.json_failed,
                config.output.display()
            );
        }
        Command::Refine { input, output } => {
            let config = RefineConfig { input, output };
            let stats = run_refine(&Reconciler::new()?, &config)?;
            println!("Refined {} records into {}", stats.total, config.output.display());
            println!("  rescued from raw text:   {}", stats.rescued);
            println!("  moved to Human Cell Line: {}", stats.human);
            println!("  moved to Hybridoma:       {}", stats.hybridoma);
            println!("  moved to Plasmid/Vector:  {}", stats.plasmid_vector);
            println!("  generic class names:      {}", stats.generic_class);
        }
        Command::Catalog {
            ollama,
            input,
            contexts,
            no_contexts,
            output,
            batch_size,
        } => {
            let mut embedder = OllamaEmbedder::new(&ollama.into_config());
            let config = CatalogConfig {
                input,
                contexts: (!no_contexts).then_some(contexts),
                output,
                embed_batch_size: batch_size,
            };
            let (catalog, summary) = run_catalog(&mut embedder, &config)?;
            let stats = catalog.stats();
            println!(
                "Embedded {} of {} named assets ({} failed batches), dimension {}, {} categories. Output: {}",
                summary.embedded,
                summary.eligible,
                summary.failed_batches,
                catalog.dimension(),
                stats.categories.len(),
                config.output.display()
            );
        }
        Command::Search {
            ollama,
            catalog,
            categories,
            limit,
            query,
        } => {
            let loaded = Catalog::load(&catalog)?;
            let stats = loaded.stats();
            println!(
                "Catalog built {}: {} assets; categories: {}",
                loaded.built_at().format("%Y-%m-%d %H:%M UTC"),
                stats.assets,
                stats.categories.join(", ")
            );
            let mut embedder = OllamaEmbedder::new(&ollama.into_config());
            let config = SearchConfig {
                max_results: limit,
                ..SearchConfig::default()
            };
            let query = query.join(" ");
            let hits = loaded.search(&mut embedder, &query, &categories, &config)?;
            if hits.is_empty() {
                println!("No matches found. Try broadening the query.");
            }
            for (idx, hit) in hits.iter().enumerate() {
                println!(
                    "{:>2}. {} ({}) - {}% match",
                    idx + 1,
                    hit.entry.name,
                    hit.entry.category,
                    hit.score
                );
                println!("    application: {}", hit.entry.application);
                println!("    patent: {}", hit.entry.title);
                println!(
                    "    deposit: {} {}",
                    hit.entry.repository, hit.entry.accession_id
                );
                if let Some(link) = &hit.order_link {
                    println!("    order: {link}");
                }
            }
        }
    }
    Ok(())
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
