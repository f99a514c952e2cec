use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use bokelai_core::cache::{FileCoverCache, MemoryCoverCache};
use bokelai_core::config::{config_path, load_config, save_config_to, set_config_key, AppConfig};
use bokelai_core::host::{AbortSignal, ResultQueue, SourceResult, TracingLog};
use bokelai_core::lookup::bokelai::Bokelai;
use bokelai_core::lookup::{IdentifyQuery, LookupContext, MetadataSource};
use bokelai_core::metadata::{BookMetadata, Identifiers, BOKELAI_SCHEME, ISBN_SCHEME};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "bokelai")]
#[command(about = "Book metadata and covers from books.com.tw")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up book metadata
    Identify {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Download a cover image
    Cover {
        #[command(flatten)]
        query: QueryArgs,

        /// Output image path
        #[arg(short, long, default_value = "cover.jpg")]
        output: String,
    },

    /// Print the detail page URL for a books.com.tw id
    Url {
        /// books.com.tw id
        #[arg(required = true)]
        id: String,
    },

    /// Extract the books.com.tw id from a product URL
    ParseUrl {
        #[arg(required = true)]
        url: String,
    },

    /// Show source information
    Info,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// books.com.tw id (skips searching)
    #[arg(long)]
    id: Option<String>,

    /// ISBN to search for
    #[arg(long)]
    isbn: Option<String>,

    /// Title to search for
    #[arg(long)]
    title: Option<String>,

    /// Author to search for (repeatable)
    #[arg(long = "author")]
    authors: Vec<String>,

    /// Network timeout in seconds (default from config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
}

impl QueryArgs {
    fn to_query(&self) -> IdentifyQuery {
        let mut identifiers = Identifiers::new();
        if let Some(id) = &self.id {
            identifiers.insert(BOKELAI_SCHEME.to_string(), id.clone());
        }
        if let Some(isbn) = &self.isbn {
            identifiers.insert(ISBN_SCHEME.to_string(), isbn.clone());
        }
        IdentifyQuery {
            title: self.title.clone(),
            authors: self.authors.clone(),
            identifiers,
        }
    }

    fn timeout(&self, cfg: &AppConfig) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.source.timeout())
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let cfg = load_config();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Identify { query } => run_identify(&cfg, query, cli.json),
        Commands::Cover { query, output } => run_cover(&cfg, query, output, cli.json),
        Commands::Url { id } => run_url(&cfg, id, cli.json),
        Commands::ParseUrl { url } => run_parse_url(&cfg, url, cli.json),
        Commands::Info => run_info(cli.json),
        Commands::Config { action } => run_config(action, &cfg, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// The CLI is the host: it owns the cover URL cache file and the result queue.
struct Host {
    source: Bokelai,
    cache: Arc<FileCoverCache>,
    log: TracingLog,
    results: ResultQueue,
    abort: AbortSignal,
}

impl Host {
    fn new(cfg: &AppConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let path = cfg
            .cache
            .cover_cache_path()
            .ok_or("Could not determine cache directory")?;
        let cache = Arc::new(FileCoverCache::open(path)?);
        tracing::debug!(path = %cache.path().display(), "using cover cache");
        let source = Bokelai::with_http(cfg.source.clone(), cache.clone())?;
        Ok(Self {
            source,
            cache,
            log: TracingLog,
            results: ResultQueue::new(),
            abort: AbortSignal::new(),
        })
    }

    fn ctx(&self) -> LookupContext<'_> {
        LookupContext {
            log: &self.log,
            results: &self.results,
            abort: &self.abort,
        }
    }
}

/// Source for commands that only build or parse URLs: no cache file, no requests.
fn url_source(cfg: &AppConfig) -> Result<Bokelai, Box<dyn std::error::Error + Send + Sync>> {
    Ok(Bokelai::with_http(cfg.source.clone(), Arc::new(MemoryCoverCache::new()))?)
}

fn spinner(message: &str, json: bool) -> ProgressBar {
    if json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn run_identify(cfg: &AppConfig, args: &QueryArgs, json: bool) -> CliResult {
    let host = Host::new(cfg)?;
    let query = args.to_query();

    let pb = spinner("Searching books.com.tw...", json);
    let outcome = host.source.identify(&host.ctx(), &query, args.timeout(cfg));
    pb.finish_and_clear();
    outcome?;
    host.cache.save()?;

    let records = host.results.drain_metadata();
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No results found");
        return Ok(());
    }
    for (i, mi) in records.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_record(mi);
    }
    Ok(())
}

fn print_record(mi: &BookMetadata) {
    println!("Title:      {}", mi.title);
    println!("Authors:    {}", mi.authors.join(", "));
    if let Some(p) = &mi.publisher {
        println!("Publisher:  {}", p);
    }
    if let Some(d) = &mi.pubdate {
        println!("Published:  {}", d);
    }
    if let Some(isbn) = &mi.isbn {
        println!("ISBN:       {}", isbn);
    }
    if !mi.tags.is_empty() {
        println!("Tags:       {}", mi.tags.join(", "));
    }
    for (scheme, value) in &mi.identifiers {
        println!("Identifier: {}:{}", scheme, value);
    }
    if let Some(url) = &mi.cover_url {
        println!("Cover:      {}", url);
    }
}

fn run_cover(cfg: &AppConfig, args: &QueryArgs, output: &str, json: bool) -> CliResult {
    let host = Host::new(cfg)?;
    let query = args.to_query();

    let pb = spinner("Resolving cover...", json);
    host.source
        .download_cover(&host.ctx(), &query, args.timeout(cfg), true);
    pb.finish_and_clear();
    host.cache.save()?;

    let data = host
        .results
        .drain()
        .into_iter()
        .find_map(|r| match r {
            SourceResult::Cover { data, .. } => Some(data),
            SourceResult::Metadata(_) => None,
        })
        .ok_or("No cover found")?;

    let out_path = Path::new(output);
    std::fs::write(out_path, &data)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "path": out_path.display().to_string(), "bytes": data.len() })
        );
    } else {
        println!("Saved cover to {} ({} bytes)", out_path.display(), data.len());
    }
    Ok(())
}

fn run_url(cfg: &AppConfig, id: &str, json: bool) -> CliResult {
    let source = url_source(cfg)?;
    let mut identifiers = Identifiers::new();
    identifiers.insert(BOKELAI_SCHEME.to_string(), id.to_string());
    let book_url = source
        .get_book_url(&identifiers)
        .ok_or("Not a valid books.com.tw id")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&book_url)?);
    } else {
        println!("{}", book_url.url);
    }
    Ok(())
}

fn run_parse_url(cfg: &AppConfig, url: &str, json: bool) -> CliResult {
    let (scheme, id) = url_source(cfg)?
        .id_from_url(url)
        .ok_or("Not a books.com.tw product URL")?;
    if json {
        println!("{}", serde_json::json!({ "scheme": scheme, "id": id }));
    } else {
        println!("{}:{}", scheme, id);
    }
    Ok(())
}

fn run_info(json: bool) -> CliResult {
    let info = &bokelai_core::lookup::bokelai::INFO;
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }
    let (major, minor, patch) = info.version;
    println!("{} {}.{}.{} by {}", info.name, major, minor, patch, info.author);
    println!("{}", info.description);
    println!("Fields: {}", info.touched_fields.join(", "));
    Ok(())
}

fn run_config(action: &ConfigAction, cfg: &AppConfig, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            save_config_to(&AppConfig::default(), &path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut updated = cfg.clone();
            set_config_key(&mut updated, key, value)?;
            save_config_to(&updated, &path)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
