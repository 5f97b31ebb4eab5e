use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use papers_dl::config::{find_config_file, get_config, load_config, Config};
use papers_dl::models::DownloadRequest;
use papers_dl::parse::{format_output, parse_file, parse_ids_from_text, IdType, OutputFormat};
use papers_dl::sources::{SciDbSource, SciHubSource, Source};
use papers_dl::utils::{HttpClient, PdfTitleHook};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI for papers-dl
#[derive(Parser, Debug)]
#[command(name = "papers-dl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Download scientific papers by DOI, PMID or URL", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a paper and print where it was saved
    #[command(alias = "f")]
    Fetch {
        /// DOI, PMID or URL of the paper
        query: String,

        /// Output directory (defaults to the configured download path)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// User agent for outbound requests
        #[arg(long = "user-agent", short = 'A')]
        user_agent: Option<String>,

        /// File name to save under (`.pdf` is appended)
        #[arg(long, short)]
        name: Option<String>,

        /// Source to fetch from
        #[arg(long, short, value_enum, default_value_t = SourceArg::Scihub)]
        source: SourceArg,
    },

    /// Scan text for identifiers
    #[command(alias = "p")]
    Parse {
        /// File to scan (reads stdin if omitted)
        #[arg(long, short)]
        path: Option<PathBuf>,

        /// Identifier types to look for (all if omitted)
        #[arg(long = "match", short = 'm', value_enum)]
        matches: Vec<IdTypeArg>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = FormatArg::Raw)]
        format: FormatArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Scihub,
    Scidb,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IdTypeArg {
    Doi,
    Isbn,
}

impl From<IdTypeArg> for IdType {
    fn from(arg: IdTypeArg) -> Self {
        match arg {
            IdTypeArg::Doi => IdType::Doi,
            IdTypeArg::Isbn => IdType::Isbn,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Raw,
    Jsonl,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Raw => OutputFormat::Raw,
            FormatArg::Jsonl => OutputFormat::Jsonl,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("papers_dl={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            query,
            output,
            user_agent,
            name,
            source,
        } => {
            let mut http = config.http.clone();
            if user_agent.is_some() {
                http.user_agent = user_agent;
            }
            let client = HttpClient::from_config(&http)?;

            let output_dir = output.unwrap_or_else(|| config.downloads.default_path.clone());
            let mut request = DownloadRequest::new(query.as_str(), output_dir);
            request = match name {
                Some(name) => request.name(name),
                None => request.title_hook(Arc::new(PdfTitleHook)),
            };

            let result = match source {
                SourceArg::Scihub => {
                    // One session per identifier so mirror rotation stays local
                    let session = SciHubSource::connect(client, &config.scihub).await?;
                    session.download(&request).await
                }
                SourceArg::Scidb => {
                    SciDbSource::new(client, &config.scidb)
                        .download(&request)
                        .await
                }
            }
            .with_context(|| format!("Failed to download {}", query))?;

            println!("{}", serde_json::to_string(&result)?);
        }

        Commands::Parse {
            path,
            matches,
            format,
        } => {
            let types: Vec<IdType> = matches.into_iter().map(IdType::from).collect();
            let types = (!types.is_empty()).then_some(types.as_slice());

            let found = match path {
                Some(path) => parse_file(&path, types)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("Failed to read stdin")?;
                    parse_ids_from_text(&text, types)
                }
            };

            let rendered = format_output(&found, format.into());
            if !rendered.is_empty() {
                println!("{}", rendered);
            }
        }
    }

    Ok(())
}

/// Load configuration from `--config`, a discovered file, or the environment
fn load_settings(path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(config_path) = path {
        load_config(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        get_config()?
    };
    Ok(config)
}
