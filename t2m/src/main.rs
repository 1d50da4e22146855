//! t2m - Forward tweets to Mastodon without duplicates

use anyhow::Context;
use clap::{Parser, Subcommand};
use libt2m::config::resolve_config_path;
use libt2m::logging::{LogFormat, LoggingConfig};
use libt2m::orchestrator::{link_accounts, list_links};
use libt2m::platforms::mastodon::MastodonProvider;
use libt2m::platforms::media::HttpMediaFetcher;
use libt2m::platforms::twitter::TwitterClient;
use libt2m::{AccountSummary, Config, ForwardOptions, Forwarder, LedgerStore, Orchestrator, T2mError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "t2m")]
#[command(version)]
#[command(about = "Forward tweets to Mastodon without duplicates")]
#[command(long_about = "\
t2m - Forward tweets to Mastodon without duplicates

DESCRIPTION:
    t2m reads the recent tweets of Twitter accounts and publishes them on
    linked Mastodon accounts. Forwarded tweets are recorded in a ledger
    (db.json) so every run only sends what is new.

COMMANDS:
    one     Forward the tweets of one Twitter account
    all     Forward the tweets of every linked Twitter account
    add     Link a Twitter account to a Mastodon account
    list    List known Twitter accounts

USAGE EXAMPLES:
    # Link an account, skip its history, then forward new tweets
    t2m add tw1 me@mamot.fr
    t2m one tw1 --only-mark-as-seen
    t2m all --retweets

    # See what would be sent, without sending it
    t2m one tw1 --debug

CONFIGURATION:
    Configuration file: ~/.config/t2m/config.toml (or $T2M_CONFIG)
    Ledger location:    ~/.local/share/t2m/db.json

    Mastodon access tokens are read from <credentials_dir>/<user@instance>.token

EXIT CODES:
    0 - Success (individual tweets may still have failed, see the logs)
    1 - Missing or malformed link, configuration or ledger error
    2 - Authentication error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: $T2M_CONFIG or ~/.config/t2m/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ledger file (overrides the configuration)
    #[arg(long, global = true, value_name = "PATH", env = "T2M_LEDGER")]
    ledger: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long, global = true, default_value = "text")]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: text, json or pretty (default: $T2M_LOG_FORMAT or text)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Forward the tweets of one Twitter account
    One {
        /// Twitter account
        twitter_handle: String,

        /// Mastodon account (user@instance); replaces the recorded link
        #[arg(short = 'm', long)]
        mastodon_handle: Option<String>,

        /// Forward at most this many tweets (the most recent ones)
        #[arg(short = 'n', long)]
        number: Option<usize>,

        /// Mark the available tweets as forwarded without sending them
        #[arg(short = 'o', long)]
        only_mark_as_seen: bool,

        #[command(flatten)]
        forward: ForwardArgs,
    },

    /// Forward the tweets of every linked Twitter account
    All {
        #[command(flatten)]
        forward: ForwardArgs,
    },

    /// Link a Twitter account to a Mastodon account
    Add {
        twitter_handle: String,

        /// Mastodon account (user@instance)
        mastodon_handle: String,
    },

    /// List known Twitter accounts
    List,
}

#[derive(clap::Args, Debug)]
struct ForwardArgs {
    /// Also forward retweets and quotes
    #[arg(short, long)]
    retweets: bool,

    /// Show what would be forwarded without sending anything
    #[arg(short, long)]
    debug: bool,

    /// Pause between two sends, e.g. "30s", "2m" or plain seconds
    #[arg(short, long, value_parser = parse_wait)]
    wait: Option<Duration>,

    /// Remove the trailing t.co link some tweets end with
    #[arg(short, long)]
    strip_trailing_url: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(s: &str) -> Result<Self, T2mError> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(T2mError::InvalidInput(format!(
                "Invalid format '{}'. Must be 'text' or 'json'",
                s
            ))),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<T2mError>()
        .map(T2mError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::parse(&cli.format)?;
    let config = load_config(cli.config.as_deref())?;
    let store = LedgerStore::new(cli.ledger.clone().unwrap_or_else(|| config.ledger_path()));

    match cli.command {
        Commands::One {
            twitter_handle,
            mastodon_handle,
            number,
            only_mark_as_seen,
            forward,
        } => {
            let mut options = forward_options(&config, &forward);
            options.limit = number;
            options.mark_seen_only = only_mark_as_seen;

            let orchestrator = build_orchestrator(&config, store)?;
            let summary = orchestrator
                .run_one(&twitter_handle, mastodon_handle.as_deref(), &options)
                .await?;
            print_summaries(format, &[summary], &options)?;
        }
        Commands::All { forward } => {
            let options = forward_options(&config, &forward);

            let orchestrator = build_orchestrator(&config, store)?;
            let summaries = orchestrator.run_all(&options).await?;
            print_summaries(format, &summaries, &options)?;
        }
        Commands::Add {
            twitter_handle,
            mastodon_handle,
        } => {
            link_accounts(&store, &twitter_handle, &mastodon_handle)?;
            match format {
                OutputFormat::Text => println!("done"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "source": twitter_handle,
                        "destination": mastodon_handle.trim_start_matches('@'),
                    })
                ),
            }
        }
        Commands::List => {
            let links = list_links(&store)?;
            match format {
                OutputFormat::Text => {
                    for link in links {
                        match link.destination {
                            Some(destination) => println!(
                                " * {} -> {} ({} forwarded)",
                                link.source, destination, link.forwarded
                            ),
                            None => println!(" * {}", link.source),
                        }
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&links)?),
            }
        }
    }

    Ok(())
}

/// Load the configuration; without an explicit path, a missing file means
/// defaults
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (resolve_config_path()?, std::env::var_os("T2M_CONFIG").is_some()),
    };

    if !explicit && !path.exists() {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default_config());
    }

    Config::load_from_path(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn forward_options(config: &Config, args: &ForwardArgs) -> ForwardOptions {
    ForwardOptions {
        dry_run: args.debug,
        delay_between_sends: args.wait.unwrap_or_else(|| config.delay()),
        include_reposts: args.retweets,
        strip_trailing_self_link: args.strip_trailing_url,
        max_fetch: config.defaults.max_fetch,
        ..Default::default()
    }
}

fn build_orchestrator(config: &Config, store: LedgerStore) -> anyhow::Result<Orchestrator> {
    let timeline = TwitterClient::from_config(&config.twitter).with_context(|| {
        format!(
            "Failed to set up the Twitter client (bearer token file: {})",
            config.twitter.bearer_token_file
        )
    })?;
    let media = HttpMediaFetcher::new()?;
    let destinations = MastodonProvider::new(config.mastodon.credentials_dir.clone());

    let forwarder = Forwarder::new(Arc::new(timeline), Arc::new(media), Arc::new(destinations))
        .with_content_warnings(config.content_warning_rules()?)
        .with_shortener_domain(&config.defaults.shortener_domain)?;

    Ok(Orchestrator::new(forwarder, store))
}

fn print_summaries(
    format: OutputFormat,
    summaries: &[AccountSummary],
    options: &ForwardOptions,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(summaries)?);
        return Ok(());
    }

    for summary in summaries {
        if let Some(error) = &summary.error {
            println!("@{} -> {}: error: {}", summary.source, summary.destination, error);
        } else if options.mark_seen_only {
            println!(
                "Marked all available tweets as seen ({} tweets marked)",
                summary.forwarded
            );
        } else if options.dry_run {
            for candidate in &summary.dry_run {
                println!(">> {} {}", candidate.text, candidate.media.join(" "));
            }
        } else {
            println!("{}", summary.summary_line());
        }
    }

    Ok(())
}

/// Plain seconds or a humantime duration
fn parse_wait(s: &str) -> Result<Duration, String> {
    if let Ok(seconds) = s.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    humantime::parse_duration(s).map_err(|e| format!("invalid duration '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wait() {
        assert_eq!(parse_wait("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_wait("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_wait("1s 500ms").unwrap(), Duration::from_millis(1500));
        assert!(parse_wait("soon").is_err());
    }

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::parse("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("xml").unwrap_err().exit_code(), 3);
    }

    #[test]
    fn test_cli_parses_one() {
        let cli = Cli::parse_from(["t2m", "one", "tw1", "-m", "a1@mamot.fr", "-n", "4", "-r", "-w", "5s"]);
        match cli.command {
            Commands::One {
                twitter_handle,
                mastodon_handle,
                number,
                only_mark_as_seen,
                forward,
            } => {
                assert_eq!(twitter_handle, "tw1");
                assert_eq!(mastodon_handle.as_deref(), Some("a1@mamot.fr"));
                assert_eq!(number, Some(4));
                assert!(!only_mark_as_seen);
                assert!(forward.retweets);
                assert_eq!(forward.wait, Some(Duration::from_secs(5)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_exit_code_through_context() {
        let error = anyhow::Error::new(T2mError::MissingLink("tw1".to_string())).context("running one");
        assert_eq!(exit_code(&error), 1);

        let error = anyhow::Error::new(T2mError::InvalidInput("bad".to_string()));
        assert_eq!(exit_code(&error), 3);
    }
}
