use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedsift::config::Config;
use feedsift::crawler::ResilientHttpClient;
use feedsift::error::{Error, FeedsiftErrorTrait};
use feedsift::pipeline::{FacebookScraper, SessionFeedClient, StrategyOrchestrator};

#[derive(Parser)]
#[command(
    name = "feedsift",
    version,
    about = "Best-effort scraper for public Facebook pages and Instagram profiles",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file (environment variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape posts from a Facebook page
    Facebook {
        /// Page handle, numeric id or URL
        page: String,

        /// Maximum number of posts to return
        #[arg(short, long)]
        max_posts: Option<usize>,

        /// Include embedded comments
        #[arg(long, default_value = "false")]
        with_comments: bool,
    },

    /// Scrape posts from an Instagram profile (requires a session)
    Instagram {
        /// Username or profile URL
        username: String,

        /// Maximum number of posts to return
        #[arg(short, long)]
        max_posts: Option<usize>,

        /// Fetch comments for each post
        #[arg(long, default_value = "false")]
        with_comments: bool,
    },

    /// Look up a single Instagram post by shortcode
    InstagramPost {
        /// Post shortcode (the part after /p/)
        shortcode: String,
    },

    /// Resolve a Facebook page to its numeric id
    Resolve {
        /// Page handle or URL
        page: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;

    let log_format = cli.log_format.as_deref().unwrap_or(config.logging.format.as_str());
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("feedsift starting");

    let client = Arc::new(
        ResilientHttpClient::with_config(
            config.http.requests_per_second,
            config.retry_policy(),
            config.request_timeout(),
            &config.http.proxies,
        )
        .context("Failed to create HTTP client")?,
    );
    let orchestrator = StrategyOrchestrator::new(config.politeness());

    match cli.command {
        Commands::Facebook {
            page,
            max_posts,
            with_comments,
        } => {
            tracing::info!(
                page = %page,
                max_posts = ?max_posts,
                with_comments = %with_comments,
                "Starting facebook command"
            );
            let scraper = FacebookScraper::new(client).with_orchestrator(orchestrator);
            let result = scraper
                .scrape(&page, &config.scrape_options(max_posts, with_comments))
                .await;
            print_json(&result)?;
        }

        Commands::Instagram {
            username,
            max_posts,
            with_comments,
        } => {
            tracing::info!(
                username = %username,
                max_posts = ?max_posts,
                with_comments = %with_comments,
                "Starting instagram command"
            );
            let feed = SessionFeedClient::new(client, config.instagram_credentials())
                .with_orchestrator(orchestrator);
            let result = feed
                .scrape(&username, &config.scrape_options(max_posts, with_comments))
                .await;
            print_json(&result)?;
        }

        Commands::InstagramPost { shortcode } => {
            tracing::info!(shortcode = %shortcode, "Starting instagram-post command");
            let feed = SessionFeedClient::new(client, config.instagram_credentials());
            let post = feed
                .media_by_shortcode(&shortcode)
                .await
                .map_err(|e| report(Error::from(e)))?;
            print_json(&post)?;
        }

        Commands::Resolve { page } => {
            tracing::info!(page = %page, "Starting resolve command");
            let scraper = FacebookScraper::new(client);
            let id = scraper
                .resolve_page_id(&page)
                .await
                .map_err(|e| report(Error::from(e)))?;
            print_json(&serde_json::json!({ "identifier": page, "pageId": id }))?;
        }
    }

    tracing::info!("feedsift completed");
    Ok(())
}

/// Log a library error with its category before handing it to anyhow
fn report(error: Error) -> anyhow::Error {
    tracing::error!(
        category = error.category().as_str(),
        recoverable = error.is_recoverable(),
        error = %error,
        "Command failed"
    );
    anyhow::Error::new(error)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("feedsift=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("feedsift={level},warn"))
            .context("Invalid log level")?
    };

    // Logs go to stderr; stdout carries the JSON result
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
