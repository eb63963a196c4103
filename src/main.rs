use std::time::Duration;

use anyhow::Context;
use browser_pincer::{
    Backend, BrowserConfig, ChromeBackend, Condition, Config, FetchBackend, FetchConfig,
    RootContext, SearchOptions,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Load a page and print what a selector matches.
#[derive(Parser, Debug)]
#[command(name = "pincer")]
#[command(version)]
struct Cli {
    /// Page to load; a bare host gets http://
    url: String,

    /// CSS selector, or XPath when it starts with '/'
    selector: String,

    /// Drive a headless Chrome instead of fetching the page over HTTP
    #[arg(long)]
    chrome: bool,

    /// Show the browser window (with --chrome)
    #[arg(long)]
    headful: bool,

    /// Wait for a condition (present, visible, actionable, gone) before reading
    #[arg(long, value_name = "CONDITION")]
    wait: Option<String>,

    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Print this attribute instead of the text
    #[arg(long, conflicts_with = "html")]
    attribute: Option<String>,

    /// Print outer HTML instead of the text
    #[arg(long)]
    html: bool,

    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.chrome {
        let backend = ChromeBackend::launch(BrowserConfig {
            headless: !cli.headful,
            ..Default::default()
        })
        .await
        .context("launching chrome")?;
        run(backend, &cli).await
    } else {
        let backend = FetchBackend::new(FetchConfig::default()).context("building http client")?;
        run(backend, &cli).await
    }
}

async fn run<B: Backend>(backend: B, cli: &Cli) -> anyhow::Result<()> {
    let config = Config::default().with_wait_timeout(Duration::from_millis(cli.timeout_ms));
    let root = RootContext::new(backend, config).await?;

    let result = extract(&root, cli).await;
    root.close().await?;
    result
}

async fn extract<B: Backend>(root: &RootContext<B>, cli: &Cli) -> anyhow::Result<()> {
    root.goto(cli.url.as_str())
        .await
        .with_context(|| format!("loading {}", cli.url))?;
    info!(url = ?root.url().await?, title = %root.title().await?, "page loaded");

    let mut options = SearchOptions::new();
    if let Some(limit) = cli.limit {
        options = options.limit(limit);
    }
    let mut found = root.search_with(&cli.selector, options).await?;
    if let Some(condition) = &cli.wait {
        found = found.wait(condition.parse::<Condition>()?).await?;
    }
    info!(matches = found.len(), selector = %cli.selector, "search finished");

    for element in found.each() {
        let line = match (&cli.attribute, cli.html) {
            (Some(name), _) => element.attribute(name).await?.unwrap_or_default(),
            (None, true) => element.html().await?,
            (None, false) => element.text().await?,
        };
        println!("{}", line.trim());
    }
    Ok(())
}
