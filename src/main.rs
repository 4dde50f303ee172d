use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cdp_page::{CdpPageDriver, PageConfig, PageDriver};
use clap::{Args, Parser, Subcommand};
use perceiver_section::{DriverProbe, SectionDetector};
use sectionscout::{crawl, CrawlOptions};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a URL: full-page and per-section screenshots plus a meta document
    Capture(CaptureArgs),
    /// Detect sections only and print the section map as JSON
    Detect(DetectArgs),
}

#[derive(Args)]
struct CaptureArgs {
    #[command(flatten)]
    page: PageArgs,

    /// Output directory for screenshots and the meta document
    #[arg(short, long, default_value = "./captures")]
    out_dir: PathBuf,

    /// Skip section detection and take only the full-page screenshot
    #[arg(long)]
    no_sections: bool,

    /// Cap applied to the body clip height, in pixels
    #[arg(long, default_value_t = region_capture::MAX_BODY_HEIGHT)]
    max_body_height: i32,
}

#[derive(Args)]
struct DetectArgs {
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct PageArgs {
    /// Target URL
    #[arg(short, long)]
    url: String,

    /// Navigation timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Chrome/Chromium executable (overrides auto-detection)
    #[arg(long, value_name = "FILE")]
    chrome_path: Option<PathBuf>,

    /// Attach to a running browser instead of launching one
    #[arg(long, value_name = "URL")]
    ws_url: Option<String>,

    /// Run with a visible browser window
    #[arg(long)]
    headful: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!("Starting SectionScout v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Capture(args) => cmd_capture(args).await,
        Commands::Detect(args) => cmd_detect(args).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn page_config(args: &PageArgs) -> Result<PageConfig> {
    Url::parse(&args.url).with_context(|| format!("invalid url: {}", args.url))?;

    let mut cfg = PageConfig::default();
    if let Some(path) = &args.chrome_path {
        cfg.executable = path.clone();
    }
    cfg.websocket_url = args.ws_url.clone();
    if args.headful {
        cfg.headless = false;
    }
    cfg.default_deadline_ms = args.timeout.saturating_mul(1000);
    Ok(cfg)
}

async fn attach_driver(args: &PageArgs) -> Result<Arc<CdpPageDriver>> {
    let cfg = page_config(args)?;
    let driver = CdpPageDriver::launch(cfg)
        .await
        .context("failed to launch browser")?;
    Ok(Arc::new(driver))
}

async fn cmd_capture(args: CaptureArgs) -> Result<()> {
    let driver = attach_driver(&args.page).await?;

    let mut options = CrawlOptions::new(&args.page.url, &args.out_dir);
    options.capture_sections = !args.no_sections;
    options.max_body_height = args.max_body_height;
    options.navigation_timeout = Duration::from_secs(args.page.timeout);

    let report = crawl(Arc::clone(&driver), &options).await;
    let close = driver.close().await;

    let report = report?;
    close.context("failed to close page")?;

    println!("{}", report.meta_path.display());
    Ok(())
}

async fn cmd_detect(args: DetectArgs) -> Result<()> {
    let driver = attach_driver(&args.page).await?;

    let outcome = async {
        driver
            .navigate(&args.page.url, Duration::from_secs(args.page.timeout))
            .await?;
        let probe = DriverProbe::new(Arc::clone(&driver));
        let map = SectionDetector::new(probe).detect().await?;
        Ok::<_, anyhow::Error>(map)
    }
    .await;
    let close = driver.close().await;

    let map = outcome?;
    close.context("failed to close page")?;

    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}
