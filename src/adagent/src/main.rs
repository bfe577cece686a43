//! AdAgent — header-bidding orchestration agent.
//!
//! Demo harness that loads configuration, fetches the placement catalog, and
//! runs one full auction cycle against a rendered page.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use adagent_auction::{AuctionCoordinator, InlineFrameSurface, SimulatedEngine};
use adagent_context::{ContextExtractor, EngagementTracker, PageData, PageView};
use adagent_core::config::AppConfig;
use adagent_core::event_bus::{make_event, noop_sink, EventSink};
use adagent_core::types::{EventType, Placement, RemoteConfig, Viewport};
use adagent_matching::{
    ConfigSource, HttpConfigSource, PubcontextClient, ReportSink, StaticConfigSource,
};

const SAMPLE_PAGE: &str = include_str!("../sample-page.html");

#[derive(Parser, Debug)]
#[command(name = "adagent")]
#[command(about = "Header-bidding orchestration agent")]
#[command(version)]
struct Cli {
    /// Rendered page HTML to run against (built-in sample page if omitted)
    #[arg(long)]
    page: Option<PathBuf>,

    /// Page URL reported to the match service
    #[arg(long, default_value = "https://example.com/sample-post")]
    url: String,

    /// Referrer reported to the match service
    #[arg(long, default_value = "")]
    referrer: String,

    /// Page-data JSON bundle (categories, tags, signal overrides)
    #[arg(long)]
    page_data: Option<PathBuf>,

    /// Config endpoint (overrides config)
    #[arg(long, env = "ADAGENT__API__CONFIG_URL")]
    config_url: Option<String>,

    /// Viewport width in CSS pixels
    #[arg(long, default_value_t = 1440)]
    viewport_width: u32,

    /// Viewport height in CSS pixels
    #[arg(long, default_value_t = 900)]
    viewport_height: u32,

    /// Use a built-in demo catalog instead of fetching remote config
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adagent=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("AdAgent starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(url) = cli.config_url {
        config.api.config_url = url;
    }

    info!(
        config_url = %config.api.config_url,
        matching_enabled = config.matching.enabled,
        match_timeout_ms = config.matching.timeout_ms,
        "Configuration loaded"
    );

    // Assemble the page view
    let html = match &cli.page {
        Some(path) => std::fs::read_to_string(path)?,
        None => SAMPLE_PAGE.to_string(),
    };
    let mut page = PageView::new(html, cli.url, cli.referrer);
    if let Some(path) = &cli.page_data {
        let raw = std::fs::read_to_string(path)?;
        page = page.with_data(serde_json::from_str::<PageData>(&raw)?);
    }

    let engagement = Arc::new(EngagementTracker::new(Viewport {
        width: cli.viewport_width,
        height: cli.viewport_height,
    }));
    let extractor = ContextExtractor::new(Arc::clone(&engagement));

    // Wire the pipeline seams
    let config_source: Arc<dyn ConfigSource> = if cli.offline {
        Arc::new(StaticConfigSource::new(demo_config()))
    } else {
        Arc::new(HttpConfigSource::new(config.api.config_url.clone())?)
    };

    let events: Arc<dyn EventSink> = match &config.api.report_url {
        Some(url) => Arc::new(ReportSink::new(url.clone())?),
        None => noop_sink(),
    };

    let surface = Arc::new(InlineFrameSurface::new());
    let engine = Arc::new(SimulatedEngine::new());
    let transport = Arc::new(PubcontextClient::new()?);

    let coordinator = AuctionCoordinator::new(config_source, engine)
        .with_matching(transport, extractor, config.matching.clone())
        .with_surface(surface.clone())
        .with_event_sink(Arc::clone(&events));

    match coordinator.run(&page).await {
        Ok(summary) => {
            info!(
                located = summary.located,
                rendered = summary.rendered_count(),
                no_bids = summary.no_bid_count(),
                "auction cycle complete"
            );
            for frame in surface.frames() {
                info!(code = %frame.code, shell = %frame.shell(), "frame ready for host shell");
            }
        }
        Err(e) => {
            // Failures degrade to the base page: one event, clean exit.
            error!(error = %e, "initialization failed");
            events.emit(make_event(EventType::InitFailed, "", None, None));
        }
    }

    Ok(())
}

/// Catalog used by `--offline` runs, matching the built-in sample page.
fn demo_config() -> RemoteConfig {
    let mut config = RemoteConfig {
        placements: vec![
            Placement {
                placement_id: "header-banner".into(),
                ad_unit_code: "div-header".into(),
                sizes: serde_json::json!(["728x90", "970x250"]),
                base_floor: 0.50,
                floor_cap: 10.00,
                css_selector: None,
                context_tags: None,
                enable_semantic: true,
                active: true,
            },
            Placement {
                placement_id: "sidebar-rect".into(),
                ad_unit_code: String::new(),
                sizes: serde_json::json!([[300, 250]]),
                base_floor: 0.35,
                floor_cap: 0.0,
                css_selector: None,
                context_tags: None,
                enable_semantic: true,
                active: true,
            },
        ],
        ..RemoteConfig::default()
    };
    config
        .prebid
        .bidders
        .insert("appnexus".into(), serde_json::json!({ "placementId": "1234567" }));
    config.prebid.bidders.insert(
        "rubicon".into(),
        serde_json::json!({ "accountId": 1001, "siteId": 2002, "zoneId": 3003 }),
    );
    config
}
