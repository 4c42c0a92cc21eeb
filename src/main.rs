use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use boss_scout::browser_manager::{self, LaunchOptions};
use boss_scout::core::config::load_scout_config;
use boss_scout::courier::Courier;
use boss_scout::page::BrowsingContext;
use boss_scout::session::{challenge_channel, SessionError};
use boss_scout::Timings;

/// Greet matching job postings on BOSS 直聘 and learn which companies to avoid.
#[derive(Debug, Parser)]
#[command(name = "boss-scout", version, about)]
struct Cli {
    /// Path to boss-scout.json (default: $BOSS_SCOUT_CONFIG, ./boss-scout.json, ./config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the browser without a window. QR login and slider challenges need a visible window.
    #[arg(long)]
    headless: bool,

    /// Directory holding data.json and cookie.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Do not scan the chat inbox for rejections after the run
    #[arg(long)]
    skip_learn: bool,

    /// Write the run report as JSON (to report.json in the data dir unless a path is given)
    #[arg(long)]
    report: Option<Option<PathBuf>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let mut cfg = load_scout_config(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = Some(dir);
    }
    if cli.headless {
        cfg.headless = true;
    }
    if cfg.keywords.is_empty() || cfg.city_code.is_empty() {
        warn!("no keywords or city codes configured; only the login and inbox steps will run");
    }

    let data_dir = cfg.resolve_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    info!("boss-scout: data dir {}", data_dir.display());

    let report_path = cli.report.map(|p| p.unwrap_or_else(|| cfg.report_path()));

    let ctx = Arc::new(
        browser_manager::launch(&LaunchOptions {
            headless: cfg.headless,
            user_data_dir: Some(data_dir.join("browser-profile")),
            ..Default::default()
        })
        .await?,
    );

    // Operator confirms a solved slider challenge by pressing Enter.
    let (signal, gate) = challenge_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() {
                break;
            }
            signal.confirm();
        }
    });

    let browsing: Arc<dyn BrowsingContext> = ctx.clone();
    let mut courier =
        Courier::new(browsing, cfg, gate, Timings::default())?.skip_learning(cli.skip_learn);
    let outcome = courier.run().await;
    ctx.shutdown().await;

    match outcome {
        Ok(report) => {
            if let Some(path) = report_path {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(&path, json)?;
                info!("boss-scout: report written to {}", path.display());
            }
            info!("boss-scout: {} greetings sent", report.total_sent());
            Ok(())
        }
        Err(e) => {
            if let Some(SessionError::LoginTimeout(_)) = e.downcast_ref::<SessionError>() {
                error!("boss-scout: {}", e);
                std::process::exit(1);
            }
            Err(e)
        }
    }
}
