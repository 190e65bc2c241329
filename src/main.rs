use std::path::PathBuf;

use anyhow::{bail, Context};

use rss_relay::app::App;
use rss_relay::config::Config;

const USAGE: &str = "\
Usage: rss-relay [OPTIONS]

Options:
  --once               Run a single cycle and exit
  --dry-run            Print notifications instead of sending them
  --stats [DAYS]       Show AI usage for the last DAYS days (default 7)
  --check-ai           Check that the configured AI provider responds
  --import <FILE>      Load subscriptions, keywords and preferences from a TOML file
  --config <FILE>      Use FILE instead of the default config path
  -h, --help           Show this help";

#[derive(Debug, Default)]
struct Args {
    once: bool,
    dry_run: bool,
    stats: Option<u32>,
    check_ai: bool,
    import: Option<PathBuf>,
    config: Option<PathBuf>,
    help: bool,
}

fn parse_args(raw: &[String]) -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut iter = raw.iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--once" => args.once = true,
            "--dry-run" => args.dry_run = true,
            "--check-ai" => args.check_ai = true,
            "-h" | "--help" => args.help = true,
            "--stats" => {
                let days = match iter.peek() {
                    Some(next) if !next.starts_with("--") => {
                        let days = next
                            .parse::<u32>()
                            .with_context(|| format!("invalid number of days: {}", next))?;
                        iter.next();
                        days
                    }
                    _ => 7,
                };
                args.stats = Some(days);
            }
            "--import" => {
                let path = iter.next().context("--import needs a file path")?;
                args.import = Some(PathBuf::from(path));
            }
            "--config" => {
                let path = iter.next().context("--config needs a file path")?;
                args.config = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument: {}\n\n{}", other, USAGE),
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let app = App::new(config)
        .await
        .context("failed to open the database")?;

    if let Some(path) = args.import {
        let summary = app.import_seed(&path).await?;
        println!(
            "Imported {} subscriptions, {} keyword sets and {} preference sets from {}",
            summary.subscriptions,
            summary.keyword_sets,
            summary.preferences,
            path.display()
        );
        return Ok(());
    }

    if let Some(days) = args.stats {
        println!("{}", app.usage_report(days).await?);
        return Ok(());
    }

    if args.check_ai {
        if app.check_ai().await? {
            println!("AI provider is available");
            return Ok(());
        }
        bail!("AI provider is not available");
    }

    if args.once {
        let report = app.run_once(args.dry_run).await?;
        println!(
            "{} subscriptions ({} failed), {} new items, {} notifications ({} sent, {} failed)",
            report.subscriptions,
            report.failures,
            report.new_items,
            report.deliveries,
            report.delivered,
            report.delivery_failures
        );
        return Ok(());
    }

    app.run_forever(args.dry_run).await?;
    Ok(())
}
