use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serp_harvest::{
    oldest, CancelFlag, HarvestConfig, HarvestRequest, Harvester, MarketTable, PhraseHarvest,
    ResultKind, SearchResult,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Harvest dated and undated search results for one or more phrases.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Search phrases, each harvested independently
    #[arg(required = true)]
    phrases: Vec<String>,

    /// Number of dated results wanted per phrase
    #[arg(long, default_value_t = 10)]
    dated: usize,

    /// Number of undated results wanted per phrase
    #[arg(long, default_value_t = 0)]
    undated: usize,

    /// Result vertical to scan
    #[arg(long, value_enum, default_value_t = Kind::News)]
    kind: Kind,

    /// Market code or language name, e.g. `de-DE` or `german`
    #[arg(long)]
    market: Option<String>,

    /// Language results are normalized into
    #[arg(long)]
    lang: Option<String>,

    /// Language the phrases are written in; picks the market when --market is absent
    #[arg(long)]
    query_lang: Option<String>,

    /// Optional configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "SERP_HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// JSON object of extra market aliases merged over the built-in table
    #[arg(long)]
    market_table: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    News,
    Web,
}

impl From<Kind> for ResultKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::News => ResultKind::News,
            Kind::Web => ResultKind::Web,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    harvests: &'a [PhraseHarvest],
    oldest: Option<&'a SearchResult>,
}

fn load_markets(path: Option<&PathBuf>) -> MarketTable {
    let builtin = MarketTable::builtin();
    let Some(path) = path else {
        return builtin;
    };
    match MarketTable::from_json_file(path) {
        Ok(extra) => builtin.merged_with(extra),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not load market table; using built-in entries");
            builtin
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config =
        HarvestConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(lang) = &cli.lang {
        config.target_language = lang.clone();
    }
    let markets = load_markets(cli.market_table.as_ref());
    let harvester =
        Harvester::from_config(config, markets).context("failed to build harvester")?;

    let mut template = HarvestRequest::new("", cli.dated, cli.undated).with_kind(cli.kind.into());
    if let Some(market) = &cli.market {
        template = template.with_market(market.clone());
    }
    if let Some(language) = &cli.query_lang {
        template = template.with_language(language.clone());
    }

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing current pages");
            on_signal.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Harvesting {} phrase(s)...", cli.phrases.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let start_time = Instant::now();
    let harvests = harvester
        .harvest_phrases(&cli.phrases, &template, &cancel)
        .await;
    spinner.finish_and_clear();

    for harvest in &harvests {
        info!(
            phrase = %harvest.phrase,
            dated = harvest.outcome.dated.len(),
            undated = harvest.outcome.undated.len(),
            pages = harvest.outcome.pages_fetched,
            stop = ?harvest.outcome.stop_reason,
            "Phrase finished"
        );
    }
    info!(elapsed = ?start_time.elapsed(), "Harvest complete");

    let all_dated: Vec<SearchResult> = harvests
        .iter()
        .flat_map(|h| h.outcome.dated.iter().cloned())
        .collect();
    let report = Report {
        harvests: &harvests,
        oldest: oldest(&all_dated),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
