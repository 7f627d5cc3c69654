mod dataset;
mod db;
mod extract;
mod ledger;
mod normalize;
mod page;
mod report;
mod scroll;
mod settings;
mod sink;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use page::snapshot::SnapshotPage;
use page::Page;
use scroll::Controller;
use settings::{Settings, SiteSelectors};
use sink::{CsvSink, Sink};

#[derive(Parser)]
#[command(name = "scroll_harvest", about = "Infinite-scroll property listing harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest listings from the live site through headless Chrome
    Run {
        /// Listing page to start from (default: HARVEST_START_URL or built-in)
        #[arg(long)]
        url: Option<String>,
        #[command(flatten)]
        opts: HarvestOpts,
    },
    /// Run the same loop over saved HTML snapshots, one per scroll step
    Replay {
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
        /// Actually sleep for content waits and jitter
        #[arg(long)]
        paced: bool,
        #[command(flatten)]
        opts: HarvestOpts,
    },
    /// Print statistics for a previously written CSV
    Summary { csv: PathBuf },
}

#[derive(Args)]
struct HarvestOpts {
    /// Stop after this many listings
    #[arg(short = 'n', long)]
    target: Option<usize>,
    /// Maximum successful scrolls
    #[arg(long)]
    max_scrolls: Option<u32>,
    /// Seconds to wait for content after each scroll
    #[arg(long)]
    wait: Option<f64>,
    #[arg(long)]
    jitter_min: Option<f64>,
    #[arg(long)]
    jitter_max: Option<f64>,
    /// Mark listings seen before extraction, so failures are never retried
    #[arg(long)]
    no_retry: bool,
    /// CSV output path
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write the table into this SQLite database
    #[arg(long)]
    sqlite: Option<PathBuf>,
    /// TOML file overriding the site's CSS selectors
    #[arg(long)]
    selectors: Option<PathBuf>,
    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

impl HarvestOpts {
    fn settings(&self) -> Result<Settings> {
        let mut s = Settings::load()?;
        if let Some(n) = self.target {
            s.target_record_count = n;
        }
        if let Some(n) = self.max_scrolls {
            s.max_scroll_attempts = n;
        }
        if let Some(w) = self.wait {
            s.content_wait_seconds = w;
        }
        if let Some(j) = self.jitter_min {
            s.jitter_min_seconds = j;
        }
        if let Some(j) = self.jitter_max {
            s.jitter_max_seconds = j;
        }
        if self.no_retry {
            s.retry_failed = false;
        }
        if let Some(ref o) = self.output {
            s.output = o.clone();
        }
        s.validate()?;
        Ok(s)
    }

    fn selectors(&self) -> Result<SiteSelectors> {
        match &self.selectors {
            Some(path) => SiteSelectors::from_file(path),
            None => Ok(SiteSelectors::default()),
        }
    }

    fn progress(&self, target: usize) -> Result<ProgressBar> {
        if self.quiet {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(target as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} listings ({per_sec})")?
                .progress_chars("=> "),
        );
        Ok(pb)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { url, opts } => {
            let settings = opts.settings()?;
            let url = url.unwrap_or_else(|| settings.start_url.clone());
            let page = launch_browser()?;
            harvest(page, &url, &settings, &opts).await
        }
        Commands::Replay {
            snapshots,
            paced,
            opts,
        } => {
            let settings = opts.settings()?;
            let page = SnapshotPage::from_files(&snapshots)?.paced(paced);
            let url = settings.start_url.clone();
            harvest(page, &url, &settings, &opts).await
        }
        Commands::Summary { csv } => {
            let table = sink::read_csv(&csv)?;
            report::summarize(&table).print();
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

#[cfg(feature = "chrome")]
fn launch_browser() -> Result<page::chrome::ChromePage> {
    page::chrome::ChromePage::launch()
}

#[cfg(not(feature = "chrome"))]
fn launch_browser() -> Result<SnapshotPage> {
    anyhow::bail!("this binary was built without browser support; rebuild with `--features chrome`")
}

async fn harvest<P: Page>(page: P, url: &str, settings: &Settings, opts: &HarvestOpts) -> Result<()> {
    let selectors = opts.selectors()?;
    let progress = opts.progress(settings.target_record_count)?;

    info!(
        target_count = settings.target_record_count,
        max_scrolls = settings.max_scroll_attempts,
        "Starting infinite scroll collection"
    );
    let harvest = Controller::new(settings, &selectors)
        .with_progress(progress)
        .harvest(page, url)
        .await;
    harvest.report.print();

    let mut sinks: Vec<Box<dyn Sink>> = vec![Box::new(CsvSink::new(&settings.output))];
    if let Some(ref path) = opts.sqlite {
        sinks.push(Box::new(db::SqliteSink::new(path)));
    }
    if !sink::write_all(&harvest.table, &mut sinks)? {
        println!("\nNo data collected, nothing written.");
        return Ok(());
    }
    println!("\nSaved {} listings to {}", harvest.table.len(), settings.output.display());

    report::summarize(&harvest.table).print();
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
