//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use coursewatch_canvas::CanvasClient;
use coursewatch_core::pipeline::{GeneratedGuide, ProgressReporter, RunSummary, Services};
use coursewatch_core::{
    CanvasCurator, CompletionClient, Curator, Listener, TelegramNotifier, collector, dedup,
    digest, importance, temporal,
};
use coursewatch_shared::{
    AppConfig, RunConfig, expand_home, init_config, load_config, parse_source_instant,
    resolve_completion, resolve_instances, resolve_telegram,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CourseWatch: upcoming coursework, major exams, and study guides.
#[derive(Parser)]
#[command(
    name = "coursewatch",
    version,
    about = "Daily Canvas digest with pre-exam study guides, delivered to Telegram.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full daily pipeline and send notifications.
    Run,

    /// Print the classified urgency window without notifying anyone.
    Scan,

    /// Answer chat commands from the configured Telegram chat until Ctrl-C.
    Listen,

    /// Build a study guide for the first assignment matching a name.
    Guide {
        /// Case-insensitive substring of the assignment name.
        query: String,

        /// Only write the guide to disk; do not upload it.
        #[arg(long)]
        no_upload: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coursewatch=info",
        1 => "coursewatch=debug",
        _ => "coursewatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run => cmd_run().await,
        Command::Scan => cmd_scan().await,
        Command::Listen => cmd_listen().await,
        Command::Guide { query, no_upload } => cmd_guide(&query, no_upload).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn now_in(config: &RunConfig) -> DateTime<Tz> {
    Utc::now().with_timezone(&config.zone)
}

fn canvas_clients(config: &AppConfig) -> Result<Vec<CanvasClient>> {
    let clients = resolve_instances(config)?
        .into_iter()
        .map(CanvasClient::new)
        .collect::<coursewatch_shared::Result<Vec<_>>>()?;
    Ok(clients)
}

fn build_services(config: &AppConfig, notifier: TelegramNotifier) -> Result<Services> {
    Ok(Services {
        clients: canvas_clients(config)?,
        completion: CompletionClient::new(resolve_completion(config)?)?,
        notifier,
        export_dir: expand_home(&config.export.output_dir),
        item_cards: config.run.item_cards,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run() -> Result<()> {
    let config = load_config()?;
    let notifier = TelegramNotifier::new(resolve_telegram(&config)?)?;

    let outcome = daily_run(&config, notifier.clone()).await;
    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "daily run failed");
            notifier
                .send_message(&digest::failure_message(&e.to_string()))
                .await;
            return Err(e);
        }
    };

    println!();
    println!("  Daily run complete.");
    println!("  Due soon:  {}", summary.classified);
    println!("  Majors:    {}", summary.majors);
    println!("  Guides:    {}", summary.guides.len());
    for guide in &summary.guides {
        println!("    - {}", guide.path.display());
    }
    println!(
        "  Digest:    {}",
        if summary.digest_delivered { "delivered" } else { "NOT delivered" }
    );
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// The daily pipeline under the configured wall-clock cap.
async fn daily_run(config: &AppConfig, notifier: TelegramNotifier) -> Result<RunSummary> {
    let services = build_services(config, notifier)?;
    let run_config = RunConfig::default();
    let cap = Duration::from_secs(config.run.timeout_secs);
    let reporter = CliProgress::new();
    let now = now_in(&run_config);

    info!(instances = services.clients.len(), timeout_secs = cap.as_secs(), "starting daily run");

    let outcome =
        coursewatch_core::run_daily_capped(&services, now, &run_config, &reporter, cap).await;
    if outcome.is_err() {
        reporter.finish();
    }
    Ok(outcome?)
}

async fn cmd_scan() -> Result<()> {
    let config = load_config()?;
    let clients = canvas_clients(&config)?;
    let run_config = RunConfig::default();
    let now = now_in(&run_config);

    let reporter = CliProgress::new();
    reporter.phase("Collecting work items");
    let sources = collector::collect_all(&clients, now, &run_config).await;
    let items = temporal::classify(dedup::merge(sources), now, &run_config);
    reporter.finish();

    if items.is_empty() {
        println!("Nothing due in the current window.");
        return Ok(());
    }

    let today = now.date_naive();
    println!();
    for item in &items {
        let priority = importance::priority(item, today, &run_config);
        let due = item
            .due_at_local
            .map(|d| d.format("%a %b %d %I:%M %p").to_string())
            .unwrap_or_default();
        println!(
            "  {:<13} {due}  {} ({}, {} pts)",
            priority.label(),
            item.name,
            item.container_name,
            item.points
        );
    }
    println!();
    println!("  {} item(s) due by {}", items.len(), (now + run_config.window).format("%a %b %d %I:%M %p"));
    println!();

    Ok(())
}

async fn cmd_listen() -> Result<()> {
    let config = load_config()?;
    let notifier = TelegramNotifier::new(resolve_telegram(&config)?)?;
    let services = build_services(&config, notifier)?;
    let cap = Duration::from_secs(config.run.timeout_secs);
    let listener = Listener::new(services, RunConfig::default(), cap);

    println!("Listening for commands. Send TEST to run the pipeline; Ctrl-C to stop.");
    tokio::select! {
        () = listener.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutting down listener");
        }
    }
    Ok(())
}

async fn cmd_guide(query: &str, no_upload: bool) -> Result<()> {
    let config = load_config()?;
    let notifier = TelegramNotifier::new(resolve_telegram(&config)?)?;
    let services = build_services(&config, notifier)?;
    let run_config = RunConfig::default();
    let now = now_in(&run_config);

    let reporter = CliProgress::new();
    reporter.phase(&format!("Searching for '{query}'"));
    let found = collector::search_assignments(&services.clients, query, now, &run_config).await;
    let Some(item) = found.into_iter().next() else {
        reporter.finish();
        return Err(eyre!("no assignment matching '{query}' in any active course"));
    };

    let cutoff = item
        .due_at
        .as_deref()
        .and_then(|raw| parse_source_instant(raw).ok())
        .unwrap_or_else(|| now.with_timezone(&Utc));

    info!(exam = %item.name, course = %item.container_name, %cutoff, "building study guide");

    reporter.phase(&format!("Curating material for {}", item.name));
    let curator = CanvasCurator::new(&services.clients, now, &run_config);
    let curation = curator.curate(&item, cutoff).await;

    reporter.phase("Generating study guide");
    let guide = coursewatch_core::build_guide(&services, &curation, now).await;
    reporter.finish();

    let Some(guide) = guide else {
        println!("No study guide for '{}': no prior content available or generation failed.", item.name);
        return Ok(());
    };

    if !no_upload {
        let caption = digest::study_guide_caption(&guide.exam, guide.materials);
        if !services.notifier.send_document(&guide.path, &caption).await {
            println!("Upload failed; the guide is still on disk.");
        }
    }

    println!();
    println!("  Study guide ready!");
    println!("  Exam:      {}", guide.exam);
    println!("  Course:    {}", item.container_name);
    println!("  Materials: {}", guide.materials);
    println!("  Path:      {}", guide.path.display());
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn guide_written(&self, guide: &GeneratedGuide) {
        self.spinner.println(format!("  wrote {}", guide.path.display()));
    }

    fn done(&self, _summary: &RunSummary) {
        self.finish();
    }
}
