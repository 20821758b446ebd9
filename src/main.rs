//! CLI entry point for `rr2opml`.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use rr2opml::config::{self, Config};
use rr2opml::export::opml::write_opml;
use rr2opml::mailbox::session::ImapMailbox;
use rr2opml::mailbox::NotificationFilter;
use rr2opml::resolver::http::HttpLinkResolver;
use rr2opml::resolver::patterns::SiteProfile;
use rr2opml::resolver::StoryResolver;
use rr2opml::store::stories::StoryStore;
use rr2opml::sync::sync_once;
use rr2opml::watch::{SystemClock, WatchEngine, WatchSettings};

#[derive(Parser)]
#[command(
    name = "rr2opml",
    version,
    about = "Keep an OPML feed list of the stories announced in your mailbox"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $RR2OPML_CONFIG, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configuration file if it does not exist
    Touch,
    /// Absorb unread notifications once and rewrite the subscription list
    Update,
    /// Watch the mailbox and keep the subscription list current
    Serve,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path()
            .context("could not determine a configuration directory; pass --config")?,
    };

    if let Commands::Touch = cli.command {
        return cmd_touch(&config_path);
    }

    config::ensure_config(&config_path)?;
    let config = config::load_config(&config_path)?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    match cli.command {
        Commands::Touch => Ok(()),
        Commands::Update => cmd_update(&config),
        Commands::Serve => cmd_serve(&config),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "rr2opml.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_touch(path: &Path) -> anyhow::Result<()> {
    if config::ensure_config(path)? {
        println!("  Created {}", path.display());
    } else {
        println!("  {} already exists", path.display());
    }
    Ok(())
}

/// Everything a sync needs besides the mailbox.
struct Pipeline {
    filter: NotificationFilter,
    resolver: StoryResolver<HttpLinkResolver>,
    store: StoryStore,
}

impl Pipeline {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let site = SiteProfile::from_config(&config.site)?;
        let links = HttpLinkResolver::from_config(&config.site)?;
        let store = StoryStore::open(&config.storage.database)
            .with_context(|| format!("could not open {}", config.storage.database))?;
        Ok(Self {
            filter: NotificationFilter::from_config(&config.site),
            resolver: StoryResolver::new(site, links),
            store,
        })
    }
}

/// One sync pass, then an unconditional rewrite of the subscription list.
fn cmd_update(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::open(config)?;
    let mut mailbox = ImapMailbox::connect(&config.mail)?;

    let report = sync_once(
        &mut mailbox,
        &pipeline.filter,
        &pipeline.resolver,
        &pipeline.store,
    );
    mailbox.logout();
    let report = report?;

    let stories = pipeline.store.all()?;
    write_opml(&stories, &config.outline_path())?;
    println!(
        "  {} new, {} total, written to {}",
        report.inserted,
        stories.len(),
        config.outline_path().display()
    );
    Ok(())
}

/// Run the watch engine until SIGINT or SIGTERM, or until the session drops.
fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::open(config)?;
    let mailbox = ImapMailbox::connect(&config.mail)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("could not install signal handler")?;
    }

    let mut engine = WatchEngine::new(
        mailbox,
        pipeline.filter,
        pipeline.resolver,
        pipeline.store,
        config.outline_path(),
        WatchSettings::from_config(&config.watch),
        SystemClock,
    );
    if let Err(e) = engine.run(&shutdown) {
        // The session is gone; there is nothing to log out of.
        return Err(e).context("lost connection to the mail server");
    }

    info!("Shutting down");
    engine.into_mailbox().logout();
    Ok(())
}
