use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use pearl_config::{ConfigLoader, PearlConfig};
use pearl_core::PearlError;
use pearl_memory::seed::{seed_triage_rules, seed_vision_rules};
use pearl_runtime::PearlRuntime;

mod serve;

/// Pearl: clinical triage memory that learns from clinician feedback
#[derive(Parser)]
#[command(name = "pearl", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to pearl.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Listen address override (e.g. 0.0.0.0:8000)
        #[arg(long)]
        listen: Option<String>,
    },
    /// Load the built-in rule sets into memory (safe to re-run)
    Seed {
        #[arg(value_enum, default_value = "all")]
        target: SeedTarget,
    },
    /// Print the memory context a complaint would retrieve
    Recall {
        /// Free-text complaint or patient summary
        text: String,
    },
    /// Show entry counts per collection
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SeedTarget {
    /// Triage rules only
    Rules,
    /// Radiology rules only
    Vision,
    /// Both rule sets
    All,
}

impl Cli {
    pub async fn run(self) -> pearl_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
        match config.logging.format.as_str() {
            "json" => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(true)
                .init(),
            "compact" => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .with_target(false)
                .init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init(),
        }

        match self.command {
            Commands::Serve { listen } => serve::cmd_serve(config, listen, config_loader).await,
            Commands::Seed { target } => Self::cmd_seed(&config, target).await,
            Commands::Recall { text } => Self::cmd_recall(&config, &text).await,
            Commands::Stats { json } => Self::cmd_stats(&config, json),
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Version => Self::cmd_version(),
        }
    }

    async fn cmd_seed(config: &PearlConfig, target: SeedTarget) -> pearl_core::Result<()> {
        let runtime = PearlRuntime::from_config(config)?;
        let bank = &runtime.bank;
        let embedder = runtime.embedder.as_ref();

        if matches!(target, SeedTarget::Rules | SeedTarget::All) {
            let report = seed_triage_rules(bank.rules.as_ref(), embedder).await?;
            println!(
                "✅ Triage rules: {} added, {} already present",
                report.added, report.skipped
            );
        }
        if matches!(target, SeedTarget::Vision | SeedTarget::All) {
            let report = seed_vision_rules(bank.visual.as_ref(), embedder).await?;
            println!(
                "✅ Radiology rules: {} added, {} already present",
                report.added, report.skipped
            );
        }
        Ok(())
    }

    async fn cmd_recall(config: &PearlConfig, text: &str) -> pearl_core::Result<()> {
        let runtime = PearlRuntime::from_config(config)?;
        println!("{}", runtime.rules.recall(text).await.render());
        Ok(())
    }

    fn cmd_stats(config: &PearlConfig, json: bool) -> pearl_core::Result<()> {
        let runtime = PearlRuntime::from_config(config)?;
        let stats = runtime.stats()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("📚 Memory ({})", stats.backend);
            println!("   Triage pearls:       {}", stats.triage_pearls);
            println!("   Gold-standard cases: {}", stats.gold_standard_cases);
            println!("   Visual corrections:  {}", stats.visual_corrections);
        }
        Ok(())
    }

    fn cmd_config(config: &PearlConfig, json: bool) -> pearl_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| PearlError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_version() -> pearl_core::Result<()> {
        println!("🦪 Pearl v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}
