//! spp-backtest CLI
//!
//! Usage:
//!   spp-backtest node AEEC
//!   spp-backtest all
//!   spp-backtest auto --from-history
//!   spp-backtest nodes

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spp_backtest::config::AppConfig;
use spp_backtest::runner::{MedianSource, Runner};

#[derive(Parser)]
#[command(name = "spp-backtest")]
#[command(about = "Backtest time-of-week virtual bids against settlement point prices", long_about = None)]
struct Cli {
    /// Extra config file layered over config/default and config/local
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one node from the rule table
    Node {
        /// Settlement point name, e.g. HRFDWIND_ALL
        name: String,
    },

    /// Evaluate every node in the rule table
    All,

    /// Derive rules from median returns and evaluate every node in the price table
    Auto {
        /// Compute medians from the price table instead of the precomputed file
        #[arg(long, default_value_t = false)]
        from_history: bool,
    },

    /// List nodes present in the price table
    Nodes,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), config = %config.digest(), "Starting spp-backtest");

    if config.uses_any_combinator() {
        info!("Rule lists combine with OR (strategy.rule_combinator = any)");
    }

    let runner = Runner::new(config)?;
    match cli.cmd {
        Commands::Node { name } => {
            runner.run_node(&name)?;
        }
        Commands::All => {
            let results = runner.run_all()?;
            info!(nodes = results.len(), "Done");
        }
        Commands::Auto { from_history } => {
            let source = if from_history {
                MedianSource::History
            } else {
                MedianSource::File
            };
            let results = runner.run_auto(source)?;
            info!(nodes = results.len(), "Done");
        }
        Commands::Nodes => {
            for node in runner.list_nodes()? {
                println!("{}", node);
            }
        }
    }

    Ok(())
}
