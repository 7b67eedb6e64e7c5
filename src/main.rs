//! checkfilter - evaluate a scheduled task check against a task snapshot

use anyhow::{bail, Context, Result};
use checkfilter::checks::tasksched::{self, TaskRecord};
use checkfilter::config::FilterConfig;
use checkfilter::filter::Filter;
use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::sync::Arc;

/// checkfilter - Nagios-style scheduled task check
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON snapshot of scheduled tasks
    #[arg(short, long)]
    tasks: Option<PathBuf>,

    /// JSON filter configuration, inherits unset values from the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only objects matching this expression are considered
    #[arg(short, long)]
    filter: Option<String>,

    /// Expression forcing an object to OK
    #[arg(long)]
    ok: Option<String>,

    /// Expression flagging an object as WARNING
    #[arg(short, long)]
    warn: Option<String>,

    /// Expression flagging an object as CRITICAL
    #[arg(long)]
    crit: Option<String>,

    /// Template for the check message
    #[arg(long)]
    top_syntax: Option<String>,

    /// Template for each object
    #[arg(long)]
    detail_syntax: Option<String>,

    /// Status when no task matched
    #[arg(long)]
    empty_state: Option<String>,

    /// Ignore tasks that last ran longer ago than this, e.g. 2d
    #[arg(long)]
    max_age: Option<String>,

    /// Report every matched task with this status
    #[arg(long)]
    severity: Option<String>,

    /// HTML-escape the check message
    #[arg(long)]
    escape_html: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the available attributes and exit
    #[arg(long)]
    list_attributes: bool,
}

impl Args {
    fn filter_config(&self) -> Result<FilterConfig> {
        let file_config = match &self.config {
            Some(path) => FilterConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => FilterConfig::default(),
        };

        // command line first, then the config file, then the check defaults
        let mut config = FilterConfig {
            filter: self.filter.clone(),
            ok: self.ok.clone(),
            warn: self.warn.clone(),
            crit: self.crit.clone(),
            syntax_top: self.top_syntax.clone(),
            syntax_detail: self.detail_syntax.clone(),
            empty_state: self.empty_state.clone(),
            max_age: self.max_age.clone(),
            severity: self.severity.clone(),
            escape_html: self.escape_html.then_some(true),
            debug: self.debug.then_some(true),
            ..Default::default()
        };
        config.apply_parent(&file_config);
        config.apply_parent(&tasksched::default_config());
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let registry = Arc::new(
        tasksched::build_registry::<TaskRecord>().context("Failed to build task registry")?,
    );

    if args.list_attributes {
        for doc in registry.describe() {
            println!("{:<22} {:<20} {}", doc.name, doc.value_type, doc.description);
            if let Some(human) = doc.human {
                println!("{:<22} {:<20} {}", "", "(display)", human);
            }
        }
        return Ok(());
    }

    let Some(tasks_path) = &args.tasks else {
        bail!("--tasks is required unless --list-attributes is given");
    };

    let config = args.filter_config()?;
    let filter = Filter::compile(&config, registry).context("Invalid filter")?;

    let snapshot = std::fs::read_to_string(tasks_path)
        .with_context(|| format!("Failed to read {}", tasks_path.display()))?;
    let tasks = tasksched::parse_snapshot(&snapshot)
        .with_context(|| format!("Invalid task snapshot {}", tasks_path.display()))?;
    log::debug!("Loaded {} tasks from {}", tasks.len(), tasks_path.display());

    let result = filter.scan(&tasks);
    println!("{}", result);

    std::process::exit(result.status.code());
}
