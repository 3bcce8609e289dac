use clap::{Arg, Command};
use tracing::info;

use quomodo::cache::ResponseCache;
use quomodo::config::Config;
use quomodo::history::CommandHistory;
use quomodo::router::Router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("quo")
        .about("Ask for terminal commands in plain language, review them, run them safely")
        .long_about(
            "quo sends your task to an LLM, shows the proposed commands, lets you tab \
             through and edit their parameters, and gates dangerous commands behind an \
             explicit confirmation before anything runs",
        )
        .arg(
            Arg::new("query")
                .help("The task to accomplish")
                .num_args(1..),
        )
        .arg(
            Arg::new("context")
                .long("context")
                .help("Additional context for the query")
                .value_name("TEXT")
                .num_args(1),
        )
        .arg(
            Arg::new("set-api-key")
                .long("set-api-key")
                .help("Set the OpenRouter API key")
                .value_name("API_KEY")
                .num_args(1),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Show configuration information")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-confirm")
                .long("no-confirm")
                .help("Skip confirmation for dangerous commands")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Show commands but do not execute them")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cache-stats")
                .long("cache-stats")
                .help("Show response cache statistics")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("clear-cache")
                .long("clear-cache")
                .help("Remove all cached responses")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .help("Show recent command history")
                .value_name("N")
                .num_args(0..=1)
                .default_missing_value("25"),
        )
        .get_matches();

    // Handle configuration commands
    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        let mut config = Config::load()?;
        config.set_api_key(api_key.clone())?;
        println!("✅ API key saved successfully");
        return Ok(());
    }

    if matches.get_flag("config") {
        Config::show_config_info()?;
        return Ok(());
    }

    // Maintenance commands; these need no provider and no API key
    if matches.get_flag("clear-cache") {
        let cache = ResponseCache::open(Config::get_config_dir()?)?;
        println!("Removed {} cached responses", cache.clear());
        return Ok(());
    }

    if matches.get_flag("cache-stats") {
        let cache = ResponseCache::open(Config::get_config_dir()?)?;
        let swept = cache.invalidate_expired();
        let stats = cache.stats();
        println!("Cache entries: {}", stats.size);
        println!("Expired entries removed: {swept}");
        match stats.oldest_entry_age_secs {
            Some(age) => println!("Oldest entry age: {age}s"),
            None => println!("Oldest entry age: n/a"),
        }
        return Ok(());
    }

    if let Some(limit) = matches.get_one::<String>("history") {
        let limit: usize = limit.parse().unwrap_or(25);
        let history = CommandHistory::open(Config::get_config_dir()?)?;
        let entries = history.recent(limit)?;
        if entries.is_empty() {
            println!("No history entries found");
            return Ok(());
        }
        for entry in entries {
            let status = if entry.success { "✓" } else { "✗" };
            println!("{status} {}", entry.command);
            println!("    {}", entry.query);
        }
        return Ok(());
    }

    // Handle the query itself
    let mut config = Config::load()?;
    if matches.get_flag("no-confirm") {
        config.require_confirmation = false;
    }
    let verbose = matches.get_flag("verbose");
    let dry_run = matches.get_flag("dry-run");
    let query = matches
        .get_many::<String>("query")
        .unwrap_or_default()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ");

    if query.trim().is_empty() {
        eprintln!("No query provided. Use 'quo --help' for usage information.");
        return Ok(());
    }

    info!("Processing query: {}", query);

    let router = Router::new(config, verbose)?;
    let context = matches.get_one::<String>("context").map(String::as_str);
    router.process_query(&query, context, dry_run).await?;

    Ok(())
}
