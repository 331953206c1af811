//! ClearLink CLI
//!
//! Cleans tracking parameters from URLs: deterministic rules from the rule
//! store and the AdGuard TrackParamFilter cache, with heuristic probing
//! and self-study as fallback.

mod fetch;
mod store;

use std::time::Duration;

use clap::{Parser, Subcommand};

use cl_core::{FilterEngine, FilterMode, RuleSet, RuleStore};
use cl_lists::{build_document, default_max_age, is_stale, GENERAL_LIST_URL, SPECIFIC_LIST_URL};
use fetch::HttpFetcher;
use store::FileRuleStore;

const DEFAULT_RULES_PATH: &str = "clearlink_rules.json";
const DEFAULT_CACHE_PATH: &str = "adguard_cache.json";

#[derive(Parser)]
#[command(name = "cl-cli")]
#[command(about = "ClearLink URL tracking-parameter cleaner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean tracking parameters from a URL
    Clean {
        /// URL to clean
        url: String,

        /// Filtering strategy: rule, auto, or full. Default runs rules and
        /// falls back to probing when nothing matched
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<FilterMode>,

        /// Disable learning from auto-detection
        #[arg(long)]
        no_study: bool,

        /// Skip merging the AdGuard list cache
        #[arg(long)]
        no_lists: bool,

        /// Use the cached AdGuard lists without refreshing them
        #[arg(long)]
        no_update: bool,

        /// Print a JSON result instead of the cleaned URL
        #[arg(long)]
        json: bool,

        /// Rule store path
        #[arg(long, default_value = DEFAULT_RULES_PATH)]
        rules: String,

        /// AdGuard cache path
        #[arg(long, default_value = DEFAULT_CACHE_PATH)]
        lists_cache: String,

        /// Fetch timeout for probe requests, seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Refresh the cached AdGuard tracking-parameter lists
    Update {
        /// Refresh even if the cache is still fresh
        #[arg(long)]
        force: bool,

        /// AdGuard cache path
        #[arg(long, default_value = DEFAULT_CACHE_PATH)]
        lists_cache: String,

        /// Download timeout, seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Show rule table and cache statistics
    Info {
        /// Rule store path
        #[arg(long, default_value = DEFAULT_RULES_PATH)]
        rules: String,

        /// AdGuard cache path
        #[arg(long, default_value = DEFAULT_CACHE_PATH)]
        lists_cache: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Clean {
            url,
            mode,
            no_study,
            no_lists,
            no_update,
            json,
            rules,
            lists_cache,
            timeout,
        } => cmd_clean(CleanOptions {
            url,
            mode,
            no_study,
            no_lists,
            no_update,
            json,
            rules,
            lists_cache,
            timeout,
        }),
        Commands::Update {
            force,
            lists_cache,
            timeout,
        } => cmd_update(force, &lists_cache, timeout),
        Commands::Info { rules, lists_cache } => cmd_info(&rules, &lists_cache),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct CleanOptions {
    url: String,
    mode: Option<FilterMode>,
    no_study: bool,
    no_lists: bool,
    no_update: bool,
    json: bool,
    rules: String,
    lists_cache: String,
    timeout: u64,
}

fn cmd_clean(opts: CleanOptions) -> Result<(), String> {
    let store = FileRuleStore::new(&opts.rules);
    let fetcher = HttpFetcher::new(Duration::from_secs(opts.timeout))?;

    let mut engine = FilterEngine::new(Box::new(store), Box::new(fetcher));
    engine.set_self_study(!opts.no_study);

    if !opts.no_lists {
        if let Some(external) = load_list_cache(&opts.lists_cache, !opts.no_update, opts.timeout) {
            engine.merge_external(&external);
        }
    }

    let outcome = engine
        .filter(&opts.url, opts.mode)
        .map_err(|e| e.to_string())?;

    if opts.json {
        let json = serde_json::to_string_pretty(&outcome)
            .map_err(|e| format!("Failed to serialize result: {}", e))?;
        println!("{}", json);
    } else {
        println!("{}", outcome.cleaned);
    }
    Ok(())
}

fn cmd_update(force: bool, cache_path: &str, timeout: u64) -> Result<(), String> {
    let now = chrono::Local::now().naive_local();
    let cached = read_rule_doc(cache_path);

    let needs_refresh = force
        || match &cached {
            Some(doc) => is_stale(doc, now, default_max_age()),
            None => true,
        };

    if !needs_refresh {
        println!("Cache '{}' is fresh, nothing to do", cache_path);
        return Ok(());
    }

    let doc = refresh_list_cache(cache_path, timeout)?;

    println!("Updated '{}'", cache_path);
    println!("  Host rules:      {}", doc.hosts.len());
    println!("  Default params:  {}", doc.default.len());
    println!(
        "  Last updated:    {}",
        doc.last_updated.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn cmd_info(rules_path: &str, cache_path: &str) -> Result<(), String> {
    let rules = RuleSet::load_or_default(&FileRuleStore::new(rules_path));
    println!("Rule store: {}", rules_path);
    println!("  Host rules:      {}", rules.hosts.len());
    println!("  Default params:  {}", rules.default.len());

    println!();
    println!("List cache: {}", cache_path);
    match read_rule_doc(cache_path) {
        Some(cache) => {
            let now = chrono::Local::now().naive_local();
            println!("  Host rules:      {}", cache.hosts.len());
            println!("  Default params:  {}", cache.default.len());
            println!(
                "  Last updated:    {}",
                cache.last_updated.as_deref().unwrap_or("-")
            );
            println!(
                "  Status:          {}",
                if is_stale(&cache, now, default_max_age()) {
                    "stale"
                } else {
                    "fresh"
                }
            );
        }
        None => println!("  (not present)"),
    }
    Ok(())
}

/// Load the list cache, refreshing it first when allowed and due. Refresh
/// failures fall back to whatever cached copy exists.
fn load_list_cache(cache_path: &str, allow_update: bool, timeout: u64) -> Option<RuleSet> {
    let cached = read_rule_doc(cache_path);
    if !allow_update {
        return cached;
    }

    let now = chrono::Local::now().naive_local();
    let needs_refresh = match &cached {
        Some(doc) => is_stale(doc, now, default_max_age()),
        None => true,
    };
    if !needs_refresh {
        return cached;
    }

    match refresh_list_cache(cache_path, timeout) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::warn!("list refresh failed, using cached copy: {}", e);
            cached
        }
    }
}

/// Download both TrackParamFilter sections, parse, and write the cache.
fn refresh_list_cache(cache_path: &str, timeout: u64) -> Result<RuleSet, String> {
    let fetcher = HttpFetcher::new(Duration::from_secs(timeout))?;
    let specific = fetcher.fetch_text(SPECIFIC_LIST_URL)?;
    let general = fetcher.fetch_text(GENERAL_LIST_URL)?;

    let doc = build_document(&specific, &general, chrono::Local::now().naive_local());

    let bytes = doc
        .to_vec()
        .map_err(|e| format!("Failed to serialize cache: {}", e))?;
    FileRuleStore::new(cache_path)
        .save(&bytes)
        .map_err(|e| e.to_string())?;

    Ok(doc)
}

fn read_rule_doc(path: &str) -> Option<RuleSet> {
    match FileRuleStore::new(path).load() {
        Ok(Some(bytes)) => match RuleSet::from_slice(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                log::warn!("unreadable document '{}': {}", path, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("unreadable document '{}': {}", path, e);
            None
        }
    }
}

fn parse_mode(value: &str) -> Result<FilterMode, String> {
    match value {
        "rule" => Ok(FilterMode::Rule),
        "auto" => Ok(FilterMode::Auto),
        "full" => Ok(FilterMode::Full),
        other => Err(format!(
            "unknown mode '{}', expected rule, auto, or full",
            other
        )),
    }
}
