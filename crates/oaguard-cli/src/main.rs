use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oaguard_core::{AppConfig, KvStore, PageMetadata};
use oaguard_verify::{
    AdmissionController, DatasetSource, Doi, OaResolver, OaStatusCache, PageSignals, extract_doi,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "oaguard",
    about = "Copyright/open-access admission control for scholarly pages",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting OAGUARD_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the admission decision for a URL.
    Check {
        url: String,

        /// DOI already known for the page, skipping extraction.
        #[arg(long)]
        doi: Option<String>,

        /// Treat the URL as a PDF tab.
        #[arg(long)]
        pdf: bool,
    },

    /// Extract and normalize a DOI from a URL or free text.
    Doi { input: String },

    /// Cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Domain dataset management.
    Domains {
        #[command(subcommand)]
        action: DomainsAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached open-access record.
    Clear,
    /// Show cache entry count and location.
    Stats,
}

#[derive(Subcommand)]
enum DomainsAction {
    /// Re-read the domain dataset from disk (or the bundled copy).
    Reload,
    /// Show allowlist/blocklist/conditional entry counts.
    Stats,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let start = Instant::now();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("OAGUARD_JSON").as_deref() == Ok("1");

    let config = AppConfig::load()?;
    let controller = build_controller(&config)?;

    match cli.command {
        Commands::Check { url, doi, pdf } => {
            let mut page = PageMetadata::new(&url, host_of(&url));
            if pdf {
                page = page.pdf();
            }
            if let Some(doi) = doi {
                page = page.with_doi(doi);
            }

            let decision = controller.decide(&page).await;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": decision,
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                let verdict = if decision.allowed { "ALLOW" } else { "BLOCK" };
                println!(
                    "{verdict} [{}] {}",
                    decision.category.as_str(),
                    decision.reason
                );
                if let Some(warning) = &decision.warning {
                    println!("  warning: {warning}");
                }
                if let Some(suggestion) = &decision.suggestion {
                    println!("  hint: {suggestion}");
                }
                if let Some(oa_url) = &decision.oa_url {
                    println!("  open-access copy: {oa_url}");
                }
            }
            if !decision.allowed {
                std::process::exit(3);
            }
        }

        Commands::Doi { input } => {
            let doi = Doi::parse(&input).ok().or_else(|| {
                let mut signals = PageSignals::for_url(&input);
                signals.labeled_text.push(input.clone());
                extract_doi(&signals)
            });
            let dur = start.elapsed().as_millis();

            match doi {
                Some(doi) => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "doi": doi.normalized, "url": doi.url },
                            "meta": { "duration_ms": dur }
                        }))?;
                    } else {
                        println!("{}", doi.normalized);
                    }
                }
                None => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "error",
                            "error": "no_doi",
                            "message": format!("No DOI found in: {input}"),
                            "meta": { "duration_ms": dur }
                        }))?;
                    } else {
                        eprintln!("No DOI found in: {input}");
                    }
                    std::process::exit(2);
                }
            }
        }

        Commands::Cache { action } => match action {
            CacheAction::Clear => {
                let removed = controller.resolver().cache().clear_all()?;
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "removed": removed },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("Removed {removed} cached record(s).");
                }
            }
            CacheAction::Stats => {
                let entries = controller.resolver().cache().len()?;
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": {
                            "entries": entries,
                            "db_path": config.cache.db_path,
                            "ttl_days": config.cache.ttl_days
                        },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("Cache: {entries} record(s) in {}", config.cache.db_path);
                    println!("TTL:   {} day(s)", config.cache.ttl_days);
                }
            }
        },

        Commands::Domains { action } => match action {
            DomainsAction::Reload => {
                let ok = controller.reload_domains().await;
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "reloaded": ok },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else if ok {
                    println!("Domain dataset reloaded.");
                } else {
                    eprintln!("Domain dataset reload failed; classifier is empty.");
                    std::process::exit(1);
                }
            }
            DomainsAction::Stats => {
                let (whitelist, blacklist, conditional) = controller.domain_counts().await;
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": {
                            "whitelist": whitelist,
                            "blacklist": blacklist,
                            "conditional": conditional
                        },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("Domain dataset:");
                    println!("  allowlist:   {whitelist}");
                    println!("  blocklist:   {blacklist}");
                    println!("  conditional: {conditional}");
                }
            }
        },
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn build_controller(config: &AppConfig) -> Result<Arc<AdmissionController>> {
    let store = KvStore::open(&PathBuf::from(&config.cache.db_path))?;
    let cache = Arc::new(OaStatusCache::new(
        store,
        Duration::from_secs(config.cache.ttl_days * 24 * 60 * 60),
    ));
    let resolver = Arc::new(OaResolver::with_config(
        &config.registry.base_url,
        config.registry.contact_email.clone(),
        Duration::from_secs(config.registry.timeout_secs),
        cache,
    ));
    let dataset = match &config.domains.dataset_path {
        Some(path) => DatasetSource::File(PathBuf::from(path)),
        None => DatasetSource::Bundled,
    };
    Ok(Arc::new(AdmissionController::new(dataset, resolver)))
}

/// Hostname of a URL, lowercased, without scheme, credentials, or port.
fn host_of(url: &str) -> String {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host).to_lowercase()
}
