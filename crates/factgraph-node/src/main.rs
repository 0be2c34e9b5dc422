//! factgraph-node — the permissioned fact-store CLI.
//!
//! No P2P layer and no JSON-RPC server: this is a single-process,
//! single-writer store. `submit`/`query`/`sparql`/`validators`
//! all talk to an in-process [`facade::FactGraphCore`] opened against a
//! local data directory.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use factgraph_core::{FactGraphConfig, ValidatorId};
use factgraph_crypto::{transaction_hash, KeyPair};
use factgraph_node::FactGraphCore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "factgraph-node", version, about = "Permissioned RDF fact store")]
struct Args {
    /// Directory for the durable mirror and validator roster.
    #[arg(long, default_value = "~/.factgraph/data")]
    data_dir: PathBuf,

    /// This process's node id, used only for logging.
    #[arg(long, default_value = "node")]
    node_id: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a Dilithium2 keypair and write `<id>.pub` / `<id>.sec`.
    Keygen {
        /// Validator id to name the files after.
        id: String,
    },
    /// Sign and append one fact, synchronously.
    Submit {
        subject: String,
        predicate: String,
        object: String,
        /// Validator id submitting this fact.
        #[arg(long)]
        validator: String,
        /// Path to that validator's `.sec` secret key file.
        #[arg(long)]
        secret_key: PathBuf,
    },
    /// Run a raw triple-pattern scan: `s|p|o` with `*` as wildcard.
    Query {
        subject: String,
        predicate: String,
        object: String,
    },
    /// Run a SPARQL-subset query string.
    Sparql {
        text: String,
    },
    /// List the current validator roster.
    Validators,
    /// Print cache and queue status as JSON.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,factgraph=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let data_dir = expand_tilde(&args.data_dir);

    if let Command::Keygen { id } = &args.command {
        return run_keygen(&data_dir, id);
    }

    std::fs::create_dir_all(data_dir.join("validators")).with_context(|| format!("creating validator dir under {}", data_dir.display()))?;
    std::fs::create_dir_all(data_dir.join("db")).with_context(|| format!("creating db dir under {}", data_dir.display()))?;

    let config = FactGraphConfig::new(args.node_id.clone(), data_dir.join("db"), data_dir.join("validators"));
    let core = FactGraphCore::open(&config).context("opening FactGraphCore")?;
    info!(node_id = %args.node_id, "factgraph-node ready");

    match args.command {
        Command::Keygen { .. } => unreachable!("handled above"),
        Command::Submit { subject, predicate, object, validator, secret_key } => {
            run_submit(&core, &subject, &predicate, &object, &validator, &secret_key)?;
        }
        Command::Query { subject, predicate, object } => run_query(&core, &subject, &predicate, &object)?,
        Command::Sparql { text } => run_sparql(&core, &text)?,
        Command::Validators => run_validators(&core),
        Command::Status => run_status(&core)?,
    }

    Ok(())
}

fn run_keygen(data_dir: &std::path::Path, id: &str) -> anyhow::Result<()> {
    let validators_dir = data_dir.join("validators");
    std::fs::create_dir_all(&validators_dir)?;
    let kp = KeyPair::generate();
    std::fs::write(validators_dir.join(format!("{id}.pub")), &kp.public_key)?;
    std::fs::write(validators_dir.join(format!("{id}.sec")), kp.secret_key_bytes())?;
    println!("wrote {id}.pub and {id}.sec under {}", validators_dir.display());
    Ok(())
}

fn run_submit(
    core: &FactGraphCore,
    subject: &str,
    predicate: &str,
    object: &str,
    validator: &str,
    secret_key_path: &std::path::Path,
) -> anyhow::Result<()> {
    let secret_key = std::fs::read(secret_key_path).with_context(|| format!("reading {}", secret_key_path.display()))?;
    let validator_id = ValidatorId::from(validator);
    let timestamp = chrono::Utc::now().timestamp();
    let hash = transaction_hash(subject, predicate, object, validator_id.as_str(), timestamp);
    let signature = factgraph_crypto::dilithium::sign(&secret_key, &hash).context("signing transaction hash")?;

    let id = core
        .add_transaction(subject, predicate, object, &validator_id, &signature, timestamp)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", id);
    Ok(())
}

fn run_query(core: &FactGraphCore, subject: &str, predicate: &str, object: &str) -> anyhow::Result<()> {
    let pattern = factgraph_core::TriplePattern {
        subject: none_if_wildcard(subject),
        predicate: none_if_wildcard(predicate),
        object: none_if_wildcard(object),
    };
    let text = format!(
        "SELECT ?s ?p ?o WHERE {{ {} {} {} }}",
        term_or_var(&pattern.subject, "s"),
        term_or_var(&pattern.predicate, "p"),
        term_or_var(&pattern.object, "o"),
    );
    run_sparql(core, &text)
}

fn none_if_wildcard(s: &str) -> Option<String> {
    if s == "*" {
        None
    } else {
        Some(s.to_string())
    }
}

fn term_or_var(value: &Option<String>, var: &str) -> String {
    match value {
        Some(v) => format!("<{v}>"),
        None => format!("?{var}"),
    }
}

fn run_sparql(core: &FactGraphCore, text: &str) -> anyhow::Result<()> {
    let rows = core.execute_sparql(text).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn run_validators(core: &FactGraphCore) {
    for id in core.get_validators() {
        println!("{id}");
    }
}

fn run_status(core: &FactGraphCore) -> anyhow::Result<()> {
    let cache = core.get_cache_metrics();
    let queue = core.get_queue_status();
    let performance = core.get_performance_metrics();
    let report = serde_json::json!({
        "node_count": core.node_count(),
        "cache": cache,
        "queue": queue,
        "validator_performance": performance.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<std::collections::HashMap<_, _>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
