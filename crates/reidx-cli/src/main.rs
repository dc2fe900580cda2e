//! 🚀 reidx: the front door, the bouncer, the maitre d' of index migrations.
//!
//! 🎬 *[narrator voice]* "It all started with a mapping that was wrong in production..."
//! 📦 This binary is the thin wrapper that parses flags, loads config, sets up logging,
//! and then lets the library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reidx::app_config::{ConfigOverrides, load_config};
use reidx::{MigrationOutcome, confirm};

/// 🚚 Copy an Elasticsearch index into a new one (usually with a new mapping) and
/// move its alias over, so readers never see a gap.
#[derive(Debug, Parser)]
#[command(name = "reidx", version)]
struct Cli {
    /// Source cluster URL
    #[arg(long = "from-host", value_name = "URL")]
    from_host: Option<String>,

    /// Index or alias to copy from
    #[arg(long, value_name = "NAME")]
    index: Option<String>,

    /// Target cluster URL
    #[arg(long = "to-host", value_name = "URL")]
    to_host: Option<String>,

    /// Name of the new index (default: <index>-<random suffix>)
    #[arg(long = "new-index", value_name = "NAME")]
    new_index: Option<String>,

    /// JSON file with the mapping for the new index
    #[arg(long = "new-mapping", value_name = "FILE")]
    new_mapping: Option<PathBuf>,

    /// Documents per scroll page and bulk request (0 or less lets the cluster choose)
    #[arg(long = "bulk-size", value_name = "N", allow_negative_numbers = true)]
    bulk_size: Option<i64>,

    /// TOML config file, read before env vars (REIDX_*) and flags
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            from_host: self.from_host.clone(),
            index: self.index.clone(),
            to_host: self.to_host.clone(),
            new_index: self.new_index.clone(),
            new_mapping: self.new_mapping.clone(),
            bulk_size: self.bulk_size,
        }
    }
}

/// 🕵️ Sniff an error chain like a truffle pig hunting for connection problems.
fn smells_like_connection_trouble(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let cause_str = cause.to_string();
        cause_str.contains("error sending request")
            || cause_str.contains("connection refused")
            || cause_str.contains("Connection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
    })
}

async fn run(cli: Cli) -> Result<()> {
    // 🔒 validate the config file exists before we get too emotionally attached
    if let Some(ref path) = cli.config {
        let exists = path.try_exists().with_context(|| {
            format!(
                "💀 Couldn't check whether the configuration file exists. If it's a relative path, \
                 try an absolute one. Was checking here: '{}'",
                path.display()
            )
        })?;
        anyhow::ensure!(
            exists,
            "💀 Configuration file '{}' does not exist. Double check the path, or pwd/cwd.",
            path.display()
        );
    }

    let overrides = cli.overrides();
    let app_config = load_config(cli.config.as_deref(), overrides)
        .context("💀 In reidx, main, we couldn't load the configuration. Take a look at the file, env vars and flags")?;

    let mut prompt = confirm::terminal();
    let outcome = reidx::run(app_config, &mut prompt)
        .await
        .context("💀 Migration aborted")?;

    match outcome {
        MigrationOutcome::Completed(report) => {
            println!("{}", report.summary());
            if let Some(table) = report.failures_table() {
                println!("{}", table);
            }
        }
        MigrationOutcome::Declined { target_index } => {
            info!("👋 Nothing to do, <{}> was left as it was", target_index);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // 📡 info by default, RUST_LOG for everything else
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }

        if smells_like_connection_trouble(&err) {
            error!(
                "🔧 hint: looks like a cluster isn't reachable. \
                Double-check that Elasticsearch is actually running at the URLs you gave. \
                If you're using Docker, try `docker ps` to see what's up, or \
                `docker compose up -d` to resurrect it. ☕"
            );
        }

        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn the_one_where_the_flags_are_wired_correctly() {
        Cli::command().debug_assert();
    }

    #[test]
    fn the_one_where_every_flag_lands_in_the_overrides() {
        let cli = Cli::parse_from([
            "reidx",
            "--from-host",
            "http://old:9200",
            "--index",
            "orders-live",
            "--to-host",
            "http://new:9200",
            "--new-index",
            "orders-v2",
            "--new-mapping",
            "mapping.json",
            "--bulk-size",
            "-1",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.from_host.as_deref(), Some("http://old:9200"));
        assert_eq!(overrides.index.as_deref(), Some("orders-live"));
        assert_eq!(overrides.to_host.as_deref(), Some("http://new:9200"));
        assert_eq!(overrides.new_index.as_deref(), Some("orders-v2"));
        assert_eq!(overrides.new_mapping, Some(PathBuf::from("mapping.json")));
        assert_eq!(overrides.bulk_size, Some(-1));
    }

    #[test]
    fn the_one_where_a_refused_connection_earns_a_hint() {
        let err = anyhow::anyhow!("tcp connect error: Connection refused").context("💀 Migration aborted");
        assert!(smells_like_connection_trouble(&err));
        assert!(!smells_like_connection_trouble(&anyhow::anyhow!("mapper_parsing_exception")));
    }
}
