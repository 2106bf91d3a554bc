//! boxsync shell
//!
//! Mirrors a local directory tree with a per-user namespace in an S3 bucket.
//!
//! Usage:
//!   boxsync --user-id <id> --username <name> [--bucket <bucket>] [--root <dir>]
//!
//! Settings not given on the command line come from
//! `<config_dir>/boxsync/config.json` (or `--config <path>`).

use anyhow::{Context, Result};
use boxsync_cli::{CliConfig, Shell, resolve_root_directory, validate_username};
use boxsync_cloud::{ObjectStore, PreferenceStore, ROOT_DIRECTORY_KEY, S3ObjectStore};
use boxsync_sync::{Session, SyncEngine};
use boxsync_types::NamespaceRoot;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "boxsync")]
#[command(about = "Mirror a local directory tree with an S3 bucket")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stable user id; prefixes every key the user owns
    #[arg(long)]
    user_id: String,

    /// Username; names the local mirror directory
    #[arg(long)]
    username: String,

    /// Local root directory when none has been saved
    #[arg(long)]
    root: Option<PathBuf>,

    /// Bucket holding synced objects
    #[arg(long)]
    bucket: Option<String>,

    /// Bucket holding per-user preferences
    #[arg(long)]
    preferences_bucket: Option<String>,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// Endpoint of an S3-compatible service
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    path_style: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_to(&self, config: &mut CliConfig) {
        if let Some(bucket) = &self.bucket {
            config.s3.bucket = bucket.clone();
        }
        if let Some(bucket) = &self.preferences_bucket {
            config.s3.preferences_bucket = bucket.clone();
        }
        if let Some(region) = &self.region {
            config.s3.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint_url {
            config.s3.endpoint_url = Some(endpoint.clone());
        }
        if self.path_style {
            config.s3.force_path_style = true;
        }
        if let Some(root) = &self.root {
            config.root_directory = Some(root.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = CliConfig::load_or_default(args.config.as_deref())?;
    args.apply_to(&mut config);

    let namespace = NamespaceRoot::new(args.user_id.as_str()).context("Invalid --user-id")?;
    validate_username(&args.username)?;

    let store = S3ObjectStore::connect(&config.s3, &config.s3.bucket)
        .await
        .context("Failed to connect to the sync bucket")?;
    let store: Arc<dyn ObjectStore> = Arc::new(store);

    let preferences = if config.s3.preferences_bucket.is_empty() {
        warn!("No preferences bucket configured; the root directory will not be saved");
        None
    } else {
        let bucket = S3ObjectStore::connect(&config.s3, &config.s3.preferences_bucket)
            .await
            .context("Failed to connect to the preferences bucket")?;
        Some(PreferenceStore::new(Arc::new(bucket)))
    };

    let root =
        resolve_root_directory(preferences.as_ref(), &namespace, config.root_directory.clone())
            .await?;
    let session = Session::new(namespace, args.username.as_str(), root);
    let user_root = session.user_root();
    std::fs::create_dir_all(&user_root)
        .with_context(|| format!("Failed to create {}", user_root.display()))?;

    if let Some(preferences) = &preferences {
        let root = session.root_directory().display().to_string();
        if let Err(e) = preferences
            .save(session.namespace(), ROOT_DIRECTORY_KEY, &root)
            .await
        {
            warn!("Could not save root directory preference: {}", e);
        }
    }

    info!("boxsync starting for {} in {:?}", session.username(), user_root);
    let engine = Arc::new(SyncEngine::new(store));
    let mut shell = Shell::new(
        session,
        engine,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );
    if let Some(preferences) = preferences {
        shell = shell.with_preferences(preferences);
    }
    shell.run().await?;

    info!("Goodbye");
    Ok(())
}
