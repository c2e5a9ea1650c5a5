use std::fs::File;
use std::time::Duration;

use clap::Parser;
use sitesync_core::conf::ProcessSettings;
use sitesync_core::config_store::ConfigStore;
use sitesync_core::delivery::LettreSender;
use sitesync_core::model::SyncParameters;
use sitesync_core::source::mssql::MssqlConnector;
use sitesync_core::supervisor::{exit_code, Supervisor};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Incrementally syncs configured tables from the source database into
/// per-site CSV bundles, emailing each bundle to its site's recipient.
#[derive(Parser, Debug)]
#[command(name = "syncd")]
struct Cli {
    /// Override the path to the config-store SQLite database.
    #[arg(long)]
    config_db: Option<String>,

    /// Override the path to the sync_parameters.yaml file.
    #[arg(long)]
    sync_parameters: Option<String>,
}

fn init_logging(settings: &ProcessSettings) {
    let subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    );

    match &settings.log_file {
        Some(path) => {
            let file = File::create(path).expect("failed to create LOG_FILE");
            subscriber.with_writer(file).init();
        }
        None => subscriber.init(),
    }
}

#[tokio::main]
async fn main() {
    let settings = ProcessSettings::init();
    init_logging(&settings);

    let cli = Cli::parse();
    let config_db_path = cli
        .config_db
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| settings.config_db_path.clone());
    let sync_parameters_path = cli
        .sync_parameters
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| settings.sync_parameters_path.clone());

    // ConfigStore wraps a synchronous diesel SqliteConnection; this is a
    // one-shot read at startup, not a hot path, so it runs on a blocking
    // thread rather than pulling diesel's sqlite backend onto the
    // executor's async tasks.
    let loaded = tokio::task::spawn_blocking(move || {
        let mut store = ConfigStore::connect(&config_db_path.to_string_lossy())?;
        let source_config = store.load_source_config()?;
        let email_transport = store.load_email_transport()?;
        let site_bindings = store.load_site_bindings()?;
        let staging_folders = store.load_staging_folders()?;
        Ok::<_, sitesync_core::error::SyncError>((
            source_config,
            email_transport,
            site_bindings,
            staging_folders,
        ))
    })
    .await
    .expect("config store loader task panicked");

    let (source_config, email_transport, site_bindings, staging_folders) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "failed to load configuration from config store");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };

    let sync_parameters_yaml = match std::fs::read_to_string(&sync_parameters_path) {
        Ok(contents) => contents,
        Err(err) => {
            error!(error = %err, path = %sync_parameters_path.display(), "failed to read sync_parameters.yaml");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };
    let params: SyncParameters = match serde_yaml::from_str(&sync_parameters_yaml) {
        Ok(params) => params,
        Err(err) => {
            error!(error = %err, "failed to parse sync_parameters.yaml");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };

    for site in &params.sites {
        if !site_bindings.contains_key(site) {
            error!(%site, "site has no configured recipient in site_configs");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    }

    let email_sender = match LettreSender::new(&email_transport) {
        Ok(sender) => sender,
        Err(err) => {
            error!(error = %err, "failed to initialize email transport");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };

    let tracking_triplet = params.tracking_triplet.clone();
    let cancellation = CancellationToken::new();
    let shutdown_signal = cancellation.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_signal.cancel();
    });

    let connect_config = source_config.clone();
    let connect_tracking = tracking_triplet.clone();
    let connect_site_keys = params.site_key_column.clone();
    let connect = move || {
        let config = connect_config.clone();
        let tracking = connect_tracking.clone();
        let site_keys = connect_site_keys.clone();
        Box::pin(async move { MssqlConnector::connect(&config, tracking, site_keys).await })
            as std::pin::Pin<Box<dyn std::future::Future<Output = sitesync_core::error::Result<MssqlConnector>> + Send>>
    };

    let mut supervisor = Supervisor::new(
        Duration::from_secs(settings.tick_interval_secs),
        Duration::from_secs(settings.tick_watchdog_secs),
        staging_folders.base_dir.clone(),
        params,
        tracking_triplet,
        site_bindings,
        email_sender,
        cancellation,
        connect,
    );

    let code = supervisor.run().await;
    std::process::exit(code);
}
