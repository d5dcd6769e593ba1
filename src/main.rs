use credwatch::config::{AppConfig, DomainConfig};
use credwatch::consumer::{ApiTokens, DatabaseSettings, FromCredentials, SettingsPublisher};
use credwatch::credential_watcher::{ChangeSource, ReloadCoordinator};
use credwatch::error::HandlerError;
use credwatch::store::CredentialStore;
use credwatch::traits::{FnHandler, ReloadHandler};

use async_trait::async_trait;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Publishes typed settings and logs their redacted form on every reload.
struct SettingsLogger<T> {
    publisher: SettingsPublisher<T>,
}

impl<T> SettingsLogger<T>
where
    T: FromCredentials + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            publisher: SettingsPublisher::new(),
        }
    }
}

#[async_trait]
impl<T> ReloadHandler for SettingsLogger<T>
where
    T: FromCredentials + Debug + Send + Sync + 'static,
{
    async fn on_reload(&self, store: Arc<CredentialStore>) -> Result<(), HandlerError> {
        let settings = self.publisher.refresh(&store)?;
        tracing::info!(
            domain = %store.name(),
            generation = store.generation(),
            settings = ?settings,
            "Settings refreshed"
        );
        Ok(())
    }

    async fn release(&self) {
        self.publisher.release().await;
    }
}

fn handler_for(domain: &DomainConfig) -> Arc<dyn ReloadHandler> {
    match domain.name.as_str() {
        "database" => Arc::new(SettingsLogger::<DatabaseSettings>::new()),
        "tokens" => Arc::new(SettingsLogger::<ApiTokens>::new()),
        _ => Arc::new(FnHandler::new(|store: &CredentialStore| {
            tracing::info!(
                domain = %store.name(),
                keys = store.snapshot().len(),
                "Credentials available"
            );
            Ok(())
        })),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn config_path_from_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return match args.next() {
                Some(path) => Ok(Some(PathBuf::from(path))),
                None => Err(eyre!("--config requires a file path")),
            };
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Ok(Some(PathBuf::from(path)));
        }
    }
    Ok(None)
}

async fn run(config: AppConfig) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    let mut coordinators = Vec::with_capacity(config.domains.len());
    for domain in &config.domains {
        let store = CredentialStore::from_config(domain);
        let started =
            ReloadCoordinator::start(store, handler_for(domain), ChangeSource::from_config(domain))
                .await;
        match started {
            Ok(coordinator) => coordinators.push(coordinator),
            Err(err) => {
                for coordinator in &coordinators {
                    coordinator.shutdown().await;
                }
                return Err(err.into());
            }
        }
    }

    tracing::info!(
        domains = coordinators.len(),
        "credwatch running, press Ctrl+C to stop"
    );
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
    tracing::info!("Shutdown requested");

    for coordinator in &coordinators {
        coordinator.shutdown().await;
        match serde_json::to_string(&coordinator.status()) {
            Ok(status) => tracing::info!(domain = %coordinator.domain(), %status, "Final reload status"),
            Err(err) => tracing::warn!(domain = %coordinator.domain(), error = %err, "Failed to encode status"),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    // Handle --version flag before any initialization
    if std::env::args().any(|arg| arg == "--version") {
        println!("credwatch {}", VERSION);
        std::process::exit(0);
    }

    color_eyre::install()?;
    init_tracing(std::env::args().any(|arg| arg == "--verbose"));

    let config = match config_path_from_args()? {
        Some(path) => AppConfig::load_file(&path)?,
        None => AppConfig::from_env()?,
    };
    tracing::info!(
        version = VERSION,
        domains = config.domains.len(),
        "Starting credwatch"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}
