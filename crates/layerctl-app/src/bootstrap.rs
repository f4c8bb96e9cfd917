use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use layerctl_api::{ApiServer, ControlPlane, CredentialGuard};
use layerctl_config::{FileStore, LayerRegistry, LayerStore, MemoryStore};
use layerctl_telemetry::{DEFAULT_LOG_LEVEL, GlobalContextGuard, LoggingConfig, Metrics};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::persistence::{persist_snapshot, spawn_persistence_task};
use crate::settings::AppSettings;

/// Dependencies required to bootstrap the control plane.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    settings: AppSettings,
    store: Arc<dyn LayerStore>,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        Self::from_settings(AppSettings::from_env()?)
    }

    pub(crate) fn from_settings(settings: AppSettings) -> AppResult<Self> {
        let logging = LoggingConfig {
            level: DEFAULT_LOG_LEVEL,
            format: settings.log_format,
            build_sha: option_env!("LAYERCTL_BUILD_SHA").unwrap_or("dev"),
        };
        let store: Arc<dyn LayerStore> = match &settings.state_path {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            logging,
            settings,
            store,
            telemetry,
        })
    }
}

/// Entry point for the control plane boot sequence.
///
/// # Errors
///
/// Returns an error if settings are invalid, the stored configuration cannot be restored,
/// or the API listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    layerctl_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    Box::pin(run_app_with(dependencies, shutdown_signal())).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let _context = GlobalContextGuard::new("layerctl");
    info!("layer control plane starting");

    let BootstrapDependencies {
        logging: _,
        settings,
        store,
        telemetry,
    } = dependencies;

    let guard = CredentialGuard::new(settings.admin_key.as_str())
        .map_err(|source| AppError::Guard { source })?;
    let registry = Arc::new(load_registry(store.as_ref()).await?);
    let persistence =
        spawn_persistence_task(registry.subscribe(), Arc::clone(&store), telemetry.clone());

    let control = ControlPlane::new(guard, Arc::clone(&registry), telemetry.clone());
    let api = ApiServer::new(control, telemetry.clone());

    let addr = SocketAddr::new(settings.bind_addr, settings.http_port);
    info!(addr = %addr, "launching API listener");
    let serve_result = api.serve(addr, shutdown).await;

    persistence.shutdown().await;
    persist_snapshot(store.as_ref(), &registry.snapshot(), &telemetry).await;

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Restore the registry from `store`, falling back to the defaults when nothing was saved.
pub(crate) async fn load_registry(store: &dyn LayerStore) -> AppResult<LayerRegistry> {
    let stored = store
        .load()
        .await
        .map_err(|err| AppError::config("layer_store.load", err))?;
    match stored {
        Some(document) => {
            let revision = document.revision;
            let registry = LayerRegistry::from_document(document)
                .map_err(|err| AppError::config("layer_registry.from_document", err))?;
            info!(revision, "restored stored layer configuration");
            Ok(registry)
        }
        None => {
            info!("no stored layer configuration; starting from defaults");
            Ok(LayerRegistry::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
