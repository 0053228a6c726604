use crate::application::maintenance::spawn_cleanup_schedule;
use crate::application::routes::{router, AppState};
use crate::config::Settings;
use crate::infrastructure::{
    DatabaseManager, ManagerRegistry, PgManagerFactory, RequestLogDao,
};
use crate::request_logging::{
    QueueCapacity, RequestLogQueue, RequestLogWriter, RequestLoggingConfig, RequestLoggingStack,
    RequestLoggingState, WorkerCount,
};
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    registry: Arc<ManagerRegistry<PgManagerFactory>>,
}

impl Application {
    #[instrument]
    pub async fn new() -> Result<Self> {
        Self::with_settings(Settings::new()?).await
    }

    /// Build from explicit settings and open the database connection
    #[instrument(skip(settings))]
    pub async fn with_settings(settings: Settings) -> Result<Self> {
        info!(
            host = %settings.database.host,
            port = settings.database.port,
            database = %settings.database.name,
            "Connecting to database"
        );
        let registry = Arc::new(ManagerRegistry::new(PgManagerFactory::from_settings(
            &settings,
        )?));
        registry.initialize().await?;

        Ok(Self { settings, registry })
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let manager: Arc<dyn DatabaseManager> = self.registry.get_manager().await?;

        let logging = &self.settings.request_logging;
        let queue = Arc::new(RequestLogQueue::new(
            QueueCapacity::try_new(logging.queue_capacity).map_err(|e| {
                Error::validation("request_logging.queue_capacity", e.to_string())
            })?,
        ));
        let writer = RequestLogWriter::start(
            Arc::clone(&queue),
            Arc::new(RequestLogDao::new(Arc::clone(&manager))),
            WorkerCount::try_new(logging.workers)
                .map_err(|e| Error::validation("request_logging.workers", e.to_string()))?,
        );
        let logging_state = Arc::new(RequestLoggingState::new(
            RequestLoggingConfig::from(logging)
                .with_body_read_timeout(self.settings.application.request_timeout()),
            queue,
        ));
        info!(enabled = logging.enabled, "Request logging configured");
        if self.settings.application.admin_routes {
            warn!("Admin routes are mounted without authentication");
        }

        let state = AppState::new(Arc::clone(&manager), self.settings.maintenance.clone());
        let schedule = spawn_cleanup_schedule(
            state.texts.clone(),
            state.logs.clone(),
            self.settings.maintenance.clone(),
        );

        let app = RequestLoggingStack::new(logging_state, self.settings.application.request_timeout())
            .apply_to_router(router(state, self.settings.application.admin_routes));

        let address = format!(
            "{}:{}",
            self.settings.application.host, self.settings.application.port
        );
        let listener = TcpListener::bind(&address).await?;
        info!(%address, "Starting AllMiTools server");

        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        info!("Shutting down server");
        schedule.shutdown().await;
        writer.shutdown().await;

        // Release our handle before the registry closes the pool
        drop(manager);
        if let Err(e) = self.registry.shutdown().await {
            error!(error = %e, "Error closing database connection");
        }

        served.map_err(Error::from)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ManagerRegistry<PgManagerFactory>> {
        &self.registry
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
}
