//! Lifecycle holder for the single live connection manager
//!
//! The registry is an explicit handle owned by the application and shared by
//! `Arc`; nothing here is a process global. One lock spans every
//! check-and-construct and every teardown, so callers never observe a
//! half-built manager and at most one pool exists between `initialize` and
//! `shutdown`.

use crate::config::{DatabaseSettings, Settings};
use crate::infrastructure::database::{ConnectionManager, DatabaseManager, RetryPolicy};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Builds a connected manager
#[async_trait]
pub trait ManagerFactory: Send + Sync {
    type Manager: DatabaseManager + 'static;

    async fn create(&self) -> Result<Self::Manager>;
}

/// Factory for the PostgreSQL-backed [`ConnectionManager`]
#[derive(Clone)]
pub struct PgManagerFactory {
    database: DatabaseSettings,
    retry: RetryPolicy,
}

impl PgManagerFactory {
    pub fn new(database: DatabaseSettings, retry: RetryPolicy) -> Self {
        Self { database, retry }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings.database.clone(),
            RetryPolicy::try_from(&settings.retry)?,
        ))
    }
}

#[async_trait]
impl ManagerFactory for PgManagerFactory {
    type Manager = ConnectionManager;

    async fn create(&self) -> Result<ConnectionManager> {
        ConnectionManager::connect(&self.database, self.retry).await
    }
}

pub struct ManagerRegistry<F: ManagerFactory> {
    factory: F,
    manager: Mutex<Option<Arc<F::Manager>>>,
}

impl<F: ManagerFactory> ManagerRegistry<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            manager: Mutex::new(None),
        }
    }

    /// Construct the manager unless one is already live.
    ///
    /// A failed construction leaves the registry uninitialized so a later
    /// call can try again.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let mut slot = self.manager.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        info!("Initializing database connection");
        *slot = Some(self.construct().await?);
        info!("Database connection initialized successfully");
        Ok(())
    }

    /// The live manager, constructing it on first use
    pub async fn get_manager(&self) -> Result<Arc<F::Manager>> {
        let mut slot = self.manager.lock().await;
        if let Some(manager) = slot.as_ref() {
            return Ok(Arc::clone(manager));
        }

        let manager = self.construct().await?;
        *slot = Some(Arc::clone(&manager));
        Ok(manager)
    }

    /// Close the pool and reset; a no-op when nothing is live.
    ///
    /// If closing fails the manager stays registered.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        let mut slot = self.manager.lock().await;
        let Some(manager) = slot.as_ref() else {
            return Ok(());
        };

        info!("Shutting down database connection");
        manager.close().await?;
        *slot = None;
        info!("Database connection closed successfully");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.manager.lock().await.is_some()
    }

    async fn construct(&self) -> Result<Arc<F::Manager>> {
        match self.factory.create().await {
            Ok(manager) => Ok(Arc::new(manager)),
            Err(e @ Error::Construction(_)) => Err(e),
            Err(e) => Err(Error::Construction(e.to_string())),
        }
    }
}
