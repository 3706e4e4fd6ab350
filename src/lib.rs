use std::sync::Arc;
use std::time::Duration;

use auth::{AuthProvider, CognitoAuthProvider, MemoryAuthProvider};
use clients::ClientRegistry;
use config::{AppConfig, AuthBackendConfig, StoreBackendConfig};
use store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
use tasks::{Clock, SystemClock, TaskStore};

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
pub mod schema;
pub mod store;
pub mod tasks;
pub mod views;

/// Handles to the external services, built once from configuration and
/// handed to every gateway and task store.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
}

impl Backend {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let auth: Arc<dyn AuthProvider> = match &config.auth {
            AuthBackendConfig::Cognito(cognito) => {
                tracing::info!(user_pool_id = %cognito.user_pool_id, "using Cognito auth provider");
                Arc::new(CognitoAuthProvider::new(cognito.clone()).await?)
            }
            AuthBackendConfig::Memory => {
                tracing::warn!("using in-memory auth provider, accounts are lost on restart");
                Arc::new(MemoryAuthProvider::new())
            }
        };

        let documents: Arc<dyn DocumentStore> = match &config.store {
            StoreBackendConfig::Sqlite { url, .. } => {
                Arc::new(SqliteDocumentStore::connect(url).await?)
            }
            StoreBackendConfig::Memory { .. } => {
                tracing::warn!("using in-memory document store, todos are lost on restart");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        if config.store.provision_indexes() {
            documents.provision_index(&TaskStore::required_index()).await?;
        }

        Ok(Self {
            auth,
            documents,
            clock: Arc::new(SystemClock::default()),
        })
    }
}

// Struct representing the application state
pub struct AppState {
    pub clients: ClientRegistry,
}

impl AppState {
    pub fn new(backend: Backend, client_idle_timeout: Duration) -> Self {
        Self {
            clients: ClientRegistry::new(backend, client_idle_timeout),
        }
    }
}
