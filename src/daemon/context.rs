//! Bundles the daemon's long-lived collaborators: the session registry, the
//! event store, the query table registry, and the host-tooling-backed attach
//! seams, all built from `Config`.

use std::sync::Arc;

use crate::attach::{AttachManager, HostToolingPortDiscoverer, HostToolingResolver, LldbCreateExecutor};
use crate::config::Config;
use crate::error::Result;
use crate::query::TableRegistry;
use crate::session::SessionRegistry;
use crate::store::EventStore;

pub struct DaemonContext {
    pub config: Config,
    pub registry: SessionRegistry,
    pub store: Arc<EventStore>,
    pub tables: TableRegistry,
    pub resolver: HostToolingResolver,
    pub port_discoverer: HostToolingPortDiscoverer,
    pub create_executor: LldbCreateExecutor,
}

impl DaemonContext {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(EventStore::open(&config.event_store_path.to_string_lossy()).await?);
        let tables = TableRegistry::new(store.clone());
        let resolver = HostToolingResolver {
            tool_path: config.host_tooling_path.clone(),
        };
        let port_discoverer = HostToolingPortDiscoverer {
            tool_path: config.host_tooling_path.clone(),
        };
        let create_executor = LldbCreateExecutor {
            adapter_path: config.dap_adapter_path.clone(),
        };
        Ok(Self {
            config,
            registry: SessionRegistry::new(),
            store,
            tables,
            resolver,
            port_discoverer,
            create_executor,
        })
    }

    pub fn attach_manager(&self) -> AttachManager<'_> {
        AttachManager::new(&self.create_executor, &self.port_discoverer)
    }

    /// Process-wide cleanup path (spec §4.5/§5): close every session, flush
    /// and close the event store, unlink the socket file. Shared by the
    /// normal shutdown command and the signal/panic handlers.
    pub async fn shutdown(&self) {
        for name in self.registry.list().await {
            if let Err(e) = self.registry.close(Some(&name)).await {
                tracing::warn!(session = %name, error = %e, "error closing session during shutdown");
            }
        }
        if let Err(e) = self.store.close().await {
            tracing::warn!(error = %e, "error closing event store during shutdown");
        }
        let _ = std::fs::remove_file(&self.config.socket_path);
    }
}
