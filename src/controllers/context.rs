use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::clock::{Clock, SystemClock};
use crate::models::realtime::{self, RealtimeChannel, RealtimeEvent};
use crate::models::{Backend, Config, LocalStore, MemoryBackend, SupabaseClient};

enum Remote {
    Hosted { url: String, key: String },
    Local(Arc<MemoryBackend>),
}

/// Everything a session needs, built once in `main` and handed down.
#[derive(Clone)]
pub struct AppContext {
    pub backend: Arc<dyn Backend>,
    pub store: LocalStore,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    remote: Arc<Remote>,
}

impl AppContext {
    pub fn from_config(config: Config, store: LocalStore) -> Result<Self> {
        if config.offline {
            log::info!("Running offline on the in-memory backend");
            return Ok(Self::local(config, store, Arc::new(MemoryBackend::new()), Arc::new(SystemClock)));
        }

        let (url, key) = config.credentials()?;
        let remote = Remote::Hosted {
            url: url.to_string(),
            key: key.to_string(),
        };
        let backend: Arc<dyn Backend> = Arc::new(SupabaseClient::new(url, key)?);

        Ok(Self {
            backend,
            store,
            clock: Arc::new(SystemClock),
            config,
            remote: Arc::new(remote),
        })
    }

    pub fn local(
        config: Config,
        store: LocalStore,
        backend: Arc<MemoryBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend: backend.clone(),
            store,
            clock,
            config,
            remote: Arc::new(Remote::Local(backend)),
        }
    }

    /// Starts the change feed. Events arrive on the returned receiver until
    /// the task is aborted at teardown.
    pub fn subscribe(&self) -> Result<(JoinHandle<()>, mpsc::UnboundedReceiver<RealtimeEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = match self.remote.as_ref() {
            Remote::Hosted { url, key } => {
                let channel = RealtimeChannel::new(url, key)?;
                tokio::spawn(async move {
                    if let Err(e) = channel.run(tx).await {
                        log::error!("Realtime subscription ended: {}", e);
                    }
                })
            }
            Remote::Local(backend) => tokio::spawn(realtime::forward_local(backend.subscribe(), tx)),
        };
        Ok((handle, rx))
    }
}
